use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: Uuid,
    pub title: String,
    pub options: Vec<String>,
    pub creator_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A poll as listed on its creator's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PollSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub poll: Poll,
    pub vote_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_index: i32,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn voter(&self) -> Option<VoterIdentity> {
        match (&self.user_id, &self.ip_address) {
            (Some(user), _) => Some(VoterIdentity::User(user.clone())),
            (None, Some(addr)) => Some(VoterIdentity::Address(addr.clone())),
            (None, None) => None,
        }
    }
}

/// Who is casting a vote. An authenticated user always wins over the
/// network address the request came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VoterIdentity {
    User(String),
    Address(String),
}

impl VoterIdentity {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            VoterIdentity::User(id) => Some(id),
            VoterIdentity::Address(_) => None,
        }
    }

    pub fn ip_address(&self) -> Option<&str> {
        match self {
            VoterIdentity::User(_) => None,
            VoterIdentity::Address(addr) => Some(addr),
        }
    }

    /// Key that is unique per (poll, voter). Mirrors the generated
    /// `voter_key` column in the votes table.
    pub fn key(&self) -> String {
        match self {
            VoterIdentity::User(id) => format!("user:{id}"),
            VoterIdentity::Address(addr) => format!("ip:{addr}"),
        }
    }
}

/// A poll that passed validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub title: String,
    pub options: Vec<String>,
    pub creator_id: Option<String>,
}

pub const MIN_OPTIONS: usize = 2;

impl NewPoll {
    /// Trims the title and every option, drops blank options and keeps the
    /// remaining ones in their original order.
    pub fn new(
        title: &str,
        options: &[String],
        creator: Option<&VoterIdentity>,
    ) -> Result<Self, AppError> {
        let title = title.trim();
        let options: Vec<String> = options
            .iter()
            .map(|opt| opt.trim())
            .filter(|opt| !opt.is_empty())
            .map(str::to_string)
            .collect();

        if title.is_empty() || options.len() < MIN_OPTIONS {
            return Err(AppError::Validation(
                "Title and at least 2 options are required".into(),
            ));
        }

        Ok(Self {
            title: title.to_string(),
            options,
            creator_id: creator.and_then(VoterIdentity::user_id).map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVote {
    pub poll_id: Uuid,
    pub option_index: i32,
    pub voter: VoterIdentity,
}

// ===== Request / response bodies =====

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub title: Option<String>,
    pub options: Option<Vec<String>>,
}

/// `optionIndex` is kept as a raw JSON number because browsers happily send
/// `1.0` for `1`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub poll_id: Option<String>,
    pub option_index: Option<serde_json::Number>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
    pub vote: Vote,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub poll_id: Uuid,
    pub counts: Vec<u64>,
    pub percentages: Vec<u64>,
    pub total_votes: u64,
    pub has_voted: bool,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub url: String,
}
