use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Poll {
    pub id: String,
    pub title: String,
    pub options: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollSummary {
    #[serde(flatten)]
    pub poll: Poll,
    pub vote_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Results {
    pub counts: Vec<u64>,
    pub percentages: Vec<u64>,
    pub total_votes: u64,
    pub has_voted: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatePollRequest<'a> {
    pub title: &'a str,
    pub options: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest<'a> {
    pub poll_id: &'a str,
    pub option_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct ShareResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
