use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

use super::{PollStore, Store, VoteStore};
use crate::error::StoreError;
use crate::models::{NewPoll, NewVote, Poll, PollSummary, Vote, VoterIdentity};

const POLL_COLUMNS: &str = "id, title, options, creator_id, created_at";
const VOTE_COLUMNS: &str = "id, poll_id, option_index, user_id, ip_address, created_at";

/// Postgres backend. One vote per (poll, voter) is enforced by the
/// `UNIQUE (poll_id, voter_key)` constraint, so admission is a single
/// insert-if-absent statement.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { db })
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn create_poll(&self, poll: NewPoll) -> Result<Poll, StoreError> {
        let created = sqlx::query_as::<_, Poll>(&format!(
            "INSERT INTO polls (id, title, options, creator_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {POLL_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&poll.title)
        .bind(&poll.options)
        .bind(&poll.creator_id)
        .fetch_one(&self.db)
        .await?;

        Ok(created)
    }

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let polls = sqlx::query_as::<_, Poll>(&format!(
            "SELECT {POLL_COLUMNS} FROM polls ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(polls)
    }

    async fn get_poll(&self, id: Uuid) -> Result<Option<Poll>, StoreError> {
        let poll = sqlx::query_as::<_, Poll>(&format!(
            "SELECT {POLL_COLUMNS} FROM polls WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(poll)
    }

    async fn list_polls_by_creator(
        &self,
        creator_id: &str,
    ) -> Result<Vec<PollSummary>, StoreError> {
        let polls = sqlx::query_as::<_, PollSummary>(
            "SELECT p.id, p.title, p.options, p.creator_id, p.created_at,
                    COUNT(v.id) AS vote_count
             FROM polls p
             LEFT JOIN votes v ON v.poll_id = p.id
             WHERE p.creator_id = $1
             GROUP BY p.id
             ORDER BY p.created_at DESC",
        )
        .bind(creator_id)
        .fetch_all(&self.db)
        .await?;

        Ok(polls)
    }

    async fn delete_poll(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VoteStore for PgStore {
    async fn insert_vote(&self, vote: NewVote) -> Result<Option<Vote>, StoreError> {
        let inserted = sqlx::query_as::<_, Vote>(&format!(
            "INSERT INTO votes (id, poll_id, option_index, user_id, ip_address)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (poll_id, voter_key) DO NOTHING
             RETURNING {VOTE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(vote.poll_id)
        .bind(vote.option_index)
        .bind(vote.voter.user_id())
        .bind(vote.voter.ip_address())
        .fetch_optional(&self.db)
        .await?;

        Ok(inserted)
    }

    async fn list_votes(&self, poll_id: Uuid) -> Result<Vec<Vote>, StoreError> {
        let votes = sqlx::query_as::<_, Vote>(&format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE poll_id = $1"
        ))
        .bind(poll_id)
        .fetch_all(&self.db)
        .await?;

        Ok(votes)
    }

    async fn list_votes_by_voter(
        &self,
        poll_id: Uuid,
        voter: &VoterIdentity,
    ) -> Result<Vec<Vote>, StoreError> {
        let votes = sqlx::query_as::<_, Vote>(&format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE poll_id = $1 AND voter_key = $2"
        ))
        .bind(poll_id)
        .bind(voter.key())
        .fetch_all(&self.db)
        .await?;

        Ok(votes)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
