//! Persistence for polls and votes.
//!
//! Two backends implement the same traits: [`PgStore`] talks to Postgres and
//! relies on its unique index for one-vote-per-identity, [`MemoryStore`] keeps
//! everything behind a single lock and is used when no database is configured.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewPoll, NewVote, Poll, PollSummary, Vote, VoterIdentity};

#[async_trait]
pub trait PollStore: Send + Sync {
    async fn create_poll(&self, poll: NewPoll) -> Result<Poll, StoreError>;

    /// Every poll, newest first.
    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError>;

    async fn get_poll(&self, id: Uuid) -> Result<Option<Poll>, StoreError>;

    /// Polls created by `creator_id`, newest first, with their vote counts.
    async fn list_polls_by_creator(&self, creator_id: &str)
    -> Result<Vec<PollSummary>, StoreError>;

    /// Removes the poll and its votes. Returns `false` if it did not exist.
    async fn delete_poll(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Inserts the vote unless this voter already has one on the poll, in
    /// which case nothing is written and `None` is returned.
    async fn insert_vote(&self, vote: NewVote) -> Result<Option<Vote>, StoreError>;

    async fn list_votes(&self, poll_id: Uuid) -> Result<Vec<Vote>, StoreError>;

    async fn list_votes_by_voter(
        &self,
        poll_id: Uuid,
        voter: &VoterIdentity,
    ) -> Result<Vec<Vote>, StoreError>;
}

#[async_trait]
pub trait Store: PollStore + VoteStore {
    /// Cheap liveness check for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    fn backend(&self) -> &'static str;
}
