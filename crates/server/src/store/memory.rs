use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{PollStore, Store, VoteStore};
use crate::error::StoreError;
use crate::models::{NewPoll, NewVote, Poll, PollSummary, Vote, VoterIdentity};

#[derive(Default)]
struct Tables {
    polls: Vec<Poll>,
    votes: Vec<Vote>,
}

/// Process-local store. Check and insert of a vote happen under one lock, so
/// the one-vote-per-identity rule holds under concurrent requests.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn newest_first<'a>(polls: impl DoubleEndedIterator<Item = &'a Poll>) -> Vec<Poll> {
    // Reversed insertion order keeps newer polls first when timestamps tie.
    let mut polls: Vec<Poll> = polls.rev().cloned().collect();
    polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    polls
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn create_poll(&self, poll: NewPoll) -> Result<Poll, StoreError> {
        let poll = Poll {
            id: Uuid::new_v4(),
            title: poll.title,
            options: poll.options,
            creator_id: poll.creator_id,
            created_at: Utc::now(),
        };
        self.tables().polls.push(poll.clone());
        Ok(poll)
    }

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        Ok(newest_first(self.tables().polls.iter()))
    }

    async fn get_poll(&self, id: Uuid) -> Result<Option<Poll>, StoreError> {
        Ok(self.tables().polls.iter().find(|p| p.id == id).cloned())
    }

    async fn list_polls_by_creator(
        &self,
        creator_id: &str,
    ) -> Result<Vec<PollSummary>, StoreError> {
        let tables = self.tables();
        let owned = tables
            .polls
            .iter()
            .filter(|p| p.creator_id.as_deref() == Some(creator_id));

        Ok(newest_first(owned)
            .into_iter()
            .map(|poll| {
                let vote_count = tables.votes.iter().filter(|v| v.poll_id == poll.id).count();
                PollSummary {
                    poll,
                    vote_count: vote_count as i64,
                }
            })
            .collect())
    }

    async fn delete_poll(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let before = tables.polls.len();
        tables.polls.retain(|p| p.id != id);
        if tables.polls.len() == before {
            return Ok(false);
        }
        tables.votes.retain(|v| v.poll_id != id);
        Ok(true)
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn insert_vote(&self, vote: NewVote) -> Result<Option<Vote>, StoreError> {
        let mut tables = self.tables();
        let key = vote.voter.key();
        let duplicate = tables.votes.iter().any(|v| {
            v.poll_id == vote.poll_id && v.voter().is_some_and(|voter| voter.key() == key)
        });
        if duplicate {
            return Ok(None);
        }

        let vote = Vote {
            id: Uuid::new_v4(),
            poll_id: vote.poll_id,
            option_index: vote.option_index,
            user_id: vote.voter.user_id().map(str::to_string),
            ip_address: vote.voter.ip_address().map(str::to_string),
            created_at: Utc::now(),
        };
        tables.votes.push(vote.clone());
        Ok(Some(vote))
    }

    async fn list_votes(&self, poll_id: Uuid) -> Result<Vec<Vote>, StoreError> {
        Ok(self
            .tables()
            .votes
            .iter()
            .filter(|v| v.poll_id == poll_id)
            .cloned()
            .collect())
    }

    async fn list_votes_by_voter(
        &self,
        poll_id: Uuid,
        voter: &VoterIdentity,
    ) -> Result<Vec<Vote>, StoreError> {
        Ok(self
            .tables()
            .votes
            .iter()
            .filter(|v| v.poll_id == poll_id && v.voter().as_ref() == Some(voter))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn new_poll(title: &str, creator: Option<&str>) -> NewPoll {
        NewPoll {
            title: title.into(),
            options: vec!["Red".into(), "Blue".into(), "Green".into()],
            creator_id: creator.map(str::to_string),
        }
    }

    fn vote(poll_id: Uuid, option_index: i32, voter: VoterIdentity) -> NewVote {
        NewVote {
            poll_id,
            option_index,
            voter,
        }
    }

    #[tokio::test]
    async fn lists_polls_newest_first() {
        let store = MemoryStore::new();
        let first = store.create_poll(new_poll("first", None)).await.unwrap();
        let second = store.create_poll(new_poll("second", None)).await.unwrap();

        let ids: Vec<Uuid> = store.list_polls().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn second_vote_from_same_identity_is_not_stored() {
        let store = MemoryStore::new();
        let poll = store.create_poll(new_poll("p", None)).await.unwrap();
        let alice = VoterIdentity::User("alice".into());

        let stored = store.insert_vote(vote(poll.id, 0, alice.clone())).await.unwrap();
        assert!(stored.is_some());
        let again = store.insert_vote(vote(poll.id, 1, alice.clone())).await.unwrap();
        assert!(again.is_none());

        assert_eq!(store.list_votes(poll.id).await.unwrap().len(), 1);
        assert_eq!(store.list_votes_by_voter(poll.id, &alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn user_and_address_are_separate_voters() {
        let store = MemoryStore::new();
        let poll = store.create_poll(new_poll("p", None)).await.unwrap();

        let by_addr = VoterIdentity::Address("10.0.0.5".into());
        let by_user = VoterIdentity::User("u1".into());
        assert!(store.insert_vote(vote(poll.id, 0, by_addr.clone())).await.unwrap().is_some());
        assert!(store.insert_vote(vote(poll.id, 1, by_user.clone())).await.unwrap().is_some());

        let stored = store.list_votes_by_voter(poll.id, &by_addr).await.unwrap();
        assert_eq!(stored[0].ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(stored[0].user_id, None);
    }

    #[tokio::test]
    async fn concurrent_duplicate_votes_store_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let poll_id = store.create_poll(new_poll("p", None)).await.unwrap().id;

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_vote(vote(poll_id, i % 3, VoterIdentity::Address("1.2.3.4".into())))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut stored = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                stored += 1;
            }
        }
        assert_eq!(stored, 1);
        assert_eq!(store.list_votes(poll_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn creator_listing_counts_votes_and_delete_cascades() {
        let store = MemoryStore::new();
        let mine = store.create_poll(new_poll("mine", Some("u1"))).await.unwrap();
        store.create_poll(new_poll("theirs", Some("u2"))).await.unwrap();
        store.create_poll(new_poll("anonymous", None)).await.unwrap();

        for addr in ["a", "b"] {
            store
                .insert_vote(vote(mine.id, 0, VoterIdentity::Address(addr.into())))
                .await
                .unwrap();
        }

        let summaries = store.list_polls_by_creator("u1").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].poll.id, mine.id);
        assert_eq!(summaries[0].vote_count, 2);

        assert!(store.delete_poll(mine.id).await.unwrap());
        assert!(!store.delete_poll(mine.id).await.unwrap());
        assert!(store.get_poll(mine.id).await.unwrap().is_none());
        assert!(store.list_votes(mine.id).await.unwrap().is_empty());
    }
}
