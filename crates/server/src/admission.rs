//! Deciding whether a vote may be cast, and casting it.

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewVote, Poll, Vote, VoteRequest, VoterIdentity};
use crate::notifier::{ChangeNotifier, VoteCast};
use crate::store::Store;

/// A vote request with both fields present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ballot {
    pub poll_id: Uuid,
    pub option_index: i64,
}

impl Ballot {
    pub fn from_request(request: &VoteRequest) -> Result<Self, AppError> {
        let missing = || AppError::Validation("Poll ID and option index are required".into());

        let poll_id = request
            .poll_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(missing)?;
        let option_index = request.option_index.as_ref().ok_or_else(missing)?;

        // A malformed id can never match a poll.
        let poll_id = Uuid::parse_str(poll_id).map_err(|_| poll_not_found())?;
        let option_index = whole_number(option_index)
            .ok_or_else(|| AppError::Validation("Option index is out of range".into()))?;

        Ok(Self {
            poll_id,
            option_index,
        })
    }
}

fn poll_not_found() -> AppError {
    AppError::Validation("Poll not found".into())
}

fn whole_number(number: &serde_json::Number) -> Option<i64> {
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// Checks the ballot against the poll and the voter's earlier votes. The
/// store's insert-if-absent still has the final word on duplicates.
pub async fn admit(
    store: &dyn Store,
    poll: &Poll,
    option_index: i64,
    voter: &VoterIdentity,
) -> Result<NewVote, AppError> {
    let option_index = i32::try_from(option_index)
        .ok()
        .filter(|&index| index >= 0 && (index as usize) < poll.options.len())
        .ok_or_else(|| AppError::Validation("Option index is out of range".into()))?;

    let previous = store.list_votes_by_voter(poll.id, voter).await?;
    if !previous.is_empty() {
        debug!(poll_id = %poll.id, "duplicate vote rejected before insert");
        return Err(AppError::AlreadyVoted);
    }

    Ok(NewVote {
        poll_id: poll.id,
        option_index,
        voter: voter.clone(),
    })
}

/// Validates, admits and stores one vote, then tells the poll's viewers.
pub async fn cast_vote(
    store: &dyn Store,
    notifier: &ChangeNotifier,
    ballot: Ballot,
    voter: &VoterIdentity,
) -> Result<Vote, AppError> {
    let poll = store
        .get_poll(ballot.poll_id)
        .await?
        .ok_or_else(poll_not_found)?;

    let new_vote = admit(store, &poll, ballot.option_index, voter).await?;
    let vote = store
        .insert_vote(new_vote)
        .await?
        .ok_or(AppError::AlreadyVoted)?;

    info!(poll_id = %vote.poll_id, option = vote.option_index, "vote recorded");
    notifier.publish(VoteCast::from(&vote));
    Ok(vote)
}

/// Whether this voter already has a vote on the poll.
pub async fn has_voted(
    store: &dyn Store,
    poll_id: Uuid,
    voter: &VoterIdentity,
) -> Result<bool, AppError> {
    Ok(!store.list_votes_by_voter(poll_id, voter).await?.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPoll;
    use crate::store::{MemoryStore, PollStore};

    fn request(poll_id: Option<&str>, option_index: Option<i64>) -> VoteRequest {
        VoteRequest {
            poll_id: poll_id.map(str::to_string),
            option_index: option_index.map(serde_json::Number::from),
        }
    }

    fn raw_request(body: serde_json::Value) -> VoteRequest {
        serde_json::from_value(body).unwrap()
    }

    async fn color_poll(store: &MemoryStore) -> Poll {
        let options = vec!["Red".to_string(), "Blue".to_string()];
        store
            .create_poll(NewPoll::new("Color?", &options, None).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn missing_fields_are_rejected() {
        let id = Uuid::new_v4().to_string();
        for req in [
            request(None, Some(0)),
            request(Some(""), Some(0)),
            request(Some(&id), None),
        ] {
            let err = Ballot::from_request(&req).unwrap_err();
            assert_eq!(err.to_string(), "Poll ID and option index are required");
        }
    }

    #[test]
    fn malformed_poll_id_is_a_bad_request() {
        let err = Ballot::from_request(&request(Some("nope"), Some(0))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Poll not found");
    }

    #[test]
    fn integral_floats_are_accepted_as_indexes() {
        let id = Uuid::new_v4().to_string();
        let ballot = Ballot::from_request(&raw_request(
            serde_json::json!({ "pollId": id, "optionIndex": 1.0 }),
        ))
        .unwrap();
        assert_eq!(ballot.option_index, 1);

        for index in [serde_json::json!(1.5), serde_json::json!(1e300)] {
            let err = Ballot::from_request(&raw_request(
                serde_json::json!({ "pollId": id, "optionIndex": index }),
            ))
            .unwrap_err();
            assert_eq!(err.to_string(), "Option index is out of range");
        }
    }

    #[tokio::test]
    async fn out_of_range_option_is_rejected() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;
        let voter = VoterIdentity::Address("10.0.0.5".into());

        for index in [-1, 2, 5, i64::from(i32::MAX) + 1] {
            let err = admit(&store, &poll, index, &voter).await.unwrap_err();
            assert_eq!(err.to_string(), "Option index is out of range");
        }
    }

    #[tokio::test]
    async fn second_vote_is_rejected() {
        let store = MemoryStore::new();
        let notifier = ChangeNotifier::new(4);
        let poll = color_poll(&store).await;
        let alice = VoterIdentity::User("alice".into());
        let ballot = Ballot {
            poll_id: poll.id,
            option_index: 0,
        };

        cast_vote(&store, &notifier, ballot, &alice).await.unwrap();
        let err = cast_vote(&store, &notifier, ballot, &alice).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyVoted));
        assert!(has_voted(&store, poll.id, &alice).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_poll_is_a_bad_request() {
        let store = MemoryStore::new();
        let notifier = ChangeNotifier::new(4);
        let ballot = Ballot {
            poll_id: Uuid::new_v4(),
            option_index: 0,
        };
        let voter = VoterIdentity::Address("10.0.0.5".into());

        let err = cast_vote(&store, &notifier, ballot, &voter).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Poll not found");
    }

    #[tokio::test]
    async fn viewers_are_told_about_new_votes() {
        let store = MemoryStore::new();
        let notifier = ChangeNotifier::new(4);
        let poll = color_poll(&store).await;
        let mut viewer = notifier.subscribe(poll.id);

        let ballot = Ballot {
            poll_id: poll.id,
            option_index: 1,
        };
        let voter = VoterIdentity::Address("10.0.0.5".into());
        cast_vote(&store, &notifier, ballot, &voter).await.unwrap();

        let hint = viewer.recv().await.unwrap();
        assert_eq!(hint.poll_id, poll.id);
        assert_eq!(hint.option_index, 1);
    }
}
