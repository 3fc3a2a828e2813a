//! Live "a vote was cast" hints for viewers of a poll.
//!
//! Each poll with at least one viewer gets its own bounded broadcast channel.
//! Hints are advisory: a viewer that lags or reconnects simply refetches the
//! results, so nothing here is a source of truth.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::Vote;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteCast {
    pub poll_id: Uuid,
    pub option_index: i32,
    pub created_at: DateTime<Utc>,
}

impl From<&Vote> for VoteCast {
    fn from(vote: &Vote) -> Self {
        Self {
            poll_id: vote.poll_id,
            option_index: vote.option_index,
            created_at: vote.created_at,
        }
    }
}

pub struct ChangeNotifier {
    channels: Mutex<HashMap<Uuid, broadcast::Sender<VoteCast>>>,
    capacity: usize,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        })
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<Uuid, broadcast::Sender<VoteCast>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts observing `poll_id`. The observation ends when the returned
    /// guard is dropped.
    pub fn subscribe(self: &Arc<Self>, poll_id: Uuid) -> Subscription {
        let receiver = self
            .channels()
            .entry(poll_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        debug!(%poll_id, "viewer subscribed");
        Subscription {
            poll_id,
            receiver,
            notifier: Arc::clone(self),
        }
    }

    /// Returns how many viewers were reached. Zero is normal.
    pub fn publish(&self, event: VoteCast) -> usize {
        let poll_id = event.poll_id;
        let sender = self.channels().get(&poll_id).cloned();
        let reached = sender.and_then(|tx| tx.send(event).ok()).unwrap_or(0);
        debug!(%poll_id, receivers = reached, "vote hint sent");
        reached
    }

    pub fn observer_count(&self, poll_id: Uuid) -> usize {
        self.channels()
            .get(&poll_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    pub fn open_channels(&self) -> usize {
        self.channels().len()
    }

    fn release(&self, poll_id: Uuid) {
        let mut channels = self.channels();
        // The departing receiver is still alive while this runs.
        if channels
            .get(&poll_id)
            .is_some_and(|tx| tx.receiver_count() <= 1)
        {
            channels.remove(&poll_id);
            debug!(%poll_id, "last viewer left, channel closed");
        }
    }
}

pub struct Subscription {
    poll_id: Uuid,
    receiver: broadcast::Receiver<VoteCast>,
    notifier: Arc<ChangeNotifier>,
}

impl Subscription {
    /// Waits for the next hint. Missed hints are skipped since any later one
    /// triggers the same refetch. Returns `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<VoteCast> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(poll_id = %self.poll_id, skipped, "viewer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.notifier.release(self.poll_id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn hint(poll_id: Uuid, option_index: i32) -> VoteCast {
        VoteCast {
            poll_id,
            option_index,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn every_viewer_of_the_poll_is_told() {
        let notifier = ChangeNotifier::new(8);
        let poll = Uuid::new_v4();
        let mut a = notifier.subscribe(poll);
        let mut b = notifier.subscribe(poll);

        assert_eq!(notifier.publish(hint(poll, 1)), 2);
        assert_eq!(a.recv().await.unwrap().option_index, 1);
        assert_eq!(b.recv().await.unwrap().option_index, 1);
    }

    #[tokio::test]
    async fn other_polls_are_not_told() {
        let notifier = ChangeNotifier::new(8);
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut sub = notifier.subscribe(watched);

        assert_eq!(notifier.publish(hint(other, 0)), 0);
        let waited = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn dropping_the_last_viewer_closes_the_channel() {
        let notifier = ChangeNotifier::new(8);
        let poll = Uuid::new_v4();
        let a = notifier.subscribe(poll);
        let b = notifier.subscribe(poll);
        assert_eq!(notifier.observer_count(poll), 2);

        drop(a);
        assert_eq!(notifier.observer_count(poll), 1);
        assert_eq!(notifier.open_channels(), 1);

        drop(b);
        assert_eq!(notifier.observer_count(poll), 0);
        assert_eq!(notifier.open_channels(), 0);
        assert_eq!(notifier.publish(hint(poll, 0)), 0);
    }

    #[tokio::test]
    async fn lagging_viewer_skips_to_newer_hints() {
        let notifier = ChangeNotifier::new(2);
        let poll = Uuid::new_v4();
        let mut sub = notifier.subscribe(poll);

        for i in 0..5 {
            notifier.publish(hint(poll, i));
        }
        assert_eq!(sub.recv().await.unwrap().option_index, 3);
        assert_eq!(sub.recv().await.unwrap().option_index, 4);
    }
}
