//! Per-option counts and percentages, recomputed from the raw vote rows.

use crate::models::{Poll, Vote};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub counts: Vec<u64>,
    pub percentages: Vec<u64>,
    pub total_votes: u64,
}

impl Tally {
    /// Votes whose option index is outside the poll's options are ignored and
    /// do not count towards the total.
    pub fn compute(poll: &Poll, votes: &[Vote]) -> Self {
        let mut counts = vec![0u64; poll.options.len()];
        for vote in votes {
            if let Some(count) = usize::try_from(vote.option_index)
                .ok()
                .and_then(|index| counts.get_mut(index))
            {
                *count += 1;
            }
        }

        let total_votes: u64 = counts.iter().sum();
        let percentages = counts
            .iter()
            .map(|&count| percentage(count, total_votes))
            .collect();

        Self {
            counts,
            percentages,
            total_votes,
        }
    }
}

/// `count / total * 100` rounded half up, or 0 when nobody voted.
fn percentage(count: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (count * 200 + total) / (total * 2)
}
