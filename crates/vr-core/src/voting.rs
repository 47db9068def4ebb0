//! # Vote transitions
//!
//! Pure resolution of a vote request against the caller's previous vote,
//! and the counter deltas that follow from it. Stores apply these deltas
//! inside their own transaction; nothing here touches I/O.

use serde::{Deserialize, Serialize};

use crate::models::{VoteDirection, VoteTally};

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteIntent {
    /// Clicking a button: casts, switches, or removes when repeated.
    Toggle(VoteDirection),
    Clear,
}

/// Signed change to apply to a [`VoteTally`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallyDelta {
    pub up: i64,
    pub down: i64,
}

impl TallyDelta {
    pub fn is_zero(&self) -> bool {
        self.up == 0 && self.down == 0
    }
}

impl VoteTally {
    /// Counters never go below zero, even over drifted data.
    pub fn apply(self, delta: TallyDelta) -> VoteTally {
        VoteTally {
            up: (self.up + delta.up).max(0),
            down: (self.down + delta.down).max(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub previous: Option<VoteDirection>,
    pub next: Option<VoteDirection>,
}

impl VoteTransition {
    pub fn resolve(previous: Option<VoteDirection>, intent: VoteIntent) -> Self {
        let next = match intent {
            VoteIntent::Clear => None,
            VoteIntent::Toggle(direction) if previous == Some(direction) => None,
            VoteIntent::Toggle(direction) => Some(direction),
        };
        Self { previous, next }
    }

    pub fn is_noop(&self) -> bool {
        self.previous == self.next
    }

    pub fn tally_delta(&self) -> TallyDelta {
        let count = |vote: Option<VoteDirection>, side: VoteDirection| i64::from(vote == Some(side));
        TallyDelta {
            up: count(self.next, VoteDirection::Up) - count(self.previous, VoteDirection::Up),
            down: count(self.next, VoteDirection::Down) - count(self.previous, VoteDirection::Down),
        }
    }

    /// Change to the voter's `community_votes`: switching sides is not a new vote.
    pub fn participation_delta(&self) -> i64 {
        match (self.previous, self.next) {
            (None, Some(_)) => 1,
            (Some(_), None) => -1,
            _ => 0,
        }
    }

    /// Change to the author's karma.
    pub fn karma_delta(&self) -> i64 {
        let delta = self.tally_delta();
        delta.up - delta.down
    }
}
