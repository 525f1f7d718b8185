use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the Contest lifecycle.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContestStatus {
    /// Created, but voting has not opened yet.
    Upcoming,
    /// Accepting ballots.
    Active,
    /// Temporarily not accepting ballots.
    Paused,
    /// Voting closed. Terminal, unless an administrator reopens it.
    Completed,
    /// Abandoned. Terminal.
    Cancelled,
}

impl ContestStatus {
    /// Every status that is not terminal.
    pub const OPEN: [ContestStatus; 3] = [Self::Upcoming, Self::Active, Self::Paused];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Voting has started and not finished, although it may be paused.
    pub fn is_ongoing(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    /// Is `self -> next` a legal forward or sideways move?
    ///
    /// Reopening a completed contest is an administrator override and does
    /// not go through this check.
    pub fn can_transition_to(self, next: ContestStatus) -> bool {
        Self::predecessors(next).contains(&self)
    }

    /// The statuses from which `next` may be entered.
    pub fn predecessors(next: ContestStatus) -> &'static [ContestStatus] {
        match next {
            Self::Upcoming => &[],
            Self::Active => &[Self::Upcoming, Self::Paused],
            Self::Paused => &[Self::Active],
            Self::Completed => &[Self::Active, Self::Paused],
            Self::Cancelled => &Self::OPEN,
        }
    }
}

impl From<ContestStatus> for Bson {
    fn from(status: ContestStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
