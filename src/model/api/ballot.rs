use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::ballot::Ballot};

/// A member's selection of one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotRequest {
    pub candidate_id: ApiId,
}

/// Confirmation of a cast ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotDesc {
    pub id: ApiId,
    pub contest_id: ApiId,
    pub candidate_id: ApiId,
    /// Which of the member's selections this was, counting from zero.
    pub slot: u32,
    pub cast_at: DateTime<Utc>,
}

impl From<Ballot> for BallotDesc {
    fn from(ballot: Ballot) -> Self {
        Self {
            id: ballot.id.into(),
            contest_id: ballot.contest_id.into(),
            candidate_id: ballot.candidate_id.into(),
            slot: ballot.slot,
            cast_at: ballot.cast_at,
        }
    }
}
