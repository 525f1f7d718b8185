use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core ballot data, as stored in the database. Ballots are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBallot {
    /// The member who cast this ballot.
    pub voter_id: Id,
    /// The candidate selected.
    pub candidate_id: Id,
    /// The contest voted in.
    pub contest_id: Id,
    /// When the ballot was cast.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    /// Index of this selection among the voter's selections in the contest,
    /// assigned by the store on append.
    #[serde(default)]
    pub slot: u32,
}

impl NewBallot {
    pub fn new(voter_id: Id, candidate_id: Id, contest_id: Id, cast_at: DateTime<Utc>) -> Self {
        Self {
            voter_id,
            candidate_id,
            contest_id,
            cast_at,
            slot: 0,
        }
    }
}

/// A ballot from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ballot: NewBallot,
}

impl Deref for Ballot {
    type Target = NewBallot;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}
