use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
///
/// Vote totals are never stored here; they are always derived from the ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCandidate {
    /// The contest this candidate stands in.
    pub contest_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Reference to a photo held by the media service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: NewCandidate,
}

impl Deref for Candidate {
    type Target = NewCandidate;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}
