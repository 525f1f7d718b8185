use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::contest::ContestStatus,
    mongodb::{optional_datetime, Id},
};

/// Core contest data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContest {
    /// Contest title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// How many candidates each member may vote for. At least one.
    pub max_selections_per_member: u32,
    /// Current lifecycle state.
    pub status: ContestStatus,
    /// When voting opens.
    #[serde(default, with = "optional_datetime")]
    pub start_at: Option<DateTime<Utc>>,
    /// When voting closes. A contest without a deadline is never closed automatically.
    #[serde(default, with = "optional_datetime")]
    pub end_at: Option<DateTime<Utc>>,
    /// Whether non-privileged members may see results. Absent means public.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_public: Option<bool>,
    /// Election grouping shared by related contests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Completion claim: set while a scheduler owns this contest's completion.
    #[serde(default, with = "optional_datetime")]
    pub completing_since: Option<DateTime<Utc>>,
    /// The completion announcement for the current deadline has been published.
    #[serde(default)]
    pub announced: bool,
}

impl NewContest {
    /// Create a new, upcoming contest.
    pub fn new(
        title: String,
        description: String,
        max_selections_per_member: u32,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            title,
            description,
            max_selections_per_member,
            status: ContestStatus::Upcoming,
            start_at,
            end_at,
            results_public: None,
            group: None,
            completing_since: None,
            announced: false,
        }
    }

    /// The publish flag, with absence meaning public.
    pub fn results_public(&self) -> bool {
        self.results_public.unwrap_or(true)
    }

    /// Has the deadline passed while the contest is still open?
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.end_at.map_or(false, |end| end <= now)
    }

    /// Should an upcoming contest open now?
    ///
    /// An upcoming contest whose whole window has passed opens too, so that it
    /// can then be completed through the usual route.
    pub fn is_ready_to_start(&self, now: DateTime<Utc>) -> bool {
        self.status == ContestStatus::Upcoming
            && (self.start_at.map_or(false, |start| start <= now) || self.is_due(now))
    }

    /// Can a ballot be cast at `now`?
    pub fn accepts_ballots_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ContestStatus::Active
            && self.start_at.map_or(true, |start| start <= now)
            && self.end_at.map_or(true, |end| now < end)
    }

    /// Check the static constraints on a contest definition.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Contest title must not be empty".to_string());
        }
        if self.max_selections_per_member == 0 {
            return Err("Contests must allow at least one selection per member".to_string());
        }
        if let (Some(start), Some(end)) = (self.start_at, self.end_at) {
            if end <= start {
                return Err(format!(
                    "Contest must end after it starts ({start} .. {end})"
                ));
            }
        }
        Ok(())
    }
}

/// A contest from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub contest: NewContest,
}

impl Contest {
    /// Identifies one deadline expiry of this contest, so that a reopened
    /// contest gets a fresh announcement when it closes again.
    pub fn expiry_key(&self) -> String {
        let end = self
            .end_at
            .map(|end| end.timestamp_millis().to_string())
            .unwrap_or_else(|| "none".to_string());
        format!("{}:{end}", self.id)
    }
}

impl Deref for Contest {
    type Target = NewContest;

    fn deref(&self) -> &Self::Target {
        &self.contest
    }
}

impl DerefMut for Contest {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.contest
    }
}
