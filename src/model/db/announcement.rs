use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::announcement::{Audience, Priority},
    db::contest::Contest,
};

/// A broadcast notice, as recorded in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Deduplication key: at most one announcement is recorded per key.
    pub key: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub target_audience: Audience,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Announcement {
    /// The automatic announcement that a contest has closed.
    pub fn contest_completed(contest: &Contest, completed_at: DateTime<Utc>) -> Self {
        let when = completed_at.format("%Y-%m-%d %H:%M UTC");
        Self {
            key: contest.expiry_key(),
            title: format!("Voting closed: {}", contest.title),
            body: format!(
                "Voting in \"{}\" closed at {when}. Results will be released by the returning officers.",
                contest.title
            ),
            priority: Priority::High,
            target_audience: Audience::All,
            created_at: completed_at,
        }
    }
}
