use aws_sdk_sns::Client as SnsClient;
use mongodb::Database;

use crate::error::{Error, Result};
use crate::model::{
    db::announcement::Announcement,
    mongodb::{is_duplicate_key_error, Coll},
};

use super::NotificationSink;

/// SNS rejects subjects longer than this.
const MAX_SUBJECT_CHARS: usize = 100;

/// Records announcements in the `announcements` collection, from where the
/// member-facing noticeboard reads them.
///
/// The unique index on `key` makes publishing idempotent: a second publish
/// for the same contest expiry is accepted but not recorded again.
pub struct MongoAnnouncements {
    announcements: Coll<Announcement>,
}

impl MongoAnnouncements {
    pub fn new(db: &Database) -> Self {
        Self {
            announcements: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl NotificationSink for MongoAnnouncements {
    async fn publish(&self, announcement: Announcement) -> Result<()> {
        match self.announcements.insert_one(&announcement, None).await {
            Ok(_) => {
                info!("Recorded announcement {}", announcement.key);
                Ok(())
            }
            Err(e) if is_duplicate_key_error(&e) => {
                warn!(
                    "Announcement {} was already recorded, not repeating it",
                    announcement.key
                );
                Ok(())
            }
            Err(e) => Err(Error::Notification(e.to_string())),
        }
    }
}

/// Broadcasts announcements to an Amazon SNS topic.
pub struct SnsAnnouncements {
    client: SnsClient,
    topic_arn: String,
}

impl SnsAnnouncements {
    pub fn new(client: SnsClient, topic_arn: String) -> Self {
        Self { client, topic_arn }
    }
}

#[rocket::async_trait]
impl NotificationSink for SnsAnnouncements {
    async fn publish(&self, announcement: Announcement) -> Result<()> {
        let subject: String = announcement.title.chars().take(MAX_SUBJECT_CHARS).collect();
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(&announcement.body)
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;
        info!(
            "Broadcast announcement {} to {}",
            announcement.key, self.topic_arn
        );
        Ok(())
    }
}
