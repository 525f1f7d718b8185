//! Stores that misbehave in controlled ways, wrapping a `MemoryStore`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rocket::tokio::time::sleep;

use crate::error::{Error, Result};
use crate::model::{
    common::contest::ContestStatus,
    db::{
        ballot::{Ballot, NewBallot},
        contest::{Contest, NewContest},
    },
    mongodb::Id,
};

use super::{BallotStore, ContestStore, MemoryStore};

/// A contest store whose completions are slow or whose listings fail.
pub struct FaultyContests {
    inner: Arc<MemoryStore>,
    complete_delay: Duration,
    listing_fails: bool,
}

impl FaultyContests {
    pub fn slow_completion(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self {
            inner,
            complete_delay: delay,
            listing_fails: false,
        }
    }

    pub fn failing_listing(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            complete_delay: Duration::ZERO,
            listing_fails: true,
        }
    }

    fn check_listing(&self) -> Result<()> {
        if self.listing_fails {
            return Err(Error::Timeout("contest listing unavailable".to_string()));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl ContestStore for FaultyContests {
    async fn get_contest(&self, id: Id) -> Result<Option<Contest>> {
        self.inner.get_contest(id).await
    }

    async fn list_contests(&self) -> Result<Vec<Contest>> {
        self.check_listing()?;
        self.inner.list_contests().await
    }

    async fn list_open_contests(&self) -> Result<Vec<Contest>> {
        self.check_listing()?;
        self.inner.list_open_contests().await
    }

    async fn list_unannounced_completions(&self) -> Result<Vec<Contest>> {
        self.check_listing()?;
        self.inner.list_unannounced_completions().await
    }

    async fn insert_contest(&self, contest: NewContest) -> Result<Contest> {
        self.inner.insert_contest(contest).await
    }

    async fn activate(&self, id: Id) -> Result<Contest> {
        self.inner.activate(id).await
    }

    async fn complete(&self, id: Id, due_at: Option<DateTime<Utc>>) -> Result<Option<Contest>> {
        sleep(self.complete_delay).await;
        self.inner.complete(id, due_at).await
    }

    async fn reopen(&self, id: Id, new_end_at: DateTime<Utc>) -> Result<Contest> {
        self.inner.reopen(id, new_end_at).await
    }

    async fn transition(&self, id: Id, next: ContestStatus) -> Result<Contest> {
        self.inner.transition(id, next).await
    }

    async fn set_results_public(&self, id: Id, public: bool) -> Result<Contest> {
        self.inner.set_results_public(id, public).await
    }

    async fn claim_completion(
        &self,
        id: Id,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.claim_completion(id, now, stale_before).await
    }

    async fn release_completion(&self, id: Id) -> Result<()> {
        self.inner.release_completion(id).await
    }

    async fn mark_announced(&self, id: Id) -> Result<()> {
        self.inner.mark_announced(id).await
    }

    async fn delete_contest(&self, id: Id) -> Result<bool> {
        self.inner.delete_contest(id).await
    }
}

/// A ballot log that cannot be read.
pub struct UnreadableBallots;

#[rocket::async_trait]
impl BallotStore for UnreadableBallots {
    async fn list_ballots(&self, _contest_id: Id) -> Result<Vec<Ballot>> {
        Err(Error::Timeout("ballot log unavailable".to_string()))
    }

    async fn append(&self, _ballot: NewBallot, _max_selections: u32) -> Result<Ballot> {
        Err(Error::Timeout("ballot log unavailable".to_string()))
    }

    async fn delete_ballots(&self, _contest_id: Id) -> Result<u64> {
        Err(Error::Timeout("ballot log unavailable".to_string()))
    }
}
