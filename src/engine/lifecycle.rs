//! Time-driven contest state changes.
//!
//! The scheduler is the only component that changes contest status on its
//! own. It is polled with the current time; everything it does is a function
//! of that time and the stored contests, so overlapping or repeated ticks are
//! harmless.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rocket::futures::future::join_all;
use rocket::tokio::time::timeout;

use crate::error::{Error, Result};
use crate::model::{
    common::contest::ContestStatus,
    db::{announcement::Announcement, contest::Contest},
    mongodb::Id,
};
use crate::store::Stores;

/// Timing knobs for the scheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Upper bound on one contest's completion attempt.
    pub completion_timeout: Duration,
    /// A completion claim older than this is presumed abandoned.
    pub claim_ttl: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            completion_timeout: Duration::from_secs(30),
            claim_ttl: Duration::from_secs(300),
        }
    }
}

/// What one tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub activated: Vec<Id>,
    pub completed: Vec<Id>,
    /// Due contests whose completion is claimed by someone else, or that
    /// were given a later deadline while being completed.
    pub skipped: Vec<Id>,
    /// Contests that will be retried on the next tick.
    pub failed: Vec<Id>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.activated.is_empty()
            && self.completed.is_empty()
            && self.skipped.is_empty()
            && self.failed.is_empty()
    }
}

/// Drives contests through their lifecycle.
#[derive(Clone)]
pub struct LifecycleScheduler {
    stores: Stores,
    settings: SchedulerSettings,
}

impl LifecycleScheduler {
    pub fn new(stores: Stores, settings: SchedulerSettings) -> Self {
        Self { stores, settings }
    }

    /// Open every contest whose start has arrived and close every contest
    /// whose deadline has passed, announcing each closure exactly once.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        let open = match timeout(
            self.settings.completion_timeout,
            self.stores.contests.list_open_contests(),
        )
        .await
        {
            Ok(Ok(open)) => open,
            Ok(Err(e)) => {
                error!("Scheduler tick at {now} could not list contests: {e}");
                return report;
            }
            Err(_) => {
                error!("Scheduler tick at {now} timed out listing contests");
                return report;
            }
        };

        for contest in open.iter().filter(|c| c.is_ready_to_start(now)) {
            match self.stores.contests.activate(contest.id).await {
                Ok(_) => {
                    info!("Opened contest {} ({})", contest.id, contest.title);
                    report.activated.push(contest.id);
                }
                Err(e) => {
                    error!("Failed to open contest {}: {e}", contest.id);
                    report.failed.push(contest.id);
                }
            }
        }

        let mut due: Vec<Contest> = open.into_iter().filter(|c| c.is_due(now)).collect();
        // Completions whose announcement did not go out are retried here.
        match self.stores.contests.list_unannounced_completions().await {
            Ok(pending) => {
                for contest in pending {
                    if !due.iter().any(|d| d.id == contest.id) {
                        due.push(contest);
                    }
                }
            }
            Err(e) => warn!("Could not list unannounced completions: {e}"),
        }

        let attempts = due
            .iter()
            .map(|contest| self.attempt(contest.id, now, Some(now)));
        for (contest, outcome) in due.iter().zip(join_all(attempts).await) {
            match outcome {
                Ok(Some(_)) => report.completed.push(contest.id),
                Ok(None) => report.skipped.push(contest.id),
                Err(e) => {
                    error!(
                        "Completing contest {} failed, retrying next tick: {e}",
                        contest.id
                    );
                    report.failed.push(contest.id);
                }
            }
        }

        if report.is_idle() {
            trace!("Scheduler tick at {now} had nothing to do");
        } else {
            debug!("Scheduler tick at {now}: {report:?}");
        }
        report
    }

    /// Claim, complete and announce one contest.
    ///
    /// With `due_at`, the contest is only completed if its deadline has passed
    /// by then. Returns `None` when another scheduler holds the claim or the
    /// contest is no longer due. Unless the contest was completed, the claim is
    /// released so a later tick can try again.
    async fn attempt(
        &self,
        id: Id,
        now: DateTime<Utc>,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Contest>> {
        let stale_before = self.stale_before(now);
        if !self
            .stores
            .contests
            .claim_completion(id, now, stale_before)
            .await?
        {
            debug!("Contest {id} is already being completed elsewhere");
            return Ok(None);
        }

        let result = match timeout(
            self.settings.completion_timeout,
            self.complete_and_announce(id, now, due_at),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "completing contest {id} took longer than {:?}",
                self.settings.completion_timeout
            ))),
        };

        match result {
            Ok(Some(contest)) => Ok(Some(contest)),
            Ok(None) => {
                info!("Contest {id} has a later deadline now, leaving it open");
                self.release(id).await;
                Ok(None)
            }
            Err(e) => {
                self.release(id).await;
                Err(e)
            }
        }
    }

    async fn release(&self, id: Id) {
        if let Err(e) = self.stores.contests.release_completion(id).await {
            error!("Failed to release completion claim on contest {id}: {e}");
        }
    }

    async fn complete_and_announce(
        &self,
        id: Id,
        now: DateTime<Utc>,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Contest>> {
        let contest = match self.stores.contests.complete(id, due_at).await? {
            Some(contest) => contest,
            None => return Ok(None),
        };
        if contest.announced {
            return Ok(Some(contest));
        }
        self.stores
            .notifier
            .publish(Announcement::contest_completed(&contest, now))
            .await?;
        self.stores.contests.mark_announced(id).await?;
        info!("Completed contest {id} ({}) and announced it", contest.title);
        Ok(Some(contest))
    }

    fn stale_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        ChronoDuration::from_std(self.settings.claim_ttl)
            .ok()
            .and_then(|ttl| now.checked_sub_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Give a contest a new deadline. A completed contest becomes active again
    /// and will be completed and announced afresh when the new deadline passes.
    pub async fn reopen(
        &self,
        id: Id,
        new_end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Contest> {
        let contest = self.get(id).await?;
        if new_end_at <= now {
            return Err(Error::bad_request(format!(
                "New deadline {new_end_at} for contest {id} is not in the future"
            )));
        }
        if let Some(start) = contest.start_at {
            if new_end_at <= start {
                return Err(Error::bad_request(format!(
                    "New deadline {new_end_at} for contest {id} is before it starts"
                )));
            }
        }
        let reopened = self.stores.contests.reopen(id, new_end_at).await?;
        info!(
            "Reopened contest {id} ({:?} -> {:?}) until {new_end_at}",
            contest.status, reopened.status
        );
        Ok(reopened)
    }

    pub async fn pause(&self, id: Id) -> Result<Contest> {
        self.transition(id, ContestStatus::Paused).await
    }

    pub async fn resume(&self, id: Id) -> Result<Contest> {
        self.transition(id, ContestStatus::Active).await
    }

    pub async fn cancel(&self, id: Id) -> Result<Contest> {
        self.transition(id, ContestStatus::Cancelled).await
    }

    /// Close an active or paused contest ahead of its deadline, announcing it
    /// immediately.
    pub async fn complete_now(&self, id: Id, now: DateTime<Utc>) -> Result<Contest> {
        self.attempt(id, now, None).await?.ok_or_else(|| {
            Error::conflict(format!("Contest {id} is already being completed"))
        })
    }

    pub async fn set_results_public(&self, id: Id, public: bool) -> Result<Contest> {
        let contest = self.stores.contests.set_results_public(id, public).await?;
        info!(
            "Results of contest {id} are now {}",
            if public { "public" } else { "hidden" }
        );
        Ok(contest)
    }

    async fn transition(&self, id: Id, next: ContestStatus) -> Result<Contest> {
        let contest = self.stores.contests.transition(id, next).await?;
        info!("Contest {id} is now {next:?}");
        Ok(contest)
    }

    async fn get(&self, id: Id) -> Result<Contest> {
        self.stores
            .contests
            .get_contest(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Contest {id}")))
    }
}
