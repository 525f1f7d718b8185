//! The narrow contracts through which the engine reaches durable state and
//! the outside world.
//!
//! Every operation is async and fallible; callers decide whether a failure is
//! fatal (writes) or degrades to empty data (reads feeding a tally).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::Database;

use crate::error::Result;
use crate::model::{
    common::contest::ContestStatus,
    db::{
        announcement::Announcement,
        ballot::{Ballot, NewBallot},
        candidate::{Candidate, NewCandidate},
        contest::{Contest, NewContest},
        member::Member,
    },
    mongodb::Id,
};

mod memory;
mod mongo;
mod notify;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use notify::{MongoAnnouncements, SnsAnnouncements};

#[rocket::async_trait]
pub trait ContestStore: Send + Sync {
    async fn get_contest(&self, id: Id) -> Result<Option<Contest>>;

    async fn list_contests(&self) -> Result<Vec<Contest>>;

    /// Contests that are not yet terminal.
    async fn list_open_contests(&self) -> Result<Vec<Contest>>;

    /// Completed contests whose completion announcement is still outstanding.
    async fn list_unannounced_completions(&self) -> Result<Vec<Contest>>;

    async fn insert_contest(&self, contest: NewContest) -> Result<Contest>;

    /// Move an upcoming contest to active. Already-active contests are left alone.
    async fn activate(&self, id: Id) -> Result<Contest>;

    /// Atomically move an active or paused contest to completed.
    ///
    /// With `due_at`, the contest is only completed if its deadline is at or
    /// before that instant; a contest that is no longer due is left alone and
    /// `None` returned. Completing an already-completed contest succeeds
    /// without changing it.
    async fn complete(&self, id: Id, due_at: Option<DateTime<Utc>>) -> Result<Option<Contest>>;

    /// Give a contest a new deadline, reverting a completed contest to active
    /// and clearing its completion bookkeeping.
    async fn reopen(&self, id: Id, new_end_at: DateTime<Utc>) -> Result<Contest>;

    /// Move a contest to `next`, provided the move is legal from its current status.
    async fn transition(&self, id: Id, next: ContestStatus) -> Result<Contest>;

    async fn set_results_public(&self, id: Id, public: bool) -> Result<Contest>;

    /// Atomically claim the right to complete a contest.
    ///
    /// Succeeds iff no claim is held, or the held claim was taken before
    /// `stale_before`. Returns whether the claim was taken.
    async fn claim_completion(
        &self,
        id: Id,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool>;

    /// Drop a completion claim so a later tick can retry.
    async fn release_completion(&self, id: Id) -> Result<()>;

    /// Record that the completion announcement has gone out. A contest that
    /// has been reopened since is left alone.
    async fn mark_announced(&self, id: Id) -> Result<()>;

    /// Returns whether the contest existed.
    async fn delete_contest(&self, id: Id) -> Result<bool>;
}

#[rocket::async_trait]
pub trait CandidateStore: Send + Sync {
    async fn list_candidates(&self, contest_id: Id) -> Result<Vec<Candidate>>;

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;

    /// Returns how many candidates were removed.
    async fn delete_candidates(&self, contest_id: Id) -> Result<u64>;
}

#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    async fn list_ballots(&self, contest_id: Id) -> Result<Vec<Ballot>>;

    /// Append a ballot, enforcing the per-voter limits atomically: a voter
    /// may not select the same candidate twice, nor make more than
    /// `max_selections` selections in one contest.
    async fn append(&self, ballot: NewBallot, max_selections: u32) -> Result<Ballot>;

    /// Returns how many ballots were removed.
    async fn delete_ballots(&self, contest_id: Id) -> Result<u64>;
}

#[rocket::async_trait]
pub trait MemberStore: Send + Sync {
    async fn list_members(&self) -> Result<Vec<Member>>;

    async fn get_member(&self, id: Id) -> Result<Option<Member>>;
}

#[rocket::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, announcement: Announcement) -> Result<()>;
}

/// Every collaborator the engine talks to. This becomes managed state.
#[derive(Clone)]
pub struct Stores {
    pub contests: Arc<dyn ContestStore>,
    pub candidates: Arc<dyn CandidateStore>,
    pub ballots: Arc<dyn BallotStore>,
    pub members: Arc<dyn MemberStore>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl Stores {
    /// Back everything with a single in-memory store.
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            contests: store.clone(),
            candidates: store.clone(),
            ballots: store.clone(),
            members: store.clone(),
            notifier: store,
        }
    }

    /// Back everything with MongoDB, announcing through `notifier`.
    pub fn mongo(db: &Database, notifier: Arc<dyn NotificationSink>) -> Self {
        let store = Arc::new(MongoStore::new(db));
        Self {
            contests: store.clone(),
            candidates: store.clone(),
            ballots: store.clone(),
            members: store,
            notifier,
        }
    }
}
