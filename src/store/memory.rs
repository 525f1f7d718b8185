use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
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

use super::{BallotStore, CandidateStore, ContestStore, MemberStore, NotificationSink};

/// A process-local store implementing every collaborator contract.
///
/// All tables sit behind one lock, so each operation is atomic with respect
/// to every other; this makes completion claims safe within a single process.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    contests: BTreeMap<Id, Contest>,
    candidates: Vec<Candidate>,
    ballots: Vec<Ballot>,
    members: Vec<Member>,
    announcements: Vec<Announcement>,
}

impl Tables {
    fn contest_mut(&mut self, id: Id) -> Result<&mut Contest> {
        self.contests
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("Contest {id}")))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_member(&self, member: Member) {
        self.tables.lock().await.members.push(member);
    }

    /// Every announcement published so far, in order.
    pub async fn announcements(&self) -> Vec<Announcement> {
        self.tables.lock().await.announcements.clone()
    }
}

#[rocket::async_trait]
impl ContestStore for MemoryStore {
    async fn get_contest(&self, id: Id) -> Result<Option<Contest>> {
        Ok(self.tables.lock().await.contests.get(&id).cloned())
    }

    async fn list_contests(&self) -> Result<Vec<Contest>> {
        Ok(self.tables.lock().await.contests.values().cloned().collect())
    }

    async fn list_open_contests(&self) -> Result<Vec<Contest>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .contests
            .values()
            .filter(|c| !c.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn list_unannounced_completions(&self) -> Result<Vec<Contest>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .contests
            .values()
            .filter(|c| c.status == ContestStatus::Completed && !c.announced)
            .cloned()
            .collect())
    }

    async fn insert_contest(&self, contest: NewContest) -> Result<Contest> {
        let contest = Contest {
            id: Id::new(),
            contest,
        };
        let mut tables = self.tables.lock().await;
        tables.contests.insert(contest.id, contest.clone());
        Ok(contest)
    }

    async fn activate(&self, id: Id) -> Result<Contest> {
        let mut tables = self.tables.lock().await;
        let contest = tables.contest_mut(id)?;
        match contest.status {
            ContestStatus::Upcoming => contest.status = ContestStatus::Active,
            ContestStatus::Active => {}
            other => {
                return Err(Error::conflict(format!(
                    "Cannot activate contest {id} from {other:?}"
                )))
            }
        }
        Ok(contest.clone())
    }

    async fn complete(&self, id: Id, due_at: Option<DateTime<Utc>>) -> Result<Option<Contest>> {
        let mut tables = self.tables.lock().await;
        let contest = tables.contest_mut(id)?;
        match contest.status {
            ContestStatus::Completed => {}
            status if status.can_transition_to(ContestStatus::Completed) => {
                if due_at.map_or(false, |now| !contest.is_due(now)) {
                    return Ok(None);
                }
                contest.status = ContestStatus::Completed;
            }
            other => {
                return Err(Error::conflict(format!(
                    "Cannot complete contest {id} from {other:?}"
                )))
            }
        }
        Ok(Some(contest.clone()))
    }

    async fn reopen(&self, id: Id, new_end_at: DateTime<Utc>) -> Result<Contest> {
        let mut tables = self.tables.lock().await;
        let contest = tables.contest_mut(id)?;
        if contest.status == ContestStatus::Cancelled {
            return Err(Error::conflict(format!(
                "Contest {id} was cancelled and cannot be reopened"
            )));
        }
        if contest.status == ContestStatus::Completed {
            contest.status = ContestStatus::Active;
        }
        contest.end_at = Some(new_end_at);
        contest.completing_since = None;
        contest.announced = false;
        Ok(contest.clone())
    }

    async fn transition(&self, id: Id, next: ContestStatus) -> Result<Contest> {
        let mut tables = self.tables.lock().await;
        let contest = tables.contest_mut(id)?;
        if !contest.status.can_transition_to(next) {
            return Err(Error::conflict(format!(
                "Cannot move contest {id} from {:?} to {next:?}",
                contest.status
            )));
        }
        contest.status = next;
        Ok(contest.clone())
    }

    async fn set_results_public(&self, id: Id, public: bool) -> Result<Contest> {
        let mut tables = self.tables.lock().await;
        let contest = tables.contest_mut(id)?;
        contest.results_public = Some(public);
        Ok(contest.clone())
    }

    async fn claim_completion(
        &self,
        id: Id,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let contest = tables.contest_mut(id)?;
        let free = match contest.completing_since {
            None => true,
            Some(since) => since < stale_before,
        };
        if free {
            contest.completing_since = Some(now);
        }
        Ok(free)
    }

    async fn release_completion(&self, id: Id) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.contest_mut(id)?.completing_since = None;
        Ok(())
    }

    async fn mark_announced(&self, id: Id) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let contest = tables.contest_mut(id)?;
        if contest.status == ContestStatus::Completed {
            contest.announced = true;
        }
        Ok(())
    }

    async fn delete_contest(&self, id: Id) -> Result<bool> {
        Ok(self.tables.lock().await.contests.remove(&id).is_some())
    }
}

#[rocket::async_trait]
impl CandidateStore for MemoryStore {
    async fn list_candidates(&self, contest_id: Id) -> Result<Vec<Candidate>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .candidates
            .iter()
            .filter(|c| c.contest_id == contest_id)
            .cloned()
            .collect())
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        self.tables.lock().await.candidates.push(candidate.clone());
        Ok(candidate)
    }

    async fn delete_candidates(&self, contest_id: Id) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.candidates.len();
        tables.candidates.retain(|c| c.contest_id != contest_id);
        Ok((before - tables.candidates.len()) as u64)
    }
}

#[rocket::async_trait]
impl BallotStore for MemoryStore {
    async fn list_ballots(&self, contest_id: Id) -> Result<Vec<Ballot>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ballots
            .iter()
            .filter(|b| b.contest_id == contest_id)
            .cloned()
            .collect())
    }

    async fn append(&self, mut ballot: NewBallot, max_selections: u32) -> Result<Ballot> {
        let mut tables = self.tables.lock().await;
        let previous = tables
            .ballots
            .iter()
            .filter(|b| b.contest_id == ballot.contest_id && b.voter_id == ballot.voter_id)
            .collect::<Vec<_>>();
        if previous
            .iter()
            .any(|b| b.candidate_id == ballot.candidate_id)
        {
            return Err(Error::conflict(format!(
                "Voter {} already voted for candidate {}",
                ballot.voter_id, ballot.candidate_id
            )));
        }
        if previous.len() >= max_selections as usize {
            return Err(Error::conflict(format!(
                "Voter {} has used all {max_selections} selections in contest {}",
                ballot.voter_id, ballot.contest_id
            )));
        }
        ballot.slot = previous.len() as u32;
        let ballot = Ballot {
            id: Id::new(),
            ballot,
        };
        tables.ballots.push(ballot.clone());
        Ok(ballot)
    }

    async fn delete_ballots(&self, contest_id: Id) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.ballots.len();
        tables.ballots.retain(|b| b.contest_id != contest_id);
        Ok((before - tables.ballots.len()) as u64)
    }
}

#[rocket::async_trait]
impl MemberStore for MemoryStore {
    async fn list_members(&self) -> Result<Vec<Member>> {
        Ok(self.tables.lock().await.members.clone())
    }

    async fn get_member(&self, id: Id) -> Result<Option<Member>> {
        let tables = self.tables.lock().await;
        Ok(tables.members.iter().find(|m| m.id == id).cloned())
    }
}

#[rocket::async_trait]
impl NotificationSink for MemoryStore {
    async fn publish(&self, announcement: Announcement) -> Result<()> {
        info!("Announcement: {}", announcement.title);
        self.tables.lock().await.announcements.push(announcement);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    async fn store_with_contest() -> (MemoryStore, Contest) {
        let store = MemoryStore::new();
        let contest = store
            .insert_contest(NewContest::current_example())
            .await
            .unwrap();
        (store, contest)
    }

    #[rocket::async_test]
    async fn complete_is_idempotent() {
        let (store, contest) = store_with_contest().await;

        let first = store.complete(contest.id, None).await.unwrap().unwrap();
        let second = store.complete(contest.id, None).await.unwrap().unwrap();
        assert_eq!(first.status, ContestStatus::Completed);
        assert_eq!(first, second);
    }

    #[rocket::async_test]
    async fn cancelled_contest_cannot_complete() {
        let (store, contest) = store_with_contest().await;
        store
            .transition(contest.id, ContestStatus::Cancelled)
            .await
            .unwrap();
        assert!(store.complete(contest.id, None).await.is_err());
        assert!(store.reopen(contest.id, Utc::now()).await.is_err());
    }

    #[rocket::async_test]
    async fn upcoming_contest_cannot_complete() {
        let store = MemoryStore::new();
        let contest = store
            .insert_contest(NewContest::future_example())
            .await
            .unwrap();
        let err = store.complete(contest.id, None).await.unwrap_err();
        assert!(matches!(err, Error::Status(status, _) if status.code == 409));
    }

    #[rocket::async_test]
    async fn due_completion_respects_the_current_deadline() {
        let (store, contest) = store_with_contest().await;
        let end = contest.end_at.unwrap();

        // Not yet due.
        let early = store
            .complete(contest.id, Some(end - Duration::minutes(1)))
            .await
            .unwrap();
        assert_eq!(early, None);
        assert_eq!(
            store.get_contest(contest.id).await.unwrap().unwrap().status,
            ContestStatus::Active
        );

        let completed = store.complete(contest.id, Some(end)).await.unwrap().unwrap();
        assert_eq!(completed.status, ContestStatus::Completed);
        // Already completed counts as done whatever the deadline.
        assert!(store
            .complete(contest.id, Some(end - Duration::hours(1)))
            .await
            .unwrap()
            .is_some());
    }

    #[rocket::async_test]
    async fn announcement_of_a_reopened_contest_is_not_recorded() {
        let (store, contest) = store_with_contest().await;
        store.complete(contest.id, None).await.unwrap();
        store
            .reopen(contest.id, Utc::now() + Duration::days(1))
            .await
            .unwrap();

        store.mark_announced(contest.id).await.unwrap();
        assert!(!store.get_contest(contest.id).await.unwrap().unwrap().announced);
    }

    #[rocket::async_test]
    async fn claim_is_exclusive_until_released_or_stale() {
        let (store, contest) = store_with_contest().await;
        let now = Utc::now();
        let long_ago = now - Duration::hours(1);

        assert!(store.claim_completion(contest.id, now, long_ago).await.unwrap());
        assert!(!store.claim_completion(contest.id, now, long_ago).await.unwrap());

        store.release_completion(contest.id).await.unwrap();
        assert!(store.claim_completion(contest.id, now, long_ago).await.unwrap());

        // A claim older than the staleness cutoff can be taken over.
        let later = now + Duration::hours(2);
        assert!(store
            .claim_completion(contest.id, later, later - Duration::minutes(5))
            .await
            .unwrap());
    }

    #[rocket::async_test]
    async fn reopen_clears_completion_bookkeeping() {
        let (store, contest) = store_with_contest().await;
        let now = Utc::now();
        store.claim_completion(contest.id, now, now).await.unwrap();
        store.complete(contest.id, None).await.unwrap();
        store.mark_announced(contest.id).await.unwrap();

        let new_end = now + Duration::days(1);
        let reopened = store.reopen(contest.id, new_end).await.unwrap();
        assert_eq!(reopened.status, ContestStatus::Active);
        assert_eq!(reopened.end_at, Some(new_end));
        assert_eq!(reopened.completing_since, None);
        assert!(!reopened.announced);
    }

    #[rocket::async_test]
    async fn append_enforces_selection_limits() {
        let (store, contest) = store_with_contest().await;
        let voter = Id::new();
        let (a, b, c) = (Id::new(), Id::new(), Id::new());
        let now = Utc::now();

        let first = store
            .append(NewBallot::new(voter, a, contest.id, now), 2)
            .await
            .unwrap();
        assert_eq!(first.slot, 0);

        // Same candidate twice.
        assert!(store
            .append(NewBallot::new(voter, a, contest.id, now), 2)
            .await
            .is_err());

        let second = store
            .append(NewBallot::new(voter, b, contest.id, now), 2)
            .await
            .unwrap();
        assert_eq!(second.slot, 1);

        // Out of selections.
        assert!(store
            .append(NewBallot::new(voter, c, contest.id, now), 2)
            .await
            .is_err());

        // Another voter is unaffected.
        assert!(store
            .append(NewBallot::new(Id::new(), c, contest.id, now), 2)
            .await
            .is_ok());
        assert_eq!(store.list_ballots(contest.id).await.unwrap().len(), 3);
    }
}
