//! Vote counting and turnout.
//!
//! Tallies are never stored. Every request re-reads the ballot log and
//! recomputes from scratch, so there are no running counters to drift.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rocket::futures::future::join_all;
use rocket::tokio::{join, time::timeout};
use serde::{Deserialize, Serialize};

use crate::error::{Error, IntegrityError, Result};
use crate::model::{
    db::{ballot::Ballot, candidate::Candidate, contest::Contest, member::Member},
    mongodb::Id,
};
use crate::store::Stores;

/// The independent sources a tally is assembled from.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Contest,
    Candidates,
    Ballots,
    Members,
}

/// Participation within one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTurnout {
    pub branch: String,
    pub members: usize,
    pub voted: usize,
    pub participation_pct: u32,
}

/// A point-in-time tally of one contest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub contest_id: Id,
    /// Votes per candidate. Every known candidate is present, even with zero votes.
    pub counts: BTreeMap<Id, u64>,
    /// Everyone who cast at least one ballot.
    pub unique_voters: BTreeSet<Id>,
    /// Members who voted, as a percentage of all members. `None` when the
    /// member list was unavailable.
    pub turnout_pct: Option<u32>,
    /// Sorted by descending participation.
    pub branch_turnout: Vec<BranchTurnout>,
    /// Sources that could not be read; their contribution is empty.
    pub degraded: Vec<DataSource>,
}

impl Tally {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn total_votes(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Combined turnout across every contest of an election grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTally {
    pub group: String,
    pub contests: Vec<Tally>,
    pub unique_voters: BTreeSet<Id>,
    pub turnout_pct: Option<u32>,
    pub branch_turnout: Vec<BranchTurnout>,
    pub degraded: Vec<DataSource>,
}

/// Everything a tally depends on. `None` marks a source that could not be read.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub contest: Option<Contest>,
    pub candidates: Option<Vec<Candidate>>,
    pub ballots: Option<Vec<Ballot>>,
    pub members: Option<Vec<Member>>,
}

impl Snapshot {
    fn degraded(&self) -> Vec<DataSource> {
        let mut degraded = Vec::new();
        if self.contest.is_none() {
            degraded.push(DataSource::Contest);
        }
        if self.candidates.is_none() {
            degraded.push(DataSource::Candidates);
        }
        if self.ballots.is_none() {
            degraded.push(DataSource::Ballots);
        }
        if self.members.is_none() {
            degraded.push(DataSource::Members);
        }
        degraded
    }
}

/// `part / whole` as a whole percentage, rounding halves up. Zero when `whole` is zero.
pub fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let rounded = (200 * part as u64 + whole as u64) / (2 * whole as u64);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Tally a snapshot of one contest.
///
/// Fails only when the stored ballots break an invariant; missing sources
/// degrade the result instead.
pub fn compute(contest_id: Id, snapshot: &Snapshot) -> std::result::Result<Tally, IntegrityError> {
    let mut counts: BTreeMap<Id, u64> = snapshot
        .candidates
        .iter()
        .flatten()
        .map(|candidate| (candidate.id, 0))
        .collect();
    let candidates_known = snapshot.candidates.is_some();

    let mut selections: HashMap<Id, Vec<Id>> = HashMap::new();
    for ballot in snapshot.ballots.iter().flatten() {
        if ballot.contest_id != contest_id {
            return Err(IntegrityError::ForeignBallot {
                ballot: ballot.id,
                expected: contest_id,
                actual: ballot.contest_id,
            });
        }
        if candidates_known && !counts.contains_key(&ballot.candidate_id) {
            return Err(IntegrityError::UnknownCandidate {
                ballot: ballot.id,
                candidate: ballot.candidate_id,
            });
        }
        let chosen = selections.entry(ballot.voter_id).or_default();
        if chosen.contains(&ballot.candidate_id) {
            return Err(IntegrityError::DuplicateSelection {
                voter: ballot.voter_id,
                candidate: ballot.candidate_id,
            });
        }
        chosen.push(ballot.candidate_id);
        *counts.entry(ballot.candidate_id).or_insert(0) += 1;
    }

    if let Some(contest) = &snapshot.contest {
        let max = contest.max_selections_per_member;
        if let Some((voter, chosen)) = selections
            .iter()
            .find(|(_, chosen)| chosen.len() > max as usize)
        {
            return Err(IntegrityError::SelectionsExceeded {
                voter: *voter,
                cast: chosen.len(),
                max,
            });
        }
    }

    let unique_voters: BTreeSet<Id> = selections.into_keys().collect();
    let (turnout_pct, branch_turnout) = match &snapshot.members {
        Some(members) => (
            Some(member_turnout(members, &unique_voters)),
            branch_turnout(members, &unique_voters),
        ),
        None => (None, Vec::new()),
    };

    Ok(Tally {
        contest_id,
        counts,
        unique_voters,
        turnout_pct,
        branch_turnout,
        degraded: snapshot.degraded(),
    })
}

/// Merge the tallies of a grouping into combined distinct-voter turnout.
pub fn combine(group: String, contests: Vec<Tally>, members: Option<&[Member]>) -> GroupTally {
    let unique_voters: BTreeSet<Id> = contests
        .iter()
        .flat_map(|tally| tally.unique_voters.iter().copied())
        .collect();
    let mut degraded: Vec<DataSource> = contests
        .iter()
        .flat_map(|tally| tally.degraded.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let (turnout_pct, branch_turnout) = match members {
        Some(members) => (
            Some(member_turnout(members, &unique_voters)),
            branch_turnout(members, &unique_voters),
        ),
        None => {
            if !degraded.contains(&DataSource::Members) {
                degraded.push(DataSource::Members);
            }
            (None, Vec::new())
        }
    };

    GroupTally {
        group,
        contests,
        unique_voters,
        turnout_pct,
        branch_turnout,
        degraded,
    }
}

fn member_turnout(members: &[Member], voters: &BTreeSet<Id>) -> u32 {
    let voted = members.iter().filter(|m| voters.contains(&m.id)).count();
    percentage(voted, members.len())
}

fn branch_turnout(members: &[Member], voters: &BTreeSet<Id>) -> Vec<BranchTurnout> {
    let mut branches: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for member in members {
        let (total, voted) = branches.entry(member.branch_name()).or_default();
        *total += 1;
        if voters.contains(&member.id) {
            *voted += 1;
        }
    }

    let mut turnout: Vec<BranchTurnout> = branches
        .into_iter()
        .map(|(branch, (members, voted))| BranchTurnout {
            branch: branch.to_string(),
            members,
            voted,
            participation_pct: percentage(voted, members),
        })
        .collect();
    // Stable sort keeps the alphabetical order from the map among ties.
    turnout.sort_by_key(|b| Reverse(b.participation_pct));
    turnout
}

/// Reads snapshots from the stores and tallies them.
#[derive(Clone)]
pub struct TallyAggregator {
    stores: Stores,
    fetch_timeout: Duration,
}

impl TallyAggregator {
    pub fn new(stores: Stores, fetch_timeout: Duration) -> Self {
        Self {
            stores,
            fetch_timeout,
        }
    }

    /// Tally one contest.
    pub async fn aggregate(&self, contest_id: Id) -> Result<Tally> {
        let (snapshot, members) = join!(self.contest_snapshot(contest_id), self.fetch_members());
        let snapshot = Snapshot {
            members,
            ..snapshot?
        };
        let tally = compute(contest_id, &snapshot).map_err(|e| {
            error!("Tally of contest {contest_id} failed an integrity check: {e}");
            e
        })?;
        if tally.is_degraded() {
            warn!(
                "Tally of contest {contest_id} is degraded, missing {:?}",
                tally.degraded
            );
        }
        Ok(tally)
    }

    /// Tally every contest of an election grouping.
    ///
    /// Also returns the grouping's contests, in the same order as the
    /// tallies. If the contests cannot be listed the result is empty and
    /// marked degraded.
    pub async fn aggregate_group(&self, group: &str) -> Result<(GroupTally, Vec<Contest>)> {
        let (listed, members) = join!(
            self.bounded(DataSource::Contest, self.stores.contests.list_contests()),
            self.fetch_members()
        );
        let contests: Vec<Contest> = match listed {
            Some(listed) => listed
                .into_iter()
                .filter(|c| c.group.as_deref() == Some(group))
                .collect(),
            None => {
                warn!("Tally of group '{group}' is degraded, its contests could not be listed");
                let unlisted = GroupTally {
                    group: group.to_string(),
                    contests: Vec::new(),
                    unique_voters: BTreeSet::new(),
                    turnout_pct: None,
                    branch_turnout: Vec::new(),
                    degraded: vec![DataSource::Contest],
                };
                return Ok((unlisted, Vec::new()));
            }
        };
        if contests.is_empty() {
            return Err(Error::not_found(format!("Election group '{group}'")));
        }

        let snapshots = join_all(contests.iter().map(|c| self.contest_snapshot(c.id))).await;
        let mut tallies = Vec::with_capacity(contests.len());
        for (contest, snapshot) in contests.iter().zip(snapshots) {
            let snapshot = Snapshot {
                members: members.clone(),
                ..snapshot?
            };
            let tally = compute(contest.id, &snapshot).map_err(|e| {
                error!(
                    "Tally of contest {} in group '{group}' failed an integrity check: {e}",
                    contest.id
                );
                e
            })?;
            tallies.push(tally);
        }

        let group_tally = combine(group.to_string(), tallies, members.as_deref());
        if !group_tally.degraded.is_empty() {
            warn!(
                "Tally of group '{group}' is degraded, missing {:?}",
                group_tally.degraded
            );
        }
        Ok((group_tally, contests))
    }

    /// When each ballot of a contest was cast, or `None` if the ballots
    /// could not be read in time.
    pub async fn ballot_times(&self, contest_id: Id) -> Option<Vec<DateTime<Utc>>> {
        let ballots = self
            .bounded(
                DataSource::Ballots,
                self.stores.ballots.list_ballots(contest_id),
            )
            .await?;
        Some(ballots.iter().map(|ballot| ballot.cast_at).collect())
    }

    /// Read the contest, its candidates and its ballots concurrently.
    /// Members are left out, as they are shared between contests.
    async fn contest_snapshot(&self, contest_id: Id) -> Result<Snapshot> {
        let (contest, candidates, ballots) = join!(
            self.bounded(
                DataSource::Contest,
                self.stores.contests.get_contest(contest_id)
            ),
            self.bounded(
                DataSource::Candidates,
                self.stores.candidates.list_candidates(contest_id)
            ),
            self.bounded(
                DataSource::Ballots,
                self.stores.ballots.list_ballots(contest_id)
            ),
        );
        let contest = match contest {
            Some(Some(contest)) => Some(contest),
            Some(None) => return Err(Error::not_found(format!("Contest {contest_id}"))),
            None => None,
        };
        Ok(Snapshot {
            contest,
            candidates,
            ballots,
            members: None,
        })
    }

    async fn fetch_members(&self) -> Option<Vec<Member>> {
        self.bounded(DataSource::Members, self.stores.members.list_members())
            .await
    }

    /// Run one source fetch under the timeout, turning any failure into `None`.
    async fn bounded<T>(
        &self,
        source: DataSource,
        fetch: impl Future<Output = Result<T>>,
    ) -> Option<T> {
        match timeout(self.fetch_timeout, fetch).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("Failed to read {source:?}: {e}");
                None
            }
            Err(_) => {
                warn!(
                    "Reading {source:?} took longer than {:?}",
                    self.fetch_timeout
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use rocket::tokio::time::sleep;

    use crate::model::{
        common::role::Role,
        db::{ballot::NewBallot, candidate::NewCandidate, contest::NewContest},
    };
    use crate::store::{
        testing::{FaultyContests, UnreadableBallots},
        BallotStore, CandidateStore, ContestStore, MemberStore, MemoryStore,
    };

    struct Fixture {
        store: Arc<MemoryStore>,
        contest: Contest,
        a: Id,
        b: Id,
        members: Vec<Member>,
    }

    /// Contest with candidates A and B and ten members across two branches.
    async fn fixture(max_selections: u32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut spec = NewContest::current_example();
        spec.max_selections_per_member = max_selections;
        let contest = store.insert_contest(spec).await.unwrap();
        let mut ids = Vec::new();
        for name in ["A", "B"] {
            let candidate = store
                .insert_candidate(NewCandidate {
                    contest_id: contest.id,
                    name: name.to_string(),
                    description: String::new(),
                    photo: None,
                })
                .await
                .unwrap();
            ids.push(candidate.id);
        }
        let mut members = Vec::new();
        for i in 0..10 {
            let branch = if i < 4 { "North" } else { "South" };
            let member = Member::new(Some(branch), Role::Member);
            store.add_member(member.clone()).await;
            members.push(member);
        }
        Fixture {
            store,
            contest,
            a: ids[0],
            b: ids[1],
            members,
        }
    }

    fn snapshot_ballot(voter: Id, candidate: Id, contest: Id) -> Ballot {
        Ballot {
            id: Id::new(),
            ballot: NewBallot::new(voter, candidate, contest, Utc::now()),
        }
    }

    fn aggregator(stores: Stores) -> TallyAggregator {
        TallyAggregator::new(stores, Duration::from_millis(200))
    }

    #[rocket::async_test]
    async fn counts_zero_candidates_and_turnout() {
        let f = fixture(1).await;
        for member in &f.members[..3] {
            f.store
                .append(NewBallot::new(member.id, f.a, f.contest.id, Utc::now()), 1)
                .await
                .unwrap();
        }

        let tally = aggregator(Stores::in_memory(f.store.clone()))
            .aggregate(f.contest.id)
            .await
            .unwrap();

        assert_eq!(tally.counts.get(&f.a), Some(&3));
        assert_eq!(tally.counts.get(&f.b), Some(&0));
        assert_eq!(tally.unique_voters.len(), 3);
        assert_eq!(tally.turnout_pct, Some(30));
        assert!(!tally.is_degraded());

        // Three of the four North members voted, none of the South.
        assert_eq!(
            tally.branch_turnout,
            vec![
                BranchTurnout {
                    branch: "North".to_string(),
                    members: 4,
                    voted: 3,
                    participation_pct: 75,
                },
                BranchTurnout {
                    branch: "South".to_string(),
                    members: 6,
                    voted: 0,
                    participation_pct: 0,
                },
            ]
        );
    }

    #[rocket::async_test]
    async fn voter_with_several_selections_counts_once() {
        let f = fixture(2).await;
        let voter = f.members[0].id;
        for candidate in [f.a, f.b] {
            f.store
                .append(NewBallot::new(voter, candidate, f.contest.id, Utc::now()), 2)
                .await
                .unwrap();
        }

        let tally = aggregator(Stores::in_memory(f.store.clone()))
            .aggregate(f.contest.id)
            .await
            .unwrap();
        assert_eq!(tally.total_votes(), 2);
        assert_eq!(tally.unique_voters.len(), 1);
        assert_eq!(tally.turnout_pct, Some(10));
    }

    #[rocket::async_test]
    async fn unknown_contest_is_not_found() {
        let f = fixture(1).await;
        let result = aggregator(Stores::in_memory(f.store))
            .aggregate(Id::new())
            .await;
        assert!(matches!(result, Err(Error::Status(status, _)) if status.code == 404));
    }

    struct BrokenMembers;

    #[rocket::async_trait]
    impl MemberStore for BrokenMembers {
        async fn list_members(&self) -> Result<Vec<Member>> {
            Err(Error::Timeout("member directory unreachable".to_string()))
        }

        async fn get_member(&self, _id: Id) -> Result<Option<Member>> {
            Err(Error::Timeout("member directory unreachable".to_string()))
        }
    }

    struct SlowMembers;

    #[rocket::async_trait]
    impl MemberStore for SlowMembers {
        async fn list_members(&self) -> Result<Vec<Member>> {
            sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn get_member(&self, _id: Id) -> Result<Option<Member>> {
            Ok(None)
        }
    }

    #[rocket::async_test]
    async fn member_failure_keeps_candidate_counts() {
        let f = fixture(1).await;
        f.store
            .append(NewBallot::new(f.members[0].id, f.b, f.contest.id, Utc::now()), 1)
            .await
            .unwrap();

        let stores = Stores {
            members: Arc::new(BrokenMembers),
            ..Stores::in_memory(f.store.clone())
        };
        let tally = aggregator(stores).aggregate(f.contest.id).await.unwrap();

        assert_eq!(tally.counts.get(&f.b), Some(&1));
        assert_eq!(tally.counts.get(&f.a), Some(&0));
        assert_eq!(tally.turnout_pct, None);
        assert!(tally.branch_turnout.is_empty());
        assert_eq!(tally.degraded, vec![DataSource::Members]);
    }

    #[rocket::async_test]
    async fn slow_member_fetch_times_out_gracefully() {
        let f = fixture(1).await;
        let stores = Stores {
            members: Arc::new(SlowMembers),
            ..Stores::in_memory(f.store.clone())
        };
        let started = std::time::Instant::now();
        let tally = aggregator(stores).aggregate(f.contest.id).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(tally.counts.len(), 2);
        assert_eq!(tally.degraded, vec![DataSource::Members]);
    }

    #[test]
    fn integrity_violations_are_reported() {
        let contest = Contest {
            id: Id::new(),
            contest: NewContest::current_example(),
        };
        let known = Candidate {
            id: Id::new(),
            candidate: NewCandidate {
                contest_id: contest.id,
                name: "Known".to_string(),
                description: String::new(),
                photo: None,
            },
        };
        let voter = Id::new();
        let base = Snapshot {
            contest: Some(contest.clone()),
            candidates: Some(vec![known.clone()]),
            ballots: None,
            members: Some(Vec::new()),
        };

        let unknown = Snapshot {
            ballots: Some(vec![snapshot_ballot(voter, Id::new(), contest.id)]),
            ..base.clone()
        };
        assert!(matches!(
            compute(contest.id, &unknown),
            Err(IntegrityError::UnknownCandidate { .. })
        ));

        let foreign = Snapshot {
            ballots: Some(vec![snapshot_ballot(voter, known.id, Id::new())]),
            ..base.clone()
        };
        assert!(matches!(
            compute(contest.id, &foreign),
            Err(IntegrityError::ForeignBallot { .. })
        ));

        let twice = Snapshot {
            ballots: Some(vec![
                snapshot_ballot(voter, known.id, contest.id),
                snapshot_ballot(voter, known.id, contest.id),
            ]),
            ..base.clone()
        };
        assert!(matches!(
            compute(contest.id, &twice),
            Err(IntegrityError::DuplicateSelection { .. })
        ));

        let second = Candidate {
            id: Id::new(),
            candidate: NewCandidate {
                name: "Second".to_string(),
                ..known.candidate.clone()
            },
        };
        let too_many = Snapshot {
            candidates: Some(vec![known.clone(), second.clone()]),
            ballots: Some(vec![
                snapshot_ballot(voter, known.id, contest.id),
                snapshot_ballot(voter, second.id, contest.id),
            ]),
            ..base
        };
        assert_eq!(
            compute(contest.id, &too_many),
            Err(IntegrityError::SelectionsExceeded {
                voter,
                cast: 2,
                max: 1
            })
        );
    }

    #[test]
    fn missing_candidates_fall_back_to_ballot_counts() {
        let contest_id = Id::new();
        let candidate = Id::new();
        let snapshot = Snapshot {
            contest: None,
            candidates: None,
            ballots: Some(vec![
                snapshot_ballot(Id::new(), candidate, contest_id),
                snapshot_ballot(Id::new(), candidate, contest_id),
            ]),
            members: None,
        };
        let tally = compute(contest_id, &snapshot).unwrap();
        assert_eq!(tally.counts.get(&candidate), Some(&2));
        assert_eq!(
            tally.degraded,
            vec![
                DataSource::Contest,
                DataSource::Candidates,
                DataSource::Members
            ]
        );
    }

    #[test]
    fn percentages_round_and_never_divide_by_zero() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 0), 0);
        assert_eq!(percentage(3, 10), 30);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(7, 7), 100);
    }

    #[test]
    fn members_without_branch_are_grouped_together() {
        let voter = Member::new(None, Role::Member);
        let members = vec![
            voter.clone(),
            Member::new(Some("  "), Role::Officer),
            Member::new(Some("East"), Role::Member),
        ];
        let voters = BTreeSet::from([voter.id]);
        let turnout = branch_turnout(&members, &voters);
        assert_eq!(turnout[0].branch, "Unassigned");
        assert_eq!(turnout[0].members, 2);
        assert_eq!(turnout[0].participation_pct, 50);
        assert_eq!(turnout[1].branch, "East");
        assert_eq!(turnout[1].participation_pct, 0);
    }

    #[rocket::async_test]
    async fn group_turnout_counts_distinct_voters_across_contests() {
        let f = fixture(1).await;
        let mut grouped = Vec::new();
        for _ in 0..2 {
            let mut spec = NewContest::current_example();
            spec.group = Some("AGM 2024".to_string());
            let contest = f.store.insert_contest(spec).await.unwrap();
            let only = f
                .store
                .insert_candidate(NewCandidate {
                    contest_id: contest.id,
                    name: "Only".to_string(),
                    description: String::new(),
                    photo: None,
                })
                .await
                .unwrap();
            grouped.push((contest.id, only.id));
        }

        // Member 0 votes in both, member 1 only in the second.
        let (first, only_first) = grouped[0];
        let (second, only_second) = grouped[1];
        f.store
            .append(NewBallot::new(f.members[0].id, only_first, first, Utc::now()), 1)
            .await
            .unwrap();
        for member in &f.members[..2] {
            f.store
                .append(NewBallot::new(member.id, only_second, second, Utc::now()), 1)
                .await
                .unwrap();
        }

        let aggregator = aggregator(Stores::in_memory(f.store.clone()));
        let (group, contests) = aggregator.aggregate_group("AGM 2024").await.unwrap();
        assert_eq!(group.contests.len(), 2);
        let tallied: Vec<Id> = group.contests.iter().map(|t| t.contest_id).collect();
        let listed: Vec<Id> = contests.iter().map(|c| c.id).collect();
        assert_eq!(tallied, listed);
        assert_eq!(group.unique_voters.len(), 2);
        assert_eq!(group.turnout_pct, Some(20));
        assert!(group.degraded.is_empty());

        assert!(aggregator.aggregate_group("No such group").await.is_err());
    }

    #[rocket::async_test]
    async fn unlisted_group_degrades_instead_of_failing() {
        let f = fixture(1).await;
        let stores = Stores {
            contests: Arc::new(FaultyContests::failing_listing(f.store.clone())),
            ..Stores::in_memory(f.store.clone())
        };

        let (group, contests) = aggregator(stores)
            .aggregate_group("AGM 2024")
            .await
            .unwrap();
        assert!(contests.is_empty());
        assert!(group.contests.is_empty());
        assert_eq!(group.turnout_pct, None);
        assert_eq!(group.degraded, vec![DataSource::Contest]);
    }

    #[rocket::async_test]
    async fn corrupt_contest_fails_its_group() {
        let f = fixture(1).await;
        let mut spec = NewContest::current_example();
        spec.group = Some("AGM 2024".to_string());
        let contest = f.store.insert_contest(spec).await.unwrap();
        // A ballot for a candidate the contest never had.
        f.store
            .append(NewBallot::new(f.members[0].id, Id::new(), contest.id, Utc::now()), 1)
            .await
            .unwrap();

        let result = aggregator(Stores::in_memory(f.store.clone()))
            .aggregate_group("AGM 2024")
            .await;
        assert!(matches!(
            result,
            Err(Error::Integrity(IntegrityError::UnknownCandidate { .. }))
        ));
    }

    #[rocket::async_test]
    async fn unreadable_ballots_leave_no_times() {
        let f = fixture(1).await;
        f.store
            .append(NewBallot::new(f.members[0].id, f.a, f.contest.id, Utc::now()), 1)
            .await
            .unwrap();

        let healthy = aggregator(Stores::in_memory(f.store.clone()));
        assert_eq!(healthy.ballot_times(f.contest.id).await.map(|t| t.len()), Some(1));

        let stores = Stores {
            ballots: Arc::new(UnreadableBallots),
            ..Stores::in_memory(f.store.clone())
        };
        assert_eq!(aggregator(stores).ballot_times(f.contest.id).await, None);
    }
}
