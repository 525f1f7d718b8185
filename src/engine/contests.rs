//! Contest administration: creation, candidates and deletion.

use crate::error::{Error, Result};
use crate::model::{
    common::contest::ContestStatus,
    db::{
        candidate::{Candidate, NewCandidate},
        contest::{Contest, NewContest},
    },
    mongodb::Id,
};
use crate::store::Stores;

/// Validate and store a new contest. New contests always start out upcoming.
pub async fn create_contest(stores: &Stores, mut contest: NewContest) -> Result<Contest> {
    contest.validate().map_err(Error::bad_request)?;
    contest.status = ContestStatus::Upcoming;
    contest.completing_since = None;
    contest.announced = false;
    let contest = stores.contests.insert_contest(contest).await?;
    info!("Created contest {} ({})", contest.id, contest.title);
    Ok(contest)
}

/// Add a candidate to a contest that has not finished.
pub async fn add_candidate(
    stores: &Stores,
    contest_id: Id,
    name: String,
    description: String,
    photo: Option<String>,
) -> Result<Candidate> {
    if name.trim().is_empty() {
        return Err(Error::bad_request("Candidate name must not be empty"));
    }
    let contest = get(stores, contest_id).await?;
    if contest.status.is_terminal() {
        return Err(Error::conflict(format!(
            "Cannot add candidates to contest {contest_id}, it is {:?}",
            contest.status
        )));
    }
    let candidate = stores
        .candidates
        .insert_candidate(NewCandidate {
            contest_id,
            name,
            description,
            photo,
        })
        .await?;
    debug!("Added candidate {} to contest {contest_id}", candidate.id);
    Ok(candidate)
}

/// Delete a contest and its candidates.
///
/// A contest with ballots is only deleted when `cascade` is set, in which
/// case its ballots go too.
pub async fn delete_contest(stores: &Stores, contest_id: Id, cascade: bool) -> Result<()> {
    get(stores, contest_id).await?;

    let ballots = stores.ballots.list_ballots(contest_id).await?;
    if !ballots.is_empty() {
        if !cascade {
            return Err(Error::conflict(format!(
                "Contest {contest_id} has {} ballots; deleting it needs cascade",
                ballots.len()
            )));
        }
        let deleted = stores.ballots.delete_ballots(contest_id).await?;
        warn!("Deleted {deleted} ballots of contest {contest_id}");
    }
    let candidates = stores.candidates.delete_candidates(contest_id).await?;
    if !stores.contests.delete_contest(contest_id).await? {
        return Err(Error::not_found(format!("Contest {contest_id}")));
    }
    info!("Deleted contest {contest_id} and {candidates} candidates");
    Ok(())
}

async fn get(stores: &Stores, contest_id: Id) -> Result<Contest> {
    stores
        .contests
        .get_contest(contest_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Contest {contest_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use chrono::Utc;

    use crate::model::db::ballot::NewBallot;
    use crate::store::{BallotStore, CandidateStore, ContestStore, MemoryStore};

    #[rocket::async_test]
    async fn created_contests_are_upcoming() {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::in_memory(store.clone());

        let mut spec = NewContest::future_example();
        spec.status = ContestStatus::Completed;
        spec.announced = true;
        let contest = create_contest(&stores, spec).await.unwrap();
        assert_eq!(contest.status, ContestStatus::Upcoming);
        assert!(!contest.announced);

        let mut invalid = NewContest::future_example();
        invalid.title = "  ".to_string();
        assert!(create_contest(&stores, invalid).await.is_err());
        assert_eq!(store.list_contests().await.unwrap().len(), 1);
    }

    #[rocket::async_test]
    async fn candidates_only_join_unfinished_contests() {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::in_memory(store.clone());
        let contest = store
            .insert_contest(NewContest::current_example())
            .await
            .unwrap();

        add_candidate(&stores, contest.id, "Sam".to_string(), String::new(), None)
            .await
            .unwrap();
        assert!(add_candidate(&stores, contest.id, "".to_string(), String::new(), None)
            .await
            .is_err());

        store.complete(contest.id, None).await.unwrap();
        assert!(
            add_candidate(&stores, contest.id, "Late".to_string(), String::new(), None)
                .await
                .is_err()
        );
        assert_eq!(store.list_candidates(contest.id).await.unwrap().len(), 1);
    }

    #[rocket::async_test]
    async fn deleting_a_voted_contest_needs_cascade() {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::in_memory(store.clone());
        let contest = store
            .insert_contest(NewContest::current_example())
            .await
            .unwrap();
        let candidate = add_candidate(&stores, contest.id, "Sam".to_string(), String::new(), None)
            .await
            .unwrap();
        store
            .append(
                NewBallot::new(Id::new(), candidate.id, contest.id, Utc::now()),
                1,
            )
            .await
            .unwrap();

        assert!(delete_contest(&stores, contest.id, false).await.is_err());
        assert!(store.get_contest(contest.id).await.unwrap().is_some());

        delete_contest(&stores, contest.id, true).await.unwrap();
        assert!(store.get_contest(contest.id).await.unwrap().is_none());
        assert!(store.list_ballots(contest.id).await.unwrap().is_empty());
        assert!(store.list_candidates(contest.id).await.unwrap().is_empty());

        assert!(delete_contest(&stores, contest.id, true).await.is_err());
    }
}
