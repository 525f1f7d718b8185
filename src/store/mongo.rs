use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    results::InsertOneResult,
    Database,
};
use rocket::{futures::TryStreamExt, http::Status};

use crate::error::{Error, Result};
use crate::model::{
    common::contest::ContestStatus,
    db::{
        ballot::{Ballot, NewBallot},
        candidate::{Candidate, NewCandidate},
        contest::{Contest, NewContest},
        member::Member,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};

use super::{BallotStore, CandidateStore, ContestStore, MemberStore};

/// MongoDB-backed implementation of the contest, candidate, ballot and member stores.
pub struct MongoStore {
    contests: Coll<Contest>,
    new_contests: Coll<NewContest>,
    candidates: Coll<Candidate>,
    new_candidates: Coll<NewCandidate>,
    ballots: Coll<Ballot>,
    new_ballots: Coll<NewBallot>,
    members: Coll<Member>,
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        Self {
            contests: Coll::from_db(db),
            new_contests: Coll::from_db(db),
            candidates: Coll::from_db(db),
            new_candidates: Coll::from_db(db),
            ballots: Coll::from_db(db),
            new_ballots: Coll::from_db(db),
            members: Coll::from_db(db),
        }
    }

    /// Apply `update` to the contest iff it currently matches `filter`,
    /// returning the updated contest.
    async fn update_contest(
        &self,
        id: Id,
        filter: Document,
        update: Document,
    ) -> Result<Option<Contest>> {
        let mut full_filter = id.as_doc();
        full_filter.extend(filter);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .contests
            .find_one_and_update(full_filter, update, options)
            .await?)
    }

    /// Work out why a conditional update matched nothing.
    async fn explain_miss(&self, id: Id, action: &str) -> Error {
        match self.get_contest(id).await {
            Ok(Some(contest)) => Error::conflict(format!(
                "Cannot {action} contest {id} from {:?}",
                contest.status
            )),
            Ok(None) => Error::not_found(format!("Contest {id}")),
            Err(e) => e,
        }
    }
}

/// A BSON array of statuses, for use with `$in`.
fn status_in(statuses: &[ContestStatus]) -> Bson {
    Bson::Array(statuses.iter().copied().map(Bson::from).collect())
}

/// Extract the new document's ID from an insert result.
fn inserted_id(result: InsertOneResult) -> Result<Id> {
    result
        .inserted_id
        .as_object_id()
        .map(Id::from)
        .ok_or_else(|| {
            Error::Status(
                Status::InternalServerError,
                "Database assigned a non-ObjectId identifier".to_string(),
            )
        })
}

#[rocket::async_trait]
impl ContestStore for MongoStore {
    async fn get_contest(&self, id: Id) -> Result<Option<Contest>> {
        Ok(self.contests.find_one(id.as_doc(), None).await?)
    }

    async fn list_contests(&self) -> Result<Vec<Contest>> {
        Ok(self.contests.find(None, None).await?.try_collect().await?)
    }

    async fn list_open_contests(&self) -> Result<Vec<Contest>> {
        let filter = doc! {
            "status": { "$in": status_in(&ContestStatus::OPEN) },
        };
        Ok(self.contests.find(filter, None).await?.try_collect().await?)
    }

    async fn list_unannounced_completions(&self) -> Result<Vec<Contest>> {
        let filter = doc! {
            "status": ContestStatus::Completed,
            "announced": { "$ne": true },
        };
        Ok(self.contests.find(filter, None).await?.try_collect().await?)
    }

    async fn insert_contest(&self, contest: NewContest) -> Result<Contest> {
        let result = self.new_contests.insert_one(&contest, None).await?;
        Ok(Contest {
            id: inserted_id(result)?,
            contest,
        })
    }

    async fn activate(&self, id: Id) -> Result<Contest> {
        let filter = doc! { "status": ContestStatus::Upcoming };
        let update = doc! { "$set": { "status": ContestStatus::Active } };
        if let Some(contest) = self.update_contest(id, filter, update).await? {
            return Ok(contest);
        }
        match self.get_contest(id).await? {
            Some(contest) if contest.status == ContestStatus::Active => Ok(contest),
            _ => Err(self.explain_miss(id, "activate").await),
        }
    }

    async fn complete(&self, id: Id, due_at: Option<DateTime<Utc>>) -> Result<Option<Contest>> {
        let mut filter = doc! {
            "status": { "$in": status_in(ContestStatus::predecessors(ContestStatus::Completed)) },
        };
        if let Some(now) = due_at {
            // Checked in the same update, so a deadline moved by a concurrent
            // reopen is respected.
            filter.insert("end_at", doc! { "$lte": BsonDateTime::from_chrono(now) });
        }
        let update = doc! { "$set": { "status": ContestStatus::Completed } };
        if let Some(contest) = self.update_contest(id, filter, update).await? {
            return Ok(Some(contest));
        }
        match self.get_contest(id).await? {
            // Already completed counts as success.
            Some(contest) if contest.status == ContestStatus::Completed => Ok(Some(contest)),
            Some(contest)
                if due_at.is_some() && contest.status.can_transition_to(ContestStatus::Completed) =>
            {
                Ok(None)
            }
            _ => Err(self.explain_miss(id, "complete").await),
        }
    }

    async fn reopen(&self, id: Id, new_end_at: DateTime<Utc>) -> Result<Contest> {
        let current = self
            .get_contest(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Contest {id}")))?;
        let status = match current.status {
            ContestStatus::Cancelled => {
                return Err(Error::conflict(format!(
                    "Contest {id} was cancelled and cannot be reopened"
                )))
            }
            ContestStatus::Completed => ContestStatus::Active,
            other => other,
        };
        // Guard on the status we read, so a concurrent change is not overwritten.
        let filter = doc! { "status": current.status };
        let update = doc! {
            "$set": {
                "status": status,
                "end_at": BsonDateTime::from_chrono(new_end_at),
                "completing_since": Bson::Null,
                "announced": false,
            }
        };
        self.update_contest(id, filter, update)
            .await?
            .ok_or_else(|| Error::conflict(format!("Contest {id} changed while reopening")))
    }

    async fn transition(&self, id: Id, next: ContestStatus) -> Result<Contest> {
        let filter = doc! {
            "status": { "$in": status_in(ContestStatus::predecessors(next)) },
        };
        let update = doc! { "$set": { "status": next } };
        match self.update_contest(id, filter, update).await? {
            Some(contest) => Ok(contest),
            None => Err(self.explain_miss(id, &format!("move to {next:?}")).await),
        }
    }

    async fn set_results_public(&self, id: Id, public: bool) -> Result<Contest> {
        let update = doc! { "$set": { "results_public": public } };
        self.update_contest(id, Document::new(), update)
            .await?
            .ok_or_else(|| Error::not_found(format!("Contest {id}")))
    }

    async fn claim_completion(
        &self,
        id: Id,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "$or": [
                { "completing_since": Bson::Null },
                { "completing_since": { "$lt": BsonDateTime::from_chrono(stale_before) } },
            ],
        };
        let update = doc! {
            "$set": { "completing_since": BsonDateTime::from_chrono(now) }
        };
        let result = self.contests.update_one(filter, update, None).await?;
        Ok(result.modified_count == 1)
    }

    async fn release_completion(&self, id: Id) -> Result<()> {
        let update = doc! { "$set": { "completing_since": Bson::Null } };
        self.contests.update_one(id.as_doc(), update, None).await?;
        Ok(())
    }

    async fn mark_announced(&self, id: Id) -> Result<()> {
        let mut filter = id.as_doc();
        filter.insert("status", ContestStatus::Completed);
        let update = doc! { "$set": { "announced": true } };
        let result = self.contests.update_one(filter, update, None).await?;
        if result.matched_count == 0 && self.get_contest(id).await?.is_none() {
            return Err(Error::not_found(format!("Contest {id}")));
        }
        Ok(())
    }

    async fn delete_contest(&self, id: Id) -> Result<bool> {
        let result = self.contests.delete_one(id.as_doc(), None).await?;
        Ok(result.deleted_count == 1)
    }
}

#[rocket::async_trait]
impl CandidateStore for MongoStore {
    async fn list_candidates(&self, contest_id: Id) -> Result<Vec<Candidate>> {
        let filter = doc! { "contest_id": contest_id };
        Ok(self.candidates.find(filter, None).await?.try_collect().await?)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let result = self.new_candidates.insert_one(&candidate, None).await?;
        Ok(Candidate {
            id: inserted_id(result)?,
            candidate,
        })
    }

    async fn delete_candidates(&self, contest_id: Id) -> Result<u64> {
        let filter = doc! { "contest_id": contest_id };
        Ok(self.candidates.delete_many(filter, None).await?.deleted_count)
    }
}

#[rocket::async_trait]
impl BallotStore for MongoStore {
    async fn list_ballots(&self, contest_id: Id) -> Result<Vec<Ballot>> {
        let filter = doc! { "contest_id": contest_id };
        Ok(self.ballots.find(filter, None).await?.try_collect().await?)
    }

    async fn append(&self, mut ballot: NewBallot, max_selections: u32) -> Result<Ballot> {
        let voter_filter = doc! {
            "contest_id": ballot.contest_id,
            "voter_id": ballot.voter_id,
        };
        let used = self.ballots.count_documents(voter_filter, None).await?;
        if used >= u64::from(max_selections) {
            return Err(Error::conflict(format!(
                "Voter {} has used all {max_selections} selections in contest {}",
                ballot.voter_id, ballot.contest_id
            )));
        }
        // The unique (contest, voter, slot) index turns a concurrent append
        // for the same slot into a duplicate key error.
        ballot.slot = u32::try_from(used).unwrap_or(u32::MAX);
        match self.new_ballots.insert_one(&ballot, None).await {
            Ok(result) => Ok(Ballot {
                id: inserted_id(result)?,
                ballot,
            }),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::conflict(format!(
                "Voter {} already voted for candidate {} or is voting concurrently",
                ballot.voter_id, ballot.candidate_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_ballots(&self, contest_id: Id) -> Result<u64> {
        let filter = doc! { "contest_id": contest_id };
        Ok(self.ballots.delete_many(filter, None).await?.deleted_count)
    }
}

#[rocket::async_trait]
impl MemberStore for MongoStore {
    async fn list_members(&self) -> Result<Vec<Member>> {
        Ok(self.members.find(None, None).await?.try_collect().await?)
    }

    async fn get_member(&self, id: Id) -> Result<Option<Member>> {
        Ok(self.members.find_one(id.as_doc(), None).await?)
    }
}
