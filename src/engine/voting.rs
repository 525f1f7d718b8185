use chrono::{DateTime, Utc};
use rocket::http::Status;

use crate::error::{Error, Result};
use crate::model::{
    db::ballot::{Ballot, NewBallot},
    mongodb::Id,
};
use crate::store::Stores;

/// Record one selection by `voter_id` for `candidate_id` in `contest_id`.
///
/// The store enforces the per-voter limits atomically, so concurrent casts by
/// the same voter cannot exceed them.
pub async fn cast(
    stores: &Stores,
    voter_id: Id,
    contest_id: Id,
    candidate_id: Id,
    now: DateTime<Utc>,
) -> Result<Ballot> {
    let contest = stores
        .contests
        .get_contest(contest_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Contest {contest_id}")))?;
    if !contest.accepts_ballots_at(now) {
        return Err(Error::conflict(format!(
            "Contest {contest_id} is not accepting ballots ({:?})",
            contest.status
        )));
    }

    let candidates = stores.candidates.list_candidates(contest_id).await?;
    if !candidates.iter().any(|c| c.id == candidate_id) {
        return Err(Error::not_found(format!(
            "Candidate {candidate_id} in contest {contest_id}"
        )));
    }

    if stores.members.get_member(voter_id).await?.is_none() {
        return Err(Error::Status(
            Status::Forbidden,
            format!("{voter_id} is not a member and cannot vote"),
        ));
    }

    let ballot = stores
        .ballots
        .append(
            NewBallot::new(voter_id, candidate_id, contest_id, now),
            contest.max_selections_per_member,
        )
        .await?;
    debug!(
        "Member {voter_id} cast selection {} in contest {contest_id}",
        ballot.slot
    );
    Ok(ballot)
}
