use rocket::{serde::json::Json, Route, State};

use crate::engine::{curve, tally::DataSource, visibility, TallyAggregator};
use crate::error::Result;
use crate::model::{
    api::{
        auth::Caller,
        contest::{ContestDesc, ContestSummary},
        results::{CurrentVisibility, CurveResponse, GroupTallyDesc, TallyResponse},
    },
    mongodb::Id,
};
use crate::store::Stores;
use crate::Config;

use super::find_contest;

pub fn routes() -> Vec<Route> {
    routes![
        contests,
        contest,
        contest_tally,
        engagement_curve,
        contest_visibility,
        current_visibility,
        group_tally,
    ]
}

#[get("/contests")]
async fn contests(stores: &State<Stores>) -> Result<Json<Vec<ContestSummary>>> {
    let mut contests = stores.contests.list_contests().await?;
    contests.sort_by_key(|c| (c.start_at, c.id));
    Ok(Json(contests.into_iter().map(ContestSummary::from).collect()))
}

#[get("/contests/<contest_id>")]
async fn contest(contest_id: Id, stores: &State<Stores>) -> Result<Json<ContestDesc>> {
    let contest = find_contest(stores, contest_id).await?;
    let candidates = stores.candidates.list_candidates(contest_id).await?;
    Ok(Json(ContestDesc::new(contest, candidates)))
}

#[get("/contests/<contest_id>/tally")]
async fn contest_tally(
    contest_id: Id,
    caller: Option<Caller>,
    stores: &State<Stores>,
    aggregator: &State<TallyAggregator>,
) -> Result<Json<TallyResponse>> {
    let contest = find_contest(stores, contest_id).await?;
    let visibility = visibility::resolve(Some(&contest), caller.map(|c| c.role));
    if !visibility.visible {
        return Ok(Json(TallyResponse::withheld(visibility)));
    }

    let tally = aggregator.aggregate(contest_id).await?;
    Ok(Json(TallyResponse {
        visibility,
        tally: Some(tally.into()),
    }))
}

#[get("/contests/<contest_id>/curve")]
async fn engagement_curve(
    contest_id: Id,
    stores: &State<Stores>,
    aggregator: &State<TallyAggregator>,
    config: &State<Config>,
) -> Result<Json<CurveResponse>> {
    let contest = find_contest(stores, contest_id).await?;
    let mut degraded = Vec::new();
    let points = if contest.status.is_ongoing() {
        // Unreadable ballots draw a flat curve rather than failing the request.
        let timestamps = aggregator
            .ballot_times(contest_id)
            .await
            .unwrap_or_else(|| {
                degraded.push(DataSource::Ballots);
                Vec::new()
            });
        Some(curve::build(&timestamps, config.curve_offset()))
    } else {
        None
    };

    Ok(Json(CurveResponse {
        contest_id: contest_id.into(),
        status: contest.status,
        points,
        degraded,
    }))
}

#[get("/contests/<contest_id>/visibility")]
async fn contest_visibility(
    contest_id: Id,
    caller: Option<Caller>,
    stores: &State<Stores>,
) -> Result<Json<visibility::Visibility>> {
    let contest = stores.contests.get_contest(contest_id).await?;
    Ok(Json(visibility::resolve(
        contest.as_ref(),
        caller.map(|c| c.role),
    )))
}

#[get("/results/current/visibility")]
async fn current_visibility(
    caller: Option<Caller>,
    stores: &State<Stores>,
) -> Result<Json<CurrentVisibility>> {
    let contests = stores.contests.list_contests().await?;
    let current = visibility::current_contest(&contests);
    let resolved = visibility::resolve(current, caller.map(|c| c.role));
    Ok(Json(CurrentVisibility {
        contest_id: current.map(|c| c.id.into()),
        visible: resolved.visible,
        reason: resolved.reason,
    }))
}

#[get("/groups/<group>/tally")]
async fn group_tally(
    group: &str,
    caller: Option<Caller>,
    aggregator: &State<TallyAggregator>,
) -> Result<Json<GroupTallyDesc>> {
    let (mut group_tally, contests) = aggregator.aggregate_group(group).await?;

    // Participation is shown to everyone; each contest's counts only to
    // those who may see that contest's results.
    let role = caller.map(|c| c.role);
    let tallies = std::mem::take(&mut group_tally.contests)
        .into_iter()
        .zip(&contests)
        .map(|(tally, contest)| {
            let visibility = visibility::resolve(Some(contest), role);
            if visibility.visible {
                TallyResponse {
                    visibility,
                    tally: Some(tally.into()),
                }
            } else {
                TallyResponse::withheld(visibility)
            }
        })
        .collect();
    Ok(Json(GroupTallyDesc::new(group_tally, tallies)))
}
