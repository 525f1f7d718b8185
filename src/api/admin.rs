use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::engine::{contests, LifecycleScheduler};
use crate::error::Result;
use crate::model::{
    api::{
        auth::AdminCaller,
        contest::{
            CandidateDesc, CandidateSpec, ContestDesc, ContestSpec, ContestSummary,
            PublishRequest, ReopenRequest,
        },
        results::TickReportDesc,
    },
    mongodb::Id,
};
use crate::store::Stores;

pub fn routes() -> Vec<Route> {
    routes![
        create_contest,
        add_candidate,
        pause_contest,
        resume_contest,
        cancel_contest,
        complete_contest,
        reopen_contest,
        set_results_public,
        delete_contest,
        tick_scheduler,
    ]
}

#[post("/contests", data = "<spec>", format = "json")]
async fn create_contest(
    _admin: AdminCaller,
    spec: Json<ContestSpec>,
    stores: &State<Stores>,
) -> Result<Json<ContestDesc>> {
    let contest = contests::create_contest(stores, spec.0.into()).await?;
    Ok(Json(ContestDesc::new(contest, Vec::new())))
}

#[post("/contests/<contest_id>/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    _admin: AdminCaller,
    contest_id: Id,
    spec: Json<CandidateSpec>,
    stores: &State<Stores>,
) -> Result<Json<CandidateDesc>> {
    let CandidateSpec {
        name,
        description,
        photo,
    } = spec.0;
    let candidate = contests::add_candidate(stores, contest_id, name, description, photo).await?;
    Ok(Json(candidate.into()))
}

#[post("/contests/<contest_id>/pause")]
async fn pause_contest(
    _admin: AdminCaller,
    contest_id: Id,
    scheduler: &State<LifecycleScheduler>,
) -> Result<Json<ContestSummary>> {
    Ok(Json(scheduler.pause(contest_id).await?.into()))
}

#[post("/contests/<contest_id>/resume")]
async fn resume_contest(
    _admin: AdminCaller,
    contest_id: Id,
    scheduler: &State<LifecycleScheduler>,
) -> Result<Json<ContestSummary>> {
    Ok(Json(scheduler.resume(contest_id).await?.into()))
}

#[post("/contests/<contest_id>/cancel")]
async fn cancel_contest(
    _admin: AdminCaller,
    contest_id: Id,
    scheduler: &State<LifecycleScheduler>,
) -> Result<Json<ContestSummary>> {
    Ok(Json(scheduler.cancel(contest_id).await?.into()))
}

/// Close voting now rather than at the deadline.
#[post("/contests/<contest_id>/complete")]
async fn complete_contest(
    _admin: AdminCaller,
    contest_id: Id,
    scheduler: &State<LifecycleScheduler>,
) -> Result<Json<ContestSummary>> {
    let contest = scheduler.complete_now(contest_id, Utc::now()).await?;
    Ok(Json(contest.into()))
}

#[post("/contests/<contest_id>/reopen", data = "<request>", format = "json")]
async fn reopen_contest(
    admin: AdminCaller,
    contest_id: Id,
    request: Json<ReopenRequest>,
    scheduler: &State<LifecycleScheduler>,
) -> Result<Json<ContestSummary>> {
    let contest = scheduler
        .reopen(contest_id, request.end_at, Utc::now())
        .await?;
    info!("Admin {} reopened contest {contest_id}", admin.0.member_id);
    Ok(Json(contest.into()))
}

#[put("/contests/<contest_id>/results-public", data = "<request>", format = "json")]
async fn set_results_public(
    _admin: AdminCaller,
    contest_id: Id,
    request: Json<PublishRequest>,
    scheduler: &State<LifecycleScheduler>,
) -> Result<Json<ContestSummary>> {
    let contest = scheduler
        .set_results_public(contest_id, request.public)
        .await?;
    Ok(Json(contest.into()))
}

#[delete("/contests/<contest_id>?<cascade>")]
async fn delete_contest(
    admin: AdminCaller,
    contest_id: Id,
    cascade: Option<bool>,
    stores: &State<Stores>,
) -> Result<()> {
    contests::delete_contest(stores, contest_id, cascade.unwrap_or(false)).await?;
    info!("Admin {} deleted contest {contest_id}", admin.0.member_id);
    Ok(())
}

/// Run one scheduler tick immediately.
#[post("/scheduler/tick")]
async fn tick_scheduler(
    _admin: AdminCaller,
    scheduler: &State<LifecycleScheduler>,
) -> Json<TickReportDesc> {
    Json(scheduler.tick(Utc::now()).await.into())
}
