use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::engine::voting;
use crate::error::Result;
use crate::model::{
    api::{
        auth::Caller,
        ballot::{BallotDesc, BallotRequest},
    },
    mongodb::Id,
};
use crate::store::Stores;

pub fn routes() -> Vec<Route> {
    routes![cast_ballot]
}

#[post("/contests/<contest_id>/ballots", data = "<request>", format = "json")]
async fn cast_ballot(
    caller: Caller,
    contest_id: Id,
    request: Json<BallotRequest>,
    stores: &State<Stores>,
) -> Result<Json<BallotDesc>> {
    let ballot = voting::cast(
        stores,
        caller.member_id,
        contest_id,
        request.candidate_id.into(),
        Utc::now(),
    )
    .await?;
    Ok(Json(ballot.into()))
}
