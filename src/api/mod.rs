use rocket::Route;

use crate::error::{Error, Result};
use crate::model::{db::contest::Contest, mongodb::Id};
use crate::store::Stores;

mod admin;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}

/// Fetch a contest or produce a 404.
async fn find_contest(stores: &Stores, contest_id: Id) -> Result<Contest> {
    stores
        .contests
        .get_contest(contest_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Contest {contest_id}")))
}
