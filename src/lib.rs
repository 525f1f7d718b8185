#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

#[cfg(test)]
#[macro_use]
extern crate db_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod recurring_task;
pub mod store;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing, EngineFairing, StoresFairing};
use logging::LoggerFairing;

/// Assemble the server: config, MongoDB stores, the lifecycle engine polling
/// in the background, and every route.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing { quiet_rocket: true })
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(StoresFairing)
        .attach(EngineFairing::polling())
        .mount("/", api::routes())
}

/// A server backed by `stores` with a fixed config, whose scheduler only
/// ticks when asked to.
#[cfg(test)]
pub(crate) fn rocket_for_stores(stores: store::Stores, config: Config) -> Rocket<Build> {
    rocket::build()
        .manage(config)
        .manage(stores)
        .attach(LoggerFairing {
            quiet_rocket: false,
        })
        .attach(EngineFairing::manual())
        .mount("/", api::routes())
}

/// A scratch database for one test, emptied and indexed.
#[cfg(test)]
pub(crate) async fn test_database(test: &str) -> mongodb::Database {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    let client = mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to database at \"{db_uri}\": {e}"));
    // Database names are limited to 64 bytes.
    let name: String = format!("test_{test}").chars().take(63).collect();
    let db = client.database(&name);
    db.drop(None).await.unwrap();
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    db
}
