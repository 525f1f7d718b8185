use std::sync::{Arc, Mutex};
use std::time::Duration;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sns::{
    config::{Credentials, Region},
    Client as SnsClient,
};
use chrono::{FixedOffset, Offset, Utc};
use mongodb::{Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Orbit, Rocket,
};
use serde::Deserialize;

use crate::engine::{LifecycleScheduler, SchedulerSettings, TallyAggregator};
use crate::model::mongodb::ensure_indexes_exist;
use crate::recurring_task::RecurringTask;
use crate::store::{MongoAnnouncements, NotificationSink, SnsAnnouncements, Stores};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // non-secrets
    tick_interval: u64,
    completion_timeout: u64,
    claim_ttl: u64,
    fetch_timeout_ms: u64,
    curve_utc_offset_minutes: i32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Seconds between scheduler ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval)
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            completion_timeout: Duration::from_secs(self.completion_timeout),
            claim_ttl: Duration::from_secs(self.claim_ttl),
        }
    }

    /// Upper bound on each read feeding a tally.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// The local time zone in which engagement curve slots are laid out.
    pub fn curve_offset(&self) -> FixedOffset {
        self.checked_curve_offset().unwrap_or_else(|| Utc.fix())
    }

    fn checked_curve_offset(&self) -> Option<FixedOffset> {
        self.curve_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Secret key used to verify JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Reject settings that would make the scheduler or curve misbehave.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval == 0 {
            return Err("`tick_interval` must be at least one second".to_string());
        }
        if self.completion_timeout == 0 || self.fetch_timeout_ms == 0 {
            return Err("Timeouts must be positive".to_string());
        }
        if self.claim_ttl <= self.completion_timeout {
            return Err("`claim_ttl` must exceed `completion_timeout`".to_string());
        }
        if self.checked_curve_offset().is_none() {
            return Err(format!(
                "`curve_utc_offset_minutes` of {} is not a valid UTC offset",
                self.curve_utc_offset_minutes
            ));
        }
        if self.jwt_secret.is_empty() {
            return Err("`jwt_secret` must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
impl Config {
    pub fn example() -> Self {
        Self {
            tick_interval: 60,
            completion_timeout: 5,
            claim_ttl: 60,
            fetch_timeout_ms: 500,
            curve_utc_offset_minutes: 0,
            jwt_secret: "test secret".to_string(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let Err(e) = config.validate() {
            error!("Invalid application config: {e}");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// The database used in production.
const DATABASE_NAME: &str = "elections";

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the indexes the stores rely on, and places both a `Client` and a
/// `Database` into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE_NAME);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Configuration for the AWS connection. Everything is optional: without a
/// topic, announcements are only recorded in the database.
#[derive(Deserialize)]
struct AnnouncementConfig {
    // non-secrets
    announcement_topic_arn: Option<String>,
    aws_region: Option<String>,
    aws_access_key_id: Option<String>,
    // secrets
    aws_secret_access_key: Option<String>,
}

impl AnnouncementConfig {
    /// Build an SNS sink if a topic is configured.
    fn sns(self) -> Result<Option<SnsAnnouncements>, String> {
        let topic_arn = match self.announcement_topic_arn {
            Some(topic_arn) => topic_arn,
            None => return Ok(None),
        };
        let (region, key_id, secret) = match (
            self.aws_region,
            self.aws_access_key_id,
            self.aws_secret_access_key,
        ) {
            (Some(region), Some(key_id), Some(secret)) => (region, key_id, secret),
            _ => {
                return Err(
                    "`announcement_topic_arn` needs `aws_region`, `aws_access_key_id` \
and `aws_secret_access_key`"
                        .to_string(),
                )
            }
        };
        let aws_config = SdkConfig::builder()
            .region(Region::new(region))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                key_id,
                secret,
                None,
                None,
                "rocket config",
            )))
            .behavior_version(BehaviorVersion::latest())
            .build();
        Ok(Some(SnsAnnouncements::new(
            SnsClient::new(&aws_config),
            topic_arn,
        )))
    }
}

/// A fairing that wires the MongoDB stores and the announcement sink into
/// a `Stores` in managed state.
/// This fairing depends on the database being available in managed state,
/// and so must be attached after the fairing responsible for that.
pub struct StoresFairing;

#[rocket::async_trait]
impl Fairing for StoresFairing {
    fn info(&self) -> Info {
        Info {
            name: "Stores",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let announcement_config = match rocket.figment().extract::<AnnouncementConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load announcement config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let db = match rocket.state::<Database>() {
            Some(db) => db.clone(),
            None => {
                error!("Database was not available when creating stores");
                return Err(rocket);
            }
        };
        let notifier: Arc<dyn NotificationSink> = match announcement_config.sns() {
            Ok(Some(sns)) => {
                info!("Announcements will be broadcast via Amazon SNS");
                Arc::new(sns)
            }
            Ok(None) => {
                info!("Announcements will be recorded in the database");
                Arc::new(MongoAnnouncements::new(&db))
            }
            Err(e) => {
                error!("Invalid announcement config: {e}");
                return Err(rocket);
            }
        };

        rocket = rocket.manage(Stores::mongo(&db, notifier));
        Ok(rocket)
    }
}

/// A fairing that places the `LifecycleScheduler` and `TallyAggregator` into
/// managed state, and, if polling is enabled, ticks the scheduler in the
/// background from liftoff until shutdown.
/// Depends on `Config` and `Stores` being in managed state.
pub struct EngineFairing {
    poll: bool,
    task: Mutex<Option<RecurringTask>>,
}

impl EngineFairing {
    pub fn polling() -> Self {
        Self {
            poll: true,
            task: Mutex::new(None),
        }
    }

    /// Leave ticking to the caller.
    pub fn manual() -> Self {
        Self {
            poll: false,
            task: Mutex::new(None),
        }
    }
}

#[rocket::async_trait]
impl Fairing for EngineFairing {
    fn info(&self) -> Info {
        Info {
            name: "Lifecycle Engine",
            kind: Kind::Ignite | Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (stores, config) = match (rocket.state::<Stores>(), rocket.state::<Config>()) {
            (Some(stores), Some(config)) => (stores.clone(), config.clone()),
            _ => {
                error!("Stores and config must be available before the engine starts");
                return Err(rocket);
            }
        };
        let scheduler = LifecycleScheduler::new(stores.clone(), config.scheduler_settings());
        let aggregator = TallyAggregator::new(stores, config.fetch_timeout());

        rocket = rocket.manage(scheduler).manage(aggregator);
        Ok(rocket)
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        if !self.poll {
            return;
        }
        let (scheduler, period) = match (
            rocket.state::<LifecycleScheduler>(),
            rocket.state::<Config>(),
        ) {
            (Some(scheduler), Some(config)) => (scheduler.clone(), config.tick_interval()),
            _ => {
                error!("Lifecycle scheduler was not available at liftoff, contests will not close automatically");
                return;
            }
        };
        let task = RecurringTask::new(period, move || {
            let scheduler = scheduler.clone();
            async move {
                scheduler.tick(Utc::now()).await;
            }
        });
        info!("Lifecycle scheduler polling every {period:?}");
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(task);
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            task.cancel().await;
            info!("Lifecycle scheduler stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_is_valid() {
        let config = Config::example();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.curve_offset(), FixedOffset::east_opt(0).unwrap());
        assert_eq!(config.scheduler_settings().claim_ttl, Duration::from_secs(60));
    }

    #[test]
    fn bad_configs_are_rejected() {
        let mut config = Config::example();
        config.tick_interval = 0;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.claim_ttl = config.completion_timeout;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.curve_utc_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn absurd_curve_offsets_fall_back_to_utc() {
        for minutes in [i32::MAX, i32::MIN, 36_000_000] {
            let mut config = Config::example();
            config.curve_utc_offset_minutes = minutes;
            assert!(config.validate().is_err());
            assert_eq!(config.curve_offset(), Utc.fix());
        }

        let mut config = Config::example();
        config.curve_utc_offset_minutes = -300;
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.curve_offset(), FixedOffset::west_opt(5 * 3600).unwrap());
    }

    #[test]
    fn topic_without_credentials_is_an_error() {
        let config = AnnouncementConfig {
            announcement_topic_arn: Some("arn:aws:sns:eu-west-2:000000000000:closures".to_string()),
            aws_region: Some("eu-west-2".to_string()),
            aws_access_key_id: None,
            aws_secret_access_key: None,
        };
        assert!(config.sns().is_err());

        let config = AnnouncementConfig {
            announcement_topic_arn: None,
            aws_region: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
        };
        assert!(matches!(config.sns(), Ok(None)));
    }
}
