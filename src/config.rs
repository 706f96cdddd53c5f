use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sns::{
    config::{Credentials, Region},
    Client as SnsClient,
};
use chrono::FixedOffset;
use mongodb::{Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    clock::SystemClock,
    model::{
        mongodb::ensure_indexes_exist,
        quota::{CounterCache, MemoryCounterCache, QuotaLedger, QuotaTimezone, RedisCounterCache},
        store::MongoStore,
    },
    notification::{NotificationQueue, SnsNotifier},
    Services,
};

const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    /// Seconds east of UTC.
    quota_utc_offset: Option<i32>,
    #[serde(default = "default_queue_capacity")]
    notification_queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Config {
    /// The timezone whose midnight resets daily quotas.
    /// Without a configured offset this follows the host's clock, so daily
    /// windows track daylight saving changes.
    pub fn quota_timezone(&self) -> QuotaTimezone {
        match self.quota_utc_offset.and_then(FixedOffset::east_opt) {
            Some(offset) => QuotaTimezone::Fixed(offset),
            None => QuotaTimezone::HostLocal,
        }
    }

    /// How many notifications may wait for delivery before new ones are
    /// dropped.
    pub fn notification_queue_capacity(&self) -> usize {
        self.notification_queue_capacity.max(1)
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

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let Some(offset) = config.quota_utc_offset {
            if FixedOffset::east_opt(offset).is_none() {
                error!("`quota_utc_offset` of {offset} seconds is out of range");
                return Err(rocket);
            }
        }
        info!("Daily quotas reset at midnight {}", config.quota_timezone());

        Ok(rocket.manage(config))
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
    // non-secrets
    db_name: Option<String>,
}

const DEFAULT_DATABASE_NAME: &str = "survey";

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the indexes exist, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let name = config
            .db_name
            .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());
        let db = client.database(&name);

        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create indexes on database {name}: {e}");
            return Err(rocket);
        }
        info!("...database {name} online!");

        Ok(rocket.manage(client).manage(db))
    }
}

/// The counter cache quotas are tracked in.
#[derive(Clone)]
pub struct SharedCounterCache(pub Arc<dyn CounterCache>);

#[derive(Deserialize)]
struct CounterCacheConfig {
    // secrets
    redis_uri: Option<String>,
}

/// A fairing that connects to Redis if configured, or falls back to a
/// process-local cache, and places the result into managed state.
pub struct CounterCacheFairing;

#[rocket::async_trait]
impl Fairing for CounterCacheFairing {
    fn info(&self) -> Info {
        Info {
            name: "Counter cache",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<CounterCacheConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load counter cache config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let cache: Arc<dyn CounterCache> = match config.redis_uri {
            Some(uri) => match RedisCounterCache::connect(&uri).await {
                Ok(cache) => {
                    info!("Connected to Redis counter cache");
                    Arc::new(cache)
                }
                Err(e) => {
                    error!("Failed to connect to Redis: {e}");
                    return Err(rocket);
                }
            },
            None => {
                warn!("`redis_uri` not set, quota counters will not survive a restart");
                Arc::new(MemoryCounterCache::new(Arc::new(SystemClock)))
            }
        };

        Ok(rocket.manage(SharedCounterCache(cache)))
    }
}

/// Configuration for new-response notifications.
#[derive(Deserialize)]
struct NotifierConfig {
    // non-secrets
    notify_topic_arn: Option<String>,
}

/// Configuration for the AWS connection.
#[derive(Deserialize)]
struct AwsConfig {
    // non-secrets
    aws_region: String,
    aws_access_key_id: String,
    // secrets
    aws_secret_access_key: String,
}

/// A fairing that, when a topic is configured, starts the notification
/// worker publishing to Amazon SNS and places its queue into managed state.
pub struct NotifierFairing;

#[rocket::async_trait]
impl Fairing for NotifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "AWS SNS",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let topic_arn = match rocket.figment().extract::<NotifierConfig>() {
            Ok(NotifierConfig {
                notify_topic_arn: Some(arn),
            }) => arn,
            Ok(_) => {
                info!("`notify_topic_arn` not set, new-response notifications disabled");
                return Ok(rocket);
            }
            Err(e) => {
                error!("Failed to load notification config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let config = match rocket.figment().extract::<AwsConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load AWS config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let capacity = match rocket.state::<Config>() {
            Some(config) => config.notification_queue_capacity(),
            None => DEFAULT_QUEUE_CAPACITY,
        };

        let aws_config = SdkConfig::builder()
            .region(Region::new(config.aws_region))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                config.aws_access_key_id,
                config.aws_secret_access_key,
                None,
                None,
                "rocket config",
            )))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let notifier = SnsNotifier::new(SnsClient::new(&aws_config), topic_arn);
        let queue = NotificationQueue::spawn(Arc::new(notifier), capacity);
        info!("Publishing new-response notifications to Amazon SNS");

        Ok(rocket.manage(queue))
    }
}

/// A fairing that assembles the submission, statistics and answer sheet
/// services from the state placed by the fairings before it.
pub struct ServicesFairing;

#[rocket::async_trait]
impl Fairing for ServicesFairing {
    fn info(&self) -> Info {
        Info {
            name: "Services",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let services = match (
            rocket.state::<Config>(),
            rocket.state::<Database>(),
            rocket.state::<SharedCounterCache>(),
        ) {
            (Some(config), Some(db), Some(SharedCounterCache(cache))) => {
                let store = Arc::new(MongoStore::from_db(db));
                let ledger = Arc::new(QuotaLedger::new(cache.clone(), config.quota_timezone()));
                Services::new(
                    store.clone(),
                    store,
                    ledger,
                    Arc::new(SystemClock),
                    rocket.state::<NotificationQueue>().cloned(),
                )
            }
            _ => {
                error!("Services need the config, database and counter cache fairings");
                return Err(rocket);
            }
        };

        Ok(services.manage(rocket))
    }
}
