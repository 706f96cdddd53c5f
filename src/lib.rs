#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use rocket::{Build, Rocket};

use crate::{
    clock::Clock,
    config::{
        ConfigFairing, CounterCacheFairing, DatabaseFairing, NotifierFairing, ServicesFairing,
    },
    logging::LoggerFairing,
    model::{
        answer_admin::AnswerSheetAdmin,
        quota::QuotaLedger,
        statistics::StatisticsAggregator,
        store::{DefinitionStore, ResponseStore},
        submission::SubmissionPipeline,
    },
    notification::NotificationQueue,
};

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notification;

/// Assemble the server. Every connection is made when the returned rocket
/// ignites.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(CounterCacheFairing)
        .attach(NotifierFairing)
        .attach(ServicesFairing)
}

/// The services the routes are served by.
pub struct Services {
    pipeline: SubmissionPipeline,
    statistics: StatisticsAggregator,
    admin: AnswerSheetAdmin,
    clock: Arc<dyn Clock>,
}

impl Services {
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        responses: Arc<dyn ResponseStore>,
        ledger: Arc<QuotaLedger>,
        clock: Arc<dyn Clock>,
        notifications: Option<NotificationQueue>,
    ) -> Self {
        let mut pipeline =
            SubmissionPipeline::new(definitions.clone(), responses.clone(), ledger.clone());
        if let Some(queue) = notifications {
            pipeline = pipeline.with_notifications(queue);
        }
        Self {
            pipeline,
            statistics: StatisticsAggregator::new(definitions.clone(), responses.clone()),
            admin: AnswerSheetAdmin::new(definitions, responses, ledger),
            clock,
        }
    }

    /// Place every service into managed state.
    pub fn manage(self, rocket: Rocket<Build>) -> Rocket<Build> {
        rocket
            .manage(self.pipeline)
            .manage(self.statistics)
            .manage(self.admin)
            .manage(self.clock)
    }
}

/// A server over the given services, without any external connections.
#[cfg(test)]
pub(crate) fn rocket_with_services(services: Services) -> Rocket<Build> {
    services.manage(rocket::build().mount("/", api::routes()).attach(LoggerFairing))
}

/// Connect to the database named by `db_uri`.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to database")
}

/// A random database name, so concurrent tests never share data.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// A server storing everything in the named database, with process-local
/// quota counters.
#[cfg(test)]
pub(crate) fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use chrono::{Offset, Utc};

    use crate::{
        clock::SystemClock,
        model::{quota::MemoryCounterCache, store::MongoStore},
    };

    let db = client.database(db_name);
    let store = Arc::new(MongoStore::from_db(&db));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(MemoryCounterCache::new(clock.clone()));
    let ledger = Arc::new(QuotaLedger::new(cache, Utc.fix()));
    let services = Services::new(store.clone(), store, ledger, clock, None);
    rocket_with_services(services).manage(client).manage(db)
}
