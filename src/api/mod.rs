use rocket::Route;

mod answers;
mod responses;
mod statistics;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(responses::routes());
    routes.extend(statistics::routes());
    routes.extend(answers::routes());
    routes
}

/// A client for a server running on in-memory stores.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{FixedOffset, Utc};
    use rocket::local::asynchronous::Client;

    use crate::{
        clock::MockClock,
        model::{
            common::survey::Survey,
            quota::{MemoryCounterCache, QuotaLedger},
            store::MemoryStore,
        },
        Services,
    };

    pub struct TestServer {
        pub client: Client,
        pub store: Arc<MemoryStore>,
        pub clock: MockClock,
    }

    pub async fn test_server(surveys: impl IntoIterator<Item = Survey>) -> TestServer {
        log4rs_test_utils::test_logging::init_logging_once_for(["survey_backend"], None, None);

        let clock = MockClock::new(Utc::now());
        let store = Arc::new(MemoryStore::new());
        for survey in surveys {
            store.add_survey(survey);
        }
        let cache = MemoryCounterCache::new(Arc::new(clock.clone()));
        let ledger = Arc::new(QuotaLedger::new(
            Arc::new(cache),
            FixedOffset::east_opt(0).unwrap(),
        ));
        let services = Services::new(
            store.clone(),
            store.clone(),
            ledger,
            Arc::new(clock.clone()),
            None,
        );
        let client = Client::tracked(crate::rocket_with_services(services))
            .await
            .unwrap();
        TestServer {
            client,
            store,
            clock,
        }
    }
}
