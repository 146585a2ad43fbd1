//! Common test utilities: an in-process server over an in-memory store
//! and a mock remote catalog.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use carddex_core::ingest::{CatalogMigrator, MigrationState};
use carddex_core::testing::MockRemoteCatalog;
use carddex_core::{CardStore, Config, IngestConfig, SearchEngine, SqliteCardStore};

use carddex_server::api::create_router;
use carddex_server::state::AppState;

/// Re-export fixtures for test convenience
pub use carddex_core::testing::fixtures;

pub const TEST_PAGE_SIZE: u32 = 3;

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub struct TestFixture {
    pub router: Router,
    pub store: Arc<SqliteCardStore>,
    pub remote: Arc<MockRemoteCatalog>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_ingest_config(IngestConfig {
            batch_size: 2,
            batch_delay_ms: 0,
            page_delay_ms: 0,
            max_retries: 1,
            backoff_base_ms: 1,
            backoff_cap_ms: 2,
            max_consecutive_failures: 3,
            start_page: 1,
        })
    }

    pub fn with_ingest_config(ingest: IngestConfig) -> Self {
        let store = Arc::new(SqliteCardStore::in_memory().expect("in-memory store"));
        let remote = Arc::new(MockRemoteCatalog::new());

        let mut config = Config::default();
        config.ingest = ingest;

        let store_dyn: Arc<dyn CardStore> = store.clone();
        let engine = Arc::new(SearchEngine::new(store_dyn.clone(), &config.search));
        let migrator = CatalogMigrator::new(
            store_dyn.clone(),
            remote.clone(),
            config.ingest.clone(),
            TEST_PAGE_SIZE,
            Arc::new(MigrationState::new()),
        );

        let state = Arc::new(AppState::new(
            config,
            "testhash".to_string(),
            store_dyn,
            engine,
            migrator,
        ));

        Self {
            router: create_router(state),
            store,
            remote,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router handled request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
