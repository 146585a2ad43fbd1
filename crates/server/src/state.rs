use std::sync::Arc;

use chrono::{DateTime, Utc};

use carddex_core::ingest::CatalogMigrator;
use carddex_core::{CardStore, Config, SanitizedConfig, SearchEngine};

/// Shared application state
pub struct AppState {
    config: Config,
    config_hash: String,
    store: Arc<dyn CardStore>,
    engine: Arc<SearchEngine>,
    migrator: CatalogMigrator,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Config,
        config_hash: String,
        store: Arc<dyn CardStore>,
        engine: Arc<SearchEngine>,
        migrator: CatalogMigrator,
    ) -> Self {
        Self {
            config,
            config_hash,
            store,
            engine,
            migrator,
            started_at: Utc::now(),
        }
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn store(&self) -> &dyn CardStore {
        self.store.as_ref()
    }

    pub fn migrator(&self) -> &CatalogMigrator {
        &self.migrator
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
