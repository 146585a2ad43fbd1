pub mod config;
pub mod ingest;
pub mod price;
pub mod search;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, IngestConfig, RemoteConfig, SanitizedConfig, SearchConfig, ServerConfig,
    StoreConfig,
};
pub use ingest::{
    CatalogMigrator, HttpRemoteCatalog, IngestError, MigrationPhase, MigrationProgress,
    MigrationState, MigrationStatus, RemoteCatalog, RemoteCatalogError,
};
pub use price::{estimate, PriceEstimate, PriceSource};
pub use search::{
    CardDocument, EngineStats, Listing, Page, SearchEngine, SearchFilters, SearchRequest,
    SetDocument, SortDirection, SortField,
};
pub use store::{
    Card, CardSet, CardStore, Facet, OpaqueDocument, SqliteCardStore, StoreError, StoreStats,
    Suggestion, SuggestionKind,
};
