//! Catalog ingestion: remote client, record mapping and the migration
//! pipeline.

mod client;
mod runner;
mod types;

pub use client::{HttpRemoteCatalog, RemoteCatalog, RemoteCatalogError};
pub use runner::{CatalogMigrator, MigrationState};
pub use types::{
    map_card, map_set, IngestError, MigrationPhase, MigrationProgress, MigrationStatus,
    RemoteCard, RemotePage, RemoteSet, RemoteSetRef,
};
