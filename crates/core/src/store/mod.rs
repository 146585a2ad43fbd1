//! Local card catalog storage.

mod dialect;
mod query;
mod sqlite;
mod types;

pub use dialect::{PostgresDialect, SqlDialect, SqlQuery, SqlValue, SqliteDialect};
pub use query::{QueryBuilder, CARD_COLUMNS};
pub use sqlite::SqliteCardStore;
pub use types::{
    BatchOutcome, Card, CardSet, Facet, OpaqueDocument, StoreError, StoreStats, Suggestion,
    SuggestionKind, OPAQUE_DOCUMENT_VERSION, PLACEHOLDER_IMAGE_URL,
};

use crate::search::plan::QueryPlan;

/// Storage backend seam. Implementations are synchronous; async callers
/// wrap them as the engine does.
pub trait CardStore: Send + Sync {
    /// Write a batch of cards, inserting or overwriting by id. Individual
    /// row failures are counted in the outcome, not raised.
    fn upsert_cards(&self, cards: &[Card]) -> Result<BatchOutcome, StoreError>;

    fn upsert_sets(&self, sets: &[CardSet]) -> Result<BatchOutcome, StoreError>;

    /// Execute a normalized search, returning the page of rows and the
    /// total match count.
    fn search(&self, plan: &QueryPlan) -> Result<(Vec<Card>, u64), StoreError>;

    fn get_card(&self, id: &str) -> Result<Option<Card>, StoreError>;

    fn list_sets(&self) -> Result<Vec<CardSet>, StoreError>;

    /// Distinct values for one filterable field, sorted, deduplicated.
    fn facet_values(&self, facet: Facet) -> Result<Vec<String>, StoreError>;

    fn suggestions(&self, needle: &str, limit: u32) -> Result<Vec<Suggestion>, StoreError>;

    /// Cards related to the given id, best matches first. Unknown ids
    /// yield `NotFound`.
    fn similar(&self, id: &str, limit: u32) -> Result<Vec<Card>, StoreError>;

    /// Last fully ingested page for a resource, if a run was interrupted.
    fn checkpoint(&self, resource: &str) -> Result<Option<u32>, StoreError>;

    fn save_checkpoint(&self, resource: &str, last_page: u32) -> Result<(), StoreError>;

    fn clear_checkpoint(&self, resource: &str) -> Result<(), StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;
}
