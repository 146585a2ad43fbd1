//! Search engine, request planning and result caching.

mod cache;
mod engine;
pub(crate) mod plan;

pub use cache::{Clock, ManualClock, SearchCache, SystemClock};
pub use engine::{
    CacheStats, CardDocument, EngineStats, Listing, Page, SearchEngine, SetDocument,
};
pub use plan::{
    PlanLimits, QueryPlan, SearchFilters, SearchRequest, SortDirection, SortField, TextClause,
    ENERGY_SUBTYPES, TRAINER_SUBTYPES,
};
