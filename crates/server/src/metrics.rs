//! Prometheus metrics for observability.
//!
//! Counter values are surfaced through `/api/status` rather than a
//! scrape endpoint.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    registry
        .register(Box::new(SEARCH_REQUESTS_TOTAL.clone()))
        .expect("register search counter");
    registry
        .register(Box::new(MIGRATIONS_STARTED_TOTAL.clone()))
        .expect("register migration counter");
    registry
});

/// Read requests served, by endpoint family.
pub static SEARCH_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("carddex_requests_total", "Total catalog read requests"),
        &["endpoint"],
    )
    .expect("valid counter opts")
});

/// Migration runs started over the process lifetime.
pub static MIGRATIONS_STARTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "carddex_migrations_started_total",
        "Total migration runs started",
    )
    .expect("valid counter opts")
});

pub fn record_request(endpoint: &str) {
    SEARCH_REQUESTS_TOTAL.with_label_values(&[endpoint]).inc();
}

pub fn requests_served() -> u64 {
    // Touch the registry so it is initialized before the first status read.
    let _ = &*REGISTRY;
    SEARCH_REQUESTS_TOTAL
        .with_label_values(&["cards"])
        .get()
        .saturating_add(SEARCH_REQUESTS_TOTAL.with_label_values(&["sets"]).get())
        .saturating_add(
            SEARCH_REQUESTS_TOTAL
                .with_label_values(&["suggestions"])
                .get(),
        )
        .saturating_add(SEARCH_REQUESTS_TOTAL.with_label_values(&["facets"]).get())
}
