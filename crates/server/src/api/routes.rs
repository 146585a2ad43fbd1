use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{admin, cards, handlers};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Catalog reads
        .route("/api/pokemontcg/cards", get(cards::search_cards))
        .route("/api/pokemontcg/cards/{id}", get(cards::get_card))
        .route("/api/pokemontcg/sets", get(cards::list_sets))
        .route("/api/pokemontcg/types", get(cards::list_types))
        .route("/api/pokemontcg/rarities", get(cards::list_rarities))
        .route("/api/pokemontcg/subtypes", get(cards::list_subtypes))
        .route("/api/pokemontcg/languages", get(cards::list_languages))
        .route("/api/pokemontcg/series", get(cards::list_series))
        // Discovery
        .route("/api/suggestions", get(cards::suggestions))
        .route("/api/cards/{id}/similar", get(cards::similar))
        .route("/api/cards/{id}/price", get(cards::price))
        // Health
        .route("/api/status", get(handlers::status))
        // Migration admin
        .route("/api/admin/migrate", post(admin::start_migration))
        .route("/api/admin/migration-progress", get(admin::migration_progress))
        .route("/api/admin/migration-stop", post(admin::stop_migration))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
