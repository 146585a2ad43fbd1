//! Status and fallback handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::metrics;
use crate::state::AppState;

/// Structured error body used by every handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal_error".to_string(),
            message: e.to_string(),
        }),
    )
}

pub fn not_found_error(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not_found".to_string(),
            message,
        }),
    )
}

const ENDPOINTS: &[&str] = &[
    "GET /api/pokemontcg/cards",
    "GET /api/pokemontcg/cards/{id}",
    "GET /api/pokemontcg/sets",
    "GET /api/pokemontcg/types",
    "GET /api/pokemontcg/rarities",
    "GET /api/pokemontcg/subtypes",
    "GET /api/pokemontcg/languages",
    "GET /api/pokemontcg/series",
    "GET /api/suggestions",
    "GET /api/cards/{id}/similar",
    "GET /api/cards/{id}/price",
    "GET /api/status",
    "POST /api/admin/migrate",
    "GET /api/admin/migration-progress",
    "POST /api/admin/migration-stop",
];

/// Fallback: a structured 404 listing what the API does serve.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "not_found",
            "message": "Unknown endpoint",
            "endpoints": ENDPOINTS,
        })),
    )
}

/// GET /api/status
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    let stats = state.engine().stats().map_err(internal_error)?;

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "configHash": state.config_hash(),
        "uptimeSeconds": state.uptime_seconds(),
        "store": stats.store,
        "cache": stats.cache,
        "migration": state.migrator().state().phase(),
        "requestsServed": metrics::requests_served(),
        "config": state.sanitized_config(),
    })))
}
