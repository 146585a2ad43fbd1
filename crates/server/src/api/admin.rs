//! Migration admin handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use carddex_core::ingest::IngestError;

use crate::metrics;
use crate::state::AppState;

use super::handlers::ErrorResponse;

/// POST /api/admin/migrate
pub async fn start_migration(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    match state.migrator().start() {
        Ok(run_id) => {
            metrics::MIGRATIONS_STARTED_TOTAL.inc();
            Ok(Json(json!({ "status": "started", "runId": run_id })))
        }
        Err(IngestError::MigrationInProgress) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "migration_in_progress".to_string(),
                message: "A migration is already running".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "internal_error".to_string(),
                message: e.to_string(),
            }),
        )),
    }
}

/// GET /api/admin/migration-progress
pub async fn migration_progress(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.migrator().progress() {
        Some(progress) => Json(serde_json::to_value(&progress).unwrap_or_else(
            |_| json!({ "status": "idle" }),
        )),
        None => Json(json!({ "status": "idle" })),
    }
}

/// POST /api/admin/migration-stop
pub async fn stop_migration(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let was_running = state.migrator().stop();
    Json(json!({ "status": "stopped", "wasRunning": was_running }))
}
