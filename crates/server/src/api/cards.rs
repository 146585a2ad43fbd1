//! Catalog read handlers: search, lookup, facets, suggestions,
//! similarity and price. Pure parameter marshaling over the engine.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use carddex_core::store::StoreError;
use carddex_core::{
    estimate, CardDocument, Facet, Listing, Page, PriceEstimate, SearchFilters, SearchRequest,
    SetDocument, SortDirection, SortField, Suggestion,
};

use crate::metrics;
use crate::state::AppState;

use super::handlers::{internal_error, not_found_error, ErrorResponse};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn map_store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(what) => not_found_error(format!("No such {}", what)),
        other => internal_error(other),
    }
}

/// All parameters arrive as raw strings and are coerced when the request
/// is built, so a malformed value degrades to a safe default instead of a
/// rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardsQueryParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub page_size: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default, rename = "type")]
    pub card_type: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub has_image: Option<String>,
    #[serde(default)]
    pub has_price: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

fn coerce_u32(raw: Option<String>, fallback: u32) -> u32 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(fallback)
}

fn coerce_bool(raw: Option<String>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

impl From<CardsQueryParams> for SearchRequest {
    fn from(params: CardsQueryParams) -> Self {
        SearchRequest {
            text: params.q.unwrap_or_default(),
            page: coerce_u32(params.page, 1),
            page_size: coerce_u32(params.page_size, 0),
            filters: SearchFilters {
                series: params.series,
                set: params.set,
                rarity: params.rarity,
                card_type: params.card_type,
                subtype: params.subtype,
                language: params.language,
                has_image: coerce_bool(params.has_image),
                has_price: coerce_bool(params.has_price),
            },
            sort: params.sort.as_deref().map(SortField::parse).unwrap_or_default(),
            direction: params
                .direction
                .as_deref()
                .map(SortDirection::parse)
                .unwrap_or_default(),
        }
    }
}

/// GET /api/pokemontcg/cards
pub async fn search_cards(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CardsQueryParams>,
) -> Result<Json<Page<CardDocument>>, ApiError> {
    metrics::record_request("cards");
    let request = SearchRequest::from(params);
    state
        .engine()
        .search(&request)
        .map(Json)
        .map_err(map_store_error)
}

/// GET /api/pokemontcg/cards/{id}
pub async fn get_card(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    metrics::record_request("cards");
    match state.engine().get_card(&id) {
        Ok(Some(card)) => Ok(Json(json!({ "data": card }))),
        Ok(None) => Err(not_found_error(format!("No such card {}", id))),
        Err(e) => Err(map_store_error(e)),
    }
}

/// GET /api/pokemontcg/sets
pub async fn list_sets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Listing<SetDocument>>, ApiError> {
    metrics::record_request("sets");
    state
        .engine()
        .list_sets()
        .map(Json)
        .map_err(map_store_error)
}

async fn facet(state: &AppState, facet: Facet) -> Result<Json<serde_json::Value>, ApiError> {
    metrics::record_request("facets");
    let values = state
        .engine()
        .facet_values(facet)
        .map_err(map_store_error)?;
    let count = values.len();
    Ok(Json(json!({ "data": values, "count": count })))
}

/// GET /api/pokemontcg/types
pub async fn list_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    facet(&state, Facet::Types).await
}

/// GET /api/pokemontcg/rarities
pub async fn list_rarities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    facet(&state, Facet::Rarities).await
}

/// GET /api/pokemontcg/subtypes
pub async fn list_subtypes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    facet(&state, Facet::Subtypes).await
}

/// GET /api/pokemontcg/languages
pub async fn list_languages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    facet(&state, Facet::Languages).await
}

/// GET /api/pokemontcg/series
pub async fn list_series(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    facet(&state, Facet::Series).await
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

/// GET /api/suggestions
pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestionsParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    metrics::record_request("suggestions");
    let text = params.q.unwrap_or_default();
    if text.trim().is_empty() {
        return Ok(Json(json!({ "data": Vec::<Suggestion>::new() })));
    }
    let data = state
        .engine()
        .suggestions(&text, coerce_u32(params.limit, 10))
        .map_err(map_store_error)?;
    Ok(Json(json!({ "data": data })))
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    #[serde(default)]
    pub limit: Option<String>,
}

/// GET /api/cards/{id}/similar
pub async fn similar(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    metrics::record_request("cards");
    let data = state
        .engine()
        .similar(&id, coerce_u32(params.limit, 10))
        .map_err(map_store_error)?;
    Ok(Json(json!({ "data": data })))
}

/// GET /api/cards/{id}/price
pub async fn price(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PriceEstimate>, ApiError> {
    metrics::record_request("cards");
    match state.store().get_card(&id) {
        Ok(Some(card)) => Ok(Json(estimate(&card))),
        Ok(None) => Err(not_found_error(format!("No such card {}", id))),
        Err(e) => Err(map_store_error(e)),
    }
}
