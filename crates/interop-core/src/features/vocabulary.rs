//! Vocabulary RPC surface (C12, spec.md §4.12): seed the in-memory OMOP
//! vocabulary and look up/search concepts.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::domain::OmopConcept;
use crate::error::{AppError, ServerResult};
use crate::vocabulary::LoadSummary;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/seed", post(seed))
        .route("/lookup", get(lookup_by_code))
        .route("/search", get(search))
}

#[derive(Debug, Deserialize)]
struct SeedRequest {
    directory: String,
}

/// Loads every `*.csv` vocabulary file in `directory` (spec.md §4.12: one
/// file per OMOP vocabulary table, keyed by file name).
async fn seed(State(state): State<AppState>, Json(request): Json<SeedRequest>) -> ServerResult<Json<LoadSummary>> {
    let dir = std::path::PathBuf::from(request.directory);
    let summary = state.vocabulary.seed_from_directory(&dir)?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct LookupQuery {
    code: String,
    vocabulary: String,
}

async fn lookup_by_code(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> ServerResult<Json<OmopConcept>> {
    state
        .vocabulary
        .lookup_by_code(&query.code, &query.vocabulary)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no concept for {}:{}", query.vocabulary, query.code)))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    text: String,
    domain: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ServerResult<Json<Vec<OmopConcept>>> {
    Ok(Json(state.vocabulary.search_by_text(&query.text, query.domain.as_deref(), query.limit)))
}
