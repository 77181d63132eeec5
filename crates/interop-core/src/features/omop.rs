//! OMOP RPC surface (C11, spec.md §4.11): table prediction, concept
//! normalization, preview, ingestion of one FHIR resource, and human
//! concept-approval overrides.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{FhirResource, OmopRow, Schema};
use crate::error::ServerResult;
use crate::omop::{NormalizeOutcome, OmopTable};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/predict-table", post(predict_table))
        .route("/normalize-concepts", post(normalize_concepts))
        .route("/preview/:job_id/:table", get(preview))
        .route("/ingest/:job_id", post(ingest_one))
        .route("/concept-approvals", post(approve_concept))
}

#[derive(Debug, Deserialize)]
struct PredictTableRequest {
    source_schema: Schema,
}

#[derive(Debug, Serialize)]
struct TablePredictionResponse {
    table: OmopTable,
    confidence: f64,
    top3: Vec<(OmopTable, f64)>,
    manual_review_recommended: bool,
}

async fn predict_table(
    State(state): State<AppState>,
    Json(request): Json<PredictTableRequest>,
) -> ServerResult<Json<TablePredictionResponse>> {
    let prediction = state.omop.predict_table(&request.source_schema);
    Ok(Json(TablePredictionResponse {
        table: prediction.table,
        confidence: prediction.confidence,
        top3: prediction.top3,
        manual_review_recommended: prediction.manual_review_recommended,
    }))
}

#[derive(Debug, Deserialize)]
struct NormalizeConceptsRequest {
    job_id: Option<Uuid>,
    domain: String,
    #[serde(flatten)]
    source: ValueSource,
}

/// Either the caller already has the candidate values, or it hands over a
/// job/resource-type/field-pointer triple and lets the engine collect them
/// via its FHIR-first/staging-fallback priority (spec.md §4.11).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ValueSource {
    Values { values: Vec<String> },
    Collect { resource_type: String, field_pointer: String },
}

async fn normalize_concepts(
    State(state): State<AppState>,
    Json(request): Json<NormalizeConceptsRequest>,
) -> ServerResult<Json<NormalizeOutcome>> {
    let values = match request.source {
        ValueSource::Values { values } => values,
        ValueSource::Collect { resource_type, field_pointer } => {
            let job_id = request.job_id.unwrap_or_else(Uuid::nil);
            state.omop.collect_source_values(&state.record_store, job_id, &resource_type, &field_pointer).await?
        },
    };

    let outcome = state.omop.normalize_concepts(&state.catalog, &values, &request.domain, request.job_id).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

async fn preview(
    State(state): State<AppState>,
    Path((job_id, table)): Path<(Uuid, String)>,
    Query(query): Query<PreviewQuery>,
) -> ServerResult<Json<Vec<OmopRow>>> {
    Ok(Json(state.omop.preview(&state.record_store, job_id, &table, query.limit).await?))
}

async fn ingest_one(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(mut resource): Json<FhirResource>,
) -> ServerResult<Json<Vec<OmopRow>>> {
    resource.job_id = job_id;
    let rows = state.omop.ingest_one(&state.catalog, &state.record_store, &resource).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct ApproveConceptRequest {
    job_id: Option<Uuid>,
    field: String,
    source_value: String,
    concept_id: i64,
}

async fn approve_concept(State(state): State<AppState>, Json(request): Json<ApproveConceptRequest>) -> ServerResult<Json<()>> {
    crate::catalog::concept_approvals::upsert(&state.catalog, request.job_id, &request.field, &request.source_value, request.concept_id)
        .await?;
    Ok(Json(()))
}
