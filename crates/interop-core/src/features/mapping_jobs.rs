//! Mapping Job RPC surface (C8, spec.md §4.8): create, inspect, analyze,
//! amend, and approve a mapping job's field mappings.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::mapping_jobs;
use crate::domain::{FieldMapping, MappingJob, Schema};
use crate::error::{AppError, ServerResult};
use crate::mapping::{predict_resource_type, workflow, WorkflowError};

use super::shared::auth::user_id_from_headers;
use super::shared::pagination::{Paginated, PaginationParams};
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_job).get(list_jobs))
        .route("/:job_id", get(get_job))
        .route("/:job_id/analyze", post(analyze_job))
        .route("/:job_id/manual-mapping", post(add_manual_mapping))
        .route("/:job_id/approve", post(approve_mappings))
}

#[derive(Debug, Deserialize)]
struct CreateMappingJobRequest {
    name: String,
    source_schema: Schema,
    target_schema: Schema,
}

async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateMappingJobRequest>,
) -> ServerResult<Json<MappingJob>> {
    let user_id = user_id_from_headers(&headers);
    let job = MappingJob::new(user_id, request.name, request.source_schema, request.target_schema);
    mapping_jobs::create(&state.catalog, &job).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
struct ListMappingJobsQuery {
    user_id: Option<String>,
    #[serde(flatten)]
    pagination: PaginationParams,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListMappingJobsQuery>,
) -> ServerResult<Json<Paginated<MappingJob>>> {
    query.pagination.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let jobs = mapping_jobs::list(
        &state.catalog,
        query.user_id.as_deref(),
        query.pagination.per_page(),
        query.pagination.offset(),
    )
    .await?;
    let total = jobs.len() as i64 + query.pagination.offset();
    Ok(Json(Paginated::from_items(jobs, &query.pagination, total)))
}

async fn get_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> ServerResult<Json<MappingJob>> {
    Ok(Json(mapping_jobs::get(&state.catalog, job_id).await?))
}

/// Runs the Resource Predictor (C7) and AI Mapping Engine (C6) and moves the
/// job to `PENDING_REVIEW`. Idempotent on `DRAFT`/`PENDING_REVIEW`
/// (spec.md §4.8).
async fn analyze_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> ServerResult<Json<MappingJob>> {
    let mut job = mapping_jobs::get(&state.catalog, job_id).await?;
    let prediction = predict_resource_type(&job.source_schema);
    let suggestions = state.mapping_engine.suggest_mappings(&job.source_schema, &job.target_schema).await;

    workflow::analyze(&mut job, &prediction, suggestions).map_err(workflow_error)?;
    mapping_jobs::update(&state.catalog, &job).await?;
    Ok(Json(job))
}

async fn add_manual_mapping(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(mapping): Json<FieldMapping>,
) -> ServerResult<Json<MappingJob>> {
    let mut job = mapping_jobs::get(&state.catalog, job_id).await?;
    workflow::add_manual_mapping(&mut job, mapping).map_err(workflow_error)?;
    mapping_jobs::update(&state.catalog, &job).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
struct ApproveMappingsRequest {
    mappings: Vec<FieldMapping>,
}

#[derive(Debug, Serialize)]
struct InvalidMappingResponse {
    error: &'static str,
    offending_fields: Vec<String>,
}

async fn approve_mappings(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<ApproveMappingsRequest>,
) -> ServerResult<axum::response::Response> {
    let mut job = mapping_jobs::get(&state.catalog, job_id).await?;
    match workflow::approve_mappings(&mut job, request.mappings) {
        Ok(()) => {
            mapping_jobs::update(&state.catalog, &job).await?;
            Ok(Json(job).into_response())
        },
        Err(WorkflowError::InvalidMapping(fields)) => Ok((
            axum::http::StatusCode::BAD_REQUEST,
            Json(InvalidMappingResponse { error: "invalid_mapping", offending_fields: fields }),
        )
            .into_response()),
        Err(e) => Err(workflow_error(e)),
    }
}

fn workflow_error(e: WorkflowError) -> AppError {
    match e {
        WorkflowError::AlreadyApproved => AppError::Conflict(e.to_string()),
        WorkflowError::NotPendingReview(_) => AppError::Conflict(e.to_string()),
        WorkflowError::InvalidMapping(_) => AppError::InvalidMapping(e.to_string()),
    }
}
