//! Ingestion Job RPC surface (C10, spec.md §4.10): register, start, stop,
//! and inspect ingestion jobs, plus their DLQ.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::catalog::ingestion_jobs;
use crate::domain::{ConnectorRef, DlqRecord, IngestionJobConfig, IngestionJobRecord};
use crate::error::ServerResult;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_job).get(list_jobs))
        .route("/:job_id", get(get_job))
        .route("/:job_id/start", post(start_job))
        .route("/:job_id/stop", post(stop_job))
        .route("/:job_id/dlq", get(list_dlq))
}

#[derive(Debug, Deserialize)]
struct CreateIngestionJobRequest {
    job_name: String,
    mapping_job_id: Option<Uuid>,
    source_connector: ConnectorRef,
    destination_connector: ConnectorRef,
    #[serde(default)]
    omop_auto_sync: bool,
    omop_target_table: Option<String>,
}

async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateIngestionJobRequest>,
) -> ServerResult<Json<IngestionJobRecord>> {
    let config = IngestionJobConfig {
        job_id: Uuid::new_v4(),
        job_name: request.job_name,
        mapping_job_id: request.mapping_job_id,
        source_connector: request.source_connector,
        destination_connector: request.destination_connector,
        omop_auto_sync: request.omop_auto_sync,
        omop_target_table: request.omop_target_table,
    };
    Ok(Json(ingestion_jobs::create(&state.catalog, &config).await?))
}

async fn list_jobs(State(state): State<AppState>) -> ServerResult<Json<Vec<IngestionJobRecord>>> {
    Ok(Json(ingestion_jobs::list_all(&state.catalog).await?))
}

/// Returns the catalog's durable snapshot overlaid with the supervisor's
/// live in-memory metrics when the job is currently running (spec.md §4.10
/// step 8: the catalog is only flushed every 2s/100 records, so a poll of a
/// running job favors the hot-path atomics over the last flush).
async fn get_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> ServerResult<Json<IngestionJobRecord>> {
    let mut record = ingestion_jobs::get(&state.catalog, job_id).await?;
    if let Some(live_metrics) = state.supervisor.metrics(job_id).await {
        record.metrics = live_metrics;
    }
    Ok(Json(record))
}

async fn start_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> ServerResult<Json<IngestionJobRecord>> {
    state.supervisor.start_job(job_id).await?;
    Ok(Json(ingestion_jobs::get(&state.catalog, job_id).await?))
}

async fn stop_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> ServerResult<Json<IngestionJobRecord>> {
    state.supervisor.stop_job(job_id);
    Ok(Json(ingestion_jobs::get(&state.catalog, job_id).await?))
}

#[derive(Debug, Deserialize)]
struct DlqQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    skip: u64,
}

fn default_limit() -> i64 {
    50
}

async fn list_dlq(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<DlqQuery>,
) -> ServerResult<Json<Vec<DlqRecord>>> {
    Ok(Json(state.record_store.list_by_job("staging_dlq", job_id, query.limit, query.skip).await?))
}
