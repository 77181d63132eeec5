//! Streaming Ingestion Engine (C10, spec.md §4.10, §5): pulls records from a
//! source connector, transforms them through a mapping job's approved
//! mappings (or passes them through untransformed), writes them into the
//! Record Store, optionally fans out to OMOP, and tracks per-job metrics.

pub mod connectors;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::{ingestion_jobs, mapping_jobs};
use crate::domain::{
    DlqRecord, ErrorDetailsKind, FhirResource, IngestionErrorDetails, IngestionJobConfig, IngestionMetrics, IngestionStatus, StagingRecord,
};
use crate::error::{AppError, ServerResult};
use crate::id_service::{self, IdNamespace};
use crate::omop::OmopEngine;
use crate::record_store::RecordStore;
use crate::transform::{self, TransformRegistry};

use connectors::{build_destination, build_source};

/// Retry budget for a transient `sourceRead` failure before the job moves to
/// ERROR (spec.md §4.10 step 2, §7).
const SOURCE_READ_RETRIES: u32 = 3;
const SOURCE_READ_BACKOFFS: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];

/// Catalog metrics are flushed at least this often, or every 100 records,
/// whichever comes first (spec.md §4.10 step 8).
const PERSIST_INTERVAL: Duration = Duration::from_secs(2);
const PERSIST_RECORD_BATCH: i64 = 100;

/// Live, in-process handle for one running (or stopped) ingestion job.
/// Metrics are atomics so a status poll never needs to take the supervisor's
/// lock (spec.md §5: single mutex guards the handle map, not the counters).
pub struct IngestionJobHandle {
    received: AtomicI64,
    processed: AtomicI64,
    failed: AtomicI64,
    stop_tx: watch::Sender<bool>,
}

impl IngestionJobHandle {
    fn new() -> (Arc<Self>, watch::Receiver<bool>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Arc::new(Self { received: AtomicI64::new(0), processed: AtomicI64::new(0), failed: AtomicI64::new(0), stop_tx });
        (handle, stop_rx)
    }

    pub fn metrics_snapshot(&self) -> IngestionMetrics {
        IngestionMetrics {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            last_updated: Some(Utc::now()),
        }
    }

    pub fn request_stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Owns every live ingestion job's handle and drives start/stop transitions.
/// A plain `std::sync::Mutex` over the handle map, per spec.md §5's explicit
/// design — not a lock-free map, since the map itself changes rarely (only
/// on start/stop) while metrics (the hot path) live outside it in atomics.
pub struct IngestionSupervisor {
    catalog: SqlitePool,
    record_store: RecordStore,
    omop: Arc<OmopEngine>,
    handles: Mutex<HashMap<Uuid, Arc<IngestionJobHandle>>>,
}

impl IngestionSupervisor {
    pub fn new(catalog: SqlitePool, record_store: RecordStore, omop: Arc<OmopEngine>) -> Self {
        Self { catalog, record_store, omop, handles: Mutex::new(HashMap::new()) }
    }

    /// Forces every non-IDLE job back to IDLE on process start (spec.md §3:
    /// "reconstructed from the catalog ... always starting at IDLE — never
    /// auto-resuming to RUNNING").
    pub async fn rehydrate(&self) -> ServerResult<()> {
        for record in ingestion_jobs::list_all(&self.catalog).await? {
            if record.status != IngestionStatus::Idle {
                ingestion_jobs::update_status(&self.catalog, record.config.job_id, IngestionStatus::Idle, &record.metrics, None).await?;
            }
        }
        Ok(())
    }

    pub async fn metrics(&self, job_id: Uuid) -> Option<IngestionMetrics> {
        let handle = self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).get(&job_id).cloned();
        handle.map(|handle| handle.metrics_snapshot())
    }

    /// Pre-flight validates the configured source and destination, then
    /// spawns the worker loop (spec.md §4.10 step 1).
    pub async fn start_job(&self, job_id: Uuid) -> ServerResult<()> {
        let record = ingestion_jobs::get(&self.catalog, job_id).await?;

        let source = match build_source(&record.config.source_connector) {
            Ok(source) => source,
            Err(e) => return self.mark_error(job_id, ErrorDetailsKind::SourceMissing, e.to_string()).await,
        };
        if let Err(e) = source.validate().await {
            return self.mark_error(job_id, ErrorDetailsKind::SourceMissing, e.to_string()).await;
        }

        let destination = match build_destination(&record.config.destination_connector) {
            Ok(destination) => destination,
            Err(e) => return self.mark_error(job_id, ErrorDetailsKind::DestinationMissing, e.to_string()).await,
        };
        if let Err(e) = destination.validate().await {
            return self.mark_error(job_id, ErrorDetailsKind::DestinationMissing, e.to_string()).await;
        }

        let (handle, stop_rx) = IngestionJobHandle::new();
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).insert(job_id, Arc::clone(&handle));

        ingestion_jobs::update_status(&self.catalog, job_id, IngestionStatus::Running, &IngestionMetrics::default(), None).await?;

        let catalog = self.catalog.clone();
        let record_store = self.record_store.clone();
        let omop = Arc::clone(&self.omop);
        tokio::spawn(async move {
            run_worker(catalog, record_store, omop, record.config, source, handle, stop_rx).await;
        });

        Ok(())
    }

    /// Requests cooperative shutdown; a no-op if the job isn't running
    /// (spec.md §4.10 step 7).
    pub fn stop_job(&self, job_id: Uuid) {
        if let Some(handle) = self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).get(&job_id) {
            handle.request_stop();
        }
    }

    async fn mark_error(&self, job_id: Uuid, kind: ErrorDetailsKind, message: String) -> ServerResult<()> {
        let error = IngestionErrorDetails { kind, message };
        ingestion_jobs::update_status(&self.catalog, job_id, IngestionStatus::Error, &IngestionMetrics::default(), Some(&error)).await
    }
}

/// Recursively sorts a JSON value's object keys so structurally-identical
/// rows always serialize identically, regardless of field order in the
/// source (used to key deterministic FHIR ids off the raw source row).
fn canonical_key(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> = map.iter().map(|(k, v)| (k.clone(), sort(v))).collect();
                serde_json::to_value(sorted).unwrap_or(Value::Null)
            },
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

async fn dlq(record_store: &RecordStore, job_id: Uuid, reason: String, source: Value) {
    let record = DlqRecord { job_id, failed_at: Utc::now(), error_reason: reason, source };
    if let Err(e) = record_store.upsert_dlq(&record).await {
        error!(job_id = %job_id, error = %e, "failed to write DLQ record");
    }
}

/// Builds the target document for one source row: applies every approved
/// mapping if a mapping job backs this ingestion job, else passes the row
/// through unchanged.
fn build_target(row: &Value, mappings: Option<&[crate::domain::FieldMapping]>, registry: &TransformRegistry) -> Result<Value, crate::transform::TransformError> {
    let Some(mappings) = mappings else { return Ok(row.clone()) };

    let mut target = Value::Object(serde_json::Map::new());
    for mapping in mappings {
        transform::apply_mapping(mapping, row, &mut target, registry)?;
    }
    Ok(target)
}

/// The worker loop proper (spec.md §4.10): pull, transform, write, fan out
/// to OMOP, persist progress, cooperate with stop requests.
async fn run_worker(
    catalog: SqlitePool,
    record_store: RecordStore,
    omop: Arc<OmopEngine>,
    config: IngestionJobConfig,
    mut source: Box<dyn connectors::SourceConnector>,
    handle: Arc<IngestionJobHandle>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let approved_mappings = match config.mapping_job_id {
        Some(mapping_job_id) => match mapping_jobs::get(&catalog, mapping_job_id).await {
            Ok(job) => Some((job.approved_mappings, job.target_resource_type.unwrap_or_else(|| "Patient".to_string()))),
            Err(e) => {
                warn!(job_id = %config.job_id, error = %e, "mapping job backing this ingestion job is missing; passing records through raw");
                None
            },
        },
        None => None,
    };
    let (mappings, target_resource_type) = match &approved_mappings {
        Some((mappings, resource_type)) => (Some(mappings.as_slice()), resource_type.as_str()),
        None => (None, "Patient"),
    };

    let registry = TransformRegistry::new();
    let mut last_persisted = Instant::now();
    let mut records_since_persist: i64 = 0;

    loop {
        if *stop_rx.borrow() {
            let _ = persist_progress(&catalog, config.job_id, &handle, IngestionStatus::Stopped, None).await;
            return;
        }

        match read_with_retry(source.as_mut(), &config, &handle, &catalog).await {
            Ok(ReadOutcome::End) => break,
            // The source stream is healthy but this one record didn't parse
            // (spec.md §4.10 step 6: "parse, transform, or write" all DLQ and
            // continue; §8 scenario 2: one malformed row of N still yields
            // `received=N`).
            Ok(ReadOutcome::RecordError(message)) => {
                handle.received.fetch_add(1, Ordering::Relaxed);
                handle.failed.fetch_add(1, Ordering::Relaxed);
                dlq(&record_store, config.job_id, format!("parse: {message}"), Value::Null).await;
            },
            Ok(ReadOutcome::Row(row)) => {
                handle.received.fetch_add(1, Ordering::Relaxed);

                let row_key = canonical_key(&row);
                match build_target(&row, mappings, &registry) {
                    Ok(target) => {
                        let write_result = if mappings.is_some() {
                            let id = id_service::derive_fhir_id(target_resource_type, &row_key);
                            let resource = FhirResource::new(id, target_resource_type.to_string(), config.job_id, target);
                            let write = record_store.upsert_fhir(&resource).await;
                            if write.is_ok() && config.omop_auto_sync {
                                if let Err(e) = omop.ingest_one(&catalog, &record_store, &resource).await {
                                    warn!(job_id = %config.job_id, error = %e, "OMOP auto-sync failed for a record; FHIR write still stands");
                                }
                            }
                            write
                        } else {
                            let record = StagingRecord { job_id: config.job_id, ingested_at: Utc::now(), payload: target };
                            record_store.upsert_staging(&record).await
                        };

                        match write_result {
                            Ok(()) => {
                                handle.processed.fetch_add(1, Ordering::Relaxed);
                            },
                            Err(e) => {
                                handle.failed.fetch_add(1, Ordering::Relaxed);
                                dlq(&record_store, config.job_id, format!("destinationWrite: {e}"), row).await;
                            },
                        }
                    },
                    Err(e) => {
                        handle.failed.fetch_add(1, Ordering::Relaxed);
                        dlq(&record_store, config.job_id, format!("transform: {e}"), row).await;
                    },
                }
            },
            Err(()) => return,
        }

        records_since_persist += 1;
        if records_since_persist >= PERSIST_RECORD_BATCH || last_persisted.elapsed() >= PERSIST_INTERVAL {
            if let Err(e) = persist_progress(&catalog, config.job_id, &handle, IngestionStatus::Running, None).await {
                error!(job_id = %config.job_id, error = %e, "failed to persist ingestion progress");
            }
            records_since_persist = 0;
            last_persisted = Instant::now();
        }
    }

    let _ = persist_progress(&catalog, config.job_id, &handle, IngestionStatus::Idle, None).await;
    info!(job_id = %config.job_id, "ingestion job reached end of source stream");
}

/// Result of pulling one record from the source, distinguishing a healthy
/// stream yielding an unparseable record from the stream itself ending or
/// failing (spec.md §4.10 step 6 vs. step 2/§7 `sourceRead`).
enum ReadOutcome {
    Row(Value),
    End,
    RecordError(String),
}

/// Pulls the next record. A per-record `AppError::ParseRecord` is returned
/// immediately as `ReadOutcome::RecordError` without touching the retry
/// budget or the job's status — the caller DLQs it and keeps reading. Any
/// other error is treated as a transient `sourceRead` failure and retried
/// with exponential backoff; after the budget is exhausted the job moves to
/// ERROR and `Err(())` is returned (spec.md §4.10 step 2, §7).
async fn read_with_retry(
    source: &mut dyn connectors::SourceConnector,
    config: &IngestionJobConfig,
    handle: &Arc<IngestionJobHandle>,
    catalog: &SqlitePool,
) -> Result<ReadOutcome, ()> {
    let mut attempt = 0;
    loop {
        match source.next_record().await {
            Ok(Some(row)) => return Ok(ReadOutcome::Row(row)),
            Ok(None) => return Ok(ReadOutcome::End),
            Err(AppError::ParseRecord(message)) => return Ok(ReadOutcome::RecordError(message)),
            Err(e) => {
                if attempt >= SOURCE_READ_RETRIES {
                    let error = IngestionErrorDetails { kind: ErrorDetailsKind::RuntimeError, message: e.to_string() };
                    let _ = ingestion_jobs::update_status(catalog, config.job_id, IngestionStatus::Error, &handle.metrics_snapshot(), Some(&error)).await;
                    error!(job_id = %config.job_id, error = %e, "source read exhausted its retry budget");
                    return Err(());
                }
                tokio::time::sleep(SOURCE_READ_BACKOFFS[attempt as usize]).await;
                attempt += 1;
            },
        }
    }
}

async fn persist_progress(
    catalog: &SqlitePool,
    job_id: Uuid,
    handle: &Arc<IngestionJobHandle>,
    status: IngestionStatus,
    error: Option<&IngestionErrorDetails>,
) -> ServerResult<()> {
    let metrics = handle.metrics_snapshot();
    ingestion_jobs::update_status(catalog, job_id, status, &metrics, error).await.map_err(|e| e as AppError)
}
