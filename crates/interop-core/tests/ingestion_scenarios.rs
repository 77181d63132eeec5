//! End-to-end ingestion scenarios (spec.md §8): a CSV source streamed through
//! the real `IngestionSupervisor` into a MongoDB-backed Record Store,
//! exercising the worker loop's per-record failure handling rather than its
//! individual helper functions in isolation.
//!
//! Requires Docker; run with `cargo test --test ingestion_scenarios -- --ignored`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{test_catalog, write_csv, TestMongo};
use indexmap::IndexMap;
use interop_core::catalog::{ingestion_jobs, mapping_jobs};
use interop_core::domain::{
    ConnectorRef, DlqRecord, FieldMapping, IngestionJobConfig, IngestionStatus, MappingJob, MappingStatus, TransformType,
};
use interop_core::ingestion::IngestionSupervisor;
use interop_core::mapping::clients::{NullEmbeddingClient, NullLlmClient};
use interop_core::omop::OmopEngine;
use interop_core::vocabulary::VocabularyService;
use uuid::Uuid;

async fn supervisor(mongo: &TestMongo, catalog: sqlx::SqlitePool) -> IngestionSupervisor {
    let record_store = mongo.record_store().await.expect("record store connects");
    let vocabulary = Arc::new(VocabularyService::new());
    let omop = Arc::new(OmopEngine::new(vocabulary, Arc::new(NullEmbeddingClient), Arc::new(NullLlmClient)));
    IngestionSupervisor::new(catalog, record_store, omop)
}

/// Waits until the job's catalog metrics satisfy `predicate` or the timeout
/// elapses, polling the way a status-endpoint caller would.
async fn wait_for(catalog: &sqlx::SqlitePool, job_id: Uuid, predicate: impl Fn(&interop_core::domain::IngestionJobRecord) -> bool) -> interop_core::domain::IngestionJobRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let record = ingestion_jobs::get(catalog, job_id).await.expect("job exists");
        if predicate(&record) || tokio::time::Instant::now() >= deadline {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn malformed_row_is_dlqd_and_the_job_continues() {
    let mongo = TestMongo::start().await.expect("mongo container");
    let catalog = test_catalog().await;
    let sup = supervisor(&mongo, catalog.clone()).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_csv(dir.path(), "patients.csv", "patient_id,first_name\nP001,John,extra\nP002,Jane\nP003,Mae\n");

    let job_id = Uuid::new_v4();
    let config = IngestionJobConfig {
        job_id,
        job_name: "malformed row scenario".into(),
        mapping_job_id: None,
        source_connector: ConnectorRef::CsvFile { path },
        destination_connector: ConnectorRef::Mongodb { uri: mongo_uri(&mongo).await, db: "healthbridge_test".into(), collection: "staging".into(), query: None },
        omop_auto_sync: false,
        omop_target_table: None,
    };
    ingestion_jobs::create(&catalog, &config).await.expect("create job");
    sup.start_job(job_id).await.expect("start job");

    let record = wait_for(&catalog, job_id, |r| r.status == IngestionStatus::Idle).await;
    assert_eq!(record.status, IngestionStatus::Idle, "job should reach end of stream, not ERROR");
    assert_eq!(record.metrics.received, 3, "spec.md §8 scenario 2: received counts the malformed row too");
    assert_eq!(record.metrics.processed, 2);
    assert_eq!(record.metrics.failed, 1);

    let store = mongo.record_store().await.expect("record store");
    let dlq: Vec<DlqRecord> = store.list_by_job("staging_dlq", job_id, 10, 0).await.expect("dlq query");
    assert_eq!(dlq.len(), 1);
    assert!(!dlq[0].error_reason.is_empty());
    assert!(dlq[0].error_reason.starts_with("parse"), "reason was {:?}", dlq[0].error_reason);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn transform_failure_is_dlqd_with_a_reason_starting_with_transform() {
    let mongo = TestMongo::start().await.expect("mongo container");
    let catalog = test_catalog().await;
    let sup = supervisor(&mongo, catalog.clone()).await;

    let mapping_job_id = Uuid::new_v4();
    let mapping_job = MappingJob {
        job_id: mapping_job_id,
        user_id: "test-user".into(),
        name: "birth date mapping".into(),
        source_schema: IndexMap::new(),
        target_schema: IndexMap::new(),
        ai_mappings: vec![],
        approved_mappings: vec![FieldMapping {
            source_field: "birth_date".into(),
            target_field: "birthDate".into(),
            transform_type: TransformType::FormatDate,
            confidence_score: 0.9,
            rationale: String::new(),
            clinical_context: None,
            type_compatible: true,
            alternatives: vec![],
            options: serde_json::Value::Null,
        }],
        status: MappingStatus::Approved,
        target_resource_type: Some("Patient".to_string()),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    mapping_jobs::create(&catalog, &mapping_job).await.expect("create mapping job");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_csv(dir.path(), "patients.csv", "patient_id,birth_date\nP001,not-a-date\n");

    let job_id = Uuid::new_v4();
    let config = IngestionJobConfig {
        job_id,
        job_name: "transform failure scenario".into(),
        mapping_job_id: Some(mapping_job_id),
        source_connector: ConnectorRef::CsvFile { path },
        destination_connector: ConnectorRef::Mongodb { uri: mongo_uri(&mongo).await, db: "healthbridge_test".into(), collection: "fhir_Patient".into(), query: None },
        omop_auto_sync: false,
        omop_target_table: None,
    };
    ingestion_jobs::create(&catalog, &config).await.expect("create job");
    sup.start_job(job_id).await.expect("start job");

    let record = wait_for(&catalog, job_id, |r| r.status == IngestionStatus::Idle).await;
    assert_eq!(record.metrics.failed, 1);
    assert_eq!(record.metrics.processed, 0);

    let store = mongo.record_store().await.expect("record store");
    let dlq: Vec<DlqRecord> = store.list_by_job("staging_dlq", job_id, 10, 0).await.expect("dlq query");
    assert_eq!(dlq.len(), 1);
    assert!(dlq[0].error_reason.starts_with("transform"), "spec.md §8 scenario 3: reason was {:?}", dlq[0].error_reason);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn empty_source_file_completes_with_zero_records() {
    let mongo = TestMongo::start().await.expect("mongo container");
    let catalog = test_catalog().await;
    let sup = supervisor(&mongo, catalog.clone()).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_csv(dir.path(), "patients.csv", "patient_id,first_name\n");

    let job_id = Uuid::new_v4();
    let config = IngestionJobConfig {
        job_id,
        job_name: "empty file scenario".into(),
        mapping_job_id: None,
        source_connector: ConnectorRef::CsvFile { path },
        destination_connector: ConnectorRef::Mongodb { uri: mongo_uri(&mongo).await, db: "healthbridge_test".into(), collection: "staging".into(), query: None },
        omop_auto_sync: false,
        omop_target_table: None,
    };
    ingestion_jobs::create(&catalog, &config).await.expect("create job");
    sup.start_job(job_id).await.expect("start job");

    let record = wait_for(&catalog, job_id, |r| r.status == IngestionStatus::Idle).await;
    assert_eq!(record.status, IngestionStatus::Idle);
    assert_eq!(record.metrics.received, 0);
    assert_eq!(record.metrics.processed, 0);
    assert_eq!(record.metrics.failed, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn stop_mid_stream_halts_before_the_source_is_exhausted() {
    let mongo = TestMongo::start().await.expect("mongo container");
    let catalog = test_catalog().await;
    let sup = supervisor(&mongo, catalog.clone()).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let mut body = String::from("patient_id,first_name\n");
    for i in 0..5000 {
        body.push_str(&format!("P{i:04},Name{i}\n"));
    }
    let path = write_csv(dir.path(), "patients.csv", &body);

    let job_id = Uuid::new_v4();
    let config = IngestionJobConfig {
        job_id,
        job_name: "stop mid-stream scenario".into(),
        mapping_job_id: None,
        source_connector: ConnectorRef::CsvFile { path },
        destination_connector: ConnectorRef::Mongodb { uri: mongo_uri(&mongo).await, db: "healthbridge_test".into(), collection: "staging".into(), query: None },
        omop_auto_sync: false,
        omop_target_table: None,
    };
    ingestion_jobs::create(&catalog, &config).await.expect("create job");
    sup.start_job(job_id).await.expect("start job");
    sup.stop_job(job_id);

    let record = wait_for(&catalog, job_id, |r| r.status == IngestionStatus::Stopped || r.status == IngestionStatus::Idle).await;
    assert_eq!(record.status, IngestionStatus::Stopped, "a requested stop must land the job in STOPPED, not run to completion");
    assert!(record.metrics.received <= 5000);
}

/// Reads back the mapped host port for the running Mongo container so the
/// `mongodb://` URI the job's destination connector validates against
/// actually reaches it.
async fn mongo_uri(mongo: &TestMongo) -> String {
    mongo.uri().await
}
