//! Record Store document shapes: staging, DLQ, FHIR resources, OMOP rows
//! (spec.md §3, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw accepted row, persisted before transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingRecord {
    pub job_id: Uuid,
    pub ingested_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// A record that failed parse/transform/write, with the reason it failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqRecord {
    pub job_id: Uuid,
    pub failed_at: DateTime<Utc>,
    pub error_reason: String,
    pub source: serde_json::Value,
}

/// A persisted FHIR R4 resource document. `id` is a pure function of the
/// resource's natural keys (see `id_service`), so repeated upserts of the
/// same logical resource converge to one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirResource {
    pub id: String,
    pub resource_type: String,
    pub job_id: Uuid,
    pub persisted_at: DateTime<Utc>,
    /// The FHIR JSON body itself (including its own `resourceType`/`id`
    /// fields, kept in sync with the envelope above).
    pub resource: serde_json::Value,
}

impl FhirResource {
    /// Builds a persisted FHIR document, stamping the body's `meta.lastUpdated`
    /// to match `persisted_at` (spec.md §3: "FHIR R4 JSON plus `{id, job_id,
    /// persisted_at, meta.lastUpdated}`" — every persisted resource carries
    /// both the envelope fields and the in-body `meta.lastUpdated`).
    pub fn new(id: String, resource_type: String, job_id: Uuid, mut resource: serde_json::Value) -> Self {
        let persisted_at = Utc::now();
        stamp_meta_last_updated(&mut resource, persisted_at);
        Self { id, resource_type, job_id, persisted_at, resource }
    }
}

/// Sets `resource.meta.lastUpdated`, creating the `meta` object if the body
/// doesn't already have one.
fn stamp_meta_last_updated(resource: &mut serde_json::Value, last_updated: DateTime<Utc>) {
    let Some(map) = resource.as_object_mut() else { return };
    let meta = map.entry("meta").or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    if let serde_json::Value::Object(meta_map) = meta {
        meta_map.insert("lastUpdated".to_string(), serde_json::Value::String(last_updated.to_rfc3339()));
    }
}

/// One row in an OMOP CDM table, tagged with its table name since all five
/// tables share a Record Store collection-naming scheme (`omop_<Table>`) but
/// are modeled here as one loosely-typed row plus a discriminant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmopRow {
    #[serde(rename = "_table")]
    pub table: String,
    pub person_id: i64,
    pub job_id: Option<Uuid>,
    pub persisted_at: DateTime<Utc>,
    pub synced_from_fhir: bool,
    /// CDM-field-specific payload (`gender_concept_id`, `measurement_date`,
    /// ...), shaped differently per table.
    pub fields: serde_json::Value,
}

impl OmopRow {
    /// Natural key used for idempotent upserts of event-table rows
    /// (spec.md §4.11: `(_table, person_id, source_value, start_date)`).
    pub fn event_key(&self, source_value: &str, start_date: &str) -> String {
        format!("{}:{}:{}:{}", self.table, self.person_id, source_value, start_date)
    }
}

/// An OMOP standard vocabulary concept, loaded from CSV seeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmopConcept {
    pub concept_id: i64,
    pub concept_name: String,
    pub domain_id: String,
    pub vocabulary_id: String,
    pub concept_code: String,
    pub standard_concept: Option<String>,
    pub concept_class_id: String,
    pub valid_start_date: String,
    pub valid_end_date: String,
}

impl OmopConcept {
    /// OMOP marks preferred normalization targets with `standard_concept = 'S'`.
    pub fn is_standard(&self) -> bool {
        self.standard_concept.as_deref() == Some("S")
    }
}

/// A human-approved `sourceValue -> concept_id` mapping, cached per job and
/// consulted before re-running concept matching (spec.md §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptApproval {
    pub job_id: Option<Uuid>,
    pub field: String,
    pub source_value: String,
    pub concept_id: i64,
}
