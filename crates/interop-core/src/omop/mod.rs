//! OMOP Transformation & Concept Normalization engine (C11, spec.md §4.11):
//! table prediction, concept matching, FHIR->CDM row building, and
//! idempotent persistence into the Record Store's `omop_<Table>`
//! collections.

pub mod concept_matcher;
pub mod table_predictor;
pub mod transform;

use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::catalog::concept_approvals;
use crate::domain::{FhirResource, OmopRow, Schema};
use crate::error::ServerResult;
use crate::mapping::clients::{EmbeddingClient, LlmClient};
use crate::record_store::RecordStore;
use crate::vocabulary::VocabularyService;

use concept_matcher::{ConceptMatcher, ConceptSuggestion};
pub use table_predictor::{predict_table, TablePrediction};

/// The OMOP CDM tables this engine knows how to predict and populate
/// (spec.md §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OmopTable {
    Person,
    VisitOccurrence,
    ConditionOccurrence,
    Measurement,
    DrugExposure,
}

impl std::fmt::Display for OmopTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Person => "PERSON",
            Self::VisitOccurrence => "VISIT_OCCURRENCE",
            Self::ConditionOccurrence => "CONDITION_OCCURRENCE",
            Self::Measurement => "MEASUREMENT",
            Self::DrugExposure => "DRUG_EXPOSURE",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OmopTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERSON" => Ok(Self::Person),
            "VISIT_OCCURRENCE" => Ok(Self::VisitOccurrence),
            "CONDITION_OCCURRENCE" => Ok(Self::ConditionOccurrence),
            "MEASUREMENT" => Ok(Self::Measurement),
            "DRUG_EXPOSURE" => Ok(Self::DrugExposure),
            other => Err(format!("unknown OMOP table: {other}")),
        }
    }
}

/// Outcome of a `normalize_concepts` run (spec.md §4.11: "every run reports
/// whether it found any real data, and never fabricates concepts when it
/// didn't").
#[derive(Debug, Clone, Serialize)]
pub struct NormalizeOutcome {
    pub success: bool,
    pub source: &'static str,
    pub count: usize,
    pub suggestions: Vec<ConceptSuggestion>,
    pub message: Option<String>,
}

impl NormalizeOutcome {
    fn no_data() -> Self {
        Self { success: false, source: "none", count: 0, suggestions: Vec::new(), message: Some("No concepts to map".to_string()) }
    }
}

pub struct OmopEngine {
    vocabulary: Arc<VocabularyService>,
    matcher: ConceptMatcher,
}

impl OmopEngine {
    pub fn new(vocabulary: Arc<VocabularyService>, embedding: Arc<dyn EmbeddingClient>, llm: Arc<dyn LlmClient>) -> Self {
        let matcher = ConceptMatcher::new(Arc::clone(&vocabulary), embedding, llm);
        Self { vocabulary, matcher }
    }

    /// Predicts which CDM table a source schema most likely targets
    /// (spec.md §4.11).
    pub fn predict_table(&self, source_schema: &Schema) -> TablePrediction {
        table_predictor::predict_table(source_schema)
    }

    /// Assembles the candidate source values for a normalization run,
    /// following the data-source priority: job-scoped FHIR, then the
    /// most recently persisted FHIR resource of that type overall, then
    /// job-scoped staging rows (spec.md §4.11).
    pub async fn collect_source_values(
        &self,
        record_store: &RecordStore,
        job_id: Uuid,
        resource_type: &str,
        field_pointer: &str,
    ) -> ServerResult<Vec<String>> {
        let job_scoped = record_store.list_fhir_by_job(resource_type, job_id, 1000).await?;
        if !job_scoped.is_empty() {
            return Ok(extract_field_values(&job_scoped, field_pointer));
        }

        if let Some(recent) = record_store.most_recent_fhir(resource_type).await? {
            return Ok(extract_field_values(std::slice::from_ref(&recent), field_pointer));
        }

        let staging: Vec<crate::domain::StagingRecord> = record_store.list_by_job("staging", job_id, 1000, 0).await?;
        Ok(staging
            .iter()
            .filter_map(|record| record.payload.pointer(field_pointer).and_then(serde_json::Value::as_str).map(str::to_string))
            .collect())
    }

    /// Matches each source value to an OMOP standard concept, consulting
    /// human approvals (per-job first, then global) before running the
    /// matcher pipeline (spec.md §4.11 Approvals).
    pub async fn normalize_concepts(
        &self,
        catalog: &SqlitePool,
        values: &[String],
        domain: &str,
        job_id: Option<Uuid>,
    ) -> ServerResult<NormalizeOutcome> {
        if values.is_empty() {
            return Ok(NormalizeOutcome::no_data());
        }

        let mut suggestions = Vec::with_capacity(values.len());
        for value in values {
            if let Some(concept_id) = concept_approvals::lookup(catalog, job_id, domain, value).await? {
                if let Some(concept) = self.vocabulary.lookup_by_id(concept_id) {
                    suggestions.push(ConceptSuggestion {
                        source_value: value.clone(),
                        concept_id: Some(concept.concept_id),
                        concept_name: Some(concept.concept_name),
                        confidence: 1.0,
                        stage: "approved",
                        match_found: true,
                    });
                    continue;
                }
            }
            suggestions.push(self.matcher.match_one(value, domain).await);
        }

        Ok(NormalizeOutcome { success: true, source: "real_data", count: suggestions.len(), suggestions, message: None })
    }

    /// Returns the most recently persisted rows for one job's CDM table
    /// (spec.md §4.11 Preview).
    pub async fn preview(&self, record_store: &RecordStore, job_id: Uuid, table: &str, limit: i64) -> ServerResult<Vec<OmopRow>> {
        record_store.list_by_job(&format!("omop_{table}"), job_id, limit, 0).await
    }

    /// Transforms one persisted FHIR resource into its CDM row(s) and writes
    /// them, idempotently, into the Record Store (spec.md §4.11).
    pub async fn ingest_one(&self, catalog: &SqlitePool, record_store: &RecordStore, resource: &FhirResource) -> ServerResult<Vec<OmopRow>> {
        let rows: Vec<OmopRow> = match resource.resource_type.as_str() {
            "Patient" => transform::person_from_patient(catalog, resource).await?.into_iter().collect(),
            "Observation" => transform::measurement_from_observation(catalog, &self.matcher, resource).await?.into_iter().collect(),
            "DiagnosticReport" => transform::measurements_from_diagnostic_report(catalog, &self.matcher, resource).await?,
            "Condition" => transform::condition_occurrence_from_condition(catalog, &self.matcher, resource).await?.into_iter().collect(),
            "MedicationRequest" => transform::drug_exposure_from_medication_request(catalog, &self.matcher, resource).await?.into_iter().collect(),
            other => {
                tracing::debug!(resource_type = other, "no OMOP row builder for this FHIR resource type");
                Vec::new()
            },
        };

        self.persist_all(record_store, &rows).await?;
        Ok(rows)
    }

    /// Persists a batch of CDM rows, upserting by natural key so replays are
    /// idempotent (spec.md §4.11 Persistence).
    pub async fn persist_all(&self, record_store: &RecordStore, rows: &[OmopRow]) -> ServerResult<usize> {
        for row in rows {
            self.persist_row(record_store, row).await?;
        }
        Ok(rows.len())
    }

    async fn persist_row(&self, record_store: &RecordStore, row: &OmopRow) -> ServerResult<()> {
        if row.table == OmopTable::Person.to_string() {
            return record_store.upsert_omop(row, None).await;
        }

        let source_value = row.fields.get("source_value").and_then(serde_json::Value::as_str).unwrap_or("");
        let start_date = row.fields.get("start_date").and_then(serde_json::Value::as_str).unwrap_or("");
        record_store.upsert_omop(row, Some((source_value, start_date))).await
    }
}

fn extract_field_values(resources: &[FhirResource], field_pointer: &str) -> Vec<String> {
    resources
        .iter()
        .filter_map(|resource| resource.resource.pointer(field_pointer).and_then(serde_json::Value::as_str).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::clients::{NullEmbeddingClient, NullLlmClient};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.expect("pool");
        sqlx::query(crate::catalog::schema::CREATE_TABLES).execute(&pool).await.expect("schema");
        pool
    }

    fn engine() -> OmopEngine {
        OmopEngine::new(Arc::new(VocabularyService::new()), Arc::new(NullEmbeddingClient), Arc::new(NullLlmClient))
    }

    #[tokio::test]
    async fn normalize_concepts_with_no_values_reports_failure_without_fabricating() {
        let pool = test_pool().await;
        let outcome = engine().normalize_concepts(&pool, &[], "Condition", None).await.expect("normalize");
        assert!(!outcome.success);
        assert_eq!(outcome.count, 0);
        assert_eq!(outcome.message.as_deref(), Some("No concepts to map"));
    }

    #[tokio::test]
    async fn normalize_concepts_prefers_a_human_approval_over_the_matcher_pipeline() {
        let vocabulary = VocabularyService::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ICD10CM.csv");
        std::fs::write(
            &path,
            "concept_id,concept_name,domain_id,vocabulary_id,concept_code,standard_concept,concept_class_id,valid_start_date,valid_end_date\n\
             201826,Type 2 diabetes mellitus,Condition,ICD10CM,E11.9,S,Clinical Finding,1970-01-01,2099-12-31\n",
        )
        .expect("write csv");
        vocabulary.load_from_csv(&path).expect("load");

        let engine = OmopEngine::new(Arc::new(vocabulary), Arc::new(NullEmbeddingClient), Arc::new(NullLlmClient));
        let pool = test_pool().await;
        concept_approvals::upsert(&pool, None, "Condition", "uncoded diabetes text", 201826).await.expect("approve");

        let outcome = engine
            .normalize_concepts(&pool, &["uncoded diabetes text".to_string()], "Condition", None)
            .await
            .expect("normalize");

        assert!(outcome.success);
        assert_eq!(outcome.suggestions[0].stage, "approved");
        assert_eq!(outcome.suggestions[0].concept_id, Some(201826));
    }

    #[test]
    fn omop_table_display_round_trips_through_from_str() {
        for table in [OmopTable::Person, OmopTable::VisitOccurrence, OmopTable::ConditionOccurrence, OmopTable::Measurement, OmopTable::DrugExposure] {
            let label = table.to_string();
            assert_eq!(label.parse::<OmopTable>().expect("parse"), table);
        }
    }
}
