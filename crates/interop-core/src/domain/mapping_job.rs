//! MappingJob: the schema-mapping workflow's aggregate root (spec.md §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::field_mapping::FieldMapping;
use super::schema::Schema;

/// Lifecycle status of a mapping job. `Approved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingStatus {
    Draft,
    Analyzing,
    PendingReview,
    Approved,
}

impl std::fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "DRAFT",
            Self::Analyzing => "ANALYZING",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Approved => "APPROVED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MappingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "ANALYZING" => Ok(Self::Analyzing),
            "PENDING_REVIEW" => Ok(Self::PendingReview),
            "APPROVED" => Ok(Self::Approved),
            other => Err(format!("unknown mapping status: {other}")),
        }
    }
}

/// The full mapping job aggregate: identity, schemas, AI suggestions, and
/// human-approved mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingJob {
    pub job_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub source_schema: Schema,
    pub target_schema: Schema,
    pub ai_mappings: Vec<FieldMapping>,
    pub approved_mappings: Vec<FieldMapping>,
    pub status: MappingStatus,
    /// FHIR resource type the Resource Predictor (C7) picked at the last
    /// `analyze()` call. Drives which `fhir_<ResourceType>` collection the
    /// Ingestion Engine writes to when this job backs an ingestion job
    /// (spec.md §4.10 step 4).
    #[serde(default)]
    pub target_resource_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MappingJob {
    pub fn new(user_id: String, name: String, source_schema: Schema, target_schema: Schema) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            user_id,
            name,
            source_schema,
            target_schema,
            ai_mappings: Vec::new(),
            approved_mappings: Vec::new(),
            status: MappingStatus::Draft,
            target_resource_type: None,
            created_at: now,
            updated_at: now,
        }
    }
}
