//! IngestionJobConfig / IngestionJob runtime types (spec.md §3, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tagged union of supported source/destination connector configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum ConnectorRef {
    #[serde(rename = "csvFile")]
    CsvFile { path: String },
    #[serde(rename = "mongodb")]
    Mongodb {
        uri: String,
        db: String,
        collection: String,
        #[serde(default)]
        query: Option<serde_json::Value>,
    },
    #[serde(rename = "jsonApi")]
    JsonApi { url: String },
    #[serde(rename = "hl7Api")]
    Hl7Api { url: String },
    #[serde(rename = "fhirApi")]
    FhirApi { url: String },
    #[serde(rename = "dataWarehouse")]
    DataWarehouse { uri: String },
}

impl ConnectorRef {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CsvFile { .. } => "csvFile",
            Self::Mongodb { .. } => "mongodb",
            Self::JsonApi { .. } => "jsonApi",
            Self::Hl7Api { .. } => "hl7Api",
            Self::FhirApi { .. } => "fhirApi",
            Self::DataWarehouse { .. } => "dataWarehouse",
        }
    }
}

/// Durable configuration for one ingestion job, persisted in the Job Catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJobConfig {
    pub job_id: Uuid,
    pub job_name: String,
    pub mapping_job_id: Option<Uuid>,
    pub source_connector: ConnectorRef,
    pub destination_connector: ConnectorRef,
    pub omop_auto_sync: bool,
    pub omop_target_table: Option<String>,
}

/// Runtime status of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionStatus {
    Idle,
    Running,
    Stopped,
    Error,
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for IngestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(Self::Idle),
            "RUNNING" => Ok(Self::Running),
            "STOPPED" => Ok(Self::Stopped),
            "ERROR" => Ok(Self::Error),
            other => Err(format!("unknown ingestion status: {other}")),
        }
    }
}

/// Monotonic per-job counters. `received >= processed + failed` always holds
/// (spec.md §8).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IngestionMetrics {
    pub received: i64,
    pub processed: i64,
    pub failed: i64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// The kind of fatal/per-record error an ingestion job can surface
/// (spec.md §7 error taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDetailsKind {
    SourceMissing,
    DestinationMissing,
    RuntimeError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionErrorDetails {
    pub kind: ErrorDetailsKind,
    pub message: String,
}

/// Durable snapshot of an ingestion job's config + runtime state, as stored
/// in / reloaded from the Job Catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJobRecord {
    pub config: IngestionJobConfig,
    pub status: IngestionStatus,
    pub metrics: IngestionMetrics,
    pub error: Option<IngestionErrorDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
