//! Core domain types shared across the engines and the RPC surface.

pub mod field_mapping;
pub mod ingestion;
pub mod mapping_job;
pub mod records;
pub mod resource_type;
pub mod schema;

pub use field_mapping::{FieldMapping, FieldMappingAlternative, TransformType};
pub use ingestion::{
    ConnectorRef, ErrorDetailsKind, IngestionErrorDetails, IngestionJobConfig,
    IngestionJobRecord, IngestionMetrics, IngestionStatus,
};
pub use mapping_job::{MappingJob, MappingStatus};
pub use records::{ConceptApproval, DlqRecord, FhirResource, OmopConcept, OmopRow, StagingRecord};
pub use resource_type::FhirResourceType;
pub use schema::{InferredSchema, Schema};
