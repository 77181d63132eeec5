//! Audit data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ============================================================================
// Audit Query Constants
// ============================================================================

/// Default number of audit entries returned per query
pub const DEFAULT_AUDIT_QUERY_LIMIT: i64 = 100;

/// Maximum number of audit entries that can be returned in a single query.
/// This prevents excessive memory usage and query timeouts.
pub const MAX_AUDIT_QUERY_LIMIT: i64 = 1000;

/// Audit log entry from the database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    /// Unique identifier for the audit entry
    pub id: Uuid,
    /// User ID who performed the action (nullable for anonymous actions)
    pub user_id: Option<Uuid>,
    /// Action performed
    pub action: String,
    /// Type of resource affected
    pub resource_type: String,
    /// ID of the affected resource
    pub resource_id: Option<String>,
    /// Before/after state or creation data
    pub changes: Option<JsonValue>,
    /// Client IP address (IPv4 or IPv6)
    pub ip_address: Option<String>,
    /// Client user agent string
    pub user_agent: Option<String>,
    /// Timestamp when the action occurred
    pub timestamp: DateTime<Utc>,
    /// Additional contextual metadata
    pub metadata: Option<JsonValue>,
}

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Read,
    Submit,
    Approve,
    Reject,
    Start,
    Cancel,
    Retry,
    Other,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Read => "read",
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Start => "start",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resource types that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MappingJob,
    FieldMapping,
    IngestionJob,
    StagingRecord,
    DlqRecord,
    ConceptApproval,
    Other,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MappingJob => "mapping_job",
            Self::FieldMapping => "field_mapping",
            Self::IngestionJob => "ingestion_job",
            Self::StagingRecord => "staging_record",
            Self::DlqRecord => "dlq_record",
            Self::ConceptApproval => "concept_approval",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Query parameters for audit logs
#[derive(Debug, Clone, Deserialize)]
pub struct AuditQuery {
    /// Filter by user ID
    pub user_id: Option<Uuid>,
    /// Filter by action
    pub action: Option<AuditAction>,
    /// Filter by resource type
    pub resource_type: Option<ResourceType>,
    /// Filter by resource ID
    pub resource_id: Option<String>,
    /// Start timestamp for range query
    pub start_time: Option<DateTime<Utc>>,
    /// End timestamp for range query
    pub end_time: Option<DateTime<Utc>>,
    /// Maximum number of results to return
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Offset for pagination
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_AUDIT_QUERY_LIMIT
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            action: None,
            resource_type: None,
            resource_id: None,
            start_time: None,
            end_time: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Input for creating an audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditEntry {
    /// User ID who performed the action (nullable for anonymous actions)
    pub user_id: Option<Uuid>,
    /// Action performed
    pub action: AuditAction,
    /// Type of resource affected
    pub resource_type: ResourceType,
    /// ID of the affected resource
    pub resource_id: Option<String>,
    /// Before/after state or creation data
    pub changes: Option<JsonValue>,
    /// Additional contextual metadata
    pub metadata: Option<JsonValue>,
    /// Client IP address
    pub ip_address: Option<String>,
    /// Client user agent string
    pub user_agent: Option<String>,
}

impl CreateAuditEntry {
    /// Create a builder for constructing audit entries
    pub fn builder() -> AuditEntryBuilder {
        AuditEntryBuilder::default()
    }
}

/// Builder for creating audit entries
#[derive(Debug, Clone, Default)]
pub struct AuditEntryBuilder {
    user_id: Option<Uuid>,
    action: Option<AuditAction>,
    resource_type: Option<ResourceType>,
    resource_id: Option<String>,
    changes: Option<JsonValue>,
    metadata: Option<JsonValue>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl AuditEntryBuilder {
    pub fn user_id(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn resource_id(mut self, resource_id: Option<String>) -> Self {
        self.resource_id = resource_id;
        self
    }

    pub fn changes(mut self, changes: JsonValue) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Try to build the CreateAuditEntry, returning an error if required fields are missing
    pub fn try_build(self) -> Result<CreateAuditEntry, &'static str> {
        let action = self.action.ok_or("action is required")?;
        let resource_type = self.resource_type.ok_or("resource_type is required")?;

        Ok(CreateAuditEntry {
            user_id: self.user_id,
            action,
            resource_type,
            resource_id: self.resource_id,
            changes: self.changes,
            metadata: self.metadata,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        })
    }
}
