//! Field mapping types shared by the AI Mapping Engine, Mapping Workflow,
//! and Transform Core.

use serde::{Deserialize, Serialize};

/// How a target field's value is derived from one or more source fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformType {
    Direct,
    Concat,
    Split,
    Uppercase,
    Lowercase,
    FormatDate,
    Custom,
}

impl TransformType {
    /// Parses a transform type from its wire representation, used by
    /// `approveMappings` to reject unknown transform types per spec.md §4.8.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DIRECT" => Some(Self::Direct),
            "CONCAT" => Some(Self::Concat),
            "SPLIT" => Some(Self::Split),
            "UPPERCASE" => Some(Self::Uppercase),
            "LOWERCASE" => Some(Self::Lowercase),
            "FORMAT_DATE" => Some(Self::FormatDate),
            "CUSTOM" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// One ranked candidate or approved field-to-field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    pub transform_type: TransformType,
    /// Clamped to `[0, 1]` by construction (see `AiMappingEngine`).
    pub confidence_score: f64,
    pub rationale: String,
    pub clinical_context: Option<String>,
    pub type_compatible: bool,
    pub alternatives: Vec<FieldMappingAlternative>,
    /// Transform-specific configuration (separator, source/target date format,
    /// custom registry key). Kept as a JSON blob since its shape depends on
    /// `transform_type`; `TransformCore` interprets it per-variant.
    #[serde(default)]
    pub options: serde_json::Value,
}

/// A runner-up candidate for the same target field, kept for operator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMappingAlternative {
    pub source_field: String,
    pub confidence_score: f64,
    pub rationale: String,
}

impl FieldMapping {
    /// Invariant enforced before a mapping is accepted into an APPROVED job
    /// (spec.md §3 FieldMapping invariant / §8 testable property).
    pub fn is_valid_for_approval(&self) -> bool {
        !self.source_field.trim().is_empty() && !self.target_field.trim().is_empty()
    }
}
