//! Mapping Workflow (C8): the `MappingJob` state machine (spec.md §4.8).
//!
//! ```text
//! DRAFT --analyze()--> ANALYZING --auto--> PENDING_REVIEW
//!   |                                        |
//!   +--addManualMapping()-------------------+
//!                                           v
//!                                   approveMappings(list) --> APPROVED (terminal)
//! ```

use thiserror::Error;

use crate::domain::{FieldMapping, MappingJob, MappingStatus};

use super::ai_mapping_engine::MappingSuggestions;
use super::resource_predictor::ResourcePrediction;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("mapping job is in terminal state APPROVED and cannot be re-analyzed")]
    AlreadyApproved,

    #[error("approveMappings requires the job to be in PENDING_REVIEW (was {0})")]
    NotPendingReview(MappingStatus),

    #[error("invalid mapping(s): {0:?}")]
    InvalidMapping(Vec<String>),
}

/// Runs schema analysis (Resource Predictor + AI Mapping Engine) and moves
/// the job to `PENDING_REVIEW`. Idempotent on `DRAFT`/`PENDING_REVIEW`
/// (spec.md §4.8) — re-running simply replaces `ai_mappings` with a fresh
/// suggestion set.
pub fn analyze(job: &mut MappingJob, prediction: &ResourcePrediction, suggestions: MappingSuggestions) -> Result<(), WorkflowError> {
    if job.status == MappingStatus::Approved {
        return Err(WorkflowError::AlreadyApproved);
    }

    job.status = MappingStatus::Analyzing;
    job.ai_mappings = suggestions.mappings;
    job.target_resource_type = Some(prediction.resource_type.to_string());
    job.status = MappingStatus::PendingReview;
    job.updated_at = chrono::Utc::now();
    Ok(())
}

/// Adds an operator-authored mapping to the candidate set, available from
/// `DRAFT` (skip straight to review) or `PENDING_REVIEW`.
pub fn add_manual_mapping(job: &mut MappingJob, mapping: FieldMapping) -> Result<(), WorkflowError> {
    if job.status == MappingStatus::Approved {
        return Err(WorkflowError::AlreadyApproved);
    }

    job.ai_mappings.push(mapping);
    job.status = MappingStatus::PendingReview;
    job.updated_at = chrono::Utc::now();
    Ok(())
}

/// Validates and stores a point-in-time snapshot of approved mappings,
/// moving the job to the terminal `APPROVED` state. Does not mutate
/// `ai_mappings` (spec.md §4.8).
pub fn approve_mappings(job: &mut MappingJob, approved: Vec<FieldMapping>) -> Result<(), WorkflowError> {
    // Re-approving an already-APPROVED job with the identical list is a
    // no-op (spec.md §8 round-trip law).
    if job.status == MappingStatus::Approved && job.approved_mappings == approved {
        return Ok(());
    }

    if job.status != MappingStatus::PendingReview {
        return Err(WorkflowError::NotPendingReview(job.status));
    }

    let invalid: Vec<String> = approved
        .iter()
        .filter(|mapping| !mapping.is_valid_for_approval())
        .map(|mapping| {
            if mapping.source_field.trim().is_empty() {
                format!("sourceField empty for target {}", mapping.target_field)
            } else {
                format!("targetField empty for source {}", mapping.source_field)
            }
        })
        .collect();

    if !invalid.is_empty() {
        return Err(WorkflowError::InvalidMapping(invalid));
    }

    job.approved_mappings = approved;
    job.status = MappingStatus::Approved;
    job.updated_at = chrono::Utc::now();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Schema, TransformType};
    use indexmap::IndexMap;

    fn draft_job() -> MappingJob {
        MappingJob::new("user-1".into(), "test job".into(), IndexMap::new() as Schema, IndexMap::new() as Schema)
    }

    fn valid_mapping() -> FieldMapping {
        FieldMapping {
            source_field: "first_name".into(),
            target_field: "name[0].given[0]".into(),
            transform_type: TransformType::Direct,
            confidence_score: 0.95,
            rationale: "exact match".into(),
            clinical_context: None,
            type_compatible: true,
            alternatives: vec![],
            options: serde_json::Value::Null,
        }
    }

    #[test]
    fn analyze_moves_draft_to_pending_review() {
        let mut job = draft_job();
        let suggestions = MappingSuggestions { mappings: vec![valid_mapping()], degraded: false };
        let prediction = super::super::resource_predictor::predict(&IndexMap::new());
        analyze(&mut job, &prediction, suggestions).expect("analyze");
        assert_eq!(job.status, MappingStatus::PendingReview);
        assert_eq!(job.ai_mappings.len(), 1);
    }

    #[test]
    fn analyze_rejects_approved_job() {
        let mut job = draft_job();
        job.status = MappingStatus::Approved;
        let suggestions = MappingSuggestions { mappings: vec![], degraded: false };
        let prediction = super::super::resource_predictor::predict(&IndexMap::new());
        assert!(matches!(analyze(&mut job, &prediction, suggestions), Err(WorkflowError::AlreadyApproved)));
    }

    #[test]
    fn approve_mappings_requires_pending_review() {
        let mut job = draft_job();
        let result = approve_mappings(&mut job, vec![valid_mapping()]);
        assert!(matches!(result, Err(WorkflowError::NotPendingReview(MappingStatus::Draft))));
    }

    #[test]
    fn approve_mappings_rejects_empty_target_field() {
        let mut job = draft_job();
        job.status = MappingStatus::PendingReview;
        let mut bad_mapping = valid_mapping();
        bad_mapping.target_field = String::new();

        let result = approve_mappings(&mut job, vec![bad_mapping]);
        assert!(matches!(result, Err(WorkflowError::InvalidMapping(_))));
        assert_eq!(job.status, MappingStatus::PendingReview);
    }

    #[test]
    fn approve_mappings_succeeds_and_snapshots() {
        let mut job = draft_job();
        job.status = MappingStatus::PendingReview;
        let mapping = valid_mapping();

        approve_mappings(&mut job, vec![mapping.clone()]).expect("approve");
        assert_eq!(job.status, MappingStatus::Approved);
        assert_eq!(job.approved_mappings, vec![mapping]);
    }

    #[test]
    fn re_approving_same_list_on_approved_job_is_a_no_op() {
        let mut job = draft_job();
        job.status = MappingStatus::PendingReview;
        let mapping = valid_mapping();
        approve_mappings(&mut job, vec![mapping.clone()]).expect("approve");

        let result = approve_mappings(&mut job, vec![mapping]);
        assert!(result.is_ok());
        assert_eq!(job.status, MappingStatus::Approved);
    }
}
