//! Server-facing error types and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Result alias used throughout `interop-core` handlers and engines.
pub type ServerResult<T> = std::result::Result<T, AppError>;

/// Stable machine-readable error kind, mirrored in the JSON response body so
/// clients can branch on it without parsing `message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceMissing,
    DestinationMissing,
    SourceRead,
    ParseRecord,
    Transform,
    DestinationWrite,
    OmopSync,
    ConceptMatchNone,
    InvalidMapping,
    LlmUnavailable,
    Timeout,
    NotFound,
    Validation,
    Conflict,
    Internal,
}

impl ErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation
            | ErrorKind::InvalidMapping
            | ErrorKind::SourceMissing
            | ErrorKind::DestinationMissing => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::LlmUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::SourceRead
            | ErrorKind::ParseRecord
            | ErrorKind::Transform
            | ErrorKind::DestinationWrite
            | ErrorKind::OmopSync
            | ErrorKind::ConceptMatchNone
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Top-level application error. Every engine-facing error eventually flows
/// through one of these variants so the HTTP layer has one place to map
/// errors to status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("record store error: {0}")]
    RecordStore(#[from] mongodb::error::Error),

    #[error("job catalog error: {0}")]
    Catalog(#[from] sqlx::Error),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("source read failed: {0}")]
    SourceRead(String),

    /// A single record could not be parsed out of the source stream — the
    /// stream itself is still healthy, so this is a per-record failure
    /// (DLQ + continue), never a reason to retry or fail the job (spec.md
    /// §4.10 step 6, §7).
    #[error("record parse failed: {0}")]
    ParseRecord(String),

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("destination write failed: {0}")]
    DestinationWrite(String),

    #[error("OMOP sync failed: {0}")]
    OmopSync(String),

    #[error("no concept match found: {0}")]
    ConceptMatchNone(String),

    #[error("invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("LLM mapping assistance unavailable: {0}")]
    LlmUnavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Bridge(#[from] interop_common::BridgeError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::SourceRead(_) => ErrorKind::SourceRead,
            AppError::ParseRecord(_) => ErrorKind::ParseRecord,
            AppError::Transform(_) => ErrorKind::Transform,
            AppError::DestinationWrite(_) => ErrorKind::DestinationWrite,
            AppError::OmopSync(_) => ErrorKind::OmopSync,
            AppError::ConceptMatchNone(_) => ErrorKind::ConceptMatchNone,
            AppError::InvalidMapping(_) => ErrorKind::InvalidMapping,
            AppError::LlmUnavailable(_) => ErrorKind::LlmUnavailable,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::RecordStore(_) | AppError::Catalog(_) | AppError::Config(_) => {
                ErrorKind::Internal
            },
            AppError::Bridge(interop_common::BridgeError::Degraded(_)) => {
                ErrorKind::LlmUnavailable
            },
            AppError::Bridge(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status();

        if status.is_server_error() {
            tracing::error!(error = %self, kind = ?kind, "request failed");
        } else {
            tracing::debug!(error = %self, kind = ?kind, "request rejected");
        }

        let body = json!({
            "error": {
                "message": self.to_string(),
                "status": status.as_u16(),
                "kind": kind,
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404_with_kind() {
        let err = AppError::NotFound("mapping job abc123 not found".to_string());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.kind().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn llm_unavailable_maps_to_503() {
        let err = AppError::LlmUnavailable("embedding service timed out".to_string());
        assert_eq!(err.kind(), ErrorKind::LlmUnavailable);
        assert_eq!(err.kind().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn degraded_bridge_error_maps_to_llm_unavailable() {
        let err = AppError::from(interop_common::BridgeError::Degraded(
            "reasoning model offline".to_string(),
        ));
        assert_eq!(err.kind(), ErrorKind::LlmUnavailable);
    }

    #[test]
    fn concept_match_none_maps_to_500() {
        let err = AppError::ConceptMatchNone("no OMOP concept within threshold".to_string());
        assert_eq!(err.kind().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn parse_record_is_distinct_from_source_read() {
        let parse_err = AppError::ParseRecord("wrong number of fields".to_string());
        assert_eq!(parse_err.kind(), ErrorKind::ParseRecord);
        assert_ne!(parse_err.kind(), ErrorKind::SourceRead);
    }
}
