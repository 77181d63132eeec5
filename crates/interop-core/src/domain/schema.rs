//! Schema representations: ordered field-path -> semantic-type maps, used by
//! the Schema Inferencer, AI Mapping Engine, and Resource Predictor.

use indexmap::IndexMap;
use interop_common::types::SemanticType;
use serde::{Deserialize, Serialize};

/// An ordered mapping from field path (possibly nested, e.g. `a[0].b`) to
/// semantic type. Order is preserved so tie-break rules that reference
/// "stable ordering by sourceField" are well defined.
pub type Schema = IndexMap<String, SemanticType>;

/// Result of `SchemaInferencer::infer`: the inferred schema plus a small
/// preview of sample rows for human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredSchema {
    pub columns: Schema,
    pub preview_rows: Vec<serde_json::Value>,
}
