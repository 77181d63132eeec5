//! Schema Inferencer (C5): column -> semantic-type inference over sample
//! rows (spec.md §4.5).

use indexmap::IndexMap;
use interop_common::types::SemanticType;
use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{InferredSchema, Schema};

const PREVIEW_ROWS: usize = 5;
const MAX_SAMPLE_ROWS: usize = 100;

fn date_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)date|dob|birth").expect("valid regex"))
}

fn datetime_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)datetime|timestamp|_at$").expect("valid regex"))
}

fn integer_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)age|count|number|id|mrn").expect("valid regex"))
}

fn decimal_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)price|amount|salary").expect("valid regex"))
}

fn boolean_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^is_|^has_|^(active|flag)$").expect("valid regex"))
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"))
}

/// Name heuristics win over value heuristics when both apply (spec.md §4.5).
/// Checked in the order the spec lists: datetime before date would both
/// match a column named `created_at`, so datetime (the more specific
/// pattern) is tried first.
fn infer_from_name(name: &str) -> Option<SemanticType> {
    if datetime_name_re().is_match(name) {
        return Some(SemanticType::DateTime);
    }
    if date_name_re().is_match(name) {
        return Some(SemanticType::Date);
    }
    if boolean_name_re().is_match(name) {
        return Some(SemanticType::Boolean);
    }
    if decimal_name_re().is_match(name) {
        return Some(SemanticType::Decimal);
    }
    if integer_name_re().is_match(name) {
        return Some(SemanticType::Integer);
    }
    None
}

fn infer_from_value(value: &str) -> SemanticType {
    let trimmed = value.trim();
    if iso_date_re().is_match(trimmed) {
        return SemanticType::Date;
    }
    if trimmed.parse::<i64>().is_ok() {
        return SemanticType::Integer;
    }
    if trimmed.parse::<f64>().is_ok() {
        return SemanticType::Decimal;
    }
    match trimmed.to_lowercase().as_str() {
        "true" | "false" | "yes" | "no" | "1" | "0" => SemanticType::Boolean,
        _ => SemanticType::String,
    }
}

/// Majority vote over non-null sample values for one column.
fn infer_column_from_values(values: &[&str]) -> SemanticType {
    let non_null: Vec<&str> = values.iter().copied().filter(|v| !v.trim().is_empty()).collect();
    if non_null.is_empty() {
        return SemanticType::String;
    }

    let mut counts: IndexMap<SemanticType, usize> = IndexMap::new();
    for value in &non_null {
        *counts.entry(infer_from_value(value)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(semantic_type, _)| semantic_type)
        .unwrap_or(SemanticType::String)
}

/// Infers a schema from up to `MAX_SAMPLE_ROWS` JSON object rows. Each row's
/// top-level keys form the candidate column set, in first-seen order.
pub fn infer_schema(rows: &[serde_json::Value]) -> InferredSchema {
    let sample: Vec<&serde_json::Value> = rows.iter().take(MAX_SAMPLE_ROWS).collect();

    let mut columns: IndexMap<String, Vec<String>> = IndexMap::new();
    for row in &sample {
        let serde_json::Value::Object(map) = row else { continue };
        for (key, value) in map {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            columns.entry(key.clone()).or_default().push(rendered);
        }
    }

    let mut schema: Schema = IndexMap::new();
    for (name, values) in &columns {
        let semantic_type = infer_from_name(name)
            .unwrap_or_else(|| infer_column_from_values(&values.iter().map(String::as_str).collect::<Vec<_>>()));
        schema.insert(name.clone(), semantic_type);
    }

    let preview_rows = rows.iter().take(PREVIEW_ROWS).cloned().collect();
    InferredSchema { columns: schema, preview_rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn name_heuristic_wins_over_value_heuristic() {
        // `patient_id` looks numeric by value but the "id" name heuristic
        // always wins per spec.md §4.5.
        let rows = vec![json!({"patient_id": "P001"}), json!({"patient_id": "P002"})];
        let inferred = infer_schema(&rows);
        assert_eq!(inferred.columns.get("patient_id"), Some(&SemanticType::Integer));
    }

    #[test]
    fn value_heuristic_used_when_name_is_uninformative() {
        let rows = vec![json!({"gender": "male"}), json!({"gender": "female"})];
        let inferred = infer_schema(&rows);
        assert_eq!(inferred.columns.get("gender"), Some(&SemanticType::String));
    }

    #[test]
    fn birth_date_name_matches_date_not_datetime() {
        let rows = vec![json!({"birth_date": "1990-01-15"})];
        let inferred = infer_schema(&rows);
        assert_eq!(inferred.columns.get("birth_date"), Some(&SemanticType::Date));
    }

    #[test]
    fn created_at_name_matches_datetime() {
        let rows = vec![json!({"created_at": "2024-01-01T00:00:00Z"})];
        let inferred = infer_schema(&rows);
        assert_eq!(inferred.columns.get("created_at"), Some(&SemanticType::DateTime));
    }

    #[test]
    fn boolean_prefix_and_exact_names_are_detected() {
        let rows = vec![json!({"is_active": "true", "flag": "1", "active": "no"})];
        let inferred = infer_schema(&rows);
        assert_eq!(inferred.columns.get("is_active"), Some(&SemanticType::Boolean));
        assert_eq!(inferred.columns.get("flag"), Some(&SemanticType::Boolean));
        assert_eq!(inferred.columns.get("active"), Some(&SemanticType::Boolean));
    }

    #[test]
    fn preview_keeps_first_five_rows_only() {
        let rows: Vec<serde_json::Value> = (0..10).map(|i| json!({"n": i.to_string()})).collect();
        let inferred = infer_schema(&rows);
        assert_eq!(inferred.preview_rows.len(), 5);
    }

    #[test]
    fn value_heuristic_uses_non_null_majority() {
        let rows = vec![json!({"amount_note": null}), json!({"amount_note": "12.5"}), json!({"amount_note": "9.0"})];
        // name contains "amount" -> decimal via name heuristic regardless of nulls.
        let inferred = infer_schema(&rows);
        assert_eq!(inferred.columns.get("amount_note"), Some(&SemanticType::Decimal));
    }
}
