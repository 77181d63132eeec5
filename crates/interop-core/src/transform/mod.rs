//! Transform Core (C9): applies one approved `FieldMapping` to a source row,
//! materializing a target document (spec.md §4.9).

pub mod paths;
pub mod registry;

use chrono::NaiveDate;
use interop_common::types::parse_target_path;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{FieldMapping, TransformType};

pub use registry::TransformRegistry;

const DEFAULT_CONCAT_SEPARATOR: &str = " ";
const DEFAULT_SPLIT_SEPARATOR: &str = ",";
const DEFAULT_SOURCE_DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_TARGET_DATETIME_FORMAT: &str = "%Y-%m-%dT00:00:00Z";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid target path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid transform options for {field}: {reason}")]
    InvalidOptions { field: String, reason: String },

    #[error("could not parse date {value:?} with format {format:?}: {reason}")]
    DateParse { value: String, format: String, reason: String },

    #[error("unknown CUSTOM transform registry key: {0}")]
    UnknownCustomKey(String),

    #[error("CUSTOM transform failed: {0}")]
    CustomFailed(String),
}

fn get_source_value<'a>(row: &'a Value, field: &str) -> Option<&'a Value> {
    row.get(field).filter(|v| !v.is_null())
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_target(target: &mut Value, path: &str, value: Value) -> Result<(), TransformError> {
    let segments = parse_target_path(path)
        .map_err(|e| TransformError::InvalidPath { path: path.to_string(), reason: e.to_string() })?;
    paths::set_path(target, &segments, value);
    Ok(())
}

/// Applies `mapping` to `row`, writing the result into `target`. Missing
/// source values propagate as absent target fields — `target` is left
/// untouched for that mapping rather than written with `null` (spec.md
/// §4.9).
pub fn apply_mapping(
    mapping: &FieldMapping,
    row: &Value,
    target: &mut Value,
    registry: &TransformRegistry,
) -> Result<(), TransformError> {
    match mapping.transform_type {
        TransformType::Direct => apply_direct(mapping, row, target),
        TransformType::Uppercase => apply_case(mapping, row, target, str::to_uppercase),
        TransformType::Lowercase => apply_case(mapping, row, target, str::to_lowercase),
        TransformType::Concat => apply_concat(mapping, row, target),
        TransformType::Split => apply_split(mapping, row, target),
        TransformType::FormatDate => apply_format_date(mapping, row, target),
        TransformType::Custom => apply_custom(mapping, row, target, registry),
    }
}

fn apply_direct(mapping: &FieldMapping, row: &Value, target: &mut Value) -> Result<(), TransformError> {
    let Some(value) = get_source_value(row, &mapping.source_field) else { return Ok(()) };
    write_target(target, &mapping.target_field, value.clone())
}

fn apply_case(mapping: &FieldMapping, row: &Value, target: &mut Value, transform: fn(&str) -> String) -> Result<(), TransformError> {
    let Some(value) = get_source_value(row, &mapping.source_field) else { return Ok(()) };
    let rendered = transform(&value_as_string(value));
    write_target(target, &mapping.target_field, Value::String(rendered))
}

fn apply_concat(mapping: &FieldMapping, row: &Value, target: &mut Value) -> Result<(), TransformError> {
    let fields = mapping
        .options
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| TransformError::InvalidOptions {
            field: mapping.target_field.clone(),
            reason: "CONCAT requires options.fields: string[]".to_string(),
        })?;

    let separator = mapping.options.get("separator").and_then(Value::as_str).unwrap_or(DEFAULT_CONCAT_SEPARATOR);

    let parts: Vec<String> = fields
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|field| get_source_value(row, field))
        .map(value_as_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        return Ok(());
    }

    write_target(target, &mapping.target_field, Value::String(parts.join(separator)))
}

fn apply_split(mapping: &FieldMapping, row: &Value, target: &mut Value) -> Result<(), TransformError> {
    let Some(value) = get_source_value(row, &mapping.source_field) else { return Ok(()) };

    let targets = mapping
        .options
        .get("targets")
        .and_then(Value::as_array)
        .ok_or_else(|| TransformError::InvalidOptions {
            field: mapping.target_field.clone(),
            reason: "SPLIT requires options.targets: string[]".to_string(),
        })?;
    let separator = mapping.options.get("separator").and_then(Value::as_str).unwrap_or(DEFAULT_SPLIT_SEPARATOR);

    let rendered = value_as_string(value);
    let parts: Vec<&str> = rendered.split(separator).collect();

    for (target_path, part) in targets.iter().filter_map(Value::as_str).zip(parts) {
        write_target(target, target_path, Value::String(part.trim().to_string()))?;
    }
    Ok(())
}

fn apply_format_date(mapping: &FieldMapping, row: &Value, target: &mut Value) -> Result<(), TransformError> {
    let Some(value) = get_source_value(row, &mapping.source_field) else { return Ok(()) };
    let rendered = value_as_string(value);

    let source_format = mapping.options.get("source_format").and_then(Value::as_str).unwrap_or(DEFAULT_SOURCE_DATE_FORMAT);
    let target_format = mapping.options.get("target_format").and_then(Value::as_str).unwrap_or(DEFAULT_TARGET_DATETIME_FORMAT);

    let date = NaiveDate::parse_from_str(rendered.trim(), source_format).map_err(|e| TransformError::DateParse {
        value: rendered.clone(),
        format: source_format.to_string(),
        reason: e.to_string(),
    })?;
    let datetime = date.and_hms_opt(0, 0, 0).ok_or_else(|| TransformError::DateParse {
        value: rendered.clone(),
        format: source_format.to_string(),
        reason: "midnight is always a valid time".to_string(),
    })?;

    write_target(target, &mapping.target_field, Value::String(datetime.format(target_format).to_string()))
}

fn apply_custom(mapping: &FieldMapping, row: &Value, target: &mut Value, registry: &TransformRegistry) -> Result<(), TransformError> {
    let key = mapping
        .options
        .get("registry_key")
        .and_then(Value::as_str)
        .ok_or_else(|| TransformError::InvalidOptions {
            field: mapping.target_field.clone(),
            reason: "CUSTOM requires options.registry_key".to_string(),
        })?;

    let value = registry.invoke(key, row)?;
    write_target(target, &mapping.target_field, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(source: &str, target: &str, transform_type: TransformType, options: Value) -> FieldMapping {
        FieldMapping {
            source_field: source.to_string(),
            target_field: target.to_string(),
            transform_type,
            confidence_score: 1.0,
            rationale: String::new(),
            clinical_context: None,
            type_compatible: true,
            alternatives: vec![],
            options,
        }
    }

    #[test]
    fn direct_copies_value() {
        let row = json!({"first_name": "John"});
        let mut target = json!({});
        let registry = TransformRegistry::new();
        apply_mapping(&mapping("first_name", "name[0].given[0]", TransformType::Direct, Value::Null), &row, &mut target, &registry).expect("apply");
        assert_eq!(target, json!({"name": [{"given": ["John"]}]}));
    }

    #[test]
    fn direct_skips_missing_source_without_writing_null() {
        let row = json!({});
        let mut target = json!({});
        let registry = TransformRegistry::new();
        apply_mapping(&mapping("missing", "name", TransformType::Direct, Value::Null), &row, &mut target, &registry).expect("apply");
        assert_eq!(target, json!({}));
    }

    #[test]
    fn uppercase_transforms_string_case() {
        let row = json!({"gender": "male"});
        let mut target = json!({});
        let registry = TransformRegistry::new();
        apply_mapping(&mapping("gender", "gender", TransformType::Uppercase, Value::Null), &row, &mut target, &registry).expect("apply");
        assert_eq!(target, json!({"gender": "MALE"}));
    }

    #[test]
    fn concat_joins_present_fields_trimmed() {
        let row = json!({"first_name": "John", "last_name": "Doe"});
        let mut target = json!({});
        let registry = TransformRegistry::new();
        let options = json!({"fields": ["first_name", "last_name"]});
        apply_mapping(&mapping("first_name", "full_name", TransformType::Concat, options), &row, &mut target, &registry).expect("apply");
        assert_eq!(target, json!({"full_name": "John Doe"}));
    }

    #[test]
    fn split_distributes_components_to_targets() {
        let row = json!({"full_name": "John,Doe"});
        let mut target = json!({});
        let registry = TransformRegistry::new();
        let options = json!({"targets": ["first_name", "last_name"]});
        apply_mapping(&mapping("full_name", "unused", TransformType::Split, options), &row, &mut target, &registry).expect("apply");
        assert_eq!(target, json!({"first_name": "John", "last_name": "Doe"}));
    }

    #[test]
    fn format_date_renders_iso_datetime_at_midnight() {
        let row = json!({"birth_date": "1990-01-15"});
        let mut target = json!({});
        let registry = TransformRegistry::new();
        apply_mapping(&mapping("birth_date", "birthDate", TransformType::FormatDate, Value::Null), &row, &mut target, &registry).expect("apply");
        assert_eq!(target, json!({"birthDate": "1990-01-15T00:00:00Z"}));
    }

    #[test]
    fn format_date_rejects_unparseable_value() {
        let row = json!({"birth_date": "not-a-date"});
        let mut target = json!({});
        let registry = TransformRegistry::new();
        let result = apply_mapping(&mapping("birth_date", "birthDate", TransformType::FormatDate, Value::Null), &row, &mut target, &registry);
        assert!(matches!(result, Err(TransformError::DateParse { .. })));
    }

    #[test]
    fn custom_invokes_registered_function() {
        let row = json!({"code": "e11.9"});
        let mut target = json!({});
        let mut registry = TransformRegistry::new();
        registry.register("uppercase_code", Box::new(|row: &Value| {
            Ok(Value::String(row.get("code").and_then(Value::as_str).unwrap_or_default().to_uppercase()))
        }));
        let options = json!({"registry_key": "uppercase_code"});
        apply_mapping(&mapping("code", "code", TransformType::Custom, options), &row, &mut target, &registry).expect("apply");
        assert_eq!(target, json!({"code": "E11.9"}));
    }

    #[test]
    fn custom_rejects_unknown_registry_key() {
        let row = json!({});
        let mut target = json!({});
        let registry = TransformRegistry::new();
        let options = json!({"registry_key": "does_not_exist"});
        let result = apply_mapping(&mapping("code", "code", TransformType::Custom, options), &row, &mut target, &registry);
        assert!(matches!(result, Err(TransformError::UnknownCustomKey(_))));
    }
}
