//! Target-path materialization: writes a value into a possibly-nested JSON
//! path (`a[0].b`), creating intermediate objects/arrays on demand
//! (spec.md §4.9).

use interop_common::types::PathSegment;
use serde_json::{Map, Value};

pub fn set_path(target: &mut Value, segments: &[PathSegment], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let obj = target.as_object_mut().expect("just coerced to object");

    match segment {
        PathSegment::Name(name) => {
            let entry = obj.entry(name.clone()).or_insert(Value::Null);
            if rest.is_empty() {
                *entry = value;
            } else {
                set_path(entry, rest, value);
            }
        },
        PathSegment::Index(name, idx) => {
            let entry = obj.entry(name.clone()).or_insert(Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            let array = entry.as_array_mut().expect("just coerced to array");
            while array.len() <= *idx as usize {
                array.push(Value::Null);
            }
            if rest.is_empty() {
                array[*idx as usize] = value;
            } else {
                set_path(&mut array[*idx as usize], rest, value);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interop_common::types::parse_target_path;
    use serde_json::json;

    #[test]
    fn sets_a_plain_name() {
        let mut target = json!({});
        let segments = parse_target_path("birthDate").expect("parse");
        set_path(&mut target, &segments, json!("1990-01-15"));
        assert_eq!(target, json!({"birthDate": "1990-01-15"}));
    }

    #[test]
    fn materializes_nested_indexed_path() {
        let mut target = json!({});
        let segments = parse_target_path("name[0].given[0]").expect("parse");
        set_path(&mut target, &segments, json!("John"));
        assert_eq!(target, json!({"name": [{"given": ["John"]}]}));
    }

    #[test]
    fn extends_arrays_to_fit_the_index() {
        let mut target = json!({});
        let segments = parse_target_path("tags[2]").expect("parse");
        set_path(&mut target, &segments, json!("x"));
        assert_eq!(target, json!({"tags": [null, null, "x"]}));
    }
}
