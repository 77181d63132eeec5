//! Registry of named CUSTOM transform functions (spec.md §4.9: "invoke a
//! named script from a registry... out-of-core; the core calls it as an
//! opaque function `(row) -> value | error`").

use std::collections::HashMap;

use super::TransformError;

pub type CustomTransformFn = dyn Fn(&serde_json::Value) -> Result<serde_json::Value, TransformError> + Send + Sync;

#[derive(Default)]
pub struct TransformRegistry {
    functions: HashMap<String, Box<CustomTransformFn>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, function: Box<CustomTransformFn>) {
        self.functions.insert(key.into(), function);
    }

    pub fn invoke(&self, key: &str, row: &serde_json::Value) -> Result<serde_json::Value, TransformError> {
        let function = self.functions.get(key).ok_or_else(|| TransformError::UnknownCustomKey(key.to_string()))?;
        function(row)
    }
}
