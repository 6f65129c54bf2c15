//! The document record shape: a stable identifier plus a field-name to
//! JSON-value mapping, following the same `serde_json::Value` payload
//! representation `meilidb-schema` and `raw_document` use upstream rather
//! than a hand-rolled value enum.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const METADATA_INDEXED_KEY: &str = "indexed";
pub const METADATA_LAST_MODIFIED_KEY: &str = "lastModified";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Document {
        Document { id: id.into(), fields, metadata: None }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn touch_metadata(&mut self, now_ms: u64) {
        let metadata = self.metadata.get_or_insert_with(Map::new);
        metadata
            .entry(METADATA_INDEXED_KEY.to_string())
            .or_insert(Value::from(now_ms));
        metadata.insert(METADATA_LAST_MODIFIED_KEY.to_string(), Value::from(now_ms));
    }
}

/// Validates that a raw document (prior to identifier assignment) only
/// needs its configured fields to resolve to *something*: this checks
/// field-path resolvability, not value type. Dotted paths (including
/// array-index segments) are resolved the same way `IndexManager` projects
/// them at index time.
pub fn validate_document(fields: &Map<String, Value>, configured_fields: &[String]) -> bool {
    if configured_fields.is_empty() {
        return false;
    }
    configured_fields
        .iter()
        .all(|path| crate::shared::extract_field(fields, path).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn validate_document_top_level_field() {
        let fields = map(json!({"title": "T"}));
        assert!(validate_document(&fields, &["title".to_string()]));
        assert!(!validate_document(&fields, &["content".to_string()]));
    }

    #[test]
    fn validate_document_dotted_path() {
        let fields = map(json!({"metadata": {"title": "T"}}));
        assert!(validate_document(&fields, &["metadata.title".to_string()]));
    }

    #[test]
    fn validate_document_empty_configured_fields_is_false() {
        let fields = map(json!({"title": "T"}));
        assert!(!validate_document(&fields, &[]));
    }
}
