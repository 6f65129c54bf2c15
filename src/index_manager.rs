//! Owns the document table (id to record) and the `IndexMapper`; orchestrates
//! add/update/remove, and exports/imports index state as an opaque,
//! shape-validated JSON tree.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::config::IndexConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::index_mapper::{IndexMapper, IndexMapperState, IndexMatch};
use crate::shared::{extract_field, normalize_field_value};

#[derive(Debug, Clone)]
pub struct IndexManager {
    config: IndexConfig,
    documents: HashMap<String, Document>,
    index_mapper: IndexMapper,
    next_ordinal: u64,
}

impl IndexManager {
    pub fn new(config: IndexConfig) -> IndexManager {
        IndexManager { config, documents: HashMap::new(), index_mapper: IndexMapper::new(), next_ordinal: 0 }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = (&String, &Document)> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Projects a document's configured fields (dotted paths, array indices
    /// allowed) into a flat lowercase searchable view keyed by field path.
    fn project_fields(&self, doc: &Document) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for field in &self.config.fields {
            if let Some(value) = extract_field(&doc.fields, field) {
                out.insert(field.clone(), normalize_field_value(value));
            }
        }
        out
    }

    /// Assigns `"{name}-{ordinal}-{epoch_ms}"` identifiers to any document
    /// missing one, indexes every configured field, and returns the (now
    /// fully assigned) identifiers in insertion order.
    pub fn add_documents(&mut self, mut docs: Vec<Document>, now_ms: u64) -> Vec<String> {
        for doc in docs.iter_mut() {
            if doc.id.is_empty() {
                self.next_ordinal += 1;
                doc.id = format!("{}-{}-{}", self.config.name, self.next_ordinal, now_ms);
            }
            doc.touch_metadata(now_ms);
        }

        let mut assigned = Vec::with_capacity(docs.len());
        for doc in docs {
            let field_texts = self.project_fields(&doc);
            self.index_mapper.index_document(&doc.id, &field_texts);
            assigned.push(doc.id.clone());
            self.documents.insert(doc.id.clone(), doc);
        }
        assigned
    }

    pub fn update_document(&mut self, id: &str, fields: Map<String, Value>, now_ms: u64) -> Result<()> {
        if !self.documents.contains_key(id) {
            return Err(Error::index(format!("Document {id} not found")));
        }
        let mut doc = Document::new(id, fields);
        doc.touch_metadata(now_ms);
        let field_texts = self.project_fields(&doc);
        self.index_mapper.update_document(id, &field_texts);
        self.documents.insert(id.to_string(), doc);
        Ok(())
    }

    pub fn remove_document(&mut self, id: &str) -> Result<()> {
        if self.documents.remove(id).is_none() {
            return Err(Error::index(format!("Document {id} not found")));
        }
        self.index_mapper.remove_document(id);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.documents.clear();
        self.index_mapper.clear();
        self.next_ordinal = 0;
    }

    /// Consults the `IndexMapper`, then filters candidates below `threshold`.
    pub fn search(&self, query: &str, fuzzy: bool, max_results: usize, threshold: f64) -> Vec<IndexMatch> {
        self.index_mapper
            .search(query, fuzzy, max_results)
            .into_iter()
            .filter(|m| m.score >= threshold)
            .collect()
    }

    /// Emits `{documents: [{key, value}...], indexState: {trie, dataMap},
    /// config}` as an opaque JSON tree suitable for handing to a storage
    /// backend.
    pub fn export_index(&self) -> Value {
        let documents: Vec<Value> = self
            .documents
            .iter()
            .map(|(key, value)| json!({"key": key, "value": value}))
            .collect();
        json!({
            "documents": documents,
            "indexState": self.index_mapper.export_state(),
            "config": self.config,
        })
    }

    /// Validates the shape of a previously exported tree before mutating any
    /// state: a malformed payload leaves the current document table and
    /// index state untouched.
    pub fn import_index(&mut self, value: &Value) -> Result<()> {
        let obj = value.as_object().ok_or_else(|| Error::index("import payload must be an object"))?;

        let documents_value =
            obj.get("documents").ok_or_else(|| Error::index("import payload missing documents"))?;
        let documents_arr =
            documents_value.as_array().ok_or_else(|| Error::index("documents must be an array"))?;

        let index_state_value =
            obj.get("indexState").ok_or_else(|| Error::index("import payload missing indexState"))?;
        let index_state_obj =
            index_state_value.as_object().ok_or_else(|| Error::index("indexState must be an object"))?;
        if !index_state_obj.contains_key("trie") || !index_state_obj.contains_key("dataMap") {
            return Err(Error::index("indexState must contain trie and dataMap"));
        }

        let config_value = obj.get("config").ok_or_else(|| Error::index("import payload missing config"))?;
        if !config_value.is_object() {
            return Err(Error::index("config must be an object"));
        }

        let mut new_documents: HashMap<String, Document> = HashMap::new();
        for entry in documents_arr {
            let entry_obj = entry.as_object().ok_or_else(|| Error::index("document entry must be an object"))?;
            let key = entry_obj
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::index("document entry missing key"))?;
            let doc_value = entry_obj.get("value").ok_or_else(|| Error::index("document entry missing value"))?;
            let document: Document = serde_json::from_value(doc_value.clone())?;
            new_documents.insert(key.to_string(), document);
        }
        let index_mapper_state: IndexMapperState = serde_json::from_value(index_state_value.clone())?;
        let config: IndexConfig = serde_json::from_value(config_value.clone())?;

        // Every fallible parse above happened before any mutation: only now
        // do we commit, so a malformed payload never leaves partial state.
        self.documents = new_documents;
        self.index_mapper.import_state(index_mapper_state);
        self.config = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexOptions, StorageConfig};
    use serde_json::json;

    fn config() -> IndexConfig {
        IndexConfig {
            name: "t".to_string(),
            version: 1,
            fields: vec!["title".to_string(), "content".to_string()],
            storage: StorageConfig::Memory,
            options: IndexOptions::default(),
        }
    }

    fn doc(id: &str, title: &str, content: &str) -> Document {
        Document::new(id, json!({"title": title, "content": content}).as_object().unwrap().clone())
    }

    #[test]
    fn assigns_identifier_when_missing() {
        let mut manager = IndexManager::new(config());
        let assigned = manager.add_documents(vec![doc("", "Test", "Content")], 1_000);
        assert_eq!(assigned.len(), 1);
        assert!(assigned[0].starts_with("t-1-1000"));
    }

    #[test]
    fn search_finds_documents_by_indexed_field() {
        let mut manager = IndexManager::new(config());
        manager.add_documents(vec![doc("d1", "Test 1", "Content 1"), doc("d2", "Test 2", "Content 2")], 0);
        let results = manager.search("test", false, 10, 0.5);
        let ids: Vec<String> = results.into_iter().map(|m| m.id).collect();
        assert!(ids.contains(&"d1".to_string()));
        assert!(ids.contains(&"d2".to_string()));
    }

    #[test]
    fn update_unknown_document_fails() {
        let mut manager = IndexManager::new(config());
        let err = manager.update_document("missing", Map::new(), 0).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn update_replaces_old_tokens_with_new_ones() {
        let mut manager = IndexManager::new(config());
        manager.add_documents(vec![doc("d1", "old", "content")], 0);
        manager
            .update_document("d1", json!({"title": "new", "content": "words"}).as_object().unwrap().clone(), 1)
            .unwrap();
        assert!(manager.search("old", false, 10, 0.5).is_empty());
        assert!(!manager.search("new", false, 10, 0.5).is_empty());
    }

    #[test]
    fn remove_unknown_document_fails() {
        let mut manager = IndexManager::new(config());
        assert!(manager.remove_document("missing").is_err());
    }

    #[test]
    fn remove_stops_future_matches() {
        let mut manager = IndexManager::new(config());
        manager.add_documents(vec![doc("d1", "hello", "world")], 0);
        manager.remove_document("d1").unwrap();
        assert!(manager.search("hello", false, 10, 0.5).is_empty());
    }

    #[test]
    fn export_import_round_trips_search_results() {
        let mut manager = IndexManager::new(config());
        manager.add_documents(vec![doc("d1", "hello", "world")], 0);
        let exported = manager.export_index();

        let mut restored = IndexManager::new(config());
        restored.import_index(&exported).unwrap();

        assert_eq!(
            restored.search("hello", false, 10, 0.5).len(),
            manager.search("hello", false, 10, 0.5).len()
        );
        assert_eq!(restored.get("d1"), manager.get("d1"));
    }

    #[test]
    fn import_rejects_malformed_shape_without_mutating_state() {
        let mut manager = IndexManager::new(config());
        manager.add_documents(vec![doc("d1", "hello", "world")], 0);
        let before = manager.search("hello", false, 10, 0.5).len();

        let bad = json!({"documents": [], "config": {}});
        assert!(manager.import_index(&bad).is_err());
        assert_eq!(manager.search("hello", false, 10, 0.5).len(), before);
    }
}
