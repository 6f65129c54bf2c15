//! Secondary index from lowercase token to the set of document identifiers
//! that contain it. Used by `IndexMapper` to distinguish exact-token hits
//! from fuzzy/prefix-only hits when scoring.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataMapper {
    tokens: HashMap<String, BTreeSet<String>>,
}

impl DataMapper {
    pub fn new() -> DataMapper {
        DataMapper::default()
    }

    /// Idempotent: mapping `token` to `id` twice has no additional effect.
    pub fn map_data(&mut self, token: &str, id: &str) {
        self.tokens.entry(token.to_lowercase()).or_default().insert(id.to_string());
    }

    pub fn get_documents(&self, token: &str) -> BTreeSet<String> {
        self.tokens.get(&token.to_lowercase()).cloned().unwrap_or_default()
    }

    pub fn contains(&self, token: &str, id: &str) -> bool {
        self.tokens.get(&token.to_lowercase()).is_some_and(|ids| ids.contains(id))
    }

    pub fn get_document_by_id(&self, id: &str) -> BTreeSet<String> {
        self.tokens
            .iter()
            .filter(|(_, ids)| ids.contains(id))
            .map(|(token, _)| token.clone())
            .collect()
    }

    pub fn get_all_keys(&self) -> Vec<String> {
        self.tokens.keys().cloned().collect()
    }

    pub fn remove_document(&mut self, id: &str) {
        for ids in self.tokens.values_mut() {
            ids.remove(id);
        }
        self.tokens.retain(|_, ids| !ids.is_empty());
    }

    pub fn export_state(&self) -> HashMap<String, Vec<String>> {
        self.tokens
            .iter()
            .map(|(token, ids)| (token.clone(), ids.iter().cloned().collect()))
            .collect()
    }

    pub fn import_state(&mut self, state: HashMap<String, Vec<String>>) {
        self.tokens = state
            .into_iter()
            .map(|(token, ids)| (token, ids.into_iter().collect()))
            .collect();
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }
}
