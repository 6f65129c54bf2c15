//! Composes the `Trie` and `DataMapper`: indexes per-document field text,
//! executes term-level prefix or fuzzy lookups, and merges/scores
//! candidates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data_mapper::DataMapper;
use crate::shared::tokenize;
use crate::trie::{Trie, TrieState};

pub const DEFAULT_FUZZY_DISTANCE: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub score: f64,
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMapperState {
    pub trie: TrieState,
    #[serde(rename = "dataMap")]
    pub data_map: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct IndexMapper {
    trie: Trie,
    data_mapper: DataMapper,
}

impl IndexMapper {
    pub fn new() -> IndexMapper {
        IndexMapper::default()
    }

    /// Tokenizes each field's already-normalized text and indexes every
    /// token into both the trie and the data mapper.
    pub fn index_document(&mut self, id: &str, field_texts: &HashMap<String, String>) {
        for text in field_texts.values() {
            for token in tokenize(text) {
                self.trie.insert(&token, id);
                self.data_mapper.map_data(&token, id);
            }
        }
    }

    /// Tokenizes `query` the same way as indexing, gathers per-term
    /// candidates (fuzzy or prefix), scores them, and returns the top
    /// `max_results` by descending score.
    pub fn search(&self, query: &str, fuzzy: bool, max_results: usize) -> Vec<IndexMatch> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scores: HashMap<String, f64> = HashMap::new();
        let mut matched_terms: HashMap<String, Vec<String>> = HashMap::new();

        for term in &terms {
            let candidates = if fuzzy {
                self.trie.fuzzy_search(term, DEFAULT_FUZZY_DISTANCE)
            } else {
                self.trie.search(term, max_results)
            };
            for id in candidates {
                let contribution = if self.data_mapper.contains(term, &id) { 1.0 } else { 0.5 };
                *scores.entry(id.clone()).or_insert(0.0) += contribution;
                matched_terms.entry(id).or_default().push(term.clone());
            }
        }

        let term_count = terms.len() as f64;
        let mut results: Vec<IndexMatch> = scores
            .into_iter()
            .map(|(id, total)| {
                let terms = matched_terms.remove(&id).unwrap_or_default();
                IndexMatch { score: (total / term_count).min(1.0), id, matched_terms: terms }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(max_results);
        results
    }

    pub fn remove_document(&mut self, id: &str) {
        self.trie.remove(id);
        self.data_mapper.remove_document(id);
    }

    pub fn update_document(&mut self, id: &str, field_texts: &HashMap<String, String>) {
        self.remove_document(id);
        self.index_document(id, field_texts);
    }

    pub fn export_state(&self) -> IndexMapperState {
        IndexMapperState { trie: self.trie.export_state(), data_map: self.data_mapper.export_state() }
    }

    pub fn import_state(&mut self, state: IndexMapperState) {
        self.trie.import_state(state.trie);
        self.data_mapper.import_state(state.data_map);
    }

    pub fn clear(&mut self) {
        self.trie.clear();
        self.data_mapper.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(text: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("field".to_string(), text.to_string());
        map
    }

    #[test]
    fn search_scores_exact_hits_higher_than_fuzzy_hits() {
        let mut mapper = IndexMapper::new();
        mapper.index_document("d1", &field("test document"));
        let results = mapper.search("test", false, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "d1");
        assert!((results[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fuzzy_search_still_scores_within_zero_to_one() {
        let mut mapper = IndexMapper::new();
        mapper.index_document("d1", &field("hello"));
        let results = mapper.search("helo", true, 10);
        assert_eq!(results.len(), 1);
        assert!(results[0].score >= 0.0 && results[0].score <= 1.0);
    }

    #[test]
    fn remove_document_stops_future_matches() {
        let mut mapper = IndexMapper::new();
        mapper.index_document("d1", &field("test"));
        mapper.remove_document("d1");
        assert!(mapper.search("test", false, 10).is_empty());
    }

    #[test]
    fn update_document_replaces_old_tokens() {
        let mut mapper = IndexMapper::new();
        mapper.index_document("d1", &field("old content"));
        mapper.update_document("d1", &field("new words"));
        assert!(mapper.search("old", false, 10).is_empty());
        assert_eq!(mapper.search("new", false, 10)[0].id, "d1");
    }

    #[test]
    fn export_import_round_trips_search_results() {
        let mut mapper = IndexMapper::new();
        mapper.index_document("d1", &field("hello world"));
        let state = mapper.export_state();
        let mut restored = IndexMapper::new();
        restored.import_state(state);
        assert_eq!(restored.search("hello", false, 10), mapper.search("hello", false, 10));
    }
}
