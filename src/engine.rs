//! The facade: coordinates initialization, storage I/O, the cache, the
//! `QueryProcessor`, the `IndexManager`, a parallel top-level trie used only
//! for regex traversal, event emission, and result post-processing
//! (boosting, pagination, match extraction).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::cache::Cache;
use crate::config::{validate_index_config, validate_search_options, IndexConfig, SearchOptions, SortOrder};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::events::{Event, EventEmitter, EventType};
use crate::index_manager::IndexManager;
use crate::query_processor::QueryProcessor;
use crate::shared::{extract_field, field_display_text, normalize_field_value, now_millis};
use crate::storage::{MemoryStorage, PersistedIndex, Storage};
use crate::trie::Trie;

/// Default regex traversal timeout; a traversal that runs past this returns
/// whatever it has collected so far rather than erroring.
pub const REGEX_TIMEOUT_MS: u64 = 5000;

const COMPLEX_REGEX_CHARS: &[char] = &['{', '+', '*', '?', '|', '['];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninit,
    Initializing,
    Ready,
    Operating,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSpan {
    pub field: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub document: Document,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<MatchSpan>,
}

/// The search engine. Owns every mutable piece of state: the document table
/// and `IndexMapper` (through `IndexManager`), the result cache, the storage
/// handle, the event-listener set, and a regex-only trie kept in step with
/// every mutation. Single-threaded cooperative — callers must serialize
/// calls against one instance.
pub struct SearchEngine {
    config: IndexConfig,
    state: EngineState,
    storage: Box<dyn Storage>,
    cache: Cache<Vec<SearchResult>>,
    index_manager: IndexManager,
    regex_trie: Trie,
    events: EventEmitter,
    query_processor: QueryProcessor,
}

impl SearchEngine {
    pub fn new(config: IndexConfig, storage: Box<dyn Storage>) -> Result<SearchEngine> {
        validate_index_config(&config)?;
        let query_processor = match &config.options.stop_words {
            Some(words) => QueryProcessor::with_stop_words(words.clone()),
            None => QueryProcessor::new(),
        };
        Ok(SearchEngine {
            index_manager: IndexManager::new(config.clone()),
            config,
            state: EngineState::Uninit,
            storage,
            cache: Cache::with_defaults(),
            regex_trie: Trie::new(),
            events: EventEmitter::new(),
            query_processor,
        })
    }

    pub fn with_memory_storage(config: IndexConfig) -> Result<SearchEngine> {
        SearchEngine::new(config, Box::new(MemoryStorage::new()))
    }

    pub fn on(&mut self, listener: impl Fn(&Event) + Send + Sync + 'static) {
        self.events.on(listener);
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn document_count(&self) -> usize {
        self.index_manager.len()
    }

    pub fn index_manager(&self) -> &IndexManager {
        &self.index_manager
    }

    /// Restores a previously exported index tree (see `IndexManager::export_index`)
    /// and rebuilds the regex-traversal trie from the restored document table so
    /// regex queries observe the same state as prefix/fuzzy queries.
    pub fn import_index(&mut self, value: &serde_json::Value) -> Result<()> {
        self.index_manager.import_index(value)?;
        self.rebuild_regex_trie();
        Ok(())
    }

    /// Idempotent. Falls back to in-memory storage if the configured backend
    /// fails to initialize, then loads a persisted index under the
    /// configured name if one is present.
    pub async fn initialize(&mut self) -> Result<()> {
        if matches!(self.state, EngineState::Ready | EngineState::Operating) {
            return Ok(());
        }
        self.state = EngineState::Initializing;

        if self.storage.initialize().await.is_err() {
            tracing::warn!(index = %self.config.name, "storage initialization failed, falling back to memory storage");
            self.events.emit(
                Event::new(EventType::StorageError, now_millis())
                    .with_error("storage initialization failed; falling back to memory storage"),
            );
            self.storage = Box::new(MemoryStorage::new());
            self.storage.initialize().await?;
        }

        if let Ok(Some(blob)) = self.storage.get_index(&self.config.name).await {
            if let Ok(persisted) = serde_json::from_slice::<PersistedIndex>(&blob) {
                if self.index_manager.import_index(&persisted.data).is_ok() {
                    self.rebuild_regex_trie();
                }
            }
        }

        self.state = EngineState::Ready;
        self.events.emit(Event::new(EventType::EngineInitialized, now_millis()));
        Ok(())
    }

    async fn ensure_ready(&mut self) -> Result<()> {
        if matches!(self.state, EngineState::Uninit) {
            self.initialize().await?;
        }
        Ok(())
    }

    fn rebuild_regex_trie(&mut self) {
        self.regex_trie.clear();
        let fields = self.config.fields.clone();
        for (id, doc) in self.index_manager.documents() {
            for field in &fields {
                if let Some(value) = extract_field(&doc.fields, field) {
                    self.regex_trie.insert(&normalize_field_value(value), id);
                }
            }
        }
    }

    fn index_into_regex_trie(&mut self, id: &str) {
        if let Some(doc) = self.index_manager.get(id) {
            for field in self.config.fields.clone() {
                if let Some(value) = extract_field(&doc.fields, &field) {
                    self.regex_trie.insert(&normalize_field_value(value), id);
                }
            }
        }
    }

    async fn persist(&mut self) {
        let data = self.index_manager.export_index();
        let persisted = PersistedIndex { id: self.config.name.clone(), data, timestamp: now_millis() };
        match serde_json::to_vec(&persisted) {
            Ok(blob) => {
                if let Err(err) = self.storage.store_index(&self.config.name, blob).await {
                    self.events
                        .emit(Event::new(EventType::StorageError, now_millis()).with_error(err.to_string()));
                }
            }
            Err(err) => {
                self.events.emit(Event::new(EventType::StorageError, now_millis()).with_error(err.to_string()));
            }
        }
    }

    /// Assigns identifiers where missing, indexes every document into both
    /// the `IndexManager` and the regex trie, clears the cache exactly once
    /// for the whole batch, and persists. A persistence failure is logged as
    /// `storage:error` but never rolls back the in-memory mutation.
    pub async fn add_documents(&mut self, docs: Vec<Document>) -> Result<Vec<String>> {
        self.ensure_ready().await?;
        self.state = EngineState::Operating;
        self.events.emit(Event::new(EventType::IndexStart, now_millis()).with_data(json!({"count": docs.len()})));

        let now = now_millis();
        let assigned = self.index_manager.add_documents(docs, now);
        for id in &assigned {
            self.index_into_regex_trie(id);
        }
        self.cache.clear();
        self.persist().await;

        self.state = EngineState::Ready;
        self.events.emit(
            Event::new(EventType::IndexComplete, now_millis()).with_data(json!({"count": assigned.len()})),
        );
        Ok(assigned)
    }

    pub async fn update_document(&mut self, id: &str, fields: Map<String, Value>) -> Result<()> {
        self.ensure_ready().await?;
        self.state = EngineState::Operating;
        self.events.emit(Event::new(EventType::UpdateStart, now_millis()).with_data(json!({"id": id})));

        let now = now_millis();
        if let Err(err) = self.index_manager.update_document(id, fields, now) {
            self.events
                .emit(Event::new(EventType::UpdateError, now_millis()).with_error(err.to_string()));
            self.state = EngineState::Ready;
            return Err(err);
        }

        self.regex_trie.remove(id);
        self.index_into_regex_trie(id);
        self.cache.clear();
        self.persist().await;

        self.state = EngineState::Ready;
        self.events.emit(Event::new(EventType::UpdateComplete, now_millis()).with_data(json!({"id": id})));
        Ok(())
    }

    pub async fn remove_document(&mut self, id: &str) -> Result<()> {
        self.ensure_ready().await?;
        self.state = EngineState::Operating;
        self.events.emit(Event::new(EventType::RemoveStart, now_millis()).with_data(json!({"id": id})));

        if let Err(err) = self.index_manager.remove_document(id) {
            self.events
                .emit(Event::new(EventType::RemoveError, now_millis()).with_error(err.to_string()));
            self.state = EngineState::Ready;
            return Err(err);
        }

        self.regex_trie.remove(id);
        self.cache.clear();
        self.persist().await;

        self.state = EngineState::Ready;
        self.events.emit(Event::new(EventType::RemoveComplete, now_millis()).with_data(json!({"id": id})));
        Ok(())
    }

    pub async fn clear_index(&mut self) -> Result<()> {
        self.ensure_ready().await?;
        self.index_manager.clear();
        self.regex_trie.clear();
        self.cache.clear();
        if let Err(err) = self.storage.delete_index(&self.config.name).await {
            self.events
                .emit(Event::new(EventType::IndexClearError, now_millis()).with_error(err.to_string()));
            return Err(err);
        }
        self.events.emit(Event::new(EventType::IndexClear, now_millis()));
        Ok(())
    }

    /// Validates options, checks the cache, then dispatches to either regex
    /// traversal of the dedicated regex trie or term-level `IndexManager`
    /// search, before materializing, (optionally) boosting, sorting, paging,
    /// and caching the result.
    pub async fn search(&mut self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>> {
        validate_search_options(&options)?;
        self.ensure_ready().await?;
        self.state = EngineState::Operating;
        let start = now_millis();
        self.events.emit(Event::new(EventType::SearchStart, start).with_data(json!({"query": query})));

        let cache_key = self.cache_key(query, &options);
        if let Some(cached) = self.cache.get(&cache_key, start) {
            self.state = EngineState::Ready;
            self.events.emit(
                Event::new(EventType::SearchComplete, now_millis())
                    .with_data(json!({"cached": true, "count": cached.len()})),
            );
            return Ok(cached);
        }

        let outcome = self.execute_search(query, &options);
        let results = match outcome {
            Ok(results) => results,
            Err(err) => {
                self.events
                    .emit(Event::new(EventType::SearchError, now_millis()).with_error(err.to_string()));
                self.state = EngineState::Ready;
                return Err(err);
            }
        };

        self.cache.set(cache_key, results.clone(), now_millis());
        self.state = EngineState::Ready;
        self.events.emit(
            Event::new(EventType::SearchComplete, now_millis())
                .with_data(json!({"cached": false, "count": results.len(), "elapsedMs": now_millis() - start})),
        );
        Ok(results)
    }

    fn cache_key(&self, query: &str, options: &SearchOptions) -> String {
        let serialized = serde_json::to_string(options).unwrap_or_default();
        format!("{}|{}|{}", self.config.name, query, serialized)
    }

    fn execute_search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let candidates = if let Some(pattern) = &options.regex {
            self.regex_candidates(pattern, options.max_results)?
        } else {
            let processed = self.query_processor.process_str(query);
            self.index_manager
                .search(&processed, options.fuzzy, options.max_results, options.threshold)
                .into_iter()
                .map(|m| Candidate { id: m.id, score: m.score, matched_terms: m.matched_terms })
                .collect()
        };

        let search_fields: Vec<String> = options.fields.clone().unwrap_or_else(|| self.config.fields.clone());

        let mut results: Vec<SearchResult> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(document) = self.index_manager.get(&candidate.id) else { continue };
            let score = if options.boost.is_empty() {
                candidate.score
            } else {
                boosted_score(document, &search_fields, &candidate.matched_terms, &options.boost)
            };
            let matches = if options.include_matches {
                let pattern = match &options.regex {
                    Some(p) => Regex::new(p)?,
                    None => term_match_pattern(&candidate.matched_terms)?,
                };
                extract_matches(document, &search_fields, &pattern)
            } else {
                Vec::new()
            };
            results.push(SearchResult {
                id: candidate.id,
                document: document.clone(),
                score,
                matched_terms: candidate.matched_terms,
                matches,
            });
        }

        results.sort_by(|a, b| {
            let ascending = a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal);
            let ordered = if options.sort_order == SortOrder::Desc { ascending.reverse() } else { ascending };
            ordered.then_with(|| a.id.cmp(&b.id))
        });

        Ok(paginate(results, options.page, options.page_size))
    }

    fn regex_candidates(&self, pattern: &str, max_results: usize) -> Result<Vec<Candidate>> {
        let regex = Regex::new(pattern)?;
        let deadline = Instant::now() + Duration::from_millis(REGEX_TIMEOUT_MS);
        let (matches, timed_out) = if is_complex_pattern(pattern) {
            self.regex_trie.search_regex_dfs(&regex, max_results, deadline)
        } else {
            self.regex_trie.search_regex_bfs(&regex, max_results, deadline)
        };
        if timed_out {
            tracing::warn!(pattern, "regex traversal timed out, returning partial results");
        }
        let max_weight = matches.iter().map(|(_, w)| *w).max().unwrap_or(1).max(1) as f64;
        Ok(matches
            .into_iter()
            .map(|(id, w)| Candidate { id, score: (w as f64 / max_weight).min(1.0), matched_terms: Vec::new() })
            .collect())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.storage.close().await?;
        self.cache.clear();
        self.index_manager.clear();
        self.regex_trie.clear();
        self.state = EngineState::Closed;
        self.events.emit(Event::new(EventType::EngineClosed, now_millis()));
        Ok(())
    }
}

struct Candidate {
    id: String,
    score: f64,
    matched_terms: Vec<String>,
}

fn paginate(results: Vec<SearchResult>, page: usize, page_size: usize) -> Vec<SearchResult> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1) * page_size;
    if start >= results.len() {
        return Vec::new();
    }
    let end = (start + page_size).min(results.len());
    results[start..end].to_vec()
}

fn is_complex_pattern(pattern: &str) -> bool {
    pattern.contains("(?") || pattern.chars().any(|c| COMPLEX_REGEX_CHARS.contains(&c))
}

/// Two scoring paths exist: the `IndexMapper` path is used by default, and
/// this term-frequency/boost path is used only when the caller supplies at
/// least one boost.
fn boosted_score(document: &Document, fields: &[String], matched_terms: &[String], boost: &HashMap<String, f64>) -> f64 {
    let mut total = 0.0;
    for field in fields {
        let Some(value) = extract_field(&document.fields, field) else { continue };
        let text = normalize_field_value(value);
        let weight = boost.get(field).copied().unwrap_or(1.0);
        for term in matched_terms {
            let frequency = text.split_whitespace().filter(|word| *word == term).count() as f64;
            total += frequency * weight;
        }
    }
    (total / 100.0).min(1.0)
}

fn term_match_pattern(terms: &[String]) -> Result<Regex> {
    if terms.is_empty() {
        return Ok(RegexBuilder::new("$^").build().expect("constant pattern is valid"));
    }
    let escaped: Vec<String> = terms.iter().map(|t| regex::escape(t)).collect();
    RegexBuilder::new(&escaped.join("|")).case_insensitive(true).build().map_err(Error::from)
}

fn extract_matches(document: &Document, fields: &[String], pattern: &Regex) -> Vec<MatchSpan> {
    let mut spans = Vec::new();
    for field in fields {
        if let Some(value) = extract_field(&document.fields, field) {
            let text = field_display_text(value);
            for m in pattern.find_iter(&text) {
                spans.push(MatchSpan { field: field.clone(), text: m.as_str().to_string() });
            }
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexOptions, StorageConfig};
    use serde_json::json;

    fn config(name: &str, fields: &[&str]) -> IndexConfig {
        IndexConfig {
            name: name.to_string(),
            version: 1,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            storage: StorageConfig::Memory,
            options: IndexOptions::default(),
        }
    }

    fn doc(id: &str, title: &str, content: &str) -> Document {
        Document::new(id, json!({"title": title, "content": content}).as_object().unwrap().clone())
    }

    #[tokio::test]
    async fn search_returns_matching_documents_with_equal_scores() {
        let mut engine = SearchEngine::with_memory_storage(config("t", &["title", "content"])).unwrap();
        engine
            .add_documents(vec![doc("d1", "Test 1", "Content 1"), doc("d2", "Test 2", "Content 2")])
            .await
            .unwrap();
        let results = engine.search("test", SearchOptions { max_results: 10, ..Default::default() }).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].score - results[1].score).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fuzzy_search_matches_near_misses() {
        let mut engine = SearchEngine::with_memory_storage(config("t", &["title"])).unwrap();
        engine.add_documents(vec![doc("d1", "hello", "")]).await.unwrap();
        let results = engine
            .search("helo", SearchOptions { fuzzy: true, threshold: 0.0, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "d1");
    }

    #[tokio::test]
    async fn update_unknown_document_surfaces_error() {
        let mut engine = SearchEngine::with_memory_storage(config("t", &["title"])).unwrap();
        let err = engine.update_document("missing", Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn removed_document_never_resurfaces() {
        let mut engine = SearchEngine::with_memory_storage(config("t", &["title"])).unwrap();
        engine.add_documents(vec![doc("d1", "hello", "")]).await.unwrap();
        engine.remove_document("d1").await.unwrap();
        let results = engine.search("hello", SearchOptions::default()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn cache_never_returns_prewrite_results() {
        let mut engine = SearchEngine::with_memory_storage(config("t", &["title"])).unwrap();
        engine.add_documents(vec![doc("d1", "hello", "")]).await.unwrap();
        let before = engine.search("hello", SearchOptions::default()).await.unwrap();
        assert_eq!(before.len(), 1);
        engine.add_documents(vec![doc("d2", "hello", "")]).await.unwrap();
        let after = engine.search("hello", SearchOptions::default()).await.unwrap();
        assert_eq!(after.len(), 2);
    }

    #[tokio::test]
    async fn regex_search_dispatches_and_ranks_by_score() {
        let mut engine = SearchEngine::with_memory_storage(config("t", &["title"])).unwrap();
        engine
            .add_documents(vec![doc("alpha", "alpha", ""), doc("alpine", "alpine", ""), doc("beta", "beta", "")])
            .await
            .unwrap();
        let options =
            SearchOptions { regex: Some("^al.*".to_string()), max_results: 10, ..SearchOptions::default() };
        let results = engine.search("", options).await.unwrap();
        let ids: Vec<String> = results.into_iter().map(|r| r.id).collect();
        assert!(ids.contains(&"alpha".to_string()));
        assert!(ids.contains(&"alpine".to_string()));
        assert!(!ids.contains(&"beta".to_string()));
    }

    #[tokio::test]
    async fn scores_stay_within_unit_interval_and_sort_is_non_increasing() {
        let mut engine = SearchEngine::with_memory_storage(config("t", &["title", "content"])).unwrap();
        engine
            .add_documents(vec![doc("d1", "test document", "more words"), doc("d2", "other", "test mention")])
            .await
            .unwrap();
        let results = engine.search("test", SearchOptions { max_results: 10, ..Default::default() }).await.unwrap();
        for window in results.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for result in &results {
            assert!((0.0..=1.0).contains(&result.score));
        }
    }

    #[tokio::test]
    async fn export_import_round_trip_preserves_search_results() {
        let mut engine = SearchEngine::with_memory_storage(config("t", &["title"])).unwrap();
        engine.add_documents(vec![doc("d1", "hello world", "")]).await.unwrap();
        let exported = engine.index_manager().export_index();

        let mut restored = SearchEngine::with_memory_storage(config("t", &["title"])).unwrap();
        restored.initialize().await.unwrap();
        restored.import_index(&exported).unwrap();

        let original = engine.search("hello", SearchOptions::default()).await.unwrap();
        let round_tripped = restored.search("hello", SearchOptions::default()).await.unwrap();
        assert_eq!(original.len(), round_tripped.len());
        assert_eq!(original[0].id, round_tripped[0].id);
    }
}
