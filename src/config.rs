//! Engine construction and per-search options, plus the validation
//! functions that reject malformed configs and options up front.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Persistent { opts: Option<serde_json::Value> },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Declared but not honored end-to-end by the core; see
    /// `validate_index_config` for the enforcement this implementation
    /// chose in place of silently ignoring it.
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_true")]
    pub stemming: bool,
    #[serde(default)]
    pub stop_words: Option<Vec<String>>,
    #[serde(default)]
    pub min_word_length: Option<usize>,
    #[serde(default)]
    pub max_word_length: Option<usize>,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

fn default_true() -> bool {
    true
}

fn default_fuzzy_threshold() -> f64 {
    0.8
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            case_sensitive: false,
            stemming: true,
            stop_words: None,
            min_word_length: None,
            max_word_length: None,
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub version: u32,
    pub fields: Vec<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub options: IndexOptions,
}

/// `caseSensitive` is declared but never honored end-to-end by the search
/// path. Rather than silently accept and ignore it, this rejects it with
/// `ValidationError` so the option's absence of effect is never a surprise
/// to a caller who set it expecting behavior.
pub fn validate_index_config(config: &IndexConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        return Err(Error::validation("index config name must be nonempty"));
    }
    if config.fields.is_empty() {
        return Err(Error::validation("index config fields must be nonempty"));
    }
    if config.options.case_sensitive {
        return Err(Error::validation(
            "caseSensitive is not honored by this engine; omit it or set it to false",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub boost: HashMap<String, f64>,
    #[serde(default)]
    pub include_matches: bool,
    #[serde(default = "default_true")]
    pub include_score: bool,
    #[serde(default)]
    pub include_stats: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

fn default_sort_order() -> SortOrder {
    SortOrder::Desc
}

fn default_max_results() -> usize {
    10
}

fn default_threshold() -> f64 {
    0.5
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            fuzzy: false,
            max_results: default_max_results(),
            threshold: default_threshold(),
            fields: None,
            sort_order: default_sort_order(),
            page: default_page(),
            page_size: default_page_size(),
            regex: None,
            boost: HashMap::new(),
            include_matches: false,
            include_score: true,
            include_stats: false,
        }
    }
}

pub fn validate_search_options(options: &SearchOptions) -> Result<()> {
    if options.max_results < 1 {
        return Err(Error::validation("maxResults must be >= 1"));
    }
    if !(0.0..=1.0).contains(&options.threshold) {
        return Err(Error::validation("threshold must be within [0, 1]"));
    }
    if options.page < 1 {
        return Err(Error::validation("page must be >= 1"));
    }
    if options.page_size < 1 {
        return Err(Error::validation("pageSize must be >= 1"));
    }
    for (&ref field, &boost) in &options.boost {
        if boost <= 0.0 {
            return Err(Error::validation(format!("boost for field {field:?} must be positive")));
        }
    }
    if let Some(pattern) = &options.regex {
        regex::Regex::new(pattern)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonpositive_max_results() {
        let options = SearchOptions { max_results: 0, ..SearchOptions::default() };
        assert!(validate_search_options(&options).is_err());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let options = SearchOptions { threshold: 1.5, ..SearchOptions::default() };
        assert!(validate_search_options(&options).is_err());
    }

    #[test]
    fn rejects_empty_name_or_fields() {
        let mut config = IndexConfig {
            name: String::new(),
            version: 1,
            fields: vec!["x".to_string()],
            storage: StorageConfig::Memory,
            options: IndexOptions::default(),
        };
        assert!(validate_index_config(&config).is_err());
        config.name = "t".to_string();
        config.fields.clear();
        assert!(validate_index_config(&config).is_err());
    }

    #[test]
    fn accepts_well_formed_config() {
        let config = IndexConfig {
            name: "t".to_string(),
            version: 1,
            fields: vec!["title".to_string()],
            storage: StorageConfig::Memory,
            options: IndexOptions::default(),
        };
        assert!(validate_index_config(&config).is_ok());
    }
}
