//! Tokenizes and classifies a raw query string into terms, operators, and
//! field modifiers; drops stop words; applies a trivial suffix-stripping
//! normalizer to terms; re-emits a canonical query string.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "were", "will", "with",
];

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r#""[^"]*"|\S+"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    Term(String),
    Operator(String),
    Modifier(String),
    Quoted(String),
}

#[derive(Debug, Clone)]
pub struct QueryProcessor {
    stop_words: Vec<String>,
}

impl Default for QueryProcessor {
    fn default() -> Self {
        QueryProcessor { stop_words: STOP_WORDS.iter().map(|s| s.to_string()).collect() }
    }
}

impl QueryProcessor {
    pub fn new() -> QueryProcessor {
        QueryProcessor::default()
    }

    pub fn with_stop_words(stop_words: Vec<String>) -> QueryProcessor {
        QueryProcessor { stop_words }
    }

    /// Classifies every whitespace- (or quote-) delimited token of an
    /// already-lowercased query string.
    pub fn classify(&self, query: &str) -> Vec<QueryToken> {
        TOKEN_PATTERN
            .find_iter(query)
            .map(|m| self.classify_token(m.as_str()))
            .collect()
    }

    fn classify_token(&self, raw: &str) -> QueryToken {
        if raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2 {
            QueryToken::Quoted(raw.to_string())
        } else if raw.starts_with('+') || raw.starts_with('-') {
            QueryToken::Operator(raw.to_string())
        } else if raw.contains(':') {
            QueryToken::Modifier(raw.to_string())
        } else {
            QueryToken::Term(raw.to_string())
        }
    }

    fn is_stop_word(&self, term: &str) -> bool {
        self.stop_words.iter().any(|w| w == term)
    }

    /// Converts an arbitrary query input (possibly `null` or a non-string
    /// JSON scalar) to the string the tokenizer consumes.
    pub fn coerce_input(input: &Value) -> String {
        match input {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        }
    }

    /// Produces the canonical query string: lowercase, stop words dropped,
    /// terms suffix-stripped, operators/modifiers/quoted phrases retained
    /// verbatim, single-space joined.
    pub fn process(&self, input: &Value) -> String {
        let raw = Self::coerce_input(input);
        self.process_str(&raw)
    }

    pub fn process_str(&self, query: &str) -> String {
        let lowered = query.to_lowercase();
        let mut out = Vec::new();
        for token in self.classify(&lowered) {
            match token {
                QueryToken::Quoted(q) => out.push(q),
                QueryToken::Operator(op) => out.push(op),
                QueryToken::Modifier(m) => out.push(m),
                QueryToken::Term(term) => {
                    if self.is_stop_word(&term) {
                        continue;
                    }
                    let normalized = normalize_term(&term);
                    if !normalized.is_empty() {
                        out.push(normalized);
                    }
                }
            }
        }
        out.join(" ")
    }
}

/// Trivial English suffix heuristic: strip trailing `ing`, then `ed`, then a
/// trailing `s` that isn't part of `ss` — with one refinement, a trailing
/// `ies` becomes `y` rather than falling through to the generic `s` rule.
fn normalize_term(word: &str) -> String {
    let mut w = word.to_string();
    if w.len() > 3 && w.ends_with("ing") {
        w.truncate(w.len() - 3);
    }
    if w.len() > 2 && w.ends_with("ed") {
        w.truncate(w.len() - 2);
    }
    if w.len() > 4 && w.ends_with("ies") {
        w.truncate(w.len() - 3);
        w.push('y');
    } else if w.len() > 1 && w.ends_with('s') && !w.ends_with("ss") {
        w.truncate(w.len() - 1);
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_stop_words_and_stems_terms() {
        let qp = QueryProcessor::new();
        assert_eq!(qp.process_str("the test and query"), "test query");
        assert_eq!(qp.process_str("Testing QUERIES"), "test query");
    }

    #[test]
    fn retains_operators_and_modifiers() {
        let qp = QueryProcessor::new();
        let processed = qp.process_str("+required -excluded");
        assert!(processed.contains("+required"));
        assert!(processed.contains("-excluded"));
        assert_eq!(qp.process_str("field:value"), "field:value");
    }

    #[test]
    fn coerces_null_and_numeric_input() {
        let qp = QueryProcessor::new();
        assert_eq!(qp.process(&Value::Null), "");
        assert_eq!(qp.process(&json!(123)), "123");
    }

    #[test]
    fn preserves_quoted_phrase_verbatim() {
        let qp = QueryProcessor::new();
        assert_eq!(qp.process_str("\"exact phrase\""), "\"exact phrase\"");
    }

    #[test]
    fn is_idempotent() {
        let qp = QueryProcessor::new();
        let samples = [
            "the test and query",
            "Testing QUERIES",
            "+required -excluded",
            "field:value",
            "\"exact tests\"",
            "",
        ];
        for sample in samples {
            let once = qp.process_str(sample);
            let twice = qp.process_str(&once);
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }
    }
}
