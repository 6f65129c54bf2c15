//! Shared utilities used by both the indexer and the query processor:
//! dotted-path field extraction (with array-index segments), value
//! normalization to a flat lowercase searchable string, tokenization, and
//! the "optimize" dedupe-then-stable-sort helper used when assembling
//! result lists.

use serde_json::{Map, Value};

/// Resolves a dotted path such as `"metadata.title"` or `"tags.0"` against a
/// field map. A numeric segment is treated as an array index into the value
/// reached so far; any other segment is treated as an object key.
pub fn extract_field<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = match (current, segment.parse::<usize>()) {
            (Value::Array(items), Ok(index)) => items.get(index)?,
            (Value::Object(map), _) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Flattens a JSON value into a single lowercase, space-joined string, the
/// way the indexer builds the searchable text for a field. Nested arrays and
/// objects are flattened depth-first; `null` contributes nothing.
pub fn normalize_field_value(value: &Value) -> String {
    let mut buf = String::new();
    normalize_into(value, &mut buf);
    buf.to_lowercase()
}

fn normalize_into(value: &Value, buf: &mut String) {
    match value {
        Value::Null => {}
        Value::Bool(b) => push_word(buf, &b.to_string()),
        Value::Number(n) => push_word(buf, &n.to_string()),
        Value::String(s) => push_word(buf, s),
        Value::Array(items) => {
            for item in items {
                normalize_into(item, buf);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                normalize_into(item, buf);
            }
        }
    }
}

fn push_word(buf: &mut String, word: &str) {
    if word.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(word);
}

/// Flattens a JSON value the same way `normalize_field_value` does but
/// preserves original case. Used when extracting match substrings for
/// display, where a caller's casing should survive round-tripping.
pub fn field_display_text(value: &Value) -> String {
    let mut buf = String::new();
    fn go(value: &Value, buf: &mut String) {
        match value {
            Value::Null => {}
            Value::Bool(b) => push_word(buf, &b.to_string()),
            Value::Number(n) => push_word(buf, &n.to_string()),
            Value::String(s) => push_word(buf, s),
            Value::Array(items) => {
                for item in items {
                    go(item, buf);
                }
            }
            Value::Object(map) => {
                for item in map.values() {
                    go(item, buf);
                }
            }
        }
    }
    go(value, &mut buf);
    buf
}

/// Tokenizes already-lowercased text: replaces non-word, non-whitespace
/// characters with spaces, splits on whitespace, drops empties. "Word"
/// matches the conventional `\w` class (`[A-Za-z0-9_]`), so underscore joins
/// a token rather than splitting it. Shared by `IndexMapper::index_document`
/// and `QueryProcessor` so indexing and querying agree on what a token is.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|tok| !tok.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Deduplicates (preserving first occurrence) then stable-sorts by the given
/// key, descending. Used to assemble final result lists from merged
/// per-term candidate sets.
pub fn optimize<T, K, F>(mut items: Vec<T>, mut key: F) -> Vec<T>
where
    T: Clone + PartialEq,
    K: PartialOrd,
    F: FnMut(&T) -> K,
{
    let mut deduped: Vec<T> = Vec::with_capacity(items.len());
    items.retain(|item| {
        if deduped.contains(item) {
            false
        } else {
            deduped.push(item.clone());
            true
        }
    });
    deduped.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(std::cmp::Ordering::Equal));
    deduped
}

pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
