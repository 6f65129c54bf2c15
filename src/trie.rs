//! Character-keyed trie: the engine's primary inverted structure. Each node
//! records an end-of-word flag, the set of document identifiers that reach
//! it, and a weight counter (occurrences of insertions ending there).
//!
//! Children are kept in a `BTreeMap` rather than a `HashMap` so preorder
//! traversal order is deterministic without a separate insertion-order
//! ledger — ties break on `char` ordering, a stable total order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrieNode {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<char, TrieNode>,
    #[serde(rename = "isEndOfWord", default)]
    pub is_end_of_word: bool,
    #[serde(rename = "documentRefs", default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ids: BTreeSet<String>,
    #[serde(default)]
    pub weight: u32,
}

impl TrieNode {
    fn is_prunable(&self) -> bool {
        self.children.is_empty() && self.ids.is_empty() && self.weight == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrieState {
    pub root: TrieNode,
    #[serde(rename = "documentLinks")]
    pub document_links: Vec<(String, Vec<Value>)>,
}

/// Character trie over lowercased whitespace-delimited tokens.
#[derive(Debug, Clone, Default)]
pub struct Trie {
    root: TrieNode,
    /// Reserved for relationship traversal; never consulted by the search
    /// path (see spec invariants for `Trie`).
    document_links: HashMap<String, Vec<Value>>,
}

impl Trie {
    pub fn new() -> Trie {
        Trie::default()
    }

    /// Splits `text` on whitespace after lowercasing and inserts each token
    /// with `id` attached at its terminal node. A no-op for empty text or id.
    pub fn insert(&mut self, text: &str, id: &str) {
        if text.trim().is_empty() || id.is_empty() {
            return;
        }
        let lowered = text.to_lowercase();
        for token in lowered.split_whitespace() {
            if token.is_empty() {
                continue;
            }
            let mut node = &mut self.root;
            for c in token.chars() {
                node = node.children.entry(c).or_default();
            }
            node.is_end_of_word = true;
            node.ids.insert(id.to_string());
            node.weight += 1;
        }
    }

    /// Walks the trie along `prefix` and collects identifiers from the
    /// reached subtree in preorder until `max_results` distinct ids are
    /// gathered.
    pub fn search(&self, prefix: &str, max_results: usize) -> BTreeSet<String> {
        let lowered = prefix.to_lowercase();
        let Some(start) = Self::walk(&self.root, &lowered) else {
            return BTreeSet::new();
        };
        let mut out = BTreeSet::new();
        Self::collect_preorder(start, &mut out, max_results);
        out
    }

    fn walk<'a>(root: &'a TrieNode, prefix: &str) -> Option<&'a TrieNode> {
        let mut node = root;
        for c in prefix.chars() {
            node = node.children.get(&c)?;
        }
        Some(node)
    }

    fn collect_preorder(node: &TrieNode, out: &mut BTreeSet<String>, max_results: usize) {
        if out.len() >= max_results {
            return;
        }
        for id in &node.ids {
            if out.len() >= max_results {
                return;
            }
            out.insert(id.clone());
        }
        for child in node.children.values() {
            if out.len() >= max_results {
                return;
            }
            Self::collect_preorder(child, out, max_results);
        }
    }

    /// Bounded Levenshtein walk: descends the trie keeping a rolling edit-
    /// distance row between `text` and the path spelled so far, pruning any
    /// branch whose best achievable distance already exceeds `max_distance`.
    /// Collects the ids of every end-of-word node whose final distance is
    /// within budget.
    pub fn fuzzy_search(&self, text: &str, max_distance: usize) -> BTreeSet<String> {
        let query: Vec<char> = text.to_lowercase().chars().collect();
        let first_row: Vec<usize> = (0..=query.len()).collect();
        let mut out = BTreeSet::new();
        Self::fuzzy_walk(&self.root, &query, &first_row, max_distance, &mut out);
        out
    }

    fn fuzzy_walk(
        node: &TrieNode,
        query: &[char],
        row: &[usize],
        max_distance: usize,
        out: &mut BTreeSet<String>,
    ) {
        if node.is_end_of_word {
            if let Some(&last) = row.last() {
                if last <= max_distance {
                    out.extend(node.ids.iter().cloned());
                }
            }
        }
        for (&c, child) in &node.children {
            let next_row = Self::next_row(row, query, c);
            if next_row.iter().copied().min().unwrap_or(usize::MAX) <= max_distance {
                Self::fuzzy_walk(child, query, &next_row, max_distance, out);
            }
        }
    }

    fn next_row(prev_row: &[usize], query: &[char], c: char) -> Vec<usize> {
        let mut row = vec![prev_row[0] + 1];
        for (i, &qc) in query.iter().enumerate() {
            let cost = if qc == c { 0 } else { 1 };
            let insertion = row[i] + 1;
            let deletion = prev_row[i + 1] + 1;
            let substitution = prev_row[i] + cost;
            row.push(insertion.min(deletion).min(substitution));
        }
        row
    }

    /// Depth-first walk discarding `id` from every terminal set, decrementing
    /// weight wherever it was present, and pruning emptied leaves.
    pub fn remove(&mut self, id: &str) {
        Self::remove_from(&mut self.root, id);
        self.document_links.remove(id);
    }

    fn remove_from(node: &mut TrieNode, id: &str) {
        if node.ids.remove(id) && node.weight > 0 {
            node.weight -= 1;
        }
        node.children.retain(|_, child| {
            Self::remove_from(child, id);
            !child.is_prunable()
        });
    }

    pub fn export_state(&self) -> TrieState {
        TrieState {
            root: self.root.clone(),
            document_links: self.document_links.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    pub fn import_state(&mut self, state: TrieState) {
        self.root = state.root;
        self.document_links = state.document_links.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.root = TrieNode::default();
        self.document_links.clear();
    }

    /// Total number of nodes in the trie, including the root.
    pub fn len(&self) -> usize {
        fn count(node: &TrieNode) -> usize {
            1 + node.children.values().map(count).sum::<usize>()
        }
        count(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Breadth-first regex traversal: a queue of `(node, spelled-so-far)`
    /// pairs, testing `pattern` against the spelled string at every node and
    /// recording ids from any node whose spelling matches. Capped at
    /// `max_results` and bounded by `deadline`; returns whatever was
    /// collected so far plus whether the deadline was hit, per the partial-
    /// result contract on regex traversal timeouts.
    pub fn search_regex_bfs(
        &self,
        pattern: &Regex,
        max_results: usize,
        deadline: Instant,
    ) -> (Vec<(String, u32)>, bool) {
        use std::collections::VecDeque;

        let mut queue = VecDeque::new();
        queue.push_back((&self.root, String::new()));
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut timed_out = false;

        while let Some((node, matched)) = queue.pop_front() {
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            if pattern.is_match(&matched) {
                for id in &node.ids {
                    if seen.insert(id.clone()) {
                        out.push((id.clone(), node.weight));
                    }
                }
            }
            for (&c, child) in &node.children {
                let mut next = matched.clone();
                next.push(c);
                queue.push_back((child, next));
            }
        }

        Self::rank_and_truncate(&mut out, max_results);
        (out, timed_out)
    }

    /// Depth-first counterpart of `search_regex_bfs`, used when the pattern
    /// is judged complex (spec §4.7's literal character-class heuristic).
    pub fn search_regex_dfs(
        &self,
        pattern: &Regex,
        max_results: usize,
        deadline: Instant,
    ) -> (Vec<(String, u32)>, bool) {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut timed_out = false;
        Self::dfs_regex(&self.root, pattern, String::new(), max_results, deadline, &mut out, &mut seen, &mut timed_out);
        Self::rank_and_truncate(&mut out, max_results);
        (out, timed_out)
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs_regex(
        node: &TrieNode,
        pattern: &Regex,
        matched: String,
        max_results: usize,
        deadline: Instant,
        out: &mut Vec<(String, u32)>,
        seen: &mut HashSet<String>,
        timed_out: &mut bool,
    ) {
        if *timed_out || out.len() >= max_results {
            return;
        }
        if Instant::now() >= deadline {
            *timed_out = true;
            return;
        }
        if pattern.is_match(&matched) {
            for id in &node.ids {
                if seen.insert(id.clone()) {
                    out.push((id.clone(), node.weight));
                }
            }
        }
        for (&c, child) in &node.children {
            let mut next = matched.clone();
            next.push(c);
            Self::dfs_regex(child, pattern, next, max_results, deadline, out, seen, timed_out);
            if *timed_out {
                return;
            }
        }
    }

    fn rank_and_truncate(out: &mut Vec<(String, u32)>, max_results: usize) {
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out.truncate(max_results);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_empty_text_or_id_is_noop() {
        let mut trie = Trie::new();
        trie.insert("", "d1");
        trie.insert("word", "");
        assert!(trie.is_empty());
    }

    #[test]
    fn prefix_search_finds_inserted_tokens() {
        let mut trie = Trie::new();
        trie.insert("Test 1", "d1");
        trie.insert("Test 2", "d2");
        let hits = trie.search("test", 10);
        assert_eq!(hits, BTreeSet::from(["d1".to_string(), "d2".to_string()]));
    }

    #[test]
    fn prefix_search_respects_max_results() {
        let mut trie = Trie::new();
        for i in 0..5 {
            trie.insert("hello", &format!("d{i}"));
        }
        assert_eq!(trie.search("hel", 2).len(), 2);
    }

    #[test]
    fn prefix_search_missing_branch_is_empty() {
        let mut trie = Trie::new();
        trie.insert("hello", "d1");
        assert!(trie.search("zzz", 10).is_empty());
    }

    #[test]
    fn fuzzy_search_within_distance() {
        let mut trie = Trie::new();
        trie.insert("hello", "d1");
        let hits = trie.fuzzy_search("helo", 2);
        assert_eq!(hits, BTreeSet::from(["d1".to_string()]));
    }

    #[test]
    fn fuzzy_search_zero_distance_equals_exact_match() {
        let mut trie = Trie::new();
        trie.insert("hello", "d1");
        trie.insert("help", "d2");
        assert_eq!(trie.fuzzy_search("hello", 0), BTreeSet::from(["d1".to_string()]));
        assert!(trie.fuzzy_search("hell", 0).is_empty());
    }

    #[test]
    fn fuzzy_search_large_distance_returns_everything() {
        let mut trie = Trie::new();
        trie.insert("alpha", "d1");
        trie.insert("beta", "d2");
        let hits = trie.fuzzy_search("zzzzzzzzzz", 10);
        assert_eq!(hits, BTreeSet::from(["d1".to_string(), "d2".to_string()]));
    }

    #[test]
    fn remove_deletes_id_and_prunes_dead_branches() {
        let mut trie = Trie::new();
        trie.insert("hello", "d1");
        trie.remove("d1");
        assert!(trie.search("hello", 10).is_empty());
        assert!(trie.is_empty());
    }

    #[test]
    fn remove_keeps_shared_prefix_alive_for_other_ids() {
        let mut trie = Trie::new();
        trie.insert("hello", "d1");
        trie.insert("help", "d2");
        trie.remove("d1");
        assert!(trie.search("hello", 10).is_empty());
        assert_eq!(trie.search("help", 10), BTreeSet::from(["d2".to_string()]));
    }

    #[test]
    fn regex_bfs_matches_prefix_pattern() {
        let mut trie = Trie::new();
        trie.insert("alpha", "d1");
        trie.insert("alpine", "d2");
        trie.insert("beta", "d3");
        let pattern = regex::Regex::new("^al.*").unwrap();
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        let (matches, timed_out) = trie.search_regex_bfs(&pattern, 10, deadline);
        assert!(!timed_out);
        let ids: BTreeSet<String> = matches.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, BTreeSet::from(["d1".to_string(), "d2".to_string()]));
    }

    #[test]
    fn regex_dfs_agrees_with_bfs() {
        let mut trie = Trie::new();
        trie.insert("alpha", "d1");
        trie.insert("beta", "d2");
        let pattern = regex::Regex::new("(al|be).+").unwrap();
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        let (bfs, _) = trie.search_regex_bfs(&pattern, 10, deadline);
        let (dfs, _) = trie.search_regex_dfs(&pattern, 10, deadline);
        let bfs_ids: BTreeSet<String> = bfs.into_iter().map(|(id, _)| id).collect();
        let dfs_ids: BTreeSet<String> = dfs.into_iter().map(|(id, _)| id).collect();
        assert_eq!(bfs_ids, dfs_ids);
    }

    #[test]
    fn export_import_round_trips() {
        let mut trie = Trie::new();
        trie.insert("hello world", "d1");
        let state = trie.export_state();
        let encoded = serde_json::to_value(&state).unwrap();
        let decoded: TrieState = serde_json::from_value(encoded).unwrap();
        let mut restored = Trie::new();
        restored.import_state(decoded);
        assert_eq!(restored.search("hel", 10), trie.search("hel", 10));
        assert_eq!(restored.fuzzy_search("wrld", 1), trie.fuzzy_search("wrld", 1));
    }
}
