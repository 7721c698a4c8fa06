//! In-memory vector store
//!
//! Records are keyed by a content hash of their text, so storing the same
//! text twice overwrites in place. Search is a brute-force cosine scan over
//! every record: O(N·D) per query, which is fine for a knowledge base of a
//! few hundred snippets.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::embeddings::cosine_similarity;

/// Category used when a record is stored without one
pub const DEFAULT_CATEGORY: &str = "general";

/// Length of the hex id derived from the text digest
const ID_LEN: usize = 16;

/// Caller-supplied metadata for a stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMetadata {
    pub category: String,
    pub source: String,
    pub tags: BTreeSet<String>,
}

impl Default for RecordMetadata {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY.to_string(),
            source: "user".to_string(),
            tags: BTreeSet::new(),
        }
    }
}

/// A stored knowledge snippet with its embedding
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub text: String,
    pub category: String,
    pub source: String,
    pub tags: BTreeSet<String>,
    pub stored_at: DateTime<Utc>,
}

/// One search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: Record,
    pub score: f32,
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub categories: Vec<String>,
    pub documents_per_category: BTreeMap<String, usize>,
}

/// Category a record is filed under; blank means `DEFAULT_CATEGORY`
pub fn effective_category(category: &str) -> &str {
    if category.trim().is_empty() {
        DEFAULT_CATEGORY
    } else {
        category
    }
}

/// Content-addressed id: first 16 hex chars of the MD5 digest of `text`
///
/// MD5 serves only as a deduplication key here, never for integrity.
pub fn content_id(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(ID_LEN);
    hex
}

/// In-memory store with a category index
#[derive(Debug, Default)]
pub struct VectorStore {
    /// Records in first-insertion order (ties in search keep this order)
    records: Vec<Record>,
    /// id -> position in `records`
    positions: HashMap<String, usize>,
    /// category -> ids, kept in step with `records`
    categories: BTreeMap<String, Vec<String>>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `text`, returning its id
    pub fn store(&mut self, text: &str, metadata: RecordMetadata, embedding: Vec<f32>) -> String {
        let id = content_id(text);
        let category = effective_category(&metadata.category).to_string();

        let record = Record {
            id: id.clone(),
            embedding,
            text: text.to_string(),
            category: category.clone(),
            source: metadata.source,
            tags: metadata.tags,
            stored_at: Utc::now(),
        };

        match self.positions.get(&id) {
            Some(&pos) => {
                let previous = std::mem::replace(&mut self.records[pos], record);
                if previous.category != category {
                    self.unindex(&previous.category, &id);
                }
            }
            None => {
                self.positions.insert(id.clone(), self.records.len());
                self.records.push(record);
            }
        }

        let bucket = self.categories.entry(category).or_default();
        if !bucket.contains(&id) {
            bucket.push(id.clone());
        }

        id
    }

    fn unindex(&mut self, category: &str, id: &str) {
        if let Some(bucket) = self.categories.get_mut(category) {
            bucket.retain(|existing| existing != id);
            if bucket.is_empty() {
                self.categories.remove(category);
            }
        }
    }

    /// Top-`top_k` records by cosine similarity, best first
    pub fn search_similar(&self, query: &[f32], top_k: usize) -> Vec<SearchHit> {
        if top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, record)| (pos, cosine_similarity(query, &record.embedding)))
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(pos, score)| SearchHit {
                record: self.records[pos].clone(),
                score,
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    /// All records in `category` (empty when the category is unknown)
    pub fn get_by_category(&self, category: &str) -> Vec<Record> {
        self.categories
            .get(category)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_documents: self.records.len(),
            categories: self.categories.keys().cloned().collect(),
            documents_per_category: self
                .categories
                .iter()
                .map(|(category, ids)| (category.clone(), ids.len()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.positions.clear();
        self.categories.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn meta(category: &str) -> RecordMetadata {
        RecordMetadata {
            category: category.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_content_id_is_md5_prefix() {
        // md5("hello") = 5d41402abc4b2a76b9719d911017c592
        assert_eq!(content_id("hello"), "5d41402abc4b2a76");
        assert_eq!(content_id("hello").len(), 16);
    }

    #[test]
    fn test_store_is_idempotent_on_text() {
        let mut store = VectorStore::new();
        let first = store.store("same text", meta("risk"), vec![1.0, 0.0]);
        let second = store.store("same text", meta("risk"), vec![1.0, 0.0]);

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().documents_per_category["risk"], 1);
        assert_eq!(store.get_by_category("risk").len(), 1);
    }

    #[test]
    fn test_restore_moves_category() {
        let mut store = VectorStore::new();
        let id = store.store("movable", meta("risk"), vec![1.0]);
        store.store("movable", meta("compliance"), vec![1.0]);

        let stats = store.stats();
        assert_eq!(stats.total_documents, 1);
        assert_eq!(stats.categories, vec!["compliance".to_string()]);
        assert_eq!(store.get(&id).unwrap().category, "compliance");
    }

    #[test]
    fn test_blank_category_defaults_to_general() {
        let mut store = VectorStore::new();
        store.store("x", meta(""), vec![1.0]);
        assert_eq!(store.stats().categories, vec!["general".to_string()]);
    }

    #[test]
    fn test_search_returns_sorted() {
        let mut store = VectorStore::new();
        store.store("far away", meta("a"), vec![0.0, 1.0, 0.0]);
        store.store("very close", meta("a"), vec![1.0, 0.0, 0.0]);
        store.store("medium", meta("a"), vec![0.5, 0.5, 0.0]);

        let results = store.search_similar(&[1.0, 0.0, 0.0], 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].record.text, "very close");
        assert_eq!(results[1].record.text, "medium");
        assert_eq!(results[2].record.text, "far away");
        assert_relative_eq!(results[0].score, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_search_respects_k() {
        let mut store = VectorStore::new();
        store.store("a", meta("x"), vec![1.0, 0.0]);
        store.store("b", meta("x"), vec![0.9, 0.1]);
        store.store("c", meta("x"), vec![0.8, 0.2]);

        for k in 0..5 {
            let results = store.search_similar(&[1.0, 0.0], k);
            assert_eq!(results.len(), k.min(3));
            for pair in results.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut store = VectorStore::new();
        store.store("first", meta("x"), vec![1.0, 0.0]);
        store.store("second", meta("x"), vec![2.0, 0.0]);
        store.store("third", meta("x"), vec![3.0, 0.0]);

        let results = store.search_similar(&[1.0, 0.0], 3);
        let texts: Vec<&str> = results.iter().map(|h| h.record.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_zero_embedding_scores_zero() {
        let mut store = VectorStore::new();
        store.store("empty", meta("x"), vec![0.0, 0.0]);
        store.store("real", meta("x"), vec![0.0, 1.0]);

        let results = store.search_similar(&[0.0, 1.0], 2);
        assert_eq!(results[0].record.text, "real");
        assert_eq!(results[1].score, 0.0);

        let results = store.search_similar(&[0.0, 0.0], 2);
        assert!(results.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn test_empty_search() {
        let store = VectorStore::new();
        assert!(store.search_similar(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_get_by_unknown_category() {
        let store = VectorStore::new();
        assert!(store.get_by_category("nothing").is_empty());
    }

    #[test]
    fn test_clear() {
        let mut store = VectorStore::new();
        store.store("hello", meta("x"), vec![1.0]);
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn test_effective_category() {
        assert_eq!(effective_category("risk"), "risk");
        assert_eq!(effective_category("  "), DEFAULT_CATEGORY);
        assert_eq!(effective_category(""), DEFAULT_CATEGORY);
    }
}
