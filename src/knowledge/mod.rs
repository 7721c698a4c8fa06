//! Knowledge repository
//!
//! Wraps the vector store with an embedder and the built-in seed facts.
//! The store sits behind a read-write lock: searches run concurrently,
//! additions take the write lock only for the insert itself.

mod seed;

pub use seed::{SeedFact, SEED_FACTS};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embeddings::Embedder;
use crate::store::{Record, RecordMetadata, StoreStats, VectorStore};

/// Decimal places kept on reported scores
const SCORE_PRECISION: f32 = 1000.0;

/// A search hit reshaped for callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeHit {
    pub text: String,
    pub category: String,
    pub source: String,
    /// Cosine similarity rounded to 3 decimals
    pub score: f32,
    pub doc_id: String,
}

/// Knowledge store plus the embedder that feeds it
pub struct KnowledgeRepository {
    store: RwLock<VectorStore>,
    embedder: Box<dyn Embedder>,
}

impl KnowledgeRepository {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            store: RwLock::new(VectorStore::new()),
            embedder,
        }
    }

    /// Store the seed facts (re-running overwrites them in place)
    pub fn initialize(&self) -> Result<usize> {
        info!("Initializing knowledge base");

        for fact in SEED_FACTS {
            let id = self.add_knowledge(
                fact.text,
                fact.category,
                fact.source,
                fact.tags.iter().map(|t| t.to_string()),
            )?;
            debug!(category = fact.category, id = %id, "Seeded knowledge");
        }

        info!(items = SEED_FACTS.len(), "Knowledge base initialized");
        Ok(SEED_FACTS.len())
    }

    /// Embed and store `text`, returning its content id
    pub fn add_knowledge(
        &self,
        text: &str,
        category: &str,
        source: &str,
        tags: impl IntoIterator<Item = String>,
    ) -> Result<String> {
        let embedding = self
            .embedder
            .embed(text)
            .with_context(|| format!("Failed to embed knowledge with {}", self.embedder.model_name()))?;

        let metadata = RecordMetadata {
            category: category.to_string(),
            source: source.to_string(),
            tags: tags.into_iter().collect(),
        };

        Ok(self.store.write().store(text, metadata, embedding))
    }

    /// Top-`top_k` knowledge hits for a natural-language query
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeHit>> {
        let embedding = self
            .embedder
            .embed(query)
            .context("Failed to embed search query")?;

        let hits = self.store.read().search_similar(&embedding, top_k);

        Ok(hits
            .into_iter()
            .map(|hit| KnowledgeHit {
                score: round_score(hit.score),
                text: hit.record.text,
                category: hit.record.category,
                source: hit.record.source,
                doc_id: hit.record.id,
            })
            .collect())
    }

    pub fn get_by_category(&self, category: &str) -> Vec<Record> {
        self.store.read().get_by_category(category)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.read().stats()
    }

    pub fn clear(&self) {
        self.store.write().clear();
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.model_name()
    }
}

fn round_score(score: f32) -> f32 {
    (score * SCORE_PRECISION).round() / SCORE_PRECISION
}
