//! Embeddings served by the model server (`POST /api/embeddings`)

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Embedder;

/// Read timeout for a single embedding call
const EMBED_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by a locally running model server
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    http: HttpClient,
}

impl OllamaEmbedder {
    /// Connect and probe the model once to learn its dimension
    pub fn new(base_url: &str, model: &str, connect_timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .connect_timeout(connect_timeout)
            .timeout(EMBED_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        let mut embedder = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension: 0,
            http,
        };

        let probe = embedder
            .request("dimension probe")
            .with_context(|| format!("Embedding model '{}' is not usable", model))?;
        embedder.dimension = probe.len();

        Ok(embedder)
    }

    fn request(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .with_context(|| format!("Failed to reach model server at {}", self.base_url))?;

        if !response.status().is_success() {
            bail!("Embedding request failed: {}", response.status());
        }

        let body: EmbeddingResponse = response
            .json()
            .context("Failed to parse embedding response")?;

        if body.embedding.is_empty() {
            bail!("Model server returned an empty embedding");
        }

        Ok(body.embedding)
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.request(text)?;
        if embedding.len() != self.dimension {
            bail!(
                "Embedding dimension changed: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
