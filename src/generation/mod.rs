//! Answer generation backends
//!
//! Two implementations share the `GenerationBackend` capability:
//! - `OllamaBackend` (primary): HTTP client for a local model server with
//!   streaming retry and smaller-model fallback
//! - `ExtractiveBackend` (secondary): network-free extractive answers that
//!   never fail
//!
//! Every failure is a `GenerationError` value, never a panic, so the
//! orchestrator can decide what to do by matching on the kind.

pub mod extractive;
pub mod ollama;

pub use extractive::{AnswerExtractor, ExtractiveBackend, LexicalExtractor, TextGenerator};
pub use ollama::OllamaBackend;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which backend produced (or should produce) an answer
///
/// Wire names match the model runtimes: `ollama` for the model server,
/// `distilbert` for the extractive fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "ollama")]
    Primary,
    #[serde(rename = "distilbert")]
    Secondary,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Primary => "ollama",
            BackendKind::Secondary => "distilbert",
        }
    }

    /// Parse a wire name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(BackendKind::Primary),
            "distilbert" => Some(BackendKind::Secondary),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub query: &'a str,
    /// Retrieved knowledge; empty when nothing relevant was found
    pub context: &'a str,
    pub system_prompt: Option<&'a str>,
}

/// A successful generation
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub elapsed_secs: f64,
    pub tokens_used: u64,
    /// True when a degraded path (smaller model) produced the text
    pub used_fallback: bool,
}

/// Why a generation attempt failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("model server is not available")]
    Unavailable,

    #[error("request timed out")]
    Timeout,

    #[error("model server returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("all fallback models failed")]
    Exhausted,

    #[error("model error: {0}")]
    Model(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout
        } else if err.is_decode() {
            GenerationError::Decode(err.to_string())
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

/// Shared generation capability
pub trait GenerationBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Generation, GenerationError>;
}

/// Extra surface of the model-server backend used for status and switching
pub trait PrimaryBackend: GenerationBackend {
    /// Result of the last availability probe
    fn is_available(&self) -> bool;

    /// Model currently used for generation
    fn model(&self) -> String;

    /// Models the server reports right now (empty if unreachable)
    fn list_models(&self) -> Vec<String>;

    /// Switch model if the server reports it; returns whether it switched
    fn change_model(&self, model: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_wire_names() {
        assert_eq!(BackendKind::parse("Ollama"), Some(BackendKind::Primary));
        assert_eq!(BackendKind::parse(" distilbert "), Some(BackendKind::Secondary));
        assert_eq!(BackendKind::parse("gpt"), None);
        assert_eq!(
            serde_json::to_string(&BackendKind::Secondary).unwrap(),
            "\"distilbert\""
        );
    }
}
