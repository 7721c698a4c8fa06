//! Configuration for Jarvis
//!
//! Resolution order:
//! 1. Explicit path passed on the command line
//! 2. `./jarvis.toml` if present
//! 3. Built-in defaults
//!
//! Environment variables are applied last and win over file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "jarvis.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub ollama: OllamaConfig,
    pub knowledge: KnowledgeConfig,
}

/// HTTP API listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Model server (Ollama) connection and generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Try the model server before the extractive fallback
    pub enabled: bool,
    pub base_url: String,
    /// Model requested by the operator; `None` picks from `preferred_models`
    pub model: Option<String>,
    /// Preference order used when no model is requested
    pub preferred_models: Vec<String>,
    /// Smaller models tried, in order, after a generation timeout
    pub degraded_models: Vec<String>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub degraded_timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub degraded_max_tokens: u32,
    pub availability_attempts: u32,
    /// Sleep step between availability attempts (1x, 2x, ...)
    pub retry_backoff_ms: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: None,
            preferred_models: vec![
                "llama2:7b".to_string(),
                "mistral:instruct".to_string(),
                "mistral".to_string(),
                "phi".to_string(),
                "tinyllama".to_string(),
            ],
            degraded_models: vec![
                "tinyllama".to_string(),
                "phi".to_string(),
                "llama2:7b".to_string(),
            ],
            connect_timeout_secs: 10,
            read_timeout_secs: 180,
            degraded_timeout_secs: 30,
            temperature: 0.7,
            max_tokens: 512,
            degraded_max_tokens: 128,
            availability_attempts: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl OllamaConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn degraded_timeout(&self) -> Duration {
        Duration::from_secs(self.degraded_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Which embedder backs the knowledge store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Deterministic feature hashing, no model required
    Hashing,
    /// `/api/embeddings` on the model server
    Ollama,
}

/// Knowledge base settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub embedder: EmbedderKind,
    /// Embedding dimension for the hashing embedder
    pub dimension: usize,
    /// Model used by the Ollama embedder
    pub embedding_model: String,
    /// Hits must score above this to be used as context
    pub relevance_threshold: f32,
    /// Hits retrieved per query
    pub top_k: usize,
    /// Seed the built-in enterprise facts at startup
    pub seed: bool,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            embedder: EmbedderKind::Hashing,
            dimension: 384,
            embedding_model: "all-minilm".to_string(),
            relevance_threshold: 0.3,
            top_k: 3,
            seed: true,
        }
    }
}

/// Endpoint paths are appended with a leading `/`
fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

impl Config {
    /// Load configuration, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::from_file(&local)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config TOML: {}", path.display()))?;
        config.ollama.base_url = normalize_base_url(&config.ollama.base_url);
        Ok(config)
    }

    /// Apply `JARVIS_*` overrides using the given variable lookup
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = var("JARVIS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("JARVIS_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("JARVIS_PORT is not a valid port: {}", port))?;
        }
        if let Some(url) = var("JARVIS_OLLAMA_URL") {
            self.ollama.base_url = normalize_base_url(&url);
        }
        if let Some(model) = var("JARVIS_OLLAMA_MODEL") {
            self.ollama.model = if model.is_empty() { None } else { Some(model) };
        }
        if let Some(enabled) = var("JARVIS_USE_OLLAMA") {
            self.ollama.enabled = matches!(
                enabled.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_match_model_server_constants() {
        let config = Config::default();
        assert_eq!(config.ollama.base_url, "http://localhost:11434");
        assert_eq!(config.ollama.preferred_models[0], "llama2:7b");
        assert_eq!(config.ollama.preferred_models.len(), 5);
        assert_eq!(config.ollama.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.ollama.read_timeout(), Duration::from_secs(180));
        assert_eq!(config.ollama.degraded_timeout(), Duration::from_secs(30));
        assert_eq!(config.ollama.availability_attempts, 3);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.knowledge.dimension, 384);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[ollama]
base_url = "http://gpu-box:11434"
max_tokens = 256

[knowledge]
embedder = "ollama"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");
        assert_eq!(config.ollama.max_tokens, 256);
        assert_eq!(config.ollama.read_timeout_secs, 180);
        assert_eq!(config.knowledge.embedder, EmbedderKind::Ollama);
        assert!((config.knowledge.relevance_threshold - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_file_base_url_loses_trailing_slash() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ollama]\nbase_url = \"http://gpu-box:11434/\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("JARVIS_PORT", "8181"),
            ("JARVIS_OLLAMA_URL", "http://10.0.0.2:11434/"),
            ("JARVIS_OLLAMA_MODEL", ""),
            ("JARVIS_USE_OLLAMA", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 8181);
        assert_eq!(config.ollama.base_url, "http://10.0.0.2:11434");
        assert_eq!(config.ollama.model, None);
        assert!(!config.ollama.enabled);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "JARVIS_PORT").then(|| "eighty".to_string()));
        assert!(result.is_err());
    }
}
