//! Primary backend: client for a locally running Ollama model server
//!
//! Per request:
//! 1. Plain generation with the read timeout
//! 2. Non-200 -> one streamed retry with the same model
//! 3. Timeout -> smaller models in turn, short timeout, reduced output
//!
//! Attempt counts are fixed (3 availability probes, 1 streamed retry, at
//! most 3 smaller models) which bounds worst-case latency.

mod internal;

pub use internal::{build_prompt, generation_params, select_model, DEFAULT_SYSTEM_PROMPT};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use reqwest::blocking::Client as HttpClient;
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use self::internal::{collect_stream, GenerateRequest, GenerateResponse, TagsResponse};
use super::{
    BackendKind, Generation, GenerationBackend, GenerationError, GenerationRequest, PrimaryBackend,
};
use crate::config::OllamaConfig;

/// Model-server backed generation
pub struct OllamaBackend {
    config: OllamaConfig,
    http: HttpClient,
    model: RwLock<String>,
    available: AtomicBool,
}

impl OllamaBackend {
    /// Build the client, probe the server and pick a model
    ///
    /// An unreachable server is not an error: the backend is returned marked
    /// unavailable and the orchestrator falls back.
    pub fn connect(config: &OllamaConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        let backend = Self {
            config: config.clone(),
            http,
            model: RwLock::new(String::new()),
            available: AtomicBool::new(false),
        };

        let reported = backend.check_availability();
        let model = select_model(
            config.model.as_deref(),
            &config.preferred_models,
            reported.as_deref().unwrap_or(&[]),
        );

        match &reported {
            Some(_) => info!(model = %model, "Ollama available"),
            None => warn!(
                base_url = %config.base_url,
                "Ollama not available after {} attempts",
                config.availability_attempts
            ),
        }

        *backend.model.write() = model;
        Ok(backend)
    }

    /// Probe `GET /api/tags` with bounded retries; returns the reported models
    fn check_availability(&self) -> Option<Vec<String>> {
        let attempts = self.config.availability_attempts.max(1);

        for attempt in 1..=attempts {
            match self.fetch_models() {
                Ok(models) => {
                    self.available.store(true, Ordering::SeqCst);
                    return Some(models);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Ollama availability check failed");
                    if attempt < attempts {
                        std::thread::sleep(self.config.retry_backoff() * attempt);
                    }
                }
            }
        }

        self.available.store(false, Ordering::SeqCst);
        None
    }

    fn fetch_models(&self) -> Result<Vec<String>, GenerationError> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(self.config.connect_timeout())
            .send()?;

        if !response.status().is_success() {
            return Err(GenerationError::Status(response.status().as_u16()));
        }

        let tags: TagsResponse = response.json()?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn post_generate(
        &self,
        request: &GenerateRequest,
        timeout: Duration,
    ) -> Result<reqwest::blocking::Response, GenerationError> {
        let url = format!("{}/api/generate", self.config.base_url);
        Ok(self.http.post(&url).json(request).timeout(timeout).send()?)
    }

    /// Retry once with a streamed response, concatenating fragments
    fn try_streaming(&self, model: &str, prompt: &str) -> Result<Generation, GenerationError> {
        let start = Instant::now();
        let mut request = generation_params(&self.config, model, prompt);
        request.stream = true;

        let response = self.post_generate(&request, self.config.read_timeout())?;
        if !response.status().is_success() {
            return Err(GenerationError::Status(response.status().as_u16()));
        }

        let (text, tokens_used) = collect_stream(BufReader::new(response).lines())
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Generation {
            text: text.trim().to_string(),
            model: format!("{} (stream)", model),
            elapsed_secs: start.elapsed().as_secs_f64(),
            tokens_used,
            used_fallback: false,
        })
    }

    /// After a timeout, try each smaller model with a short budget
    fn try_smaller_models(&self, current: &str, prompt: &str) -> Result<Generation, GenerationError> {
        for model in self.config.degraded_models.iter().filter(|m| *m != current) {
            info!(model = %model, "Trying smaller model");
            let start = Instant::now();

            let mut request = generation_params(&self.config, model, prompt);
            request.options.num_predict = self.config.degraded_max_tokens;

            let response = match self.post_generate(&request, self.config.degraded_timeout()) {
                Ok(response) if response.status().is_success() => response,
                Ok(response) => {
                    debug!(model = %model, status = %response.status(), "Smaller model failed");
                    continue;
                }
                Err(e) => {
                    debug!(model = %model, error = %e, "Smaller model failed");
                    continue;
                }
            };

            match response.json::<GenerateResponse>() {
                Ok(body) => {
                    return Ok(Generation {
                        text: body.response.trim().to_string(),
                        model: format!("{} (fallback)", model),
                        elapsed_secs: start.elapsed().as_secs_f64(),
                        tokens_used: body.eval_count,
                        used_fallback: true,
                    })
                }
                Err(e) => debug!(model = %model, error = %e, "Smaller model returned bad JSON"),
            }
        }

        Err(GenerationError::Exhausted)
    }
}

impl GenerationBackend for OllamaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Primary
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Generation, GenerationError> {
        if !self.is_available() {
            return Err(GenerationError::Unavailable);
        }

        let model = self.model();
        let prompt = build_prompt(request.query, request.context, request.system_prompt);
        let params = generation_params(&self.config, &model, &prompt);
        let start = Instant::now();

        match self.post_generate(&params, self.config.read_timeout()) {
            Ok(response) if response.status().is_success() => {
                let body: GenerateResponse = response.json()?;
                Ok(Generation {
                    text: body.response.trim().to_string(),
                    model,
                    elapsed_secs: start.elapsed().as_secs_f64(),
                    tokens_used: body.eval_count,
                    used_fallback: false,
                })
            }
            Ok(response) => {
                warn!(model = %model, status = %response.status(), "Ollama generation failed, retrying with streaming");
                self.try_streaming(&model, &prompt)
            }
            Err(GenerationError::Timeout) => {
                warn!(model = %model, "Ollama generation timed out");
                self.try_smaller_models(&model, &prompt)
            }
            Err(e) => Err(e),
        }
    }
}

impl PrimaryBackend for OllamaBackend {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn model(&self) -> String {
        self.model.read().clone()
    }

    fn list_models(&self) -> Vec<String> {
        self.fetch_models().unwrap_or_default()
    }

    fn change_model(&self, model: &str) -> bool {
        match self.fetch_models() {
            Ok(models) if models.iter().any(|m| m == model) => {
                self.available.store(true, Ordering::SeqCst);
                *self.model.write() = model.to_string();
                info!(model, "Ollama model changed");
                true
            }
            Ok(_) => {
                warn!(model, "Model not installed on Ollama server");
                false
            }
            Err(e) => {
                warn!(model, error = %e, "Cannot change model");
                false
            }
        }
    }
}
