//! Wire types and pure helpers for the model-server client

use serde::{Deserialize, Serialize};

use crate::config::OllamaConfig;

/// Used when the server reports no models at all
pub const FALLBACK_MODEL: &str = "llama2:7b";

/// Output budget for `tiny`-family models
const TINY_MAX_TOKENS: u32 = 256;

/// Default system prompt when the caller supplies none
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Jarvis, an AI assistant for enterprise governance, risk, and compliance (GRC). Provide helpful, accurate responses based on the context.";

/// `POST /api/generate` body
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

/// Sampling options understood by the model server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
}

/// `POST /api/generate` response, or one line of a streamed response
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub eval_count: u64,
    #[serde(default)]
    pub done: bool,
}

/// `GET /api/tags` response
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
pub struct ModelTag {
    pub name: String,
}

/// Parameters tuned per model family
pub fn generation_params(config: &OllamaConfig, model: &str, prompt: &str) -> GenerateRequest {
    let mut options = GenerateOptions {
        temperature: config.temperature,
        num_predict: config.max_tokens,
        num_ctx: None,
    };

    if model.contains("llama2") {
        options.num_ctx = Some(4096);
    } else if model.contains("mistral") {
        options.num_ctx = Some(8192);
    } else if model.contains("tiny") {
        options.num_predict = TINY_MAX_TOKENS;
    }

    GenerateRequest {
        model: model.to_string(),
        prompt: prompt.to_string(),
        stream: false,
        options,
    }
}

/// Pick the model to generate with
///
/// An explicit request wins. Otherwise the first preferred model the server
/// reports, then the first model it reports, then `FALLBACK_MODEL`.
pub fn select_model(requested: Option<&str>, preferred: &[String], available: &[String]) -> String {
    if let Some(model) = requested {
        return model.to_string();
    }

    preferred
        .iter()
        .find(|model| available.contains(model))
        .or_else(|| available.first())
        .cloned()
        .unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

/// Assemble system prompt, optional context and question into one prompt
pub fn build_prompt(query: &str, context: &str, system_prompt: Option<&str>) -> String {
    let system_prompt = system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT);

    if context.trim().is_empty() {
        format!("{}\n\nQuestion: {}\n\nAnswer:", system_prompt, query)
    } else {
        format!(
            "{}\n\nContext information:\n{}\n\nBased on the context above, answer the following question:\n\nQuestion: {}\n\nAnswer:",
            system_prompt, context, query
        )
    }
}

/// Concatenate the `response` fragments of a newline-delimited JSON stream
///
/// Lines that do not parse are skipped; a `done` line ends the stream.
pub fn collect_stream(lines: impl Iterator<Item = std::io::Result<String>>) -> std::io::Result<(String, u64)> {
    let mut text = String::new();
    let mut tokens = 0;

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Ok(chunk) = serde_json::from_str::<GenerateResponse>(&line) else {
            continue;
        };
        text.push_str(&chunk.response);
        if chunk.done {
            tokens = chunk.eval_count;
            break;
        }
    }

    Ok((text, tokens))
}
