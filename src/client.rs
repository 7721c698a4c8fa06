//! Blocking client for a running Jarvis API

use anyhow::{bail, Context, Result};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::api::{
    CategoriesResponse, FeedbackRequest, FeedbackResponse, HealthResponse, KnowledgeRequest,
    KnowledgeResponse, LlmStatusResponse, QueryRequest, QueryResponse, SearchResponse,
    StatsResponse, SwitchRequest, SwitchResponse,
};

/// Long enough for a primary generation that hits its own read timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(240);

/// Jarvis API client
pub struct JarvisClient {
    base_url: String,
    http: HttpClient,
}

/// Accept `host:port`, `http://host:port` or `https://...`, trailing slash optional
fn normalize_base_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

impl JarvisClient {
    pub fn new(address: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: normalize_base_url(address),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .with_context(|| format!("Failed to connect to Jarvis at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("GET {} failed ({}): {}", path, status, body);
        }

        response
            .json::<T>()
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("POST {} failed ({}): {}", path, status, body);
        }

        response
            .json::<T>()
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    pub fn health(&self) -> Result<HealthResponse> {
        self.get("/health")
    }

    pub fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.post("/query", request)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<SearchResponse> {
        let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC);
        self.get(&format!("/search/{}?limit={}", encoded, limit))
    }

    pub fn add_knowledge(&self, request: &KnowledgeRequest) -> Result<KnowledgeResponse> {
        self.post("/knowledge", request)
    }

    pub fn llm_status(&self) -> Result<LlmStatusResponse> {
        self.get("/llm/status")
    }

    pub fn switch(&self, request: &SwitchRequest) -> Result<SwitchResponse> {
        self.post("/llm/switch", request)
    }

    pub fn stats(&self) -> Result<StatsResponse> {
        self.get("/stats")
    }

    pub fn categories(&self) -> Result<CategoriesResponse> {
        self.get("/categories")
    }

    pub fn feedback(&self, request: &FeedbackRequest) -> Result<FeedbackResponse> {
        self.post("/feedback", request)
    }
}
