//! Wire types of the HTTP API, shared by the server and the client

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::knowledge::KnowledgeHit;
use crate::orchestrator::{StatsSnapshot, StatusReport};
use crate::store::StoreStats;

/// `POST /query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub message: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_backend: Option<String>,
}

fn default_user_id() -> String {
    "enterprise_user".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub sources: Vec<String>,
    pub category: String,
    pub backend: String,
    pub model: String,
    pub response_time_seconds: f64,
    pub fallback_used: bool,
    pub tokens_used: u64,
    pub timestamp: String,
}

/// `POST /llm/switch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchRequest {
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchResponse {
    pub success: bool,
    pub message: String,
    pub backend: String,
}

/// `POST /knowledge`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRequest {
    pub text: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_category() -> String {
    crate::store::DEFAULT_CATEGORY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeResponse {
    pub success: bool,
    pub message: String,
    pub doc_id: String,
    pub category: String,
}

/// `GET /search/{query}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<KnowledgeHit>,
}

/// `POST /feedback`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub query: String,
    pub response: String,
    pub rating: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub thank_you: bool,
    pub message: String,
    pub rating: i32,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: String,
    pub llm_details: LlmDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmDetails {
    pub primary_backend: String,
    pub primary_available: bool,
    pub secondary_available: bool,
}

/// `GET /stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub knowledge_base: StoreStats,
    pub llm_system: LlmSystemStats,
    pub uptime_secs: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSystemStats {
    pub current_backend: String,
    pub primary_available: bool,
    pub query_stats: StatsSnapshot,
}

/// `GET /llm/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStatusResponse {
    pub status: StatusReport,
    pub timestamp: String,
    pub recommendation: String,
}

/// `GET /categories`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
    pub counts: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_defaults() {
        let request: QueryRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(request.user_id, "enterprise_user");
        assert!(request.force_backend.is_none());
    }

    #[test]
    fn test_knowledge_request_defaults() {
        let request: KnowledgeRequest = serde_json::from_str(r#"{"text":"x"}"#).unwrap();
        assert_eq!(request.category, "general");
        assert!(request.tags.is_empty());
    }
}
