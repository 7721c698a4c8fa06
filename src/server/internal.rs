//! Transport-free request handlers
//!
//! Business logic below this module's router never touches sockets; the
//! accept loop in `super` converts streams to `HttpRequest` and back.

use anyhow::Result;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, info, warn};

use super::microserver::{HttpRequest, HttpResponse};
use super::AppState;
use crate::api::{
    CategoriesResponse, FeedbackRequest, FeedbackResponse, HealthResponse, KnowledgeRequest,
    KnowledgeResponse, LlmDetails, LlmStatusResponse, LlmSystemStats, QueryRequest, QueryResponse,
    SearchResponse, StatsResponse, SwitchRequest, SwitchResponse,
};
use crate::generation::BackendKind;
use crate::store::effective_category;

/// Default and maximum result counts for `/search`
const DEFAULT_SEARCH_LIMIT: usize = 5;
const MAX_SEARCH_LIMIT: usize = 100;

/// Sources listed per answer
const MAX_SOURCES: usize = 3;

/// Context used when no knowledge hit is relevant enough
const GENERAL_CONTEXT: &str = "General enterprise knowledge.";
const GENERAL_SOURCE: &str = "General knowledge base";

/// Source tag for knowledge added over the API
const API_SOURCE: &str = "api";

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Consistent JSON error response
fn json_error(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, &json!({ "error": message }))
}

/// Add CORS and security headers to response
fn with_common_headers(response: HttpResponse) -> HttpResponse {
    response
        .with_header("Access-Control-Allow-Origin", "*")
        .with_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .with_header("Access-Control-Allow-Headers", "Content-Type")
        .with_header("X-Content-Type-Options", "nosniff")
}

/// Split a request target into path and decoded query parameters
fn split_target(target: &str) -> (&str, Vec<(String, String)>) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_query_component(key), decode_query_component(value))
        })
        .collect();
    (path, params)
}

/// Percent-decode a path segment; `+` is literal in paths
fn decode_path_segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Query strings are form-encoded: `+` means space
fn decode_query_component(raw: &str) -> String {
    decode_path_segment(&raw.replace('+', " "))
}

fn parse_body<T: DeserializeOwned>(request: &HttpRequest) -> Result<T, HttpResponse> {
    if request.body.is_empty() {
        return Err(json_error(400, "Missing request body"));
    }
    serde_json::from_slice(&request.body).map_err(|e| json_error(400, &format!("Invalid JSON: {}", e)))
}

/// Route request to handler
pub fn route_request(request: &HttpRequest, state: &AppState) -> HttpResponse {
    let (path, params) = split_target(&request.path);

    let response = match (request.method.as_str(), path) {
        ("OPTIONS", _) => HttpResponse::empty(204),
        ("GET", "/") => handle_root(state),
        ("GET", "/health") => handle_health(state),
        ("GET", "/stats") => handle_stats(state),
        ("GET", "/llm/status") => handle_llm_status(state),
        ("POST", "/llm/switch") => handle_switch(request, state),
        ("POST", "/query") => handle_query(request, state),
        ("POST", "/knowledge") => handle_add_knowledge(request, state),
        ("POST", "/feedback") => handle_feedback(request),
        ("GET", "/categories") => handle_categories(state),
        ("GET", p) if p.starts_with("/search/") => {
            handle_search(&p["/search/".len()..], &params, state)
        }
        (
            _,
            "/" | "/health" | "/stats" | "/llm/status" | "/llm/switch" | "/query" | "/knowledge"
            | "/feedback" | "/categories",
        ) => json_error(405, "Method not allowed"),
        _ => json_error(404, "Not found"),
    };

    with_common_headers(response)
}

/// Handle GET /
fn handle_root(state: &AppState) -> HttpResponse {
    HttpResponse::json(
        200,
        &json!({
            "service": "Jarvis Enterprise API",
            "status": "operational",
            "version": state.version,
            "ai_backends": [BackendKind::Primary, BackendKind::Secondary],
            "active_backend": state.orchestrator.current_backend(),
            "endpoints": [
                "/query - Ask questions",
                "/llm/status - LLM system status",
                "/llm/switch - Switch AI backend",
                "/knowledge - Add knowledge",
                "/search/{query} - Search knowledge base",
                "/categories - Knowledge categories",
                "/feedback - Rate an answer",
                "/stats - System statistics",
                "/health - Health check"
            ]
        }),
    )
}

/// Handle GET /health
fn handle_health(state: &AppState) -> HttpResponse {
    HttpResponse::json(
        200,
        &HealthResponse {
            status: "healthy".to_string(),
            version: state.version.clone(),
            uptime_secs: state.uptime_secs(),
            timestamp: timestamp(),
            llm_details: LlmDetails {
                primary_backend: state.orchestrator.current_backend().to_string(),
                primary_available: state.orchestrator.primary_available(),
                secondary_available: true,
            },
        },
    )
}

/// Handle GET /stats
fn handle_stats(state: &AppState) -> HttpResponse {
    HttpResponse::json(
        200,
        &StatsResponse {
            knowledge_base: state.knowledge.stats(),
            llm_system: LlmSystemStats {
                current_backend: state.orchestrator.current_backend().to_string(),
                primary_available: state.orchestrator.primary_available(),
                query_stats: state.orchestrator.stats(),
            },
            uptime_secs: state.uptime_secs(),
            timestamp: timestamp(),
        },
    )
}

/// Handle GET /llm/status
fn handle_llm_status(state: &AppState) -> HttpResponse {
    let status = state.orchestrator.status();
    let recommendation = if status.primary_available {
        "Use Ollama for better quality responses"
    } else {
        "Using DistilBERT (Ollama not available)"
    };

    HttpResponse::json(
        200,
        &LlmStatusResponse {
            status,
            timestamp: timestamp(),
            recommendation: recommendation.to_string(),
        },
    )
}

/// Handle POST /llm/switch
fn handle_switch(request: &HttpRequest, state: &AppState) -> HttpResponse {
    let body: SwitchRequest = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };

    let Some(backend) = BackendKind::parse(&body.backend) else {
        return json_error(400, "Invalid backend. Use 'ollama' or 'distilbert'");
    };

    let outcome = state
        .orchestrator
        .switch_to(backend, body.model_name.as_deref().filter(|m| !m.is_empty()));

    HttpResponse::json(
        200,
        &SwitchResponse {
            success: outcome.success,
            message: outcome.message,
            backend: outcome.backend.to_string(),
        },
    )
}

/// Handle POST /query
fn handle_query(request: &HttpRequest, state: &AppState) -> HttpResponse {
    let body: QueryRequest = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };

    if body.message.trim().is_empty() {
        return json_error(400, "Message must not be empty");
    }

    match answer_query(&body, state) {
        Ok(answer) => HttpResponse::json(200, &answer),
        Err(e) => {
            error!(error = %e, "Query failed");
            json_error(500, &format!("Error processing query: {}", e))
        }
    }
}

/// Classify, retrieve, generate and assemble the answer with its sources
pub fn answer_query(request: &QueryRequest, state: &AppState) -> Result<QueryResponse> {
    if let Some(forced) = request.force_backend.as_deref() {
        match BackendKind::parse(forced) {
            Some(backend) => {
                state.orchestrator.switch_to(backend, None);
            }
            None => warn!(backend = forced, "Ignoring unknown force_backend"),
        }
    }

    let classification = state.orchestrator.classify(&request.message);
    let hits = state.knowledge.search(&request.message, state.top_k)?;

    let relevant: Vec<_> = hits
        .iter()
        .filter(|hit| hit.score > state.relevance_threshold)
        .collect();

    let context = if relevant.is_empty() {
        GENERAL_CONTEXT.to_string()
    } else {
        relevant
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let mut sources: Vec<String> = relevant
        .iter()
        .take(MAX_SOURCES)
        .map(|hit| format!("{} ({:.2})", hit.category, hit.score))
        .collect();
    if sources.is_empty() {
        sources.push(GENERAL_SOURCE.to_string());
    }

    let outcome = state.orchestrator.generate_response(
        &request.message,
        &context,
        classification.primary_category,
    );

    info!(
        user = %request.user_id,
        category = %classification.primary_category,
        backend = %outcome.backend,
        elapsed = outcome.elapsed_seconds,
        "Answered query"
    );

    Ok(QueryResponse {
        response: outcome.text,
        sources,
        category: classification.primary_category.to_string(),
        backend: outcome.backend.to_string(),
        model: outcome.model,
        response_time_seconds: outcome.elapsed_seconds,
        fallback_used: outcome.used_fallback,
        tokens_used: outcome.tokens_used,
        timestamp: timestamp(),
    })
}

/// Handle POST /knowledge
fn handle_add_knowledge(request: &HttpRequest, state: &AppState) -> HttpResponse {
    let body: KnowledgeRequest = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };

    if body.text.trim().is_empty() {
        return json_error(400, "Text must not be empty");
    }

    let category = effective_category(&body.category);

    match state
        .knowledge
        .add_knowledge(&body.text, category, API_SOURCE, body.tags)
    {
        Ok(doc_id) => HttpResponse::json(
            200,
            &KnowledgeResponse {
                success: true,
                message: "Knowledge added successfully".to_string(),
                doc_id,
                category: category.to_string(),
            },
        ),
        Err(e) => json_error(500, &format!("Error adding knowledge: {}", e)),
    }
}

/// Handle GET /search/{query}?limit=N
fn handle_search(raw_query: &str, params: &[(String, String)], state: &AppState) -> HttpResponse {
    let query = decode_path_segment(raw_query);
    if query.trim().is_empty() {
        return json_error(400, "Search query must not be empty");
    }

    let limit = match params.iter().find(|(key, _)| key == "limit") {
        Some((_, value)) => match value.parse::<usize>() {
            Ok(limit) => limit.min(MAX_SEARCH_LIMIT),
            Err(_) => return json_error(400, &format!("Invalid limit: {}", value)),
        },
        None => DEFAULT_SEARCH_LIMIT,
    };

    match state.knowledge.search(&query, limit) {
        Ok(results) => HttpResponse::json(
            200,
            &SearchResponse {
                count: results.len(),
                query,
                results,
            },
        ),
        Err(e) => json_error(500, &format!("Search failed: {}", e)),
    }
}

/// Handle POST /feedback (logged, not stored)
fn handle_feedback(request: &HttpRequest) -> HttpResponse {
    let body: FeedbackRequest = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };

    info!(
        rating = body.rating,
        feedback = body.feedback.as_deref().unwrap_or(""),
        query = %body.query,
        "Feedback received"
    );

    HttpResponse::json(
        200,
        &FeedbackResponse {
            thank_you: true,
            message: "Feedback recorded for model improvement".to_string(),
            rating: body.rating,
        },
    )
}

/// Handle GET /categories
fn handle_categories(state: &AppState) -> HttpResponse {
    let stats = state.knowledge.stats();
    HttpResponse::json(
        200,
        &CategoriesResponse {
            categories: stats.categories,
            counts: stats.documents_per_category,
        },
    )
}
