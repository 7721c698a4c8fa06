//! Jarvis HTTP API
//!
//! Design: blocking HTTP microserver, one thread per connection (no async).
//! Request handling lives in `internal` and is transport-free so it can be
//! exercised without sockets.

mod internal;
pub mod microserver;

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::create_embedder;
use crate::generation::extractive::ExtractiveBackend;
use crate::generation::ollama::OllamaBackend;
use crate::generation::PrimaryBackend;
use crate::knowledge::KnowledgeRepository;
use crate::orchestrator::ResponseOrchestrator;

pub use internal::{answer_query, route_request};
use microserver::HttpResponse;

/// Idle connections are dropped after this long
const STREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for all connections
pub struct AppState {
    pub knowledge: KnowledgeRepository,
    pub orchestrator: ResponseOrchestrator,
    /// Hits must score above this to become context
    pub relevance_threshold: f32,
    pub top_k: usize,
    pub version: String,
    start_time: Instant,
}

impl AppState {
    pub fn new(
        knowledge: KnowledgeRepository,
        orchestrator: ResponseOrchestrator,
        relevance_threshold: f32,
        top_k: usize,
    ) -> Self {
        Self {
            knowledge,
            orchestrator,
            relevance_threshold,
            top_k,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    /// Build the embedder, seed the knowledge base and connect the backends
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(config)?;
        let knowledge = KnowledgeRepository::new(embedder);

        if config.knowledge.seed {
            let seeded = knowledge
                .initialize()
                .context("Failed to seed knowledge base")?;
            info!(count = seeded, "Knowledge base initialized");
        }

        let primary: Option<Box<dyn PrimaryBackend>> = if config.ollama.enabled {
            Some(Box::new(OllamaBackend::connect(&config.ollama)?))
        } else {
            info!("Ollama disabled by configuration");
            None
        };

        let orchestrator = ResponseOrchestrator::new(primary, ExtractiveBackend::default());

        Ok(Self::new(
            knowledge,
            orchestrator,
            config.knowledge.relevance_threshold,
            config.knowledge.top_k,
        ))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Read one request, route it and write the response
pub fn handle_connection(stream: &mut (impl Read + Write), state: &AppState) {
    let response = match microserver::read_request(stream) {
        Some(Ok(request)) => route_request(&request, state),
        Some(Err(msg)) => {
            let status = if msg.contains("too large") { 413 } else { 400 };
            HttpResponse::json(status, &serde_json::json!({ "error": msg }))
        }
        None => return,
    };

    microserver::write_response(stream, &response);
}

/// Bind the configured address
pub fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{}:{}", host, port);
    TcpListener::bind(&addr).with_context(|| format!("Failed to bind {}", addr))
}

/// Accept connections until the listener fails
pub fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!(%addr, "Jarvis API listening");

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    let _ = stream.set_read_timeout(Some(STREAM_TIMEOUT));
                    handle_connection(&mut stream, &state);
                    let _ = stream.shutdown(Shutdown::Write);
                });
            }
            Err(e) => warn!(error = %e, "TCP accept error"),
        }
    }

    Ok(())
}
