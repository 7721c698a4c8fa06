//! `jarvis serve` - seed the knowledge base and run the API

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use jarvis::config::Config;
use jarvis::server::{self, AppState};

/// Options for the serve command
#[derive(Debug, Default)]
pub struct ServeOptions {
    /// Overrides `server.host`
    pub host: Option<String>,
    /// Overrides `server.port`
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    /// Answer with the extractive backend only
    pub no_ollama: bool,
}

/// Command-line flags take precedence over file and environment
fn apply_flags(config: &mut Config, options: &ServeOptions) {
    if let Some(host) = &options.host {
        config.server.host = host.clone();
    }
    if let Some(port) = options.port {
        config.server.port = port;
    }
    if options.no_ollama {
        config.ollama.enabled = false;
    }
}

fn resolve_config(options: &ServeOptions) -> Result<Config> {
    let mut config = Config::load(options.config.as_deref())?;
    apply_flags(&mut config, options);
    Ok(config)
}

pub fn execute(options: ServeOptions) -> Result<()> {
    let config = resolve_config(&options)?;

    if config.server.host != "127.0.0.1" && config.server.host != "localhost" {
        eprintln!(
            "WARNING: Binding to {} exposes the API to the network.",
            config.server.host
        );
        eprintln!("  The server has no encryption (HTTP only). Use a reverse proxy for production.");
    }

    let state = Arc::new(AppState::from_config(&config)?);
    let listener = server::bind(&config.server.host, config.server.port)?;

    println!("🚀 Jarvis Enterprise API starting...");
    println!(
        "   Listening on http://{}:{}",
        config.server.host, config.server.port
    );
    println!(
        "   Active backend: {} ({} documents)",
        state.orchestrator.current_backend(),
        state.knowledge.stats().total_documents
    );
    println!("   Press Ctrl+C to stop\n");

    server::serve(listener, state)
}
