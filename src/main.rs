use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use jarvis::client::JarvisClient;

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Enterprise GRC assistant with local LLM fallback", long_about = None)]
struct Cli {
    /// Address of a running Jarvis API
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the knowledge base and run the HTTP API
    Serve {
        /// Host to bind to (default from config: 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (default from config: 8000)
        #[arg(long)]
        port: Option<u16>,

        /// Config file (default: ./jarvis.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip the model server and answer extractively
        #[arg(long)]
        no_ollama: bool,
    },

    /// Ask a question
    Ask {
        /// The question
        message: String,

        /// Force a backend for this and later queries (ollama, distilbert)
        #[arg(long)]
        backend: Option<String>,
    },

    /// Search the knowledge base
    Search {
        query: String,

        /// Maximum results
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Add a fact to the knowledge base
    Add {
        text: String,

        #[arg(long, default_value = "general")]
        category: String,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List knowledge categories with document counts
    Categories,

    /// Show LLM backend status and query statistics
    Status,

    /// Switch the active backend
    Switch {
        /// ollama or distilbert
        backend: String,

        /// Model to activate on the model server
        #[arg(long)]
        model: Option<String>,
    },

    /// Check that the API is up
    Health,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = || JarvisClient::new(&cli.server);

    match cli.command {
        Commands::Serve {
            host,
            port,
            config,
            no_ollama,
        } => {
            commands::serve::execute(commands::serve::ServeOptions {
                host,
                port,
                config,
                no_ollama,
            })?;
        }
        Commands::Ask { message, backend } => {
            commands::ask::execute(&client()?, message, backend)?;
        }
        Commands::Search { query, limit } => {
            commands::knowledge::search(&client()?, &query, limit)?;
        }
        Commands::Add {
            text,
            category,
            tags,
        } => {
            commands::knowledge::add(&client()?, text, category, tags)?;
        }
        Commands::Categories => {
            commands::knowledge::categories(&client()?)?;
        }
        Commands::Status => {
            commands::llm::status(&client()?)?;
        }
        Commands::Switch { backend, model } => {
            commands::llm::switch(&client()?, backend, model)?;
        }
        Commands::Health => {
            commands::llm::health(&client()?)?;
        }
    }

    Ok(())
}
