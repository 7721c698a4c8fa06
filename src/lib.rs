//! Jarvis - enterprise GRC question answering
//!
//! Retrieval over an in-memory knowledge base plus a two-tier generation
//! pipeline: a local model server when reachable, an extractive answerer
//! otherwise.

pub mod api;
pub mod classify;
pub mod client;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod knowledge;
pub mod orchestrator;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use classify::{QueryClassifier, Topic};
pub use config::Config;
pub use knowledge::KnowledgeRepository;
pub use orchestrator::ResponseOrchestrator;
