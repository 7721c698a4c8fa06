//! Response orchestration
//!
//! Classify -> (caller retrieves context) -> generate with the primary
//! backend -> fall back to the extractive backend on any primary failure.
//! One orchestrator instance is shared by all request threads; its
//! selection lives behind a lock and its counters are atomics.

mod prompts;

pub use prompts::system_prompt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

use crate::classify::{ClassificationResult, QueryClassifier, Topic};
use crate::generation::{
    extractive, BackendKind, ExtractiveBackend, GenerationBackend, GenerationRequest, PrimaryBackend,
};

/// Models listed in status reports
const STATUS_MODEL_LIMIT: usize = 5;

/// Characters of the query echoed into logs
const LOG_QUERY_CHARS: usize = 50;

/// Result of one orchestrated generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub text: String,
    pub backend: BackendKind,
    pub model: String,
    pub elapsed_seconds: f64,
    pub tokens_used: u64,
    pub used_fallback: bool,
    pub succeeded: bool,
}

/// Process-wide counters, only ever incremented
#[derive(Debug, Default)]
struct Stats {
    total_queries: AtomicU64,
    primary_successes: AtomicU64,
    primary_failures: AtomicU64,
    fallbacks_used: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_queries: u64,
    pub primary_successes: u64,
    pub primary_failures: u64,
    pub fallbacks_used: u64,
}

impl Stats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            primary_successes: self.primary_successes.load(Ordering::Relaxed),
            primary_failures: self.primary_failures.load(Ordering::Relaxed),
            fallbacks_used: self.fallbacks_used.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of an explicit backend switch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchOutcome {
    pub success: bool,
    pub message: String,
    /// Backend in effect after the switch attempt
    pub backend: BackendKind,
}

/// Orchestrator status report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub current_backend: BackendKind,
    pub primary_available: bool,
    pub primary_model: Option<String>,
    pub secondary_available: bool,
    pub stats: StatsSnapshot,
    pub available_models: Vec<String>,
}

/// Ties classification and the two generation backends together
pub struct ResponseOrchestrator {
    primary: Option<Box<dyn PrimaryBackend>>,
    secondary: ExtractiveBackend,
    classifier: QueryClassifier,
    selected: Mutex<BackendKind>,
    stats: Stats,
}

impl ResponseOrchestrator {
    /// `primary` is `None` when the model server is disabled by configuration
    pub fn new(primary: Option<Box<dyn PrimaryBackend>>, secondary: ExtractiveBackend) -> Self {
        let selected = match &primary {
            Some(backend) if backend.is_available() => BackendKind::Primary,
            _ => BackendKind::Secondary,
        };
        info!(backend = %selected, "Primary LLM selected");

        Self {
            primary,
            secondary,
            classifier: QueryClassifier::new(),
            selected: Mutex::new(selected),
            stats: Stats::default(),
        }
    }

    pub fn classify(&self, query: &str) -> ClassificationResult {
        self.classifier.classify(query)
    }

    /// Backend that will be tried first for the next query
    pub fn current_backend(&self) -> BackendKind {
        *self.selected.lock()
    }

    pub fn primary_available(&self) -> bool {
        self.primary.as_ref().is_some_and(|p| p.is_available())
    }

    /// Generate an answer; always succeeds because the secondary cannot fail
    pub fn generate_response(&self, query: &str, context: &str, category: Topic) -> GenerationOutcome {
        self.stats.total_queries.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let preview: String = query.chars().take(LOG_QUERY_CHARS).collect();

        let request = GenerationRequest {
            query,
            context,
            system_prompt: Some(system_prompt(category)),
        };

        if let Some(primary) = self.active_primary() {
            info!(query = %preview, "Trying Ollama");

            match primary.generate(&request) {
                Ok(generation) => {
                    self.stats.primary_successes.fetch_add(1, Ordering::Relaxed);
                    return GenerationOutcome {
                        text: generation.text,
                        backend: primary.kind(),
                        model: generation.model,
                        elapsed_seconds: start.elapsed().as_secs_f64(),
                        tokens_used: generation.tokens_used,
                        used_fallback: generation.used_fallback,
                        succeeded: true,
                    };
                }
                Err(e) => {
                    self.stats.primary_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Ollama failed, falling back to DistilBERT");
                }
            }
        }

        self.stats.fallbacks_used.fetch_add(1, Ordering::Relaxed);
        info!(query = %preview, "Using DistilBERT fallback");

        // the extractive backend degrades to canned text instead of failing
        let (text, model) = match self.secondary.generate(&request) {
            Ok(generation) => (generation.text, generation.model),
            Err(e) => {
                warn!(error = %e, "DistilBERT failed");
                (
                    extractive::EXTRACTION_APOLOGY.to_string(),
                    extractive::MODEL_ID.to_string(),
                )
            }
        };

        GenerationOutcome {
            text,
            backend: self.secondary.kind(),
            model,
            elapsed_seconds: start.elapsed().as_secs_f64(),
            tokens_used: 0,
            used_fallback: true,
            succeeded: true,
        }
    }

    fn active_primary(&self) -> Option<&dyn PrimaryBackend> {
        if self.current_backend() != BackendKind::Primary {
            return None;
        }
        self.primary
            .as_deref()
            .filter(|primary| primary.is_available())
    }

    /// Explicitly select a backend, optionally changing the primary model
    pub fn switch_to(&self, backend: BackendKind, model: Option<&str>) -> SwitchOutcome {
        match backend {
            BackendKind::Secondary => {
                *self.selected.lock() = BackendKind::Secondary;
                info!("Switched to DistilBERT");
                SwitchOutcome {
                    success: true,
                    message: "Switched to DistilBERT".to_string(),
                    backend: BackendKind::Secondary,
                }
            }
            BackendKind::Primary => {
                let Some(primary) = self.primary.as_deref() else {
                    return self.switch_failed("Ollama is disabled in configuration.");
                };

                let switched = match model {
                    Some(model) => primary.change_model(model),
                    None => primary.is_available(),
                };

                if !switched {
                    return match model {
                        Some(model) => self.switch_failed(&format!(
                            "Model '{}' is not available on the Ollama server.",
                            model
                        )),
                        None => self.switch_failed("Ollama not available. Check if Ollama is running."),
                    };
                }

                *self.selected.lock() = BackendKind::Primary;
                let model = primary.model();
                info!(model = %model, "Switched to Ollama");
                SwitchOutcome {
                    success: true,
                    message: format!("Switched to Ollama with model: {}", model),
                    backend: BackendKind::Primary,
                }
            }
        }
    }

    fn switch_failed(&self, message: &str) -> SwitchOutcome {
        let backend = if self.active_primary().is_some() {
            BackendKind::Primary
        } else {
            BackendKind::Secondary
        };
        SwitchOutcome {
            success: false,
            message: message.to_string(),
            backend,
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn status(&self) -> StatusReport {
        let available_models = self
            .primary
            .as_ref()
            .map(|p| {
                let mut models = p.list_models();
                models.truncate(STATUS_MODEL_LIMIT);
                models
            })
            .unwrap_or_default();

        StatusReport {
            current_backend: self.current_backend(),
            primary_available: self.primary_available(),
            primary_model: self.primary.as_ref().map(|p| p.model()),
            secondary_available: true,
            stats: self.stats(),
            available_models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{Generation, GenerationError};
    use std::sync::Arc;

    /// Scriptable primary backend
    struct StubPrimary {
        available: bool,
        fail: bool,
        models: Vec<String>,
        model: Mutex<String>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl StubPrimary {
        fn new(available: bool, fail: bool) -> Self {
            Self {
                available,
                fail,
                models: vec!["mistral".into(), "phi".into(), "a".into(), "b".into(), "c".into(), "d".into()],
                model: Mutex::new("mistral".into()),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl GenerationBackend for StubPrimary {
        fn kind(&self) -> BackendKind {
            BackendKind::Primary
        }

        fn generate(&self, request: &GenerationRequest<'_>) -> Result<Generation, GenerationError> {
            self.prompts
                .lock()
                .push(request.system_prompt.unwrap_or_default().to_string());
            if self.fail {
                return Err(GenerationError::Timeout);
            }
            Ok(Generation {
                text: format!("primary answer to {}", request.query),
                model: self.model.lock().clone(),
                elapsed_secs: 0.1,
                tokens_used: 42,
                used_fallback: false,
            })
        }
    }

    impl PrimaryBackend for StubPrimary {
        fn is_available(&self) -> bool {
            self.available
        }

        fn model(&self) -> String {
            self.model.lock().clone()
        }

        fn list_models(&self) -> Vec<String> {
            self.models.clone()
        }

        fn change_model(&self, model: &str) -> bool {
            if self.available && self.models.iter().any(|m| m == model) {
                *self.model.lock() = model.to_string();
                true
            } else {
                false
            }
        }
    }

    fn orchestrator(primary: Option<StubPrimary>) -> ResponseOrchestrator {
        ResponseOrchestrator::new(
            primary.map(|p| Box::new(p) as Box<dyn PrimaryBackend>),
            ExtractiveBackend::default(),
        )
    }

    #[test]
    fn test_primary_success() {
        let orch = orchestrator(Some(StubPrimary::new(true, false)));
        assert_eq!(orch.current_backend(), BackendKind::Primary);

        let outcome = orch.generate_response("board evaluation?", "ctx", Topic::Governance);
        assert!(outcome.succeeded);
        assert_eq!(outcome.backend, BackendKind::Primary);
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.tokens_used, 42);

        let stats = orch.stats();
        assert_eq!(stats.total_queries, 1);
        assert_eq!(stats.primary_successes, 1);
        assert_eq!(stats.fallbacks_used, 0);
    }

    #[test]
    fn test_failing_primary_falls_back_every_time() {
        let orch = orchestrator(Some(StubPrimary::new(true, true)));

        for i in 1..=3 {
            let outcome = orch.generate_response("What is SOX?", "SOX mandates controls.", Topic::Compliance);
            assert!(outcome.succeeded);
            assert_eq!(outcome.backend, BackendKind::Secondary);
            assert!(outcome.used_fallback);
            assert_eq!(outcome.model, extractive::MODEL_ID);

            let stats = orch.stats();
            assert_eq!(stats.fallbacks_used, i);
            assert_eq!(stats.primary_failures, i);
            assert_eq!(stats.total_queries, i);
        }
    }

    #[test]
    fn test_system_prompt_follows_category() {
        let stub = StubPrimary::new(true, false);
        let prompts = Arc::clone(&stub.prompts);
        let orch = ResponseOrchestrator::new(Some(Box::new(stub)), ExtractiveBackend::default());

        orch.generate_response("q", "", Topic::Risk);
        orch.generate_response("q", "", Topic::Diligent);

        let seen = prompts.lock();
        assert_eq!(seen[0], system_prompt(Topic::Risk));
        assert_eq!(seen[1], system_prompt(Topic::General));
    }

    #[test]
    fn test_unavailable_primary_uses_secondary_without_failure_count() {
        let orch = orchestrator(Some(StubPrimary::new(false, false)));
        assert_eq!(orch.current_backend(), BackendKind::Secondary);

        let outcome = orch.generate_response("hello", "", Topic::General);
        assert_eq!(outcome.backend, BackendKind::Secondary);
        assert_eq!(orch.stats().primary_failures, 0);
        assert_eq!(orch.stats().fallbacks_used, 1);
    }

    /// Extractor that always answers with the same span
    struct FixedExtractor;

    impl extractive::AnswerExtractor for FixedExtractor {
        fn extract(&self, _question: &str, _context: &str) -> anyhow::Result<String> {
            Ok("quarterly board reviews".to_string())
        }
    }

    #[test]
    fn test_secondary_answers_through_generation_backend() {
        let secondary = ExtractiveBackend::new(Box::new(FixedExtractor), None);
        let orch = ResponseOrchestrator::new(None, secondary);

        let outcome = orch.generate_response(
            "How often should the board meet?",
            "Boards meet quarterly.",
            Topic::Governance,
        );
        assert_eq!(outcome.backend, BackendKind::Secondary);
        assert_eq!(outcome.model, extractive::MODEL_ID);
        assert!(outcome.text.ends_with("quarterly board reviews"));
        assert!(outcome.used_fallback);
        assert_eq!(outcome.tokens_used, 0);
    }

    #[test]
    fn test_switch_to_secondary_always_succeeds() {
        let orch = orchestrator(Some(StubPrimary::new(true, false)));
        let outcome = orch.switch_to(BackendKind::Secondary, None);
        assert!(outcome.success);
        assert_eq!(orch.current_backend(), BackendKind::Secondary);

        let generated = orch.generate_response("q", "", Topic::General);
        assert_eq!(generated.backend, BackendKind::Secondary);
        assert_eq!(orch.stats().primary_failures, 0);

        assert!(orch.switch_to(BackendKind::Primary, None).success);
        assert_eq!(orch.current_backend(), BackendKind::Primary);
    }

    #[test]
    fn test_switch_to_unavailable_primary_fails() {
        let orch = orchestrator(Some(StubPrimary::new(false, false)));
        let outcome = orch.switch_to(BackendKind::Primary, None);
        assert!(!outcome.success);
        assert_eq!(outcome.backend, BackendKind::Secondary);
        assert_eq!(orch.current_backend(), BackendKind::Secondary);

        let disabled = orchestrator(None);
        assert!(!disabled.switch_to(BackendKind::Primary, Some("phi")).success);
    }

    #[test]
    fn test_switch_model() {
        let orch = orchestrator(Some(StubPrimary::new(true, false)));
        let outcome = orch.switch_to(BackendKind::Primary, Some("phi"));
        assert!(outcome.success);
        assert!(outcome.message.ends_with("phi"));
        assert_eq!(orch.status().primary_model.as_deref(), Some("phi"));

        let missing = orch.switch_to(BackendKind::Primary, Some("gpt-4"));
        assert!(!missing.success);
        assert_eq!(missing.backend, BackendKind::Primary);
    }

    #[test]
    fn test_status_lists_first_five_models() {
        let orch = orchestrator(Some(StubPrimary::new(true, false)));
        let status = orch.status();
        assert_eq!(status.available_models.len(), 5);
        assert!(status.primary_available);
        assert!(status.secondary_available);
        assert_eq!(status.current_backend, BackendKind::Primary);

        let disabled = orchestrator(None).status();
        assert!(!disabled.primary_available);
        assert_eq!(disabled.primary_model, None);
        assert!(disabled.available_models.is_empty());
    }

    #[test]
    fn test_classify_delegates() {
        let orch = orchestrator(None);
        assert_eq!(orch.classify("gdpr audit trail").primary_category, Topic::Compliance);
    }
}
