//! Secondary backend: extractive answers with no network dependency
//!
//! With context, the answer is the passage span an `AnswerExtractor` picks,
//! behind a topic-specific lead-in. Without context, an optional
//! `TextGenerator` writes a short reply. Every failure degrades to a canned
//! sentence, so `answer` always returns text.

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, warn};

use super::{BackendKind, Generation, GenerationBackend, GenerationError, GenerationRequest};
use crate::classify::{QueryClassifier, Topic};

/// Model id reported for answers from this backend
pub const MODEL_ID: &str = "distilbert-base-uncased";

/// Context beyond this many characters is ignored
const MAX_CONTEXT_CHARS: usize = 2000;

/// Maximum generated length for the no-context path
const MAX_GENERATED_LEN: usize = 150;
const GENERATION_TEMPERATURE: f32 = 0.7;

const RESPONSE_MARKER: &str = "Provide a concise, professional response:";

/// Returned when extraction fails on a non-empty context
pub const EXTRACTION_APOLOGY: &str = "Unable to generate answer from context.";

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "what", "which", "who", "how", "why", "when", "does", "with",
    "that", "this", "our", "your", "you", "can", "should", "about", "from", "into", "has", "have",
    "was", "were", "been", "its", "their", "there", "best", "tell",
];

/// Extractive question answering over a context passage
pub trait AnswerExtractor: Send + Sync {
    fn extract(&self, question: &str, context: &str) -> Result<String>;
}

/// Short free-form text generation
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, max_length: usize, temperature: f32) -> Result<String>;
}

/// Picks the context sentence sharing the most content words with the question
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalExtractor;

impl AnswerExtractor for LexicalExtractor {
    fn extract(&self, question: &str, context: &str) -> Result<String> {
        let sentences = split_sentences(context);
        if sentences.is_empty() {
            bail!("context has no sentences");
        }

        let wanted = content_words(question);
        let mut best = (0, sentences[0]);
        for sentence in &sentences {
            let overlap = content_words(sentence).intersection(&wanted).count();
            if overlap > best.0 {
                best = (overlap, sentence);
            }
        }

        Ok(best.1.to_string())
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        if matches!(c, '.' | '?' | '!' | '\n') {
            let end = idx + c.len_utf8();
            // decimals such as "2.5" are not sentence ends
            let next_is_digit = text[end..].chars().next().is_some_and(|n| n.is_ascii_digit());
            if c == '.' && next_is_digit {
                continue;
            }
            let sentence = text[start..end].trim();
            if sentence.chars().any(char::is_alphanumeric) {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if tail.chars().any(char::is_alphanumeric) {
        sentences.push(tail);
    }

    sentences
}

fn content_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Lead-in phrase prepended to answers for each topic
pub fn lead_in(topic: Topic) -> &'static str {
    match topic {
        Topic::Governance => "As a governance expert at Diligent, I recommend: ",
        Topic::Risk => "For enterprise risk management, best practices include: ",
        Topic::Compliance => "Compliance requirements typically involve: ",
        Topic::Diligent => "Diligent's GRC solutions provide: ",
        Topic::General => "Based on enterprise best practices: ",
    }
}

/// Truncate to at most `max` characters on a char boundary
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Always-available answer generator
pub struct ExtractiveBackend {
    classifier: QueryClassifier,
    extractor: Box<dyn AnswerExtractor>,
    generator: Option<Box<dyn TextGenerator>>,
}

impl ExtractiveBackend {
    pub fn new(extractor: Box<dyn AnswerExtractor>, generator: Option<Box<dyn TextGenerator>>) -> Self {
        Self {
            classifier: QueryClassifier::new(),
            extractor,
            generator,
        }
    }

    /// Answer `query`; never fails
    pub fn answer(&self, query: &str, context: &str) -> String {
        let topic = self.classifier.first_match(query);
        let prefix = lead_in(topic);

        if !context.trim().is_empty() {
            let passage = truncate_chars(context, MAX_CONTEXT_CHARS);
            return match self.extractor.extract(query, passage) {
                Ok(span) => format!("{}{}", prefix, span),
                Err(e) => {
                    warn!(error = %e, "Extractive QA failed");
                    EXTRACTION_APOLOGY.to_string()
                }
            };
        }

        let fallback = || {
            format!(
                "{}implementing robust processes and using technology solutions like Diligent's platform.",
                prefix
            )
        };

        let Some(generator) = &self.generator else {
            debug!("No text generator configured, using template");
            return fallback();
        };

        let prompt = format!(
            "You are Jarvis, an enterprise AI assistant for Diligent.\nQuery: {}\nCategory: {}\n\n{}",
            query, topic, RESPONSE_MARKER
        );

        match generator.generate(&prompt, MAX_GENERATED_LEN, GENERATION_TEMPERATURE) {
            Ok(generated) => {
                let reply = generated
                    .rsplit(RESPONSE_MARKER)
                    .next()
                    .unwrap_or_default()
                    .trim();
                if reply.is_empty() {
                    fallback()
                } else {
                    reply.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "Text generation failed");
                fallback()
            }
        }
    }
}

impl Default for ExtractiveBackend {
    fn default() -> Self {
        Self::new(Box::new(LexicalExtractor), None)
    }
}

impl GenerationBackend for ExtractiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Secondary
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Generation, GenerationError> {
        let start = Instant::now();
        let text = self.answer(request.query, request.context);
        Ok(Generation {
            text,
            model: MODEL_ID.to_string(),
            elapsed_secs: start.elapsed().as_secs_f64(),
            tokens_used: 0,
            used_fallback: false,
        })
    }
}
