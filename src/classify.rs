//! Keyword-phrase query classifier
//!
//! A cheap deterministic bag-of-phrases classifier: each topic owns six
//! literal phrases and a query scores one point per phrase it contains.
//! The same table drives both the orchestrator's classification and the
//! extractive backend's lead-in selection.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Topics a query can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Governance,
    Risk,
    Compliance,
    Diligent,
    General,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Governance => "governance",
            Topic::Risk => "risk",
            Topic::Compliance => "compliance",
            Topic::Diligent => "diligent",
            Topic::General => "general",
        }
    }

    /// Parse a category name; anything unrecognised is `General`
    pub fn from_category(category: &str) -> Self {
        match category.trim().to_ascii_lowercase().as_str() {
            "governance" => Topic::Governance,
            "risk" => Topic::Risk,
            "compliance" => Topic::Compliance,
            "diligent" => Topic::Diligent,
            _ => Topic::General,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic -> phrases, in tie-break order. Phrases are lower-case because
/// matching runs against the lower-cased query.
pub const TOPIC_PHRASES: &[(Topic, [&str; 6])] = &[
    (
        Topic::Governance,
        [
            "board management",
            "director oversight",
            "meeting minutes",
            "committee structure",
            "corporate governance",
            "board evaluation",
        ],
    ),
    (
        Topic::Risk,
        [
            "risk assessment",
            "mitigation strategy",
            "risk appetite",
            "enterprise risk",
            "risk monitoring",
            "risk reporting",
        ],
    ),
    (
        Topic::Compliance,
        [
            "regulatory compliance",
            "sox requirements",
            "gdpr",
            "audit trail",
            "policy management",
            "compliance reporting",
        ],
    ),
    (
        Topic::Diligent,
        [
            "grc platform",
            "board portal",
            "risk management software",
            "compliance solution",
            "diligent products",
            "enterprise governance",
        ],
    ),
];

/// Outcome of classifying one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub primary_category: Topic,
    /// matched phrases / phrases for the winning topic; 0 for `General`
    pub confidence: f32,
    pub scores: BTreeMap<Topic, usize>,
}

/// Stateless classifier over `TOPIC_PHRASES`
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Score every topic and pick the best; ties go to the earlier topic
    pub fn classify(&self, query: &str) -> ClassificationResult {
        let lowered = query.to_lowercase();
        let mut scores = BTreeMap::new();
        let mut best: Option<(Topic, usize, usize)> = None;

        for (topic, phrases) in TOPIC_PHRASES {
            let count = phrases.iter().filter(|p| lowered.contains(*p)).count();
            scores.insert(*topic, count);

            if count > 0 && best.map_or(true, |(_, top, _)| count > top) {
                best = Some((*topic, count, phrases.len()));
            }
        }

        match best {
            Some((topic, count, total)) => ClassificationResult {
                primary_category: topic,
                confidence: count as f32 / total as f32,
                scores,
            },
            None => ClassificationResult {
                primary_category: Topic::General,
                confidence: 0.0,
                scores,
            },
        }
    }

    /// First topic in table order with any matching phrase
    pub fn first_match(&self, query: &str) -> Topic {
        let lowered = query.to_lowercase();
        TOPIC_PHRASES
            .iter()
            .find(|(_, phrases)| phrases.iter().any(|p| lowered.contains(p)))
            .map(|(topic, _)| *topic)
            .unwrap_or(Topic::General)
    }
}
