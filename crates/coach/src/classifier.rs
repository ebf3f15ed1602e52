use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::budget::QuestionKind;

/// Result of classifying a detected question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub kind: QuestionKind,
    pub confidence: f64,
    /// Optional per-question override of the category's target seconds.
    pub recommended_secs: Option<u64>,
}

/// Trait for pluggable question classifiers.
///
/// Production deployments back this with an LLM call; the coach bounds every
/// call with a timeout and falls back to [`QuestionKind::Unknown`] on error
/// or timeout, so a slow classifier can never stall the state machine.
#[async_trait]
pub trait QuestionClassifier: Send + Sync + 'static {
    async fn classify(&self, text: &str) -> anyhow::Result<Classification>;

    /// Human-readable classifier name.
    fn name(&self) -> &str;
}

/// Lead-phrase heuristic classifier, the default and test implementation.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn match_kind(text: &str) -> (QuestionKind, f64) {
        let lower = text.to_lowercase();
        let contains_any =
            |phrases: &[&str]| phrases.iter().any(|phrase| lower.contains(phrase));

        if contains_any(&["introduce yourself", "about yourself", "your background"]) {
            return (QuestionKind::SelfIntroduction, 0.85);
        }
        if contains_any(&["tell me about a time", "a situation where", "a conflict", "disagree"]) {
            return (QuestionKind::Behavioral, 0.8);
        }
        if contains_any(&["design a", "design an", "architecture", "how would you scale"]) {
            return (QuestionKind::SystemDesign, 0.8);
        }
        if contains_any(&["complexity", "this code", "your solution", "algorithm"]) {
            return (QuestionKind::CodingExplanation, 0.7);
        }
        if contains_any(&["your project", "you built", "you worked on", "deep dive"]) {
            return (QuestionKind::ProjectDeepDive, 0.7);
        }
        // Short questions tend to expect short answers.
        if lower.split_whitespace().count() <= 6 {
            return (QuestionKind::QuickAnswer, 0.55);
        }
        (QuestionKind::Unknown, 0.3)
    }
}

#[async_trait]
impl QuestionClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> anyhow::Result<Classification> {
        let (kind, confidence) = Self::match_kind(text);
        Ok(Classification {
            kind,
            confidence,
            recommended_secs: None,
        })
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
