use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AudioSource;

/// Configuration for the transcript aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Time separation (ms) under which near-identical text from the other
    /// source is treated as echo of the same utterance.
    pub echo_window_ms: i64,
    /// Jaccard similarity (0.0-1.0) above which two normalized texts are
    /// considered equivalent.
    pub similarity_threshold: f64,
    /// Window (ms) within which a same-source, same-speaker event updates an
    /// open partial instead of opening a new segment.
    pub partial_window_ms: i64,
    /// Hard cap on concurrently buffered segments; oldest evicted first.
    pub max_buffer_size: usize,
    /// Age (ms) past which an unfinished partial is force-finalized.
    pub stale_timeout_ms: i64,
    /// Interval (ms) of the background stale-partial sweep.
    pub sweep_interval_ms: u64,
    /// The capture path conventionally carrying the interviewer's voice.
    pub interviewer_source: AudioSource,
    /// Raw diarization label conventionally assigned to the first speaker.
    pub first_speaker_label: String,
    /// Leading words that mark a final segment as a question.
    pub question_lead_words: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            echo_window_ms: 2000,
            similarity_threshold: 0.75,
            partial_window_ms: 5000,
            max_buffer_size: 100,
            stale_timeout_ms: 10_000,
            sweep_interval_ms: 5000,
            interviewer_source: AudioSource::SystemAudio,
            first_speaker_label: "speaker_0".to_string(),
            question_lead_words: [
                "what", "how", "why", "when", "where", "who", "can", "could",
                "would", "tell", "describe", "explain",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
        }
    }
}

/// Constructor-time misconfiguration. The one error this crate surfaces to
/// callers; everything at runtime is absorbed as a drop or a logged fallback.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("similarity_threshold must be within (0.0, 1.0], got {0}")]
    SimilarityThreshold(f64),
    #[error("{name} must be positive, got {value}")]
    NonPositiveWindow { name: &'static str, value: i64 },
    #[error("max_buffer_size must be at least 1")]
    ZeroBufferSize,
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::SimilarityThreshold(self.similarity_threshold));
        }
        for (name, value) in [
            ("echo_window_ms", self.echo_window_ms),
            ("partial_window_ms", self.partial_window_ms),
            ("stale_timeout_ms", self.stale_timeout_ms),
        ] {
            if value <= 0 {
                return Err(ConfigError::NonPositiveWindow { name, value });
            }
        }
        if self.max_buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        Ok(())
    }
}
