use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub aggregator: AggregatorSettings,
    pub coach: CoachSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregatorSettings {
    /// Time separation (ms) under which near-identical text from the other
    /// source is treated as the same utterance captured twice.
    pub echo_window_ms: i64,
    /// Token-set Jaccard similarity (0.0-1.0) above which two normalized
    /// texts are considered equivalent.
    pub similarity_threshold: f64,
    /// Window (ms) within which a same-source, same-speaker event updates an
    /// open partial instead of opening a new segment.
    pub partial_window_ms: i64,
    /// Hard cap on concurrently buffered segments.
    pub max_buffer_size: usize,
    /// How long (ms) an unfinished partial may sit before being force-finalized.
    pub stale_timeout_ms: i64,
    /// Interval (ms) of the background stale-partial sweep.
    pub sweep_interval_ms: u64,
    /// Which capture path conventionally carries the interviewer's voice:
    /// "system_audio" or "microphone".
    pub interviewer_source: String,
    /// Raw diarization label conventionally assigned to whoever spoke first.
    pub first_speaker_label: String,
    /// Leading words that mark a final segment as a question.
    pub question_lead_words: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoachSettings {
    /// Upper bound (ms) on a question-classification call before falling
    /// back to the unknown-category budget.
    pub classify_timeout_ms: u64,
    /// How long (ms) the presentation layer should keep a nudge visible.
    pub nudge_dismiss_after_ms: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("CROSSTALK"),
            )
            .set_default("aggregator.echo_window_ms", 2000)?
            .set_default("aggregator.similarity_threshold", 0.75)?
            .set_default("aggregator.partial_window_ms", 5000)?
            .set_default("aggregator.max_buffer_size", 100)?
            .set_default("aggregator.stale_timeout_ms", 10000)?
            .set_default("aggregator.sweep_interval_ms", 5000)?
            .set_default("aggregator.interviewer_source", "system_audio")?
            .set_default("aggregator.first_speaker_label", "speaker_0")?
            .set_default(
                "aggregator.question_lead_words",
                vec![
                    "what", "how", "why", "when", "where", "who", "can", "could",
                    "would", "tell", "describe", "explain",
                ],
            )?
            .set_default("coach.classify_timeout_ms", 1500)?
            .set_default("coach.nudge_dismiss_after_ms", 8000)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
