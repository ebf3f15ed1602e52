pub mod aggregator;
pub mod config;
pub mod question;
pub mod recorder;
pub mod speaker;
pub mod text;

pub use aggregator::TranscriptAggregator;
pub use config::AggregatorConfig;
pub use question::QuestionRules;
pub use recorder::{MemoryRecorder, SessionRecorder};
pub use speaker::{reconcile_speaker_roles, SpeakerRole, SpeakerRoleMap, SpeakerSegment};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which capture path an event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    /// The candidate's own microphone.
    Microphone,
    /// Loopback of the remote party (meeting/system audio).
    SystemAudio,
}

impl AudioSource {
    pub fn other(self) -> Self {
        match self {
            AudioSource::Microphone => AudioSource::SystemAudio,
            AudioSource::SystemAudio => AudioSource::Microphone,
        }
    }
}

/// Word-level timing as reported by the upstream STT provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub speaker: Option<String>,
}

/// One raw chunk from an upstream speech-to-text adapter.
///
/// Not retained after processing; the aggregator folds it into its own
/// segment buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTranscriptEvent {
    pub source: AudioSource,
    pub text: String,
    pub is_final: bool,
    pub timestamp_ms: i64,
    pub speaker: Option<String>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

/// The deduplicated, versioned view of a segment handed to subscribers.
///
/// Internal bookkeeping fields (normalized text, emission time) are stripped;
/// subscribers get an owned snapshot, never a live reference into the buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSegment {
    pub text: String,
    pub speaker: Option<String>,
    pub source: AudioSource,
    pub is_final: bool,
    pub timestamp_ms: i64,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

/// One emission on the canonical stream.
///
/// Consumers dedup by `(segment_id, version)`: a version lower than or equal
/// to the last one seen for the same id is stale and must be discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalUpdate {
    pub segment_id: Uuid,
    pub version: u64,
    pub segment: CanonicalSegment,
}
