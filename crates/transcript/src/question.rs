use crate::{AudioSource, AggregatorConfig, CanonicalSegment};

/// Data-driven question-detection heuristics.
///
/// Kept as plain data (lead words, label conventions) rather than inline
/// branches so deployments can tune them and tests can exercise them in
/// isolation.
#[derive(Debug, Clone)]
pub struct QuestionRules {
    interviewer_source: AudioSource,
    first_speaker_label: String,
    lead_words: Vec<String>,
}

impl QuestionRules {
    pub fn from_config(config: &AggregatorConfig) -> Self {
        Self {
            interviewer_source: config.interviewer_source,
            first_speaker_label: config.first_speaker_label.clone(),
            lead_words: config
                .question_lead_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
        }
    }

    /// Whether a segment is attributed to the interviewer: the speaker label
    /// names the role, or matches the conventional first-speaker slot, or the
    /// segment arrived on the path the interviewer's voice conventionally
    /// takes for this deployment.
    pub fn is_interviewer(&self, speaker: Option<&str>, source: AudioSource) -> bool {
        if let Some(label) = speaker {
            if label.to_lowercase().contains("interviewer") {
                return true;
            }
            if label == self.first_speaker_label {
                return true;
            }
        }
        source == self.interviewer_source
    }

    /// Whether raw (un-normalized) text reads as a question: trailing `?` or
    /// a configured lead word.
    pub fn is_question(&self, raw_text: &str) -> bool {
        let trimmed = raw_text.trim();
        if trimmed.is_empty() {
            return false;
        }
        if trimmed.ends_with('?') {
            return true;
        }
        let first_word = trimmed
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        self.lead_words.iter().any(|w| *w == first_word)
    }

    /// Final interviewer-authored segments that read as questions feed the
    /// question stream and, downstream, arm the coach.
    pub fn is_interviewer_question(&self, segment: &CanonicalSegment) -> bool {
        segment.is_final
            && self.is_interviewer(segment.speaker.as_deref(), segment.source)
            && self.is_question(&segment.text)
    }
}
