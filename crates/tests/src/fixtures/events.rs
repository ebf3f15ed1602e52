use crosstalk_transcript::{AudioSource, RawTranscriptEvent, WordTiming};

pub fn final_event(source: AudioSource, text: &str, timestamp_ms: i64) -> RawTranscriptEvent {
    RawTranscriptEvent {
        source,
        text: text.to_string(),
        is_final: true,
        timestamp_ms,
        speaker: None,
        confidence: None,
        words: Vec::new(),
    }
}

pub fn partial_event(source: AudioSource, text: &str, timestamp_ms: i64) -> RawTranscriptEvent {
    RawTranscriptEvent {
        is_final: false,
        ..final_event(source, text, timestamp_ms)
    }
}

pub fn labeled_event(
    source: AudioSource,
    speaker: &str,
    text: &str,
    timestamp_ms: i64,
    is_final: bool,
) -> RawTranscriptEvent {
    RawTranscriptEvent {
        speaker: Some(speaker.to_string()),
        is_final,
        ..final_event(source, text, timestamp_ms)
    }
}

pub fn with_words(mut event: RawTranscriptEvent, words: &[(&str, i64, i64)]) -> RawTranscriptEvent {
    event.words = words
        .iter()
        .map(|(text, start_ms, end_ms)| WordTiming {
            text: text.to_string(),
            start_ms: *start_ms,
            end_ms: *end_ms,
            speaker: None,
        })
        .collect();
    event
}
