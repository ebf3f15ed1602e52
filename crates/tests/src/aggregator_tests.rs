use std::sync::Arc;

use crosstalk_transcript::{
    AggregatorConfig, AudioSource, TranscriptAggregator,
};

use crate::fixtures::events::{final_event, labeled_event, partial_event, with_words};
use crate::fixtures::{drain, init_tracing};

fn aggregator() -> Arc<TranscriptAggregator> {
    init_tracing();
    TranscriptAggregator::new(AggregatorConfig {
        echo_window_ms: 500,
        partial_window_ms: 5000,
        stale_timeout_ms: 10_000,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn echo_within_window_is_suppressed() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(final_event(AudioSource::Microphone, "Hello how are you", 0));
    agg.ingest(final_event(AudioSource::SystemAudio, "Hello how are you", 100));

    assert_eq!(drain(&mut updates).len(), 1);
}

#[test]
fn identical_text_outside_window_is_not_suppressed() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(final_event(AudioSource::Microphone, "Hello how are you", 0));
    agg.ingest(final_event(AudioSource::SystemAudio, "Hello how are you", 600));

    assert_eq!(drain(&mut updates).len(), 2);
}

#[test]
fn echo_check_counts_containment_as_match() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(final_event(
        AudioSource::SystemAudio,
        "Could you walk me through your resume",
        0,
    ));
    // The mic caught only a fragment of the same utterance.
    agg.ingest(final_event(AudioSource::Microphone, "through your resume", 200));

    assert_eq!(drain(&mut updates).len(), 1);
}

#[test]
fn dissimilar_simultaneous_text_is_never_suppressed() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(final_event(AudioSource::Microphone, "The weather is nice today", 0));
    agg.ingest(final_event(
        AudioSource::SystemAudio,
        "What is your favorite programming language",
        100,
    ));

    assert_eq!(drain(&mut updates).len(), 2);
}

#[test]
fn same_source_repeat_is_not_echo() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(final_event(AudioSource::Microphone, "Yes", 0));
    agg.ingest(final_event(AudioSource::Microphone, "Yes", 100));

    // Same source within the partial window but both final; the second has
    // no open partial to collapse into and is a genuine repeat.
    assert_eq!(drain(&mut updates).len(), 2);
}

#[test]
fn partial_then_final_collapse_keeps_identity() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(partial_event(AudioSource::Microphone, "Hello", 0));
    agg.ingest(final_event(AudioSource::Microphone, "Hello world", 100));

    let emitted = drain(&mut updates);
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].segment_id, emitted[1].segment_id);
    assert_eq!(emitted[0].version, 1);
    assert!(!emitted[0].segment.is_final);
    assert_eq!(emitted[1].version, 2);
    assert!(emitted[1].segment.is_final);
    assert_eq!(emitted[1].segment.text, "Hello world");
}

#[test]
fn versions_increase_across_repeated_revisions() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(partial_event(AudioSource::Microphone, "I", 0));
    agg.ingest(partial_event(AudioSource::Microphone, "I worked", 50));
    agg.ingest(partial_event(AudioSource::Microphone, "I worked on", 120));
    agg.ingest(final_event(AudioSource::Microphone, "I worked on billing", 300));

    let versions: Vec<u64> = drain(&mut updates).iter().map(|u| u.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);
}

#[test]
fn different_speakers_never_collapse() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(labeled_event(AudioSource::SystemAudio, "spk_a", "I agree", 0, false));
    agg.ingest(labeled_event(AudioSource::SystemAudio, "spk_b", "I agree", 100, false));

    let emitted = drain(&mut updates);
    assert_eq!(emitted.len(), 2);
    assert_ne!(emitted[0].segment_id, emitted[1].segment_id);
}

#[test]
fn confidence_is_kept_when_revision_omits_it() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    let mut first = partial_event(AudioSource::Microphone, "Hello", 0);
    first.confidence = Some(0.9);
    agg.ingest(first);
    agg.ingest(final_event(AudioSource::Microphone, "Hello world", 100));

    let emitted = drain(&mut updates);
    assert_eq!(emitted[1].segment.confidence, Some(0.9));
}

#[test]
fn word_timings_drive_segment_bounds() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    let event = with_words(
        final_event(AudioSource::Microphone, "Hello world", 1000),
        &[("Hello", 980, 1200), ("world", 1250, 1600)],
    );
    agg.ingest(event);

    let emitted = drain(&mut updates);
    assert_eq!(emitted[0].segment.start_ms, Some(980));
    assert_eq!(emitted[0].segment.end_ms, Some(1600));
}

#[test]
fn empty_and_punctuation_only_text_is_dropped() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(final_event(AudioSource::Microphone, "   ", 0));
    agg.ingest(final_event(AudioSource::Microphone, "...", 10));

    assert!(drain(&mut updates).is_empty());
    assert!(agg.final_segments().is_empty());
}

#[test]
fn stale_partial_is_force_finalized() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(partial_event(AudioSource::SystemAudio, "trailing thought", 1000));
    agg.sweep_stale(12_000);

    let emitted = drain(&mut updates);
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[1].segment_id, emitted[0].segment_id);
    assert_eq!(emitted[1].version, 2);
    assert!(emitted[1].segment.is_final);

    // Already final; a later sweep must not touch it again.
    agg.sweep_stale(30_000);
    assert!(drain(&mut updates).is_empty());
}

#[test]
fn fresh_partial_survives_the_sweep() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(partial_event(AudioSource::SystemAudio, "still talking", 5000));
    agg.sweep_stale(9000);

    assert_eq!(drain(&mut updates).len(), 1);
    assert!(agg.final_segments().is_empty());
}

#[test]
fn interviewer_question_fires_exactly_once() {
    let agg = aggregator();
    let mut questions = agg.subscribe_questions();

    // Default deployment convention: system audio carries the interviewer.
    agg.ingest(final_event(AudioSource::SystemAudio, "What is a lifetime?", 0));

    let fired = drain(&mut questions);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].segment.text, "What is a lifetime?");
}

#[test]
fn partial_question_does_not_fire() {
    let agg = aggregator();
    let mut questions = agg.subscribe_questions();

    agg.ingest(partial_event(AudioSource::SystemAudio, "What is a lifetime?", 0));

    assert!(drain(&mut questions).is_empty());
}

#[test]
fn candidate_statement_does_not_fire() {
    let agg = aggregator();
    let mut questions = agg.subscribe_questions();

    agg.ingest(labeled_event(
        AudioSource::Microphone,
        "spk_candidate",
        "I mostly use Rust at work.",
        0,
        true,
    ));

    assert!(drain(&mut questions).is_empty());
}

#[test]
fn lead_word_question_without_punctuation_fires() {
    let agg = aggregator();
    let mut questions = agg.subscribe_questions();

    agg.ingest(final_event(
        AudioSource::SystemAudio,
        "Tell me about your last project",
        0,
    ));

    assert_eq!(drain(&mut questions).len(), 1);
}

#[test]
fn interviewer_label_on_mic_source_fires() {
    let agg = aggregator();
    let mut questions = agg.subscribe_questions();

    agg.ingest(labeled_event(
        AudioSource::Microphone,
        "Interviewer",
        "Why did you leave?",
        0,
        true,
    ));

    assert_eq!(drain(&mut questions).len(), 1);
}

#[test]
fn stale_finalized_question_still_fires() {
    let agg = aggregator();
    let mut questions = agg.subscribe_questions();

    agg.ingest(partial_event(
        AudioSource::SystemAudio,
        "Could you explain the tradeoffs?",
        0,
    ));
    agg.sweep_stale(20_000);

    assert_eq!(drain(&mut questions).len(), 1);
}

#[test]
fn dropped_subscriber_does_not_affect_others() {
    let agg = aggregator();
    let mut keeper = agg.subscribe_updates();
    let leaver = agg.subscribe_updates();

    agg.ingest(final_event(AudioSource::Microphone, "first", 0));
    drop(leaver);
    agg.ingest(final_event(AudioSource::Microphone, "second", 2000));

    assert_eq!(drain(&mut keeper).len(), 2);
}

#[test]
fn buffer_cap_evicts_oldest_first() {
    init_tracing();
    let agg = TranscriptAggregator::new(AggregatorConfig {
        max_buffer_size: 2,
        echo_window_ms: 500,
        ..Default::default()
    })
    .unwrap();

    agg.ingest(final_event(AudioSource::Microphone, "oldest", 0));
    agg.ingest(final_event(AudioSource::Microphone, "middle", 10_000));
    agg.ingest(final_event(AudioSource::Microphone, "newest", 20_000));

    let finals = agg.final_segments();
    assert_eq!(finals.len(), 2);
    assert_eq!(finals[0].segment.text, "middle");
    assert_eq!(finals[1].segment.text, "newest");
}

#[test]
fn reset_clears_echo_memory() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.ingest(final_event(AudioSource::SystemAudio, "Hello how are you", 0));
    agg.reset();
    agg.ingest(final_event(AudioSource::Microphone, "Hello how are you", 100));

    // Pre-reset state must not suppress the re-ingested text.
    assert_eq!(drain(&mut updates).len(), 2);
    assert_eq!(agg.final_segments().len(), 1);
}

#[test]
fn destroyed_aggregator_ignores_ingest() {
    let agg = aggregator();
    let mut updates = agg.subscribe_updates();

    agg.destroy();
    agg.ingest(final_event(AudioSource::Microphone, "after the end", 0));

    assert!(drain(&mut updates).is_empty());
    assert!(agg.final_segments().is_empty());
}

#[test]
fn segments_by_source_filters_and_orders() {
    let agg = aggregator();

    agg.ingest(final_event(AudioSource::Microphone, "answer two", 10_000));
    agg.ingest(final_event(AudioSource::SystemAudio, "question one", 0));
    agg.ingest(final_event(AudioSource::Microphone, "answer one", 5000));

    let mic = agg.segments_by_source(AudioSource::Microphone);
    assert_eq!(mic.len(), 2);
    assert_eq!(mic[0].segment.text, "answer one");
    assert_eq!(mic[1].segment.text, "answer two");
}
