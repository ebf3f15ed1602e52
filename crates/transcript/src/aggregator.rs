use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AggregatorConfig, ConfigError};
use crate::question::QuestionRules;
use crate::text::{normalize, texts_match};
use crate::{AudioSource, CanonicalSegment, CanonicalUpdate, RawTranscriptEvent, WordTiming};

/// One tracked utterance in the aggregator's buffer.
///
/// `id` is assigned at creation and never changes; `version` goes up by one
/// on every in-place mutation; `normalized_text` is re-derived from `text`
/// on every mutation.
#[derive(Debug, Clone)]
struct Segment {
    id: Uuid,
    version: u64,
    text: String,
    normalized_text: String,
    speaker: Option<String>,
    source: AudioSource,
    is_final: bool,
    timestamp_ms: i64,
    start_ms: Option<i64>,
    end_ms: Option<i64>,
    confidence: Option<f64>,
    words: Vec<WordTiming>,
    emitted_at_ms: Option<i64>,
}

impl Segment {
    fn canonical(&self) -> CanonicalSegment {
        CanonicalSegment {
            text: self.text.clone(),
            speaker: self.speaker.clone(),
            source: self.source,
            is_final: self.is_final,
            timestamp_ms: self.timestamp_ms,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            confidence: self.confidence,
            words: self.words.clone(),
        }
    }

    fn update(&self) -> CanonicalUpdate {
        CanonicalUpdate {
            segment_id: self.id,
            version: self.version,
            segment: self.canonical(),
        }
    }
}

/// A finalized text kept briefly for cross-source echo comparison.
#[derive(Debug)]
struct RecentFinal {
    source: AudioSource,
    normalized_text: String,
    timestamp_ms: i64,
}

#[derive(Default)]
struct AggregatorState {
    segments: Vec<Segment>,
    recent_finals: VecDeque<RecentFinal>,
}

/// Reconciles two independently-transcribing streams into one deduplicated,
/// versioned canonical stream, and surfaces interviewer-question signals.
///
/// Created once per conversation and shared via `Arc`. Subscribers attach
/// through per-event-kind broadcast channels; a slow or dropped receiver
/// never affects other receivers or aggregator state.
pub struct TranscriptAggregator {
    config: AggregatorConfig,
    rules: QuestionRules,
    state: Mutex<AggregatorState>,
    update_tx: broadcast::Sender<CanonicalUpdate>,
    question_tx: broadcast::Sender<CanonicalUpdate>,
    sweeper: Mutex<Option<AbortHandle>>,
    destroyed: AtomicBool,
}

impl TranscriptAggregator {
    pub fn new(config: AggregatorConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        let (update_tx, _) = broadcast::channel(256);
        let (question_tx, _) = broadcast::channel(64);
        let rules = QuestionRules::from_config(&config);

        info!(
            echo_window_ms = config.echo_window_ms,
            similarity_threshold = config.similarity_threshold,
            partial_window_ms = config.partial_window_ms,
            "Transcript aggregator created"
        );

        Ok(Arc::new(Self {
            config,
            rules,
            state: Mutex::new(AggregatorState::default()),
            update_tx,
            question_tx,
            sweeper: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }))
    }

    /// Returns a new receiver for the canonical stream.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<CanonicalUpdate> {
        self.update_tx.subscribe()
    }

    /// Returns a new receiver for detected interviewer questions.
    pub fn subscribe_questions(&self) -> broadcast::Receiver<CanonicalUpdate> {
        self.question_tx.subscribe()
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn rules(&self) -> &QuestionRules {
        &self.rules
    }

    /// Folds one raw upstream chunk into the buffer.
    ///
    /// Empty-after-normalization text is dropped silently. Cross-source echo
    /// and same-source partial updates are resolved here; every surviving
    /// event produces exactly one emission on the canonical stream.
    pub fn ingest(&self, event: RawTranscriptEvent) {
        if self.destroyed.load(Ordering::Relaxed) {
            warn!("Ingest on a destroyed aggregator ignored");
            return;
        }

        let normalized = normalize(&event.text);
        if normalized.is_empty() {
            return;
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut finalized: Option<CanonicalUpdate> = None;

        let emission = {
            let mut state = self.state.lock();
            state.prune_recent_finals(event.timestamp_ms, self.config.echo_window_ms * 2);

            // Echo check: the same real-world utterance bleeding into the
            // other capture path within the echo window.
            let is_echo = state.recent_finals.iter().any(|recent| {
                recent.source != event.source
                    && (recent.timestamp_ms - event.timestamp_ms).abs()
                        <= self.config.echo_window_ms
                    && texts_match(
                        &recent.normalized_text,
                        &normalized,
                        self.config.similarity_threshold,
                    )
            });
            if is_echo {
                debug!(
                    source = ?event.source,
                    text = %event.text,
                    "Suppressed cross-source echo"
                );
                return;
            }

            // Same-source open partial within the update window: this is a
            // revision of an in-flight utterance, not a new one.
            let target = state.segments.iter_mut().find(|segment| {
                !segment.is_final
                    && segment.source == event.source
                    && segment.speaker == event.speaker
                    && (segment.timestamp_ms - event.timestamp_ms).abs()
                        <= self.config.partial_window_ms
                    && texts_match(
                        &segment.normalized_text,
                        &normalized,
                        self.config.similarity_threshold,
                    )
            });

            let update = if let Some(segment) = target {
                segment.version += 1;
                segment.text = event.text;
                segment.normalized_text = normalized;
                segment.is_final = event.is_final;
                segment.timestamp_ms = event.timestamp_ms;
                if event.confidence.is_some() {
                    segment.confidence = event.confidence;
                }
                segment.words = event.words;
                segment.recompute_word_bounds();
                segment.emitted_at_ms = Some(now_ms);
                debug!(
                    segment_id = %segment.id,
                    version = segment.version,
                    is_final = segment.is_final,
                    "Updated open partial"
                );
                segment.update()
            } else {
                let mut segment = Segment {
                    id: Uuid::new_v4(),
                    version: 1,
                    text: event.text,
                    normalized_text: normalized,
                    speaker: event.speaker,
                    source: event.source,
                    is_final: event.is_final,
                    timestamp_ms: event.timestamp_ms,
                    start_ms: None,
                    end_ms: None,
                    confidence: event.confidence,
                    words: event.words,
                    emitted_at_ms: Some(now_ms),
                };
                segment.recompute_word_bounds();
                debug!(segment_id = %segment.id, source = ?segment.source, "New segment");
                let update = segment.update();
                state.segments.push(segment);
                state.enforce_buffer_cap(self.config.max_buffer_size);
                update
            };

            if update.segment.is_final {
                state.recent_finals.push_back(RecentFinal {
                    source: update.segment.source,
                    normalized_text: normalize(&update.segment.text),
                    timestamp_ms: update.segment.timestamp_ms,
                });
                finalized = Some(update.clone());
            }
            update
        };

        self.emit(emission);
        if let Some(update) = finalized {
            self.detect_question(&update);
        }
    }

    /// Force-finalizes open partials older than the stale timeout.
    ///
    /// Run by the background sweeper, but callable directly with an explicit
    /// clock for deterministic tests. A partial the upstream provider never
    /// finalizes must not block downstream consumers forever.
    pub fn sweep_stale(&self, now_ms: i64) {
        if self.destroyed.load(Ordering::Relaxed) {
            return;
        }

        let stale: Vec<CanonicalUpdate> = {
            let mut state = self.state.lock();
            let timeout = self.config.stale_timeout_ms;
            let mut out = Vec::new();
            for segment in state.segments.iter_mut() {
                if !segment.is_final && now_ms - segment.timestamp_ms >= timeout {
                    segment.version += 1;
                    segment.is_final = true;
                    segment.emitted_at_ms = Some(now_ms);
                    warn!(
                        segment_id = %segment.id,
                        age_ms = now_ms - segment.timestamp_ms,
                        "Force-finalized stale partial"
                    );
                    out.push(segment.update());
                }
            }
            for update in &out {
                state.recent_finals.push_back(RecentFinal {
                    source: update.segment.source,
                    normalized_text: normalize(&update.segment.text),
                    timestamp_ms: update.segment.timestamp_ms,
                });
            }
            out
        };

        for update in stale {
            self.emit(update.clone());
            self.detect_question(&update);
        }
    }

    /// Spawns the periodic stale-partial sweep. Aborted by `destroy`.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }
        let aggregator = Arc::clone(self);
        let interval_ms = self.config.sweep_interval_ms;
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                aggregator.sweep_stale(chrono::Utc::now().timestamp_millis());
            }
        });
        *sweeper = Some(handle.abort_handle());
    }

    /// All finalized segments, both sources, time-ordered.
    pub fn final_segments(&self) -> Vec<CanonicalUpdate> {
        let state = self.state.lock();
        let mut finals: Vec<CanonicalUpdate> = state
            .segments
            .iter()
            .filter(|s| s.is_final)
            .map(Segment::update)
            .collect();
        finals.sort_by_key(|u| u.segment.timestamp_ms);
        finals
    }

    /// Time-ordered segments for one source (partial and final).
    pub fn segments_by_source(&self, source: AudioSource) -> Vec<CanonicalUpdate> {
        let state = self.state.lock();
        let mut segments: Vec<CanonicalUpdate> = state
            .segments
            .iter()
            .filter(|s| s.source == source)
            .map(Segment::update)
            .collect();
        segments.sort_by_key(|u| u.segment.timestamp_ms);
        segments
    }

    /// Clears the buffer and the recent-finals window. Subscriptions survive;
    /// pre-reset text re-ingested afterwards is not treated as an echo.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let dropped = state.segments.len();
        state.segments.clear();
        state.recent_finals.clear();
        info!(dropped, "Aggregator reset");
    }

    /// Terminal shutdown: stops the sweeper and clears all buffers. A
    /// destroyed aggregator ignores further ingest.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Relaxed);
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        let mut state = self.state.lock();
        state.segments.clear();
        state.recent_finals.clear();
        info!("Aggregator destroyed");
    }

    fn emit(&self, update: CanonicalUpdate) {
        if self.update_tx.send(update).is_err() {
            debug!("No canonical-stream subscribers");
        }
    }

    fn detect_question(&self, update: &CanonicalUpdate) {
        if !self.rules.is_interviewer_question(&update.segment) {
            return;
        }
        info!(
            segment_id = %update.segment_id,
            text = %update.segment.text,
            "Interviewer question detected"
        );
        if self.question_tx.send(update.clone()).is_err() {
            debug!("No question-stream subscribers");
        }
    }
}

impl Drop for TranscriptAggregator {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

impl Segment {
    fn recompute_word_bounds(&mut self) {
        self.start_ms = self.words.first().map(|w| w.start_ms);
        self.end_ms = self.words.last().map(|w| w.end_ms);
    }
}

impl AggregatorState {
    /// Keeps the recent-finals window to roughly 2x the echo window.
    fn prune_recent_finals(&mut self, now_ms: i64, retain_ms: i64) {
        while let Some(front) = self.recent_finals.front() {
            if now_ms - front.timestamp_ms > retain_ms {
                self.recent_finals.pop_front();
            } else {
                break;
            }
        }
    }

    /// Evicts oldest-by-timestamp segments past the cap.
    fn enforce_buffer_cap(&mut self, max: usize) {
        while self.segments.len() > max {
            let oldest = self
                .segments
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.timestamp_ms)
                .map(|(i, _)| i);
            match oldest {
                Some(index) => {
                    let evicted = self.segments.remove(index);
                    debug!(segment_id = %evicted.id, "Evicted segment past buffer cap");
                }
                None => break,
            }
        }
    }
}
