use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crosstalk_coach::{AnswerCoach, BudgetTable, CoachConfig, CoachEvent, CoachState, QuestionClassifier};
use crosstalk_config::Settings;
use crosstalk_transcript::speaker::SpeakerSegment;
use crosstalk_transcript::{
    reconcile_speaker_roles, AggregatorConfig, AudioSource, CanonicalUpdate, RawTranscriptEvent,
    SessionRecorder, SpeakerRoleMap, TranscriptAggregator,
};

use crate::SessionError;

/// One live conversation: its aggregator, its coach, and the wiring task
/// routing canonical events between them.
struct SessionHandle {
    aggregator: Arc<TranscriptAggregator>,
    coach: Arc<AnswerCoach>,
    wiring: AbortHandle,
}

/// Composes per-conversation pipelines: aggregation, coaching, recording,
/// and session-end speaker reconciliation.
///
/// Created once by the embedding application and shared via `Arc`. Each
/// conversation gets its own independently constructible and destructible
/// aggregator/coach pair, keyed by session id.
pub struct SessionEngine {
    settings: Settings,
    classifier: Arc<dyn QuestionClassifier>,
    recorder: Arc<dyn SessionRecorder>,
    budgets: BudgetTable,
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionEngine {
    pub fn new(
        settings: Settings,
        classifier: Arc<dyn QuestionClassifier>,
        recorder: Arc<dyn SessionRecorder>,
        budgets: BudgetTable,
    ) -> Arc<Self> {
        info!(
            classifier = classifier.name(),
            "Session engine created"
        );
        Arc::new(Self {
            settings,
            classifier,
            recorder,
            budgets,
            sessions: DashMap::new(),
        })
    }

    /// Starts a new conversation pipeline and returns its session id.
    pub async fn start_session(&self) -> Result<Uuid, SessionError> {
        let session_id = Uuid::new_v4();
        let config = self.aggregator_config();
        let aggregator = TranscriptAggregator::new(config)?;
        aggregator.start_sweeper();

        let coach = AnswerCoach::new(
            Arc::clone(&self.classifier),
            self.budgets.clone(),
            CoachConfig {
                classify_timeout: Duration::from_millis(self.settings.coach.classify_timeout_ms),
                nudge_dismiss_after_ms: self.settings.coach.nudge_dismiss_after_ms,
            },
        );
        coach.initialize(session_id);

        if let Err(error) = self.recorder.start_session(session_id).await {
            warn!(%session_id, %error, "Recorder failed to start session");
        }

        let wiring = self.spawn_wiring(session_id, &aggregator, &coach);

        self.sessions.insert(
            session_id,
            SessionHandle {
                aggregator,
                coach,
                wiring,
            },
        );
        info!(%session_id, "Session started");
        Ok(session_id)
    }

    /// Routes one raw upstream transcript chunk into a session's aggregator.
    pub fn ingest(&self, session_id: Uuid, event: RawTranscriptEvent) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        handle.aggregator.ingest(event);
        Ok(())
    }

    /// Stops a session: reconciles speaker roles from the buffered finals,
    /// hands the map to the recorder, and tears the pipeline down.
    pub async fn stop_session(&self, session_id: Uuid) -> Result<SpeakerRoleMap, SessionError> {
        let (_, handle) = self
            .sessions
            .remove(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;

        let mic = final_snapshot(&handle.aggregator, AudioSource::Microphone);
        let system = final_snapshot(&handle.aggregator, AudioSource::SystemAudio);
        let map = reconcile_speaker_roles(
            &mic,
            &system,
            handle.aggregator.config().interviewer_source,
        );

        if let Err(error) = self.recorder.add_speaker_map(session_id, &map).await {
            warn!(%session_id, %error, "Recorder failed to store speaker map");
        }
        if let Err(error) = self.recorder.end_session(session_id).await {
            warn!(%session_id, %error, "Recorder failed to end session");
        }

        handle.wiring.abort();
        handle.aggregator.destroy();
        handle.coach.reset();
        info!(%session_id, confidence = map.confidence, "Session stopped");
        Ok(map)
    }

    /// Hotkey end-of-answer signal from the presentation layer.
    pub fn end_via_hotkey(&self, session_id: Uuid) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        handle.coach.end_via_hotkey();
        Ok(())
    }

    pub fn coach_state(&self, session_id: Uuid) -> Result<CoachState, SessionError> {
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        Ok(handle.coach.state())
    }

    pub fn subscribe_updates(
        &self,
        session_id: Uuid,
    ) -> Result<broadcast::Receiver<CanonicalUpdate>, SessionError> {
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        Ok(handle.aggregator.subscribe_updates())
    }

    pub fn subscribe_questions(
        &self,
        session_id: Uuid,
    ) -> Result<broadcast::Receiver<CanonicalUpdate>, SessionError> {
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        Ok(handle.aggregator.subscribe_questions())
    }

    pub fn subscribe_coach(
        &self,
        session_id: Uuid,
    ) -> Result<broadcast::Receiver<CoachEvent>, SessionError> {
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        Ok(handle.coach.subscribe())
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Consumes the canonical stream and drives the coach and the recorder.
    ///
    /// Coach signals are derived from the single update stream rather than
    /// the question stream so that, for one interviewer utterance, the
    /// end-previous-answer transition always lands before the new question
    /// arms. Speech transitions fire on every canonical update, partials
    /// included, so the answer clock starts with the first candidate words
    /// rather than their finalization; question arming and recording wait
    /// for finals.
    fn spawn_wiring(
        &self,
        session_id: Uuid,
        aggregator: &Arc<TranscriptAggregator>,
        coach: &Arc<AnswerCoach>,
    ) -> AbortHandle {
        let mut updates = aggregator.subscribe_updates();
        let rules = aggregator.rules().clone();
        let coach = Arc::clone(coach);
        let recorder = Arc::clone(&self.recorder);

        let handle = tokio::spawn(async move {
            loop {
                let update = match updates.recv().await {
                    Ok(update) => update,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%session_id, skipped, "Wiring lagged behind canonical stream");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let segment = &update.segment;
                if rules.is_interviewer(segment.speaker.as_deref(), segment.source) {
                    coach.handle_interviewer_speech(segment);
                    if segment.is_final && rules.is_question(&segment.text) {
                        coach.handle_interviewer_question(segment).await;
                    }
                } else {
                    coach.handle_candidate_speech(segment);
                }

                if segment.is_final {
                    if let Err(error) = recorder.add_segment(session_id, segment).await {
                        warn!(%session_id, %error, "Recorder failed to store segment");
                    }
                }
            }
            debug!(%session_id, "Wiring task exiting");
        });
        handle.abort_handle()
    }

    fn aggregator_config(&self) -> AggregatorConfig {
        let s = &self.settings.aggregator;
        AggregatorConfig {
            echo_window_ms: s.echo_window_ms,
            similarity_threshold: s.similarity_threshold,
            partial_window_ms: s.partial_window_ms,
            max_buffer_size: s.max_buffer_size,
            stale_timeout_ms: s.stale_timeout_ms,
            sweep_interval_ms: s.sweep_interval_ms,
            interviewer_source: parse_source(&s.interviewer_source),
            first_speaker_label: s.first_speaker_label.clone(),
            question_lead_words: s.question_lead_words.clone(),
        }
    }
}

/// Read-only snapshot of a session's finalized segments for one source.
fn final_snapshot(aggregator: &TranscriptAggregator, source: AudioSource) -> Vec<SpeakerSegment> {
    aggregator
        .segments_by_source(source)
        .into_iter()
        .filter(|update| update.segment.is_final)
        .map(|update| SpeakerSegment {
            speaker: update.segment.speaker.clone(),
            text: update.segment.text.clone(),
            start_ms: update.segment.start_ms.unwrap_or(update.segment.timestamp_ms),
            end_ms: update.segment.end_ms.unwrap_or(update.segment.timestamp_ms),
            confidence: update.segment.confidence,
        })
        .collect()
}

fn parse_source(raw: &str) -> AudioSource {
    match raw {
        "microphone" => AudioSource::Microphone,
        "system_audio" => AudioSource::SystemAudio,
        other => {
            warn!(source = %other, "Unknown interviewer source, defaulting to system_audio");
            AudioSource::SystemAudio
        }
    }
}
