use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crosstalk_transcript::CanonicalSegment;

use crate::budget::{BudgetTable, QuestionBudget, QuestionKind};
use crate::classifier::QuestionClassifier;

/// Answer-timing lifecycle for one question instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachState {
    /// No question in flight.
    Idle,
    /// A question was detected and a budget selected; waiting for the
    /// candidate to start answering.
    Armed,
    /// The candidate is answering; the clock is running.
    Running,
    /// The soft threshold passed; one soft nudge was announced.
    SoftNudged,
    /// The hard threshold passed; one hard nudge was announced.
    HardNudged,
    /// The question was closed out (interviewer spoke, or hotkey).
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeLevel {
    Soft,
    Hard,
}

/// Events announced to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoachEvent {
    StateChanged {
        state: CoachState,
        question_kind: Option<QuestionKind>,
        question_label: Option<String>,
        target_secs: Option<u64>,
    },
    Nudge {
        level: NudgeLevel,
        message: String,
        dismiss_after_ms: u64,
    },
}

#[derive(Debug, Clone)]
pub struct CoachConfig {
    /// Bound on one classifier call; timeout falls back to the unknown budget.
    pub classify_timeout: Duration,
    /// How long the presentation layer should keep a nudge visible.
    pub nudge_dismiss_after_ms: u64,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            classify_timeout: Duration::from_millis(1500),
            nudge_dismiss_after_ms: 8000,
        }
    }
}

/// Snapshot of the in-flight question, for `current_session()`.
#[derive(Debug, Clone, Serialize)]
pub struct CoachSession {
    pub session_id: Uuid,
    pub state: CoachState,
    pub question_kind: QuestionKind,
    pub question_label: &'static str,
    pub budget: QuestionBudget,
    pub elapsed_secs: f64,
}

struct ActiveQuestion {
    kind: QuestionKind,
    budget: QuestionBudget,
    started_at: Option<Instant>,
    /// Elapsed frozen at the moment the question ended.
    ended_elapsed: Option<f64>,
    timer: Option<AbortHandle>,
}

struct CoachInner {
    session_id: Option<Uuid>,
    state: CoachState,
    question: Option<ActiveQuestion>,
    /// Bumped whenever the active question instance changes; a timer tick
    /// carrying a stale generation is ignored, so an aborted-late callback
    /// can never ghost-nudge a later question.
    generation: u64,
}

/// Turn-based answer timing coach.
///
/// Consumes interviewer-question and candidate/interviewer speech signals
/// derived from the canonical transcript stream, keeps at most one question
/// timer, and announces escalating nudges against the category budget.
/// Created once per conversation and shared via `Arc`.
pub struct AnswerCoach {
    classifier: Arc<dyn QuestionClassifier>,
    budgets: BudgetTable,
    config: CoachConfig,
    event_tx: broadcast::Sender<CoachEvent>,
    inner: Mutex<CoachInner>,
}

impl AnswerCoach {
    pub fn new(
        classifier: Arc<dyn QuestionClassifier>,
        budgets: BudgetTable,
        config: CoachConfig,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            classifier,
            budgets,
            config,
            event_tx,
            inner: Mutex::new(CoachInner {
                session_id: None,
                state: CoachState::Idle,
                question: None,
                generation: 0,
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoachEvent> {
        self.event_tx.subscribe()
    }

    /// Binds the coach to a conversation and resets to `Idle`.
    pub fn initialize(&self, session_id: Uuid) {
        let mut inner = self.inner.lock();
        Self::close_question(&mut inner);
        inner.session_id = Some(session_id);
        inner.state = CoachState::Idle;
        inner.question = None;
        info!(%session_id, "Coach initialized");
    }

    pub fn state(&self) -> CoachState {
        self.inner.lock().state
    }

    /// Snapshot of the in-flight question; `None` outside one.
    pub fn current_session(&self) -> Option<CoachSession> {
        let inner = self.inner.lock();
        let session_id = inner.session_id?;
        let question = inner.question.as_ref()?;
        Some(CoachSession {
            session_id,
            state: inner.state,
            question_kind: question.kind,
            question_label: question.kind.label(),
            budget: question.budget,
            elapsed_secs: Self::elapsed_secs(question),
        })
    }

    /// `Idle`/`Ended` -> `Armed`: classify the question (bounded by the
    /// classify timeout, degrading to the unknown budget) and start waiting
    /// for the candidate. A no-op in every other state.
    pub async fn handle_interviewer_question(self: &Arc<Self>, segment: &CanonicalSegment) {
        let generation = {
            let inner = self.inner.lock();
            if inner.session_id.is_none() {
                warn!("Question before initialize ignored");
                return;
            }
            if !matches!(inner.state, CoachState::Idle | CoachState::Ended) {
                debug!(state = ?inner.state, "Question while one is active ignored");
                return;
            }
            inner.generation
        };

        let (kind, budget) = self.classify_with_timeout(&segment.text).await;

        let event = {
            let mut inner = self.inner.lock();
            // The world may have moved while classification ran.
            if inner.generation != generation
                || !matches!(inner.state, CoachState::Idle | CoachState::Ended)
            {
                debug!("State changed during classification, not arming");
                return;
            }
            Self::close_question(&mut inner);
            inner.generation += 1;
            inner.state = CoachState::Armed;
            inner.question = Some(ActiveQuestion {
                kind,
                budget,
                started_at: None,
                ended_elapsed: None,
                timer: None,
            });
            info!(?kind, target_secs = budget.target_secs, "Question armed");
            CoachEvent::StateChanged {
                state: CoachState::Armed,
                question_kind: Some(kind),
                question_label: Some(kind.label().to_string()),
                target_secs: Some(budget.target_secs),
            }
        };
        self.emit(event);
    }

    /// `Armed` -> `Running`: the candidate started answering; the clock and
    /// the nudge timer start. A no-op in every other state.
    pub fn handle_candidate_speech(self: &Arc<Self>, _segment: &CanonicalSegment) {
        let event = {
            let mut inner = self.inner.lock();
            if inner.state != CoachState::Armed {
                return;
            }
            let generation = inner.generation;
            let (kind, budget) = match inner.question.as_mut() {
                Some(question) => {
                    question.started_at = Some(Instant::now());
                    (question.kind, question.budget)
                }
                None => return,
            };

            let coach = Arc::clone(self);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(budget.soft_secs)).await;
                coach.fire_nudge(generation, NudgeLevel::Soft);
                let gap = budget.hard_secs.saturating_sub(budget.soft_secs);
                tokio::time::sleep(Duration::from_secs(gap)).await;
                coach.fire_nudge(generation, NudgeLevel::Hard);
            });
            if let Some(question) = inner.question.as_mut() {
                question.timer = Some(handle.abort_handle());
            }

            inner.state = CoachState::Running;
            info!(?kind, "Answer running");
            CoachEvent::StateChanged {
                state: CoachState::Running,
                question_kind: Some(kind),
                question_label: Some(kind.label().to_string()),
                target_secs: Some(budget.target_secs),
            }
        };
        self.emit(event);
    }

    /// The interviewer spoke: close out any in-flight question, whether the
    /// candidate had started answering or not.
    pub fn handle_interviewer_speech(&self, _segment: &CanonicalSegment) {
        self.end_question(&[
            CoachState::Armed,
            CoachState::Running,
            CoachState::SoftNudged,
            CoachState::HardNudged,
        ]);
    }

    /// Explicit end from the presentation layer. Only meaningful while an
    /// answer is actually running; from `Idle`/`Armed` it leaves state alone.
    pub fn end_via_hotkey(&self) {
        self.end_question(&[
            CoachState::Running,
            CoachState::SoftNudged,
            CoachState::HardNudged,
        ]);
    }

    /// Back to `Idle` from any state: cancels the timer and discards the
    /// current question instance.
    pub fn reset(&self) {
        let event = {
            let mut inner = self.inner.lock();
            Self::close_question(&mut inner);
            inner.state = CoachState::Idle;
            inner.question = None;
            info!("Coach reset");
            CoachEvent::StateChanged {
                state: CoachState::Idle,
                question_kind: None,
                question_label: None,
                target_secs: None,
            }
        };
        self.emit(event);
    }

    async fn classify_with_timeout(&self, text: &str) -> (QuestionKind, QuestionBudget) {
        let result =
            tokio::time::timeout(self.config.classify_timeout, self.classifier.classify(text))
                .await;
        let (kind, recommended) = match result {
            Ok(Ok(classification)) => {
                debug!(
                    kind = ?classification.kind,
                    confidence = classification.confidence,
                    classifier = self.classifier.name(),
                    "Question classified"
                );
                (classification.kind, classification.recommended_secs)
            }
            Ok(Err(error)) => {
                warn!(%error, "Classifier failed, using unknown budget");
                (QuestionKind::Unknown, None)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.classify_timeout.as_millis() as u64,
                    "Classifier timed out, using unknown budget"
                );
                (QuestionKind::Unknown, None)
            }
        };
        let mut budget = self.budgets.budget(kind);
        if let Some(secs) = recommended {
            if secs > 0 {
                budget.target_secs = secs;
            }
        }
        (kind, budget)
    }

    fn end_question(&self, from: &[CoachState]) {
        let event = {
            let mut inner = self.inner.lock();
            if !from.contains(&inner.state) {
                return;
            }
            Self::close_question(&mut inner);
            inner.state = CoachState::Ended;
            let kind = inner.question.as_ref().map(|q| q.kind);
            info!(?kind, "Question ended");
            CoachEvent::StateChanged {
                state: CoachState::Ended,
                question_kind: kind,
                question_label: kind.map(|k| k.label().to_string()),
                target_secs: None,
            }
        };
        self.emit(event);
    }

    /// Cancels the timer and freezes the elapsed clock. Bumps the generation
    /// so any tick already past the abort is discarded.
    fn close_question(inner: &mut CoachInner) {
        if let Some(question) = inner.question.as_mut() {
            if let Some(timer) = question.timer.take() {
                timer.abort();
            }
            if question.ended_elapsed.is_none() {
                question.ended_elapsed = question
                    .started_at
                    .map(|started| started.elapsed().as_secs_f64());
            }
        }
        inner.generation += 1;
    }

    fn fire_nudge(&self, generation: u64, level: NudgeLevel) {
        let events = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            let allowed = match level {
                NudgeLevel::Soft => inner.state == CoachState::Running,
                NudgeLevel::Hard => {
                    matches!(inner.state, CoachState::Running | CoachState::SoftNudged)
                }
            };
            if !allowed {
                return;
            }
            let (kind, target_secs) = match inner.question.as_ref() {
                Some(question) => (question.kind, question.budget.target_secs),
                None => return,
            };
            let (state, message) = match level {
                NudgeLevel::Soft => (
                    CoachState::SoftNudged,
                    format!(
                        "You're past the target for this {} answer. Start wrapping up.",
                        kind.label().to_lowercase()
                    ),
                ),
                NudgeLevel::Hard => (
                    CoachState::HardNudged,
                    "This answer is running long. Finish the thought and hand it back."
                        .to_string(),
                ),
            };
            inner.state = state;
            info!(?level, ?kind, "Nudge");
            vec![
                CoachEvent::StateChanged {
                    state,
                    question_kind: Some(kind),
                    question_label: Some(kind.label().to_string()),
                    target_secs: Some(target_secs),
                },
                CoachEvent::Nudge {
                    level,
                    message,
                    dismiss_after_ms: self.config.nudge_dismiss_after_ms,
                },
            ]
        };
        for event in events {
            self.emit(event);
        }
    }

    fn elapsed_secs(question: &ActiveQuestion) -> f64 {
        if let Some(frozen) = question.ended_elapsed {
            return frozen;
        }
        question
            .started_at
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn emit(&self, event: CoachEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("No coach-event subscribers");
        }
    }
}
