use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::speaker::SpeakerRoleMap;
use crate::CanonicalSegment;

/// Persistence collaborator for finished transcript material.
///
/// The core only writes: finalized segments as they settle and the speaker
/// role map at session stop. Recorder failures are logged by the caller and
/// never disturb aggregation.
#[async_trait]
pub trait SessionRecorder: Send + Sync + 'static {
    async fn start_session(&self, session_id: Uuid) -> anyhow::Result<()>;

    async fn add_segment(
        &self,
        session_id: Uuid,
        segment: &CanonicalSegment,
    ) -> anyhow::Result<()>;

    async fn add_speaker_map(
        &self,
        session_id: Uuid,
        map: &SpeakerRoleMap,
    ) -> anyhow::Result<()>;

    async fn end_session(&self, session_id: Uuid) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct RecordedSession {
    pub segments: Vec<CanonicalSegment>,
    pub speaker_map: Option<SpeakerRoleMap>,
    pub ended: bool,
}

/// In-memory recorder for tests and single-process composition.
#[derive(Default)]
pub struct MemoryRecorder {
    sessions: Mutex<HashMap<Uuid, RecordedSession>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, session_id: Uuid) -> Option<RecordedSession> {
        self.sessions.lock().get(&session_id).cloned()
    }
}

#[async_trait]
impl SessionRecorder for MemoryRecorder {
    async fn start_session(&self, session_id: Uuid) -> anyhow::Result<()> {
        self.sessions
            .lock()
            .insert(session_id, RecordedSession::default());
        Ok(())
    }

    async fn add_segment(
        &self,
        session_id: Uuid,
        segment: &CanonicalSegment,
    ) -> anyhow::Result<()> {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(session_id).or_default();
        session.segments.push(segment.clone());
        Ok(())
    }

    async fn add_speaker_map(
        &self,
        session_id: Uuid,
        map: &SpeakerRoleMap,
    ) -> anyhow::Result<()> {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(session_id).or_default();
        session.speaker_map = Some(map.clone());
        Ok(())
    }

    async fn end_session(&self, session_id: Uuid) -> anyhow::Result<()> {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(session_id).or_default();
        session.ended = true;
        Ok(())
    }
}
