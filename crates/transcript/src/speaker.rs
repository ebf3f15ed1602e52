use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::text::{normalize, texts_match};
use crate::AudioSource;

/// Role inferred for one raw diarization label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Interviewer,
    Interviewee,
    Unknown,
}

/// Read-only snapshot of one finalized segment, as handed to the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSegment {
    pub speaker: Option<String>,
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub confidence: Option<f64>,
}

/// Diagnostic counts accompanying a role map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileDiagnostics {
    pub mic_speakers: usize,
    pub system_speakers: usize,
    pub overlap_detected: bool,
    pub echo_detected: bool,
    pub segments_compared: usize,
}

/// Session-end mapping of raw speaker labels to roles, per source, with a
/// single scalar confidence. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerRoleMap {
    pub mic_roles: HashMap<String, SpeakerRole>,
    pub system_roles: HashMap<String, SpeakerRole>,
    pub confidence: f64,
    pub diagnostics: ReconcileDiagnostics,
}

const UNLABELED: &str = "unlabeled";
const ECHO_SIMILARITY: f64 = 0.75;
const ECHO_WINDOW_MS: i64 = 2000;
/// Cross-source intervals overlapping by less than this are timing jitter,
/// not cross-talk.
const MIN_OVERLAP_MS: i64 = 300;

/// Infers which raw speaker labels on each source correspond to the
/// interviewer and the interviewee.
///
/// Scoring: the label with the most speaking time on the path that
/// conventionally carries the interviewer's voice maps to `Interviewer`, the
/// dominant label on the other path to `Interviewee`, every minor label to
/// `Unknown`. Confidence starts from the turn-taking alternation ratio of the
/// merged timeline and is reduced by cross-talk overlap, cross-source echo,
/// and an empty source. Swapping the two inputs together with the
/// interviewer-source marker swaps the role assignment.
pub fn reconcile_speaker_roles(
    mic: &[SpeakerSegment],
    system: &[SpeakerSegment],
    interviewer_source: AudioSource,
) -> SpeakerRoleMap {
    let mic_role = if interviewer_source == AudioSource::Microphone {
        SpeakerRole::Interviewer
    } else {
        SpeakerRole::Interviewee
    };
    let system_role = if interviewer_source == AudioSource::SystemAudio {
        SpeakerRole::Interviewer
    } else {
        SpeakerRole::Interviewee
    };

    let mic_roles = assign_roles(mic, mic_role);
    let system_roles = assign_roles(system, system_role);

    let alternation = alternation_ratio(mic, system);
    let overlap_detected = has_overlap(mic, system);
    let echo_detected = has_echo(mic, system);

    let mut confidence = 0.5 + 0.5 * alternation;
    if overlap_detected {
        confidence -= 0.15;
    }
    if echo_detected {
        confidence -= 0.15;
    }
    if mic.is_empty() || system.is_empty() {
        // Best-effort map from one stream only.
        confidence *= 0.5;
    }
    let confidence = confidence.clamp(0.1, 1.0);

    let diagnostics = ReconcileDiagnostics {
        mic_speakers: mic_roles.len(),
        system_speakers: system_roles.len(),
        overlap_detected,
        echo_detected,
        segments_compared: mic.len() + system.len(),
    };

    info!(
        confidence,
        mic_speakers = diagnostics.mic_speakers,
        system_speakers = diagnostics.system_speakers,
        overlap = overlap_detected,
        echo = echo_detected,
        "Speaker roles reconciled"
    );

    SpeakerRoleMap {
        mic_roles,
        system_roles,
        confidence,
        diagnostics,
    }
}

/// Maps each distinct label on one source: dominant-by-speaking-time label
/// gets the source's conventional role, the rest `Unknown`.
fn assign_roles(segments: &[SpeakerSegment], dominant_role: SpeakerRole) -> HashMap<String, SpeakerRole> {
    let mut speaking_ms: HashMap<String, i64> = HashMap::new();
    for segment in segments {
        let label = segment
            .speaker
            .clone()
            .unwrap_or_else(|| UNLABELED.to_string());
        let duration = (segment.end_ms - segment.start_ms).max(0);
        *speaking_ms.entry(label).or_insert(0) += duration;
    }

    let dominant = speaking_ms
        .iter()
        .max_by_key(|(_, ms)| **ms)
        .map(|(label, _)| label.clone());

    let mut roles = HashMap::new();
    for label in speaking_ms.keys() {
        let role = if Some(label) == dominant.as_ref() {
            dominant_role
        } else {
            SpeakerRole::Unknown
        };
        roles.insert(label.clone(), role);
    }
    roles
}

/// Fraction of adjacent turns on the merged timeline where the source
/// alternates. A clean interview alternates nearly every turn.
fn alternation_ratio(mic: &[SpeakerSegment], system: &[SpeakerSegment]) -> f64 {
    let mut timeline: Vec<(i64, AudioSource)> = mic
        .iter()
        .map(|s| (s.start_ms, AudioSource::Microphone))
        .chain(system.iter().map(|s| (s.start_ms, AudioSource::SystemAudio)))
        .collect();
    if timeline.len() < 2 {
        return 0.0;
    }
    timeline.sort_by_key(|(start, _)| *start);

    let switches = timeline
        .windows(2)
        .filter(|pair| pair[0].1 != pair[1].1)
        .count();
    switches as f64 / (timeline.len() - 1) as f64
}

/// Whether both sources were meaningfully active at the same time.
fn has_overlap(mic: &[SpeakerSegment], system: &[SpeakerSegment]) -> bool {
    for a in mic {
        for b in system {
            let overlap = a.end_ms.min(b.end_ms) - a.start_ms.max(b.start_ms);
            if overlap >= MIN_OVERLAP_MS {
                debug!(
                    overlap_ms = overlap,
                    "Cross-source overlap detected"
                );
                return true;
            }
        }
    }
    false
}

/// Whether near-duplicate text appears on both sources close in time —
/// echo the live aggregation stage did not (or could not) suppress.
fn has_echo(mic: &[SpeakerSegment], system: &[SpeakerSegment]) -> bool {
    for a in mic {
        let a_norm = normalize(&a.text);
        if a_norm.is_empty() {
            continue;
        }
        for b in system {
            if (a.start_ms - b.start_ms).abs() <= ECHO_WINDOW_MS
                && texts_match(&a_norm, &normalize(&b.text), ECHO_SIMILARITY)
            {
                debug!(text = %a.text, "Cross-source echo detected");
                return true;
            }
        }
    }
    false
}
