use crate::error::{DeposcribeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Sentinel speaker label for segments no diarization turn overlaps.
/// Segments always carry a label; this value means "nobody claimed it".
pub const UNKNOWN_SPEAKER: &str = "unknown";

/// Count of whitespace-delimited tokens in a segment's text.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// A word with refined timestamps inside one segment.
/// Confidence is normalized 0..1 (see `RecognizedSegment::confidence`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f32,
}

/// Raw output of the speech recognizer: a coarse time-stamped span of text.
///
/// Confidence is normalized 0..1, derived from whisper's no-speech
/// probability as `1.0 - p(no_speech)`, clamped. The recognizer guarantees
/// segments are ordered by start time, non-overlapping, and indexed 0..N-1
/// without gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedSegment {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    pub confidence: f32,
    pub language: String,
}

/// A speaker-attributed time interval from the diarizer.
///
/// Turns are sorted by start time but may overlap each other (simultaneous
/// speech); consumers must not assume disjointness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerTurn {
    pub speaker: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SpeakerTurn {
    pub fn new(speaker: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            speaker: speaker.into(),
            start_ms,
            end_ms,
        }
    }
}

/// The unit carried through the pipeline: created by the recognizer stage,
/// enriched in place by aligner (words), diarizer (speaker), and corrector
/// (text). Edit provenance fields are set only by manual edits after the
/// pipeline, never by the pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    pub text: String,
    pub speaker: String,
    pub confidence: f32,
    pub word_count: usize,
    pub words: Option<Vec<WordTiming>>,
    pub is_edited: bool,
    pub original_text: Option<String>,
    pub editor: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl TranscriptSegment {
    pub fn from_recognized(seg: &RecognizedSegment) -> Self {
        Self {
            index: seg.index,
            start_ms: seg.start_ms,
            end_ms: seg.end_ms,
            duration_ms: seg.end_ms.saturating_sub(seg.start_ms),
            word_count: count_words(&seg.text),
            text: seg.text.clone(),
            speaker: UNKNOWN_SPEAKER.to_string(),
            confidence: seg.confidence,
            words: None,
            is_edited: false,
            original_text: None,
            editor: None,
            edited_at: None,
        }
    }

    /// Replace the segment text, recomputing the derived word count.
    /// Used by the dictionary corrector; does not touch edit provenance.
    pub fn set_text(&mut self, text: String) {
        self.word_count = count_words(&text);
        self.text = text;
    }

    /// Move the segment window, recomputing the derived duration.
    pub fn set_window(&mut self, start_ms: u64, end_ms: u64) {
        self.start_ms = start_ms;
        self.end_ms = end_ms;
        self.duration_ms = end_ms.saturating_sub(start_ms);
    }

    /// Manual post-pipeline edit. Records provenance on first edit; the
    /// original text is kept from before the first edit only.
    pub fn apply_edit(&mut self, text: String, editor: impl Into<String>) {
        if !self.is_edited {
            self.original_text = Some(self.text.clone());
        }
        self.is_edited = true;
        self.editor = Some(editor.into());
        self.edited_at = Some(Utc::now());
        self.set_text(text);
    }

    pub fn has_known_speaker(&self) -> bool {
        self.speaker != UNKNOWN_SPEAKER
    }

    pub fn format_timestamp(&self) -> String {
        let start_sec = self.start_ms / 1000;
        format!("{:02}:{:02}", start_sec / 60, start_sec % 60)
    }
}

/// Transcription run lifecycle. Terminal states are `Completed` and
/// `Failed`; `Processing` must be entered before either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranscriptStatus {
    pub fn can_transition_to(self, next: TranscriptStatus) -> bool {
        matches!(
            (self, next),
            (TranscriptStatus::Pending, TranscriptStatus::Processing)
                | (TranscriptStatus::Processing, TranscriptStatus::Completed)
                | (TranscriptStatus::Processing, TranscriptStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TranscriptStatus::Completed | TranscriptStatus::Failed)
    }
}

impl std::fmt::Display for TranscriptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TranscriptStatus::Pending => "pending",
            TranscriptStatus::Processing => "processing",
            TranscriptStatus::Completed => "completed",
            TranscriptStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Aggregate root for one transcription run.
///
/// The derived fields (`word_count`, `segment_count`, `speaker_count`) are
/// recomputed from the final segment sequence in one pass after the last
/// stage, never tracked incrementally. `duration_seconds` comes from the
/// audio source, not from segment extents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub status: TranscriptStatus,
    pub language: Option<String>,
    pub duration_seconds: f64,
    pub segments: Vec<TranscriptSegment>,
    pub word_count: usize,
    pub segment_count: usize,
    pub speaker_count: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: TranscriptStatus::Pending,
            language: None,
            duration_seconds: 0.0,
            segments: Vec::new(),
            word_count: 0,
            segment_count: 0,
            speaker_count: 0,
            created_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
        }
    }

    /// Advance the run state machine, rejecting skips and transitions out of
    /// a terminal state.
    pub fn set_status(&mut self, next: TranscriptStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DeposcribeError::Validation(format!(
                "illegal status transition: {} -> {}",
                self.status, next
            )));
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Recompute the denormalized totals from the segment sequence.
    pub fn recompute_totals(&mut self) {
        self.segment_count = self.segments.len();
        self.word_count = self.segments.iter().map(|s| s.word_count).sum();
        self.speaker_count = self
            .segments
            .iter()
            .filter(|s| s.has_known_speaker())
            .map(|s| s.speaker.as_str())
            .collect::<BTreeSet<_>>()
            .len();
    }

    /// Distinct non-sentinel speaker labels, in sorted order.
    pub fn speakers(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|s| s.has_known_speaker())
            .map(|s| s.speaker.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognized(index: usize, start_ms: u64, end_ms: u64, text: &str) -> RecognizedSegment {
        RecognizedSegment {
            index,
            start_ms,
            end_ms,
            text: text.to_string(),
            confidence: 0.9,
            language: "en".to_string(),
        }
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words("one"), 1);
        assert_eq!(count_words("the quick  brown\tfox"), 4);
    }

    #[test]
    fn test_from_recognized_derives_fields() {
        let seg = TranscriptSegment::from_recognized(&recognized(3, 1000, 2500, "hello there"));
        assert_eq!(seg.index, 3);
        assert_eq!(seg.duration_ms, 1500);
        assert_eq!(seg.word_count, 2);
        assert_eq!(seg.speaker, UNKNOWN_SPEAKER);
        assert!(seg.words.is_none());
        assert!(!seg.is_edited);
    }

    #[test]
    fn test_set_text_recomputes_word_count() {
        let mut seg = TranscriptSegment::from_recognized(&recognized(0, 0, 1000, "a b c"));
        assert_eq!(seg.word_count, 3);
        seg.set_text("one two".to_string());
        assert_eq!(seg.word_count, 2);
        assert!(!seg.is_edited, "pipeline text changes never mark edits");
    }

    #[test]
    fn test_set_window_recomputes_duration() {
        let mut seg = TranscriptSegment::from_recognized(&recognized(0, 0, 1000, "x"));
        seg.set_window(500, 2000);
        assert_eq!(seg.duration_ms, 1500);
    }

    #[test]
    fn test_apply_edit_records_provenance_once() {
        let mut seg = TranscriptSegment::from_recognized(&recognized(0, 0, 1000, "teh word"));
        seg.apply_edit("the word".to_string(), "reviewer");
        assert!(seg.is_edited);
        assert_eq!(seg.original_text.as_deref(), Some("teh word"));
        assert_eq!(seg.editor.as_deref(), Some("reviewer"));
        assert!(seg.edited_at.is_some());
        assert_eq!(seg.word_count, 2);

        // A second edit keeps the pre-first-edit original.
        seg.apply_edit("the words".to_string(), "reviewer2");
        assert_eq!(seg.original_text.as_deref(), Some("teh word"));
    }

    #[test]
    fn test_status_transitions() {
        let mut t = Transcript::new();
        assert_eq!(t.status, TranscriptStatus::Pending);
        assert!(t.set_status(TranscriptStatus::Completed).is_err());
        assert!(t.set_status(TranscriptStatus::Failed).is_err());
        t.set_status(TranscriptStatus::Processing).unwrap();
        t.set_status(TranscriptStatus::Completed).unwrap();
        assert!(t.completed_at.is_some());
        assert!(t.set_status(TranscriptStatus::Processing).is_err());
    }

    #[test]
    fn test_status_failed_is_terminal() {
        let mut t = Transcript::new();
        t.set_status(TranscriptStatus::Processing).unwrap();
        t.set_status(TranscriptStatus::Failed).unwrap();
        assert!(t.status.is_terminal());
        assert!(t.set_status(TranscriptStatus::Completed).is_err());
    }

    #[test]
    fn test_recompute_totals() {
        let mut t = Transcript::new();
        let mut a = TranscriptSegment::from_recognized(&recognized(0, 0, 1000, "hello world"));
        let mut b = TranscriptSegment::from_recognized(&recognized(1, 1000, 2000, "again"));
        a.speaker = "SPEAKER_00".to_string();
        b.speaker = "SPEAKER_00".to_string();
        t.segments = vec![a, b];
        t.recompute_totals();
        assert_eq!(t.segment_count, 2);
        assert_eq!(t.word_count, 3);
        assert_eq!(t.speaker_count, 1);
    }

    #[test]
    fn test_unknown_speakers_not_counted() {
        let mut t = Transcript::new();
        t.segments = vec![TranscriptSegment::from_recognized(&recognized(
            0, 0, 1000, "hi",
        ))];
        t.recompute_totals();
        assert_eq!(t.speaker_count, 0);
        assert!(t.speakers().is_empty());
    }

    #[test]
    fn test_full_text() {
        let mut t = Transcript::new();
        t.segments = vec![
            TranscriptSegment::from_recognized(&recognized(0, 0, 1000, "hello")),
            TranscriptSegment::from_recognized(&recognized(1, 1000, 2000, "world")),
        ];
        assert_eq!(t.full_text(), "hello world");
    }
}
