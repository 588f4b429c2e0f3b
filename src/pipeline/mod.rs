use crate::audio::AudioSource;
use crate::error::{DeposcribeError, Result};
use crate::transcript::{RecognizedSegment, SpeakerTurn, TranscriptSegment};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub mod aligner;
pub mod corrector;
pub mod diarizer;
pub mod orchestrator;
pub mod recognizer;

/// Shortest audio the recognizer will accept.
pub const MIN_AUDIO_MS: u64 = 100;

/// Cooperative cancellation signal shared between the caller and the
/// long-running stages. Stages poll it between work units; a cancelled run
/// fails with `DeposcribeError::Cancelled` and discards partial output.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Result of the recognition stage.
pub struct RecognitionOutput {
    pub segments: Vec<RecognizedSegment>,
    pub language: String,
    pub duration_seconds: f64,
}

/// Internal-only alignment failure; consumed by the orchestrator, which
/// falls back to unaligned segments for anything but cancellation.
#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("alignment model error: {0}")]
    Model(String),

    #[error("alignment cancelled")]
    Cancelled,
}

/// Internal-only diarization failure; consumed by the orchestrator, which
/// leaves every speaker label at the unknown sentinel for anything but
/// cancellation.
#[derive(Error, Debug)]
pub enum DiarizationError {
    #[error("diarization model error: {0}")]
    Model(String),

    #[error("diarization cancelled")]
    Cancelled,
}

/// Converts decoded audio into coarse time-stamped text segments.
/// Failure here is fatal to the whole run.
pub trait SpeechRecognizer: Send + Sync {
    fn recognize(
        &self,
        audio: &AudioSource,
        language_hint: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<RecognitionOutput>;
}

/// Refines coarse segments with word-level timestamps. Must return exactly
/// the input segments, in order, enriched where alignment succeeded.
pub trait WordAligner: Send + Sync {
    fn align(
        &self,
        audio: &AudioSource,
        segments: &[TranscriptSegment],
        cancel: &CancelToken,
    ) -> std::result::Result<Vec<TranscriptSegment>, AlignmentError>;
}

/// Detects speaker turn intervals from raw audio, sorted by start time.
/// Turns may overlap each other (simultaneous speech).
pub trait SpeakerDiarizer: Send + Sync {
    fn diarize(
        &self,
        audio: &AudioSource,
        cancel: &CancelToken,
    ) -> std::result::Result<Vec<SpeakerTurn>, DiarizationError>;
}

/// Gate applied before any model invocation on a run's audio.
pub fn ensure_min_duration(audio: &AudioSource) -> Result<()> {
    let actual_ms = audio.duration_ms();
    if actual_ms < MIN_AUDIO_MS {
        return Err(DeposcribeError::AudioTooShort {
            actual_ms,
            min_ms: MIN_AUDIO_MS,
        });
    }
    Ok(())
}
