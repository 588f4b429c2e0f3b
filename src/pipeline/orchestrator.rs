use crate::audio::AudioSource;
use crate::config::settings::TranscriptionSettings;
use crate::error::{DeposcribeError, Result};
use crate::pipeline::{
    corrector, diarizer, AlignmentError, CancelToken, DiarizationError, SpeakerDiarizer,
    SpeechRecognizer, WordAligner,
};
use crate::transcript::{Transcript, TranscriptSegment, TranscriptStatus};
use std::sync::Arc;

/// Sequences the pipeline stages over injected, process-scoped model
/// handles.
///
/// Stage order is fixed: recognize, then (optionally) align, diarize,
/// correct. Only recognition failure is fatal; alignment and diarization
/// errors are absorbed with a logged warning and the run proceeds with that
/// stage's fallback output. Cancellation anywhere fails the run and
/// discards partial output.
pub struct TranscriptionPipeline {
    recognizer: Arc<dyn SpeechRecognizer>,
    aligner: Option<Arc<dyn WordAligner>>,
    diarizer: Option<Arc<dyn SpeakerDiarizer>>,
}

/// A failed run together with its record.
///
/// The transcript carries `status == Failed` and the failure reason, so a
/// caller can persist the failed record before propagating the error.
#[derive(Debug)]
pub struct RunFailure {
    pub transcript: Transcript,
    pub error: DeposcribeError,
}

impl From<RunFailure> for DeposcribeError {
    fn from(failure: RunFailure) -> Self {
        failure.error
    }
}

impl TranscriptionPipeline {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            aligner: None,
            diarizer: None,
        }
    }

    pub fn with_aligner(mut self, aligner: Arc<dyn WordAligner>) -> Self {
        self.aligner = Some(aligner);
        self
    }

    pub fn with_diarizer(mut self, diarizer: Arc<dyn SpeakerDiarizer>) -> Self {
        self.diarizer = Some(diarizer);
        self
    }

    /// Run the full pipeline over one audio source.
    ///
    /// Identical audio, config, and model versions yield the same segment
    /// sequence modulo model nondeterminism (the decode parameters are held
    /// fixed for the run). A failure returns the failed record alongside the
    /// error so it can still be persisted.
    pub fn run(
        &self,
        audio: &AudioSource,
        settings: &TranscriptionSettings,
        cancel: &CancelToken,
    ) -> std::result::Result<Transcript, RunFailure> {
        let mut transcript = Transcript::new();

        match self.drive(audio, settings, cancel, &mut transcript) {
            Ok(()) => Ok(transcript),
            Err(error) => {
                transcript.failure_reason = Some(error.to_string());
                // drive() enters Processing before anything can fail, so
                // this transition is always legal.
                transcript.set_status(TranscriptStatus::Failed).ok();
                tracing::error!(transcript = %transcript.id, error = %error, "transcription run failed");
                Err(RunFailure { transcript, error })
            }
        }
    }

    fn drive(
        &self,
        audio: &AudioSource,
        settings: &TranscriptionSettings,
        cancel: &CancelToken,
        transcript: &mut Transcript,
    ) -> Result<()> {
        transcript.set_status(TranscriptStatus::Processing)?;

        // Pre-flight: reject malformed correction rules before spending any
        // model compute.
        let rules = settings.dictionary_rules();
        corrector::validate_rules(&rules)?;

        self.execute(audio, settings, &rules, cancel, transcript)?;
        transcript.set_status(TranscriptStatus::Completed)
    }

    fn execute(
        &self,
        audio: &AudioSource,
        settings: &TranscriptionSettings,
        rules: &[(String, String)],
        cancel: &CancelToken,
        transcript: &mut Transcript,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(DeposcribeError::Cancelled);
        }

        // Stage 1: recognition. The only stage whose failure fails the run.
        let recognition = self
            .recognizer
            .recognize(audio, settings.language_hint(), cancel)?;

        let mut segments: Vec<TranscriptSegment> = recognition
            .segments
            .iter()
            .map(TranscriptSegment::from_recognized)
            .collect();

        // Stage 2: word alignment, degrading to coarse segments on failure.
        if settings.enable_word_timing {
            segments = self.run_alignment(audio, segments, cancel)?;
        }

        // Stage 3: diarization, degrading to unknown speakers on failure.
        if settings.enable_diarization {
            self.run_diarization(audio, &mut segments, cancel)?;
        }

        // Stage 4: dictionary corrections (pure; rules already validated).
        if !rules.is_empty() {
            let changed = corrector::apply_dictionary(&mut segments, rules)?;
            tracing::info!(changed, "dictionary corrections applied");
        }

        if cancel.is_cancelled() {
            return Err(DeposcribeError::Cancelled);
        }

        transcript.language = Some(recognition.language);
        transcript.duration_seconds = recognition.duration_seconds;
        transcript.segments = segments;
        transcript.recompute_totals();
        Ok(())
    }

    fn run_alignment(
        &self,
        audio: &AudioSource,
        segments: Vec<TranscriptSegment>,
        cancel: &CancelToken,
    ) -> Result<Vec<TranscriptSegment>> {
        let Some(aligner) = &self.aligner else {
            return Ok(segments);
        };

        match aligner.align(audio, &segments, cancel) {
            Ok(aligned) if aligned.len() == segments.len() => Ok(aligned),
            Ok(aligned) => {
                tracing::warn!(
                    expected = segments.len(),
                    got = aligned.len(),
                    "aligner changed segment count, discarding alignment"
                );
                Ok(segments)
            }
            Err(AlignmentError::Cancelled) => Err(DeposcribeError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "word alignment failed, continuing without word timings");
                Ok(segments)
            }
        }
    }

    fn run_diarization(
        &self,
        audio: &AudioSource,
        segments: &mut [TranscriptSegment],
        cancel: &CancelToken,
    ) -> Result<()> {
        let Some(model) = &self.diarizer else {
            return Ok(());
        };

        match model.diarize(audio, cancel) {
            Ok(turns) => {
                diarizer::assign_speakers(segments, &turns);
                Ok(())
            }
            Err(DiarizationError::Cancelled) => Err(DeposcribeError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "diarization failed, speakers left unknown");
                Ok(())
            }
        }
    }
}
