use crate::audio::{AudioSource, PIPELINE_SAMPLE_RATE};
use crate::config::settings::DecodeSettings;
use crate::error::{DeposcribeError, Result};
use crate::pipeline::{ensure_min_duration, CancelToken, RecognitionOutput, SpeechRecognizer};
use crate::transcript::RecognizedSegment;
use std::path::Path;
use std::sync::{Arc, Once};
use whisper_rs::{
    install_logging_hooks, FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters,
};

static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Chunk size for long audio (30 seconds at 16kHz)
const CHUNK_SAMPLES: usize = 30 * PIPELINE_SAMPLE_RATE as usize;
/// Overlap between chunks (2 seconds)
const OVERLAP_SAMPLES: usize = 2 * PIPELINE_SAMPLE_RATE as usize;

/// Speech recognizer backed by whisper.cpp.
///
/// The context is the expensive, process-scoped model handle: loaded once at
/// worker startup and shared across runs (and with the word aligner). Each
/// recognition pass creates its own decoding state, so concurrent runs are
/// safe.
pub struct WhisperRecognizer {
    ctx: Arc<WhisperContext>,
    decode: DecodeSettings,
}

impl WhisperRecognizer {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        use_gpu: bool,
        flash_attn: bool,
        decode: DecodeSettings,
    ) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        let path = model_path.as_ref();
        if !path.exists() {
            return Err(DeposcribeError::ModelNotFound(path.to_path_buf()));
        }

        let mut params = WhisperContextParameters::default();
        params.use_gpu = use_gpu;
        if use_gpu && flash_attn {
            params.flash_attn(true);
        }

        let ctx = WhisperContext::new_with_params(path.to_str().unwrap_or_default(), params)
            .map_err(|e| DeposcribeError::Recognition(format!("Failed to load model: {}", e)))?;

        Ok(Self {
            ctx: Arc::new(ctx),
            decode,
        })
    }

    /// Shared model handle, reused by the word aligner.
    pub fn context(&self) -> Arc<WhisperContext> {
        Arc::clone(&self.ctx)
    }

    fn full_params<'a>(&self, language: Option<&'a str>) -> FullParams<'a, 'a> {
        let mut params = if self.decode.beam_size > 1 {
            FullParams::new(SamplingStrategy::BeamSearch {
                beam_size: self.decode.beam_size,
                patience: 1.0,
            })
        } else {
            FullParams::new(SamplingStrategy::Greedy { best_of: 1 })
        };
        params.set_language(language);
        params.set_temperature(self.decode.temperature);
        params.set_no_speech_thold(self.decode.no_speech_threshold);
        params.set_logprob_thold(self.decode.logprob_threshold);
        params.set_entropy_thold(self.decode.entropy_threshold);
        if let Some(threads) = self.decode.threads {
            params.set_n_threads(threads);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params
    }

    /// Decode one window of samples. Returns segments with absolute
    /// timestamps (window offset applied) and the language whisper settled
    /// on for the window.
    fn decode_window(
        &self,
        samples: &[f32],
        language: Option<&str>,
        offset_ms: u64,
    ) -> Result<(Vec<RecognizedSegment>, String)> {
        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| DeposcribeError::Recognition(format!("Failed to create state: {}", e)))?;

        state
            .full(self.full_params(language), samples)
            .map_err(|e| DeposcribeError::Recognition(format!("Inference failed: {}", e)))?;

        let lang_id = state.full_lang_id_from_state();
        let detected = whisper_rs::get_lang_str(lang_id).unwrap_or("").to_string();

        let mut segments = Vec::new();
        let num_segments = state.full_n_segments();
        for i in 0..num_segments {
            if let Some(segment) = state.get_segment(i) {
                let text = segment.to_str_lossy().map_err(|e| {
                    DeposcribeError::Recognition(format!("Failed to get text: {}", e))
                })?;
                // Timestamps are centiseconds
                let start_ms = (segment.start_timestamp().max(0) as u64) * 10 + offset_ms;
                let end_ms = (segment.end_timestamp().max(0) as u64) * 10 + offset_ms;
                let confidence = (1.0 - segment.no_speech_probability()).clamp(0.0, 1.0);

                segments.push(RecognizedSegment {
                    index: 0, // assigned by normalize_segments
                    start_ms,
                    end_ms,
                    text: text.trim().to_string(),
                    confidence,
                    language: String::new(),
                });
            }
        }

        Ok((segments, detected))
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn recognize(
        &self,
        audio: &AudioSource,
        language_hint: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<RecognitionOutput> {
        ensure_min_duration(audio)?;

        let samples = audio.samples();
        let mut language: Option<String> = language_hint.map(str::to_string);
        let mut raw = Vec::new();
        let mut pos = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(DeposcribeError::Cancelled);
            }

            let end = (pos + CHUNK_SAMPLES).min(samples.len());
            let offset_ms = (pos as u64 * 1000) / PIPELINE_SAMPLE_RATE as u64;

            let (mut segments, detected) =
                self.decode_window(&samples[pos..end], language.as_deref(), offset_ms)?;
            // Detection happens on the first window; later windows are
            // decoded with the settled language for consistency.
            if language.is_none() && !detected.is_empty() {
                language = Some(detected);
            }
            raw.append(&mut segments);

            if end >= samples.len() {
                break;
            }
            pos = end - OVERLAP_SAMPLES;
        }

        let language = language.unwrap_or_default();
        let segments = normalize_segments(raw, &language);
        if segments.is_empty() {
            return Err(DeposcribeError::Recognition(
                "recognizer produced no segments".to_string(),
            ));
        }

        tracing::info!(
            segments = segments.len(),
            language = %language,
            "recognition complete"
        );

        Ok(RecognitionOutput {
            segments,
            language,
            duration_seconds: audio.duration_seconds(),
        })
    }
}

/// Enforce the recognizer's output invariant: segments sorted by start,
/// non-overlapping, non-empty windows, indexed 0..N-1 without gaps.
/// Overlaps from chunked decoding are resolved by clamping the later
/// segment's start; segments swallowed whole by the clamp are dropped.
pub fn normalize_segments(
    mut raw: Vec<RecognizedSegment>,
    language: &str,
) -> Vec<RecognizedSegment> {
    raw.sort_by_key(|s| (s.start_ms, s.end_ms));

    let mut out: Vec<RecognizedSegment> = Vec::with_capacity(raw.len());
    let mut prev_end = 0u64;
    for mut seg in raw {
        if seg.start_ms < prev_end {
            seg.start_ms = prev_end;
        }
        if seg.end_ms <= seg.start_ms {
            continue;
        }
        prev_end = seg.end_ms;
        seg.index = out.len();
        seg.language = language.to_string();
        out.push(seg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(start_ms: u64, end_ms: u64, text: &str) -> RecognizedSegment {
        RecognizedSegment {
            index: 0,
            start_ms,
            end_ms,
            text: text.to_string(),
            confidence: 0.8,
            language: String::new(),
        }
    }

    #[test]
    fn test_normalize_orders_and_reindexes() {
        let segments = normalize_segments(
            vec![raw(2000, 3000, "b"), raw(0, 1000, "a"), raw(4000, 5000, "c")],
            "en",
        );
        assert_eq!(segments.len(), 3);
        let indices: Vec<usize> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(segments[0].text, "a");
        assert!(segments.iter().all(|s| s.language == "en"));
    }

    #[test]
    fn test_normalize_clamps_overlap() {
        let segments = normalize_segments(vec![raw(0, 1500, "a"), raw(1000, 2000, "b")], "en");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end_ms, 1500);
        assert_eq!(segments[1].start_ms, 1500);
    }

    #[test]
    fn test_normalize_drops_swallowed_segments() {
        // Second segment lies entirely inside the first; clamping leaves it
        // with no width.
        let segments = normalize_segments(vec![raw(0, 2000, "a"), raw(500, 1500, "dup")], "en");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "a");
    }

    #[test]
    fn test_normalize_indices_gapless_after_drop() {
        let segments = normalize_segments(
            vec![raw(0, 2000, "a"), raw(100, 1000, "dup"), raw(3000, 4000, "b")],
            "en",
        );
        let indices: Vec<usize> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_normalize_empty_input() {
        assert!(normalize_segments(Vec::new(), "en").is_empty());
    }

    #[test]
    fn test_recognizer_missing_model() {
        let result = WhisperRecognizer::new(
            "/nonexistent/ggml-base.bin",
            false,
            false,
            DecodeSettings::default(),
        );
        assert!(matches!(result, Err(DeposcribeError::ModelNotFound(_))));
    }
}
