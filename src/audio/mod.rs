use crate::error::{DeposcribeError, Result};
use std::path::Path;

pub mod convert;

/// Sample rate every pipeline stage consumes.
pub const PIPELINE_SAMPLE_RATE: u32 = 16000;

/// Decoded, read-only audio handed to the pipeline by the media layer.
///
/// Samples are mono f32 at `PIPELINE_SAMPLE_RATE`, normalized to [-1.0, 1.0].
/// The source is immutable once constructed; the recognizer and diarizer both
/// read it without coordination.
#[derive(Debug, Clone)]
pub struct AudioSource {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioSource {
    /// Build a source from already-decoded samples, converting to the
    /// pipeline format (mono, 16kHz, normalized) as needed.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if samples.is_empty() {
            return Err(DeposcribeError::Audio("empty audio stream".to_string()));
        }
        let mono = convert::to_mono(&samples, channels);
        let mut resampled = convert::resample(&mono, sample_rate, PIPELINE_SAMPLE_RATE)?;
        convert::normalize(&mut resampled);
        Ok(Self {
            samples: resampled,
            sample_rate: PIPELINE_SAMPLE_RATE,
            channels: 1,
        })
    }

    /// Decode a WAV file into a pipeline-ready source.
    pub fn from_wav_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (samples, sample_rate, channels) = convert::decode_wav(path.as_ref())?;
        Self::from_samples(samples, sample_rate, channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Slice of samples covering [start_ms, end_ms), clamped to the stream.
    pub fn window(&self, start_ms: u64, end_ms: u64) -> &[f32] {
        let to_idx = |ms: u64| ((ms * self.sample_rate as u64) / 1000) as usize;
        let start = to_idx(start_ms).min(self.samples.len());
        let end = to_idx(end_ms).min(self.samples.len());
        &self.samples[start..end.max(start)]
    }
}
