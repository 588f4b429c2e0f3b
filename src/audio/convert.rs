use crate::error::{DeposcribeError, Result};
use std::path::Path;

/// Convert multi-channel audio to mono by averaging channels
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample audio to target sample rate using rubato
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        samples.len(),
        1, // mono
    )
    .map_err(|e| DeposcribeError::Audio(format!("Failed to create resampler: {}", e)))?;

    let input = vec![samples.to_vec()];
    let output = resampler
        .process(&input, None)
        .map_err(|e| DeposcribeError::Audio(format!("Resample failed: {}", e)))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Normalize samples to [-1.0, 1.0] range
pub fn normalize(samples: &mut [f32]) {
    let max_abs = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if max_abs > 1.0 {
        for sample in samples.iter_mut() {
            *sample /= max_abs;
        }
    }
}

/// Convert i16 samples to f32
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| s as f32 / i16::MAX as f32)
        .collect()
}

/// Convert i32 samples to f32
pub fn i32_to_f32(samples: &[i32]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| s as f32 / i32::MAX as f32)
        .collect()
}

/// Decode a WAV file of any common sample format into interleaved f32.
/// Returns (samples, sample_rate, channels).
pub fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32, u16)> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| DeposcribeError::Audio(format!("Failed to open WAV: {}", e)))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.unwrap_or(0.0))
            .collect(),
        hound::SampleFormat::Int => match spec.bits_per_sample {
            16 => {
                let ints: Vec<i16> = reader
                    .into_samples::<i16>()
                    .map(|s| s.unwrap_or(0))
                    .collect();
                i16_to_f32(&ints)
            }
            32 => {
                let ints: Vec<i32> = reader
                    .into_samples::<i32>()
                    .map(|s| s.unwrap_or(0))
                    .collect();
                i32_to_f32(&ints)
            }
            bits => {
                return Err(DeposcribeError::Audio(format!(
                    "Unsupported WAV bit depth: {}",
                    bits
                )))
            }
        },
    };

    Ok((samples, spec.sample_rate, spec.channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_stereo() {
        let stereo = vec![0.5, 0.3, 0.7, 0.1];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.4).abs() < 0.01); // (0.5 + 0.3) / 2
        assert!((mono[1] - 0.4).abs() < 0.01); // (0.7 + 0.1) / 2
    }

    #[test]
    fn test_to_mono_already_mono() {
        let mono = vec![0.5, 0.3, 0.7];
        let result = to_mono(&mono, 1);
        assert_eq!(result, mono);
    }

    #[test]
    fn test_normalize() {
        let mut samples = vec![2.0, -1.5, 0.5];
        normalize(&mut samples);
        assert!(samples.iter().all(|&s| s >= -1.0 && s <= 1.0));
        assert!((samples[0] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_normalize_leaves_quiet_audio_alone() {
        let mut samples = vec![0.2, -0.3];
        normalize(&mut samples);
        assert_eq!(samples, vec![0.2, -0.3]);
    }

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![0.5; 1000];
        let result = resample(&samples, 16000, 16000).unwrap();
        assert_eq!(result.len(), 1000);
    }

    #[test]
    fn test_resample_downsample() {
        let samples = vec![0.5; 48000]; // 1 second at 48kHz
        let result = resample(&samples, 48000, 16000).unwrap();
        // Should be approximately 16000 samples (1 second at 16kHz)
        assert!(result.len() > 15000 && result.len() < 17000);
    }

    #[test]
    fn test_i16_to_f32() {
        let samples = vec![i16::MAX, 0, i16::MIN];
        let converted = i16_to_f32(&samples);
        assert!((converted[0] - 1.0).abs() < 0.01);
        assert!((converted[1]).abs() < 0.01);
        assert!((converted[2] + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_decode_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..16000u32 {
            let t = i as f32 / 16000.0;
            let value = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
            writer.write_sample((value * 8000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate, channels) = decode_wav(&path).unwrap();
        assert_eq!(rate, 16000);
        assert_eq!(channels, 1);
        assert_eq!(samples.len(), 16000);
    }

    #[test]
    fn test_decode_wav_missing_file() {
        let result = decode_wav(Path::new("/nonexistent/audio.wav"));
        assert!(result.is_err());
    }
}
