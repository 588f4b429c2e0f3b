use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeposcribeConfig {
    #[serde(default)]
    pub transcription: TranscriptionSettings,

    #[serde(default)]
    pub decode: DecodeSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

/// Inference device for the recognition model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Gpu,
}

/// Compute precision for model inference. On GPU, float16 enables the fused
/// flash-attention kernels; ggml whisper models are otherwise quantized at
/// conversion time, so this does not reprocess weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputePrecision {
    Float16,
    Float32,
    Int8,
}

/// The configuration surface the pipeline orchestrator consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    /// Language code, or "auto" to detect from the first portion of audio
    #[serde(default = "default_language")]
    pub language: String,
    /// Whisper model size: tiny, base, small, medium, large-v3
    #[serde(default = "default_model_size")]
    pub model_size: String,
    #[serde(default = "default_device")]
    pub device: Device,
    #[serde(default = "default_precision")]
    pub compute_precision: ComputePrecision,
    #[serde(default = "default_true")]
    pub enable_word_timing: bool,
    #[serde(default = "default_true")]
    pub enable_diarization: bool,
    /// Find/replace corrections applied after all model stages, as
    /// `[pattern, replacement]` pairs. Declaration order is preserved and
    /// breaks ties between equal-length patterns.
    #[serde(default)]
    pub custom_dictionary: Vec<(String, String)>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            model_size: default_model_size(),
            device: default_device(),
            compute_precision: default_precision(),
            enable_word_timing: true,
            enable_diarization: true,
            custom_dictionary: Vec::new(),
        }
    }
}

impl TranscriptionSettings {
    /// Language hint for the recognizer; "auto" or empty means self-detect.
    pub fn language_hint(&self) -> Option<&str> {
        let lang = self.language.trim();
        if lang.is_empty() || lang.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(lang)
        }
    }

    /// Dictionary rules in declaration order; ties in pattern length keep
    /// this order.
    pub fn dictionary_rules(&self) -> Vec<(String, String)> {
        self.custom_dictionary.clone()
    }

    pub fn use_gpu(&self) -> bool {
        self.device == Device::Gpu
    }
}

/// Decoding parameters held fixed for a run so re-running the same audio
/// with the same config is reproducible modulo model nondeterminism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeSettings {
    #[serde(default = "default_beam_size")]
    pub beam_size: i32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_no_speech_threshold")]
    pub no_speech_threshold: f32,
    #[serde(default = "default_logprob_threshold")]
    pub logprob_threshold: f32,
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f32,
    /// Inference threads (None = library default)
    pub threads: Option<i32>,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            beam_size: default_beam_size(),
            temperature: 0.0,
            no_speech_threshold: default_no_speech_threshold(),
            logprob_threshold: default_logprob_threshold(),
            entropy_threshold: default_entropy_threshold(),
            threads: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding downloaded model files (None = XDG data dir)
    pub models_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_model_size() -> String {
    "base".to_string()
}

fn default_device() -> Device {
    Device::Cpu
}

fn default_precision() -> ComputePrecision {
    ComputePrecision::Float16
}

fn default_beam_size() -> i32 {
    5
}

fn default_no_speech_threshold() -> f32 {
    0.6
}

fn default_logprob_threshold() -> f32 {
    -1.0
}

fn default_entropy_threshold() -> f32 {
    2.4
}
