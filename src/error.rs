use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeposcribeError {
    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Audio too short: {actual_ms}ms (minimum {min_ms}ms)")]
    AudioTooShort { actual_ms: u64, min_ms: u64 },

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transcription cancelled")]
    Cancelled,

    #[error("Model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, DeposcribeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_error_maps_to_task_variant() {
        let join_error = tokio::task::spawn_blocking(|| panic!("worker died"))
            .await
            .unwrap_err();
        let converted = DeposcribeError::from(join_error);
        assert!(matches!(converted, DeposcribeError::Task(_)));
    }
}
