use crate::config::settings::DeposcribeConfig;
use crate::error::{DeposcribeError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

/// Get XDG-compliant config directory
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "deposcribe")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| DeposcribeError::Config("Could not determine config directory".to_string()))
}

/// Get XDG-compliant data directory
pub fn data_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "deposcribe")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| DeposcribeError::Config("Could not determine data directory".to_string()))
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get models directory, honoring the config override
pub fn models_dir(config: &DeposcribeConfig) -> Result<PathBuf> {
    match &config.storage.models_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(data_dir()?.join("models")),
    }
}

/// Load config from file, creating default if not exists
pub fn load_config() -> Result<DeposcribeConfig> {
    let path = config_path()?;

    if !path.exists() {
        let config = DeposcribeConfig::default();
        save_config(&config)?;
        return Ok(config);
    }

    let content = fs::read_to_string(&path)?;
    let config: DeposcribeConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save config to file
pub fn save_config(config: &DeposcribeConfig) -> Result<()> {
    let path = config_path()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)?;
    fs::write(&path, content)?;
    Ok(())
}

/// Load config with environment variable overrides applied.
pub fn load_config_with_env() -> Result<DeposcribeConfig> {
    let mut config = load_config()?;

    if let Ok(language) = std::env::var("DEPOSCRIBE_LANGUAGE") {
        config.transcription.language = language;
    }
    if let Ok(model) = std::env::var("DEPOSCRIBE_MODEL") {
        config.transcription.model_size = model;
    }
    if let Ok(dir) = std::env::var("DEPOSCRIBE_MODELS_DIR") {
        config.storage.models_dir = Some(PathBuf::from(dir));
    }

    Ok(config)
}
