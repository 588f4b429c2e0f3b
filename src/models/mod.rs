use crate::error::{DeposcribeError, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Whisper model variants the recognizer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperModel {
    Tiny,
    Base,
    Small,
    Medium,
    LargeV3,
}

impl WhisperModel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace("-", "").replace("_", "").as_str() {
            "tiny" => Some(Self::Tiny),
            "base" => Some(Self::Base),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" | "largev3" => Some(Self::LargeV3),
            _ => None,
        }
    }

    pub fn filename(&self) -> &'static str {
        match self {
            Self::Tiny => "ggml-tiny.bin",
            Self::Base => "ggml-base.bin",
            Self::Small => "ggml-small.bin",
            Self::Medium => "ggml-medium.bin",
            Self::LargeV3 => "ggml-large-v3.bin",
        }
    }

    pub fn download_url(&self) -> &'static str {
        match self {
            Self::Tiny => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.bin",
            Self::Base => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin",
            Self::Small => {
                "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin"
            }
            Self::Medium => {
                "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-medium.bin"
            }
            Self::LargeV3 => {
                "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3.bin"
            }
        }
    }

    pub fn size_mb(&self) -> u64 {
        match self {
            Self::Tiny => 75,
            Self::Base => 142,
            Self::Small => 466,
            Self::Medium => 1500,
            Self::LargeV3 => 2900,
        }
    }

    pub fn all() -> &'static [WhisperModel] {
        &[
            Self::Tiny,
            Self::Base,
            Self::Small,
            Self::Medium,
            Self::LargeV3,
        ]
    }
}

impl std::fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tiny => write!(f, "tiny"),
            Self::Base => write!(f, "base"),
            Self::Small => write!(f, "small"),
            Self::Medium => write!(f, "medium"),
            Self::LargeV3 => write!(f, "large-v3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiarizationModel {
    SortformerV2,
}

impl DiarizationModel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace("-", "").replace("_", "").as_str() {
            "sortformer" | "sortformerv2" | "sortformer2" => Some(Self::SortformerV2),
            _ => None,
        }
    }

    pub fn filename(&self) -> &'static str {
        match self {
            Self::SortformerV2 => "diar_streaming_sortformer_4spk-v2.onnx",
        }
    }

    pub fn download_url(&self) -> &'static str {
        match self {
            Self::SortformerV2 => {
                "https://huggingface.co/altunenes/parakeet-rs/resolve/main/diar_streaming_sortformer_4spk-v2.onnx"
            }
        }
    }

    pub fn size_mb(&self) -> u64 {
        match self {
            Self::SortformerV2 => 50,
        }
    }

    pub fn all() -> &'static [DiarizationModel] {
        &[Self::SortformerV2]
    }
}

impl std::fmt::Display for DiarizationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SortformerV2 => write!(f, "sortformer-v2"),
        }
    }
}

/// Files both managers store under one models directory.
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    pub fn new(models_dir: PathBuf) -> Self {
        Self { models_dir }
    }

    pub fn whisper_path(&self, model: WhisperModel) -> PathBuf {
        self.models_dir.join(model.filename())
    }

    pub fn whisper_exists(&self, model: WhisperModel) -> bool {
        self.whisper_path(model).exists()
    }

    pub fn diarization_path(&self, model: DiarizationModel) -> PathBuf {
        self.models_dir.join(model.filename())
    }

    pub fn diarization_exists(&self, model: DiarizationModel) -> bool {
        self.diarization_path(model).exists()
    }

    pub fn list_whisper(&self) -> Vec<(WhisperModel, bool, u64)> {
        WhisperModel::all()
            .iter()
            .map(|m| (*m, self.whisper_exists(*m), m.size_mb()))
            .collect()
    }

    pub fn list_diarization(&self) -> Vec<(DiarizationModel, bool, u64)> {
        DiarizationModel::all()
            .iter()
            .map(|m| (*m, self.diarization_exists(*m), m.size_mb()))
            .collect()
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.models_dir)?;
        Ok(())
    }

    pub fn download_whisper<F>(&self, model: WhisperModel, progress: F) -> Result<PathBuf>
    where
        F: Fn(u64, u64),
    {
        self.ensure_dir()?;
        let path = self.whisper_path(model);
        download_to(&path, model.download_url(), model.size_mb(), progress)
    }

    pub fn download_diarization<F>(&self, model: DiarizationModel, progress: F) -> Result<PathBuf>
    where
        F: Fn(u64, u64),
    {
        self.ensure_dir()?;
        let path = self.diarization_path(model);
        download_to(&path, model.download_url(), model.size_mb(), progress)
    }

    pub fn delete_whisper(&self, model: WhisperModel) -> Result<()> {
        delete_file(&self.whisper_path(model))
    }

    pub fn delete_diarization(&self, model: DiarizationModel) -> Result<()> {
        delete_file(&self.diarization_path(model))
    }
}

fn delete_file(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Streaming download with a `.tmp` staging file, renamed into place only
/// once the body is fully written. Already-present files are reported as
/// complete without touching the network.
fn download_to<F>(path: &Path, url: &str, size_mb: u64, progress: F) -> Result<PathBuf>
where
    F: Fn(u64, u64),
{
    if path.exists() {
        let size = fs::metadata(path)?.len();
        progress(size, size);
        return Ok(path.to_path_buf());
    }

    let response = reqwest::blocking::Client::new()
        .get(url)
        .send()
        .map_err(|e| DeposcribeError::Download(format!("Download failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(DeposcribeError::Download(format!(
            "Failed to download: HTTP {}",
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(size_mb * 1024 * 1024);
    stage_download(path, response, total_size, progress)
}

/// Stream a body into `path` via a `.tmp` staging file. An interrupted
/// write removes the staging file so no partial download lingers.
fn stage_download<R, F>(path: &Path, reader: R, total_size: u64, progress: F) -> Result<PathBuf>
where
    R: Read,
    F: Fn(u64, u64),
{
    let temp_path = path.with_extension("tmp");

    match copy_body(reader, &temp_path, total_size, &progress) {
        Ok(()) => {
            fs::rename(&temp_path, path)?;
            Ok(path.to_path_buf())
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn copy_body<R, F>(mut reader: R, temp_path: &Path, total_size: u64, progress: &F) -> Result<()>
where
    R: Read,
    F: Fn(u64, u64),
{
    let mut file = fs::File::create(temp_path)?;
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(DeposcribeError::Io)?;
        if bytes_read == 0 {
            return Ok(());
        }
        file.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;
        progress(downloaded, total_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_whisper_from_str() {
        assert_eq!(WhisperModel::from_str("base"), Some(WhisperModel::Base));
        assert_eq!(WhisperModel::from_str("BASE"), Some(WhisperModel::Base));
        assert_eq!(
            WhisperModel::from_str("large-v3"),
            Some(WhisperModel::LargeV3)
        );
        assert_eq!(WhisperModel::from_str("large"), Some(WhisperModel::LargeV3));
        assert_eq!(WhisperModel::from_str("invalid"), None);
    }

    #[test]
    fn test_diarization_from_str() {
        assert_eq!(
            DiarizationModel::from_str("sortformer"),
            Some(DiarizationModel::SortformerV2)
        );
        assert_eq!(DiarizationModel::from_str("nope"), None);
    }

    #[test]
    fn test_whisper_display_roundtrips_from_str() {
        for model in WhisperModel::all() {
            assert_eq!(WhisperModel::from_str(&model.to_string()), Some(*model));
        }
    }

    #[test]
    fn test_model_paths() {
        let dir = tempdir().unwrap();
        let manager = ModelManager::new(dir.path().to_path_buf());
        assert!(manager
            .whisper_path(WhisperModel::Base)
            .ends_with("ggml-base.bin"));
        assert!(manager
            .diarization_path(DiarizationModel::SortformerV2)
            .ends_with("diar_streaming_sortformer_4spk-v2.onnx"));
    }

    #[test]
    fn test_model_exists() {
        let dir = tempdir().unwrap();
        let manager = ModelManager::new(dir.path().to_path_buf());
        manager.ensure_dir().unwrap();

        fs::write(manager.whisper_path(WhisperModel::Base), b"dummy").unwrap();

        assert!(manager.whisper_exists(WhisperModel::Base));
        assert!(!manager.whisper_exists(WhisperModel::Tiny));
        assert!(!manager.diarization_exists(DiarizationModel::SortformerV2));
    }

    #[test]
    fn test_list_whisper() {
        let dir = tempdir().unwrap();
        let manager = ModelManager::new(dir.path().to_path_buf());
        manager.ensure_dir().unwrap();
        fs::write(manager.whisper_path(WhisperModel::Tiny), b"dummy").unwrap();

        let listed = manager.list_whisper();
        assert_eq!(listed.len(), 5);
        let tiny = listed
            .iter()
            .find(|(m, _, _)| *m == WhisperModel::Tiny)
            .unwrap();
        assert!(tiny.1);
        let base = listed
            .iter()
            .find(|(m, _, _)| *m == WhisperModel::Base)
            .unwrap();
        assert!(!base.1);
    }

    #[test]
    fn test_delete_model() {
        let dir = tempdir().unwrap();
        let manager = ModelManager::new(dir.path().to_path_buf());
        manager.ensure_dir().unwrap();

        let path = manager.whisper_path(WhisperModel::Base);
        fs::write(&path, b"dummy").unwrap();
        assert!(manager.delete_whisper(WhisperModel::Base).is_ok());
        assert!(!path.exists());

        // Deleting an absent model is a no-op.
        assert!(manager.delete_whisper(WhisperModel::Base).is_ok());
    }

    #[test]
    fn test_download_skips_existing_file() {
        let dir = tempdir().unwrap();
        let manager = ModelManager::new(dir.path().to_path_buf());
        manager.ensure_dir().unwrap();

        let path = manager.whisper_path(WhisperModel::Base);
        fs::write(&path, b"already here").unwrap();

        let reported = std::cell::Cell::new(None);
        let result = download_to(&path, "http://invalid.test/unused", 142, |done, total| {
            reported.set(Some((done, total)));
        });
        assert_eq!(result.unwrap(), path);
        assert_eq!(reported.get(), Some((12, 12)));
    }

    #[test]
    fn test_stage_download_writes_file_and_clears_staging() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");

        let body = std::io::Cursor::new(b"model bytes".to_vec());
        let result = stage_download(&path, body, 11, |_, _| {}).unwrap();
        assert_eq!(result, path);
        assert_eq!(fs::read(&path).unwrap(), b"model bytes");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_interrupted_download_removes_staging_file() {
        struct BrokenBody {
            served: bool,
        }

        impl Read for BrokenBody {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.served {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "connection reset",
                    ))
                } else {
                    self.served = true;
                    buf[..4].copy_from_slice(b"part");
                    Ok(4)
                }
            }
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");

        let result = stage_download(&path, BrokenBody { served: false }, 100, |_, _| {});
        assert!(result.is_err());
        assert!(!path.exists());
        assert!(
            !path.with_extension("tmp").exists(),
            "staging file must not outlive a failed download"
        );
    }
}
