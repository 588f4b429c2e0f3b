use crate::audio::AudioSource;
use crate::cli::commands::*;
use crate::config;
use crate::config::settings::ComputePrecision;
use crate::error::{DeposcribeError, Result};
use crate::models::{DiarizationModel, ModelManager, WhisperModel};
use crate::pipeline::aligner::WhisperAligner;
use crate::pipeline::diarizer::SortformerDiarizer;
use crate::pipeline::orchestrator::TranscriptionPipeline;
use crate::pipeline::recognizer::WhisperRecognizer;
use crate::pipeline::CancelToken;
use crate::transcript::{Transcript, TranscriptSegment};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn handle_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Transcribe {
            input,
            output,
            language,
            model,
            no_word_timing,
            no_diarization,
            dictionary,
        } => {
            handle_transcribe(
                input,
                output,
                language,
                model,
                no_word_timing,
                no_diarization,
                dictionary,
            )
            .await
        }
        Commands::Config { action } => handle_config(action).await,
        Commands::Models { action } => handle_models(action).await,
        Commands::Diarization { action } => handle_diarization(action).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_transcribe(
    input: PathBuf,
    output: Option<PathBuf>,
    language: Option<String>,
    model: Option<String>,
    no_word_timing: bool,
    no_diarization: bool,
    dictionary: Option<PathBuf>,
) -> Result<()> {
    let mut cfg = config::loader::load_config_with_env()?;

    if let Some(language) = language {
        cfg.transcription.language = language;
    }
    if let Some(model) = model {
        cfg.transcription.model_size = model;
    }
    if no_word_timing {
        cfg.transcription.enable_word_timing = false;
    }
    if no_diarization {
        cfg.transcription.enable_diarization = false;
    }
    if let Some(path) = dictionary {
        let content = std::fs::read_to_string(&path)?;
        let extra: Vec<(String, String)> = serde_json::from_str(&content)?;
        cfg.transcription.custom_dictionary.extend(extra);
    }

    let models_dir = config::loader::models_dir(&cfg)?;
    let manager = ModelManager::new(models_dir);

    let whisper_model =
        WhisperModel::from_str(&cfg.transcription.model_size).ok_or_else(|| {
            DeposcribeError::Config(format!(
                "Unknown model: {}. Use: tiny, base, small, medium, large-v3",
                cfg.transcription.model_size
            ))
        })?;

    if !manager.whisper_exists(whisper_model) {
        return Err(DeposcribeError::Config(format!(
            "Whisper model '{}' not downloaded. Run: deposcribe models download {}",
            whisper_model, whisper_model
        )));
    }

    let use_gpu = cfg.transcription.use_gpu();
    let flash_attn = use_gpu && cfg.transcription.compute_precision == ComputePrecision::Float16;

    let recognizer = Arc::new(WhisperRecognizer::new(
        manager.whisper_path(whisper_model),
        use_gpu,
        flash_attn,
        cfg.decode.clone(),
    )?);

    let mut pipeline = TranscriptionPipeline::new(recognizer.clone());

    if cfg.transcription.enable_word_timing {
        pipeline = pipeline.with_aligner(Arc::new(WhisperAligner::new(
            recognizer.context(),
            cfg.decode.threads,
        )));
    }

    if cfg.transcription.enable_diarization {
        let diar_model = DiarizationModel::SortformerV2;
        if !manager.diarization_exists(diar_model) {
            return Err(DeposcribeError::Config(
                "Diarization model not found. Run: deposcribe diarization download sortformer-v2"
                    .into(),
            ));
        }

        match SortformerDiarizer::new(manager.diarization_path(diar_model)) {
            Ok(diarizer) => {
                pipeline = pipeline.with_diarizer(Arc::new(diarizer));
            }
            Err(e) => {
                tracing::warn!(error = %e, "diarization model failed to load, speakers will be unknown");
            }
        }
    }

    println!("Transcribing: {}", input.display());
    let audio = AudioSource::from_wav_file(&input)?;
    println!(
        "Audio: {:.1}s at {} Hz",
        audio.duration_seconds(),
        audio.sample_rate()
    );

    let cancel = CancelToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            ctrl_c_cancel.cancel();
        }
    });

    let settings = cfg.transcription.clone();
    let result =
        tokio::task::spawn_blocking(move || pipeline.run(&audio, &settings, &cancel)).await?;

    let transcript = match result {
        Ok(transcript) => transcript,
        Err(failure) => {
            // The failed record is still worth keeping; write it out before
            // reporting the error.
            if let Some(path) = &output {
                let json = serde_json::to_string_pretty(&failure.transcript)?;
                std::fs::write(path, json)?;
                eprintln!("Failed transcript record written to: {}", path.display());
            }
            return Err(failure.error);
        }
    };

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&transcript)?;
            std::fs::write(&path, json)?;
            println!("Transcript written to: {}", path.display());
        }
        None => print_transcript(&transcript),
    }

    Ok(())
}

fn print_transcript(transcript: &Transcript) {
    println!(
        "\nTranscript ({} segments, {} words, {} speakers):\n",
        transcript.segment_count, transcript.word_count, transcript.speaker_count
    );
    for segment in &transcript.segments {
        print_segment(segment);
    }
    if let Some(language) = &transcript.language {
        println!("\nLanguage: {}", language);
    }
}

fn print_segment(segment: &TranscriptSegment) {
    if segment.has_known_speaker() {
        println!(
            "[{}] [{}] {}",
            segment.format_timestamp(),
            segment.speaker,
            segment.text
        );
    } else {
        println!("[{}] {}", segment.format_timestamp(), segment.text);
    }
}

async fn handle_config(action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let cfg = config::loader::load_config()?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigCommands::Path => {
            println!("{}", config::loader::config_path()?.display());
        }
        ConfigCommands::Init => {
            let cfg = config::loader::load_config()?;
            println!(
                "Configuration initialized at: {}",
                config::loader::config_path()?.display()
            );
            println!("\nDefault settings:");
            println!("  Model: {}", cfg.transcription.model_size);
            println!("  Language: {}", cfg.transcription.language);
            println!("  Word timing: {}", cfg.transcription.enable_word_timing);
            println!("  Diarization: {}", cfg.transcription.enable_diarization);
        }
    }
    Ok(())
}

async fn handle_models(action: ModelCommands) -> Result<()> {
    let cfg = config::loader::load_config_with_env()?;
    let manager = ModelManager::new(config::loader::models_dir(&cfg)?);

    match action {
        ModelCommands::List => {
            println!("{:<10} {:<12} {:<10}", "Model", "Size (MB)", "Downloaded");
            println!("{}", "-".repeat(35));

            for (model, exists, size) in manager.list_whisper() {
                let status = if exists { "✓" } else { "-" };
                println!("{:<10} {:<12} {:<10}", model, size, status);
            }
        }
        ModelCommands::Download { model } => {
            let whisper_model = WhisperModel::from_str(&model).ok_or_else(|| {
                DeposcribeError::Config(format!(
                    "Unknown model: {}. Use: tiny, base, small, medium, large-v3",
                    model
                ))
            })?;

            println!(
                "Downloading {} model (~{} MB)...",
                whisper_model,
                whisper_model.size_mb()
            );

            let path = tokio::task::spawn_blocking(move || {
                manager.download_whisper(whisper_model, print_progress)
            })
            .await??;

            println!("\nDownloaded to: {}", path.display());
        }
        ModelCommands::Delete { model } => {
            let whisper_model = WhisperModel::from_str(&model)
                .ok_or_else(|| DeposcribeError::Config(format!("Unknown model: {}", model)))?;

            manager.delete_whisper(whisper_model)?;
            println!("Deleted {} model", model);
        }
    }
    Ok(())
}

async fn handle_diarization(action: DiarizationCommands) -> Result<()> {
    let cfg = config::loader::load_config_with_env()?;
    let manager = ModelManager::new(config::loader::models_dir(&cfg)?);

    match action {
        DiarizationCommands::List => {
            println!("{:<20} {:<12} {:<10}", "Model", "Size (MB)", "Downloaded");
            println!("{}", "-".repeat(45));

            for (model, exists, size) in manager.list_diarization() {
                let status = if exists { "✓" } else { "-" };
                println!("{:<20} {:<12} {:<10}", model, size, status);
            }
        }
        DiarizationCommands::Download { model } => {
            let diar_model = DiarizationModel::from_str(&model).ok_or_else(|| {
                DeposcribeError::Config(format!("Unknown model: {}. Use: sortformer-v2", model))
            })?;

            println!("Downloading {} (~{} MB)...", diar_model, diar_model.size_mb());

            let path = tokio::task::spawn_blocking(move || {
                manager.download_diarization(diar_model, print_progress)
            })
            .await??;

            println!("\nDownloaded to: {}", path.display());
        }
        DiarizationCommands::Delete { model } => {
            let diar_model = DiarizationModel::from_str(&model)
                .ok_or_else(|| DeposcribeError::Config(format!("Unknown model: {}", model)))?;

            manager.delete_diarization(diar_model)?;
            println!("Deleted {} model", model);
        }
    }
    Ok(())
}

fn print_progress(downloaded: u64, total: u64) {
    let percent = (downloaded as f64 / total as f64 * 100.0) as u32;
    print!(
        "\rProgress: {}% ({}/{} MB)",
        percent,
        downloaded / 1024 / 1024,
        total / 1024 / 1024
    );
    std::io::stdout().flush().ok();
}
