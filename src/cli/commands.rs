use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deposcribe")]
#[command(
    author,
    version,
    about = "Offline audio transcription with word timings and speaker labels"
)]
#[command(
    long_about = "Transcribe audio locally: speech recognition, word-level alignment, speaker diarization, and dictionary-based corrections in one pass"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe a WAV file
    Transcribe {
        /// Path to the input WAV file
        input: PathBuf,

        /// Write the transcript JSON here instead of printing a summary
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Language code (overrides config; "auto" to detect)
        #[arg(short, long)]
        language: Option<String>,

        /// Whisper model size (overrides config)
        #[arg(short, long)]
        model: Option<String>,

        /// Skip word-level alignment
        #[arg(long)]
        no_word_timing: bool,

        /// Skip speaker diarization
        #[arg(long)]
        no_diarization: bool,

        /// JSON array of extra [pattern, replacement] pairs, appended after
        /// the configured dictionary
        #[arg(long)]
        dictionary: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Whisper model management
    Models {
        #[command(subcommand)]
        action: ModelCommands,
    },

    /// Speaker diarization model management
    Diarization {
        #[command(subcommand)]
        action: DiarizationCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Print config file path
    Path,
    /// Initialize default configuration
    Init,
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// List available Whisper models
    List,
    /// Download a Whisper model
    Download {
        /// Model name: tiny, base, small, medium, large-v3
        model: String,
    },
    /// Delete a downloaded model
    Delete { model: String },
}

#[derive(Subcommand)]
pub enum DiarizationCommands {
    /// List available diarization models
    List,
    /// Download a diarization model
    Download {
        /// Model name: sortformer-v2
        model: String,
    },
    /// Delete a downloaded model
    Delete { model: String },
}
