//! Command-line interface for bookvox
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// Listen to books through a remote TTS voice
#[derive(Parser, Debug)]
#[command(name = "bookvox", version, about = "Listen to books through a remote TTS voice")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Voice name (see `bookvox voices`)
    #[arg(long, global = true, value_name = "NAME")]
    pub voice: Option<String>,

    /// Style preset (Storyteller, Narrator, Podcast) or a free-text
    /// reading directive; empty string disables the directive
    #[arg(long, global = true, value_name = "STYLE")]
    pub style: Option<String>,

    /// Words per synthesized segment (50-200)
    #[arg(long, global = true, value_name = "N")]
    pub words: Option<usize>,

    /// Segments to synthesize ahead of playback (1-4)
    #[arg(long, global = true, value_name = "N")]
    pub lookahead: Option<usize>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a book aloud
    Play {
        /// Book file: JSON chapter list, or plain text/markdown
        file: PathBuf,

        /// Chapter to start from (1-based)
        #[arg(long, value_name = "N", default_value = "1")]
        chapter: usize,

        /// Segment within that chapter to start from (1-based)
        #[arg(long, value_name = "N", default_value = "1")]
        segment: usize,

        /// Audio output device (see `bookvox devices`)
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// Initial playback speed (0.25-4.0)
        #[arg(long, value_name = "MULTIPLIER")]
        speed: Option<f64>,
    },

    /// Synthesize a book to a WAV file (24 kHz mono)
    Render {
        /// Book file: JSON chapter list, or plain text/markdown
        file: PathBuf,

        /// Output path (default: book name with .wav extension)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Chapter to start from (1-based)
        #[arg(long, value_name = "N", default_value = "1")]
        chapter: usize,

        /// Segment within that chapter to start from (1-based)
        #[arg(long, value_name = "N", default_value = "1")]
        segment: usize,
    },

    /// List a book's chapters with word counts
    Chapters {
        /// Book file: JSON chapter list, or plain text/markdown
        file: PathBuf,
    },

    /// List the available voices
    Voices,

    /// List available audio output devices
    Devices,
}

impl Cli {
    /// Fold command-line flags into the loaded config. CLI beats
    /// config file and environment.
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(voice) = &self.voice {
            config.synthesis.voice = voice.clone();
        }
        if let Some(style) = &self.style {
            config.synthesis.style = style.clone();
        }
        if let Some(words) = self.words {
            config.reader.words_per_segment = words;
        }
        if let Some(lookahead) = self.lookahead {
            config.reader.lookahead = lookahead;
        }
        if let Some(Commands::Play { device, speed, .. }) = &self.command {
            if let Some(device) = device {
                config.playback.device = Some(device.clone());
            }
            if let Some(speed) = speed {
                config.playback.speed = *speed;
            }
        }
        config
    }
}
