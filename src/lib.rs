//! bookvox - Listen to books through a remote TTS voice
//!
//! Chunked synthesis with bounded look-ahead, streamed into a gapless
//! playback engine with pause, seek, and speed control.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod book;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod player;
pub mod render;
pub mod segment;
pub mod session;
pub mod synth;
pub mod transport;
pub mod voice;

// Document model
pub use book::{Book, Chapter, build_playlist};

// Synthesis seam
pub use synth::{GeminiSynthesizer, MockSynthesizer, RetryPolicy, SpeechSynthesizer};

// Prefetch pipeline
pub use pipeline::{
    AudioSegment, LogReporter, MemoryReporter, PipelineReport, PlaylistEntry, PrefetchEvent,
    Prefetcher, ProgressReporter,
};

// Playback
pub use player::{EngineState, ManualOutput, OutputDevice, StreamingEngine, Timeline};
pub use session::{PlaybackSession, SessionOutcome, SessionParams, start_session};
pub use transport::{TransportCommand, TransportHandle, transport_channel};

// Error handling
pub use error::{BookvoxError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
