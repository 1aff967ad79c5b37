//! Default configuration values and constants for bookvox.
//!
//! Numbers that show up in more than one place live here so the config
//! layer, the pipeline, and the tests all agree on them.

/// Sample rate the synthesis endpoint emits (24 kHz mono LE i16).
pub const SAMPLE_RATE: u32 = 24_000;

/// Number of channels in synthesized audio.
pub const CHANNELS: u16 = 1;

/// Target number of words per synthesized segment.
pub const WORDS_PER_SEGMENT: usize = 100;

/// Lower bound accepted for `reader.words_per_segment`.
pub const MIN_WORDS_PER_SEGMENT: usize = 50;

/// Upper bound accepted for `reader.words_per_segment`.
pub const MAX_WORDS_PER_SEGMENT: usize = 200;

/// Maximum synthesis attempts per segment before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Seconds to wait between synthesis attempts.
pub const RETRY_BACKOFF_SECS: u64 = 2;

/// Per-attempt HTTP timeout in seconds. Long segments at a slow voice
/// can take a while, but a stuck request should not hang the pipeline.
pub const ATTEMPT_TIMEOUT_SECS: u64 = 90;

/// Segments synthesized ahead of the one currently playing.
pub const LOOKAHEAD: usize = 1;

/// Upper bound accepted for `synthesis.lookahead`.
pub const MAX_LOOKAHEAD: usize = 4;

/// Minimum playback speed multiplier.
pub const MIN_SPEED: f64 = 0.25;

/// Maximum playback speed multiplier.
pub const MAX_SPEED: f64 = 4.0;

/// Seconds skipped by a relative seek step.
pub const SEEK_STEP_SECS: f64 = 15.0;

/// Model identifier used for synthesis requests.
pub const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Voice used when the config names none.
pub const VOICE: &str = "Puck";

/// Style preset used when the config names none.
pub const STYLE: &str = "Narrator";

/// Milliseconds of silence scheduled before the first segment so the
/// output device has time to spin up.
pub const LEAD_IN_MS: u64 = 40;

/// How long `stop()` waits for pipeline threads before declaring them hung.
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
