//! Speech synthesis: the trait seam the pipeline drives, the retry
//! policy shared by backends, and PCM conversion helpers.

pub mod gemini;

pub use gemini::GeminiSynthesizer;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{BookvoxError, Result};

/// A backend that turns one text segment into mono 24 kHz PCM.
///
/// Calls block until audio is available or retries are exhausted; the
/// backend owns its own timeouts so a call never blocks indefinitely.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<Vec<i16>>;
    fn name(&self) -> &str;
}

/// How long to wait between attempts. Injectable so tests can count
/// sleeps instead of taking them.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Bounded retry with a mildly increasing backoff.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    sleeper: Sleeper,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self::with_sleeper(max_attempts, backoff, Arc::new(std::thread::sleep))
    }

    pub fn with_sleeper(max_attempts: u32, backoff: Duration, sleeper: Sleeper) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            sleeper,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` up to `max_attempts` times. `on_retry` is called after
    /// each failed attempt that will be retried. The final failure is
    /// wrapped in `SynthesisFailed` carrying the attempt count and the
    /// last error's detail.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T>,
        mut on_retry: impl FnMut(u32, &BookvoxError),
    ) -> Result<T> {
        let mut last_detail = String::new();
        for attempt in 1..=self.max_attempts {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    last_detail = e.to_string();
                    if attempt < self.max_attempts {
                        on_retry(attempt, &e);
                        // Back off a little longer each time.
                        (self.sleeper)(self.backoff * attempt);
                    }
                }
            }
        }
        Err(BookvoxError::SynthesisFailed {
            attempts: self.max_attempts,
            detail: last_detail,
        })
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Convert little-endian 16-bit PCM bytes to samples. An odd trailing
/// byte is padded with zero rather than dropped, matching what the
/// remote engine occasionally emits.
pub fn pcm_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    let mut samples = Vec::with_capacity(bytes.len().div_ceil(2));
    let mut chunks = bytes.chunks_exact(2);
    for pair in &mut chunks {
        samples.push(i16::from_le_bytes([pair[0], pair[1]]));
    }
    if let [lone] = chunks.remainder() {
        samples.push(i16::from_le_bytes([*lone, 0]));
    }
    samples
}

/// Scripted synthesizer for tests: returns deterministic PCM derived
/// from the text, fails permanently on texts marked as poisoned, and
/// records every call.
#[derive(Default)]
pub struct MockSynthesizer {
    samples_per_call: usize,
    fail_markers: Vec<String>,
    transient_failures: Mutex<u32>,
    calls: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    pub fn new(samples_per_call: usize) -> Self {
        Self {
            samples_per_call,
            ..Self::default()
        }
    }

    /// Any synthesis call whose text contains `marker` fails.
    pub fn fail_on(mut self, marker: &str) -> Self {
        self.fail_markers.push(marker.to_string());
        self
    }

    /// The first `n` calls return empty audio regardless of text.
    pub fn with_transient_failures(self, n: u32) -> Self {
        *self
            .transient_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = n;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Deterministic fill value so segments from different texts are
    /// distinguishable in assertions.
    pub fn fill_value(text: &str) -> i16 {
        (text.len() % 1000) as i16 + 1
    }
}

impl SpeechSynthesizer for MockSynthesizer {
    fn synthesize(&self, text: &str) -> Result<Vec<i16>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());

        {
            let mut transient = self
                .transient_failures
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if *transient > 0 {
                *transient -= 1;
                return Err(BookvoxError::ResponseFormat {
                    message: "response contained no audio parts".to_string(),
                });
            }
        }

        if self.fail_markers.iter().any(|m| text.contains(m.as_str())) {
            return Err(BookvoxError::SynthesisFailed {
                attempts: 1,
                detail: "scripted failure".to_string(),
            });
        }

        Ok(vec![Self::fill_value(text); self.samples_per_call])
    }

    fn name(&self) -> &str {
        "mock"
    }
}
