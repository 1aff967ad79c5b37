//! The gapless streaming engine.
//!
//! Owns the timeline, the transport state, and the output device. The
//! device callback pulls samples straight off the timeline, so
//! consecutive segments abut exactly on the device clock regardless of
//! when they arrived. All transport operations take a short mutex hold
//! and return immediately; none of them block on I/O.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::defaults::{MAX_SPEED, MIN_SPEED, SAMPLE_RATE};
use crate::error::{BookvoxError, Result};
use crate::pipeline::types::AudioSegment;
use crate::player::output::OutputDevice;
use crate::player::timeline::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Streaming,
    Paused,
}

/// State shared with the device callback.
struct Shared {
    timeline: Timeline,
    paused: bool,
    speed: f64,
    /// Silent samples still to emit before the first audio, absorbing
    /// device startup latency.
    lead_in_remaining: u64,
}

pub struct StreamingEngine {
    device: Box<dyn OutputDevice>,
    shared: Arc<Mutex<Shared>>,
    state: EngineState,
    lead_in_samples: u64,
}

impl StreamingEngine {
    pub fn new(device: Box<dyn OutputDevice>, lead_in_ms: u64, speed: f64) -> Self {
        Self {
            device,
            shared: Arc::new(Mutex::new(Shared {
                timeline: Timeline::new(),
                paused: false,
                speed: speed.clamp(MIN_SPEED, MAX_SPEED),
                lead_in_remaining: 0,
            })),
            state: EngineState::Idle,
            lead_in_samples: lead_in_ms * SAMPLE_RATE as u64 / 1000,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Reset the timeline, acquire the output device, and enter
    /// Streaming. An already-active engine is stopped first. On device
    /// failure the engine stays Idle with no resources held.
    pub fn start(&mut self) -> Result<()> {
        if self.state != EngineState::Idle {
            self.stop();
        }

        {
            let mut shared = self.lock();
            shared.timeline.clear();
            shared.paused = false;
            shared.lead_in_remaining = self.lead_in_samples;
        }

        let shared = Arc::clone(&self.shared);
        self.device.start(Box::new(move |buf: &mut [i16]| {
            let mut shared = shared.lock().unwrap_or_else(|e| e.into_inner());
            if shared.paused {
                buf.fill(0);
                return;
            }
            let speed = shared.speed;
            for out in buf {
                *out = if shared.lead_in_remaining > 0 {
                    shared.lead_in_remaining -= 1;
                    0
                } else {
                    // Past the end of ingested audio this is an
                    // underrun: emit silence, leave the playhead put.
                    shared.timeline.advance(speed).unwrap_or(0)
                };
            }
        }))?;

        self.state = EngineState::Streaming;
        Ok(())
    }

    /// Append the next segment to the timeline. Must be called in
    /// ordinal order; only valid while a session is active.
    pub fn ingest(&mut self, segment: AudioSegment) -> Result<()> {
        if self.state == EngineState::Idle {
            return Err(BookvoxError::Other(
                "cannot ingest audio while the engine is idle".to_string(),
            ));
        }
        self.lock().timeline.append(segment)
    }

    /// Freeze or unfreeze the playhead exactly where it is. No samples
    /// are skipped or repeated across a pause/resume cycle.
    pub fn toggle_pause(&mut self) -> EngineState {
        match self.state {
            EngineState::Idle => {}
            EngineState::Streaming => {
                self.lock().paused = true;
                self.state = EngineState::Paused;
            }
            EngineState::Paused => {
                self.lock().paused = false;
                self.state = EngineState::Streaming;
            }
        }
        self.state
    }

    /// Move the playhead by `delta_seconds` within already-ingested
    /// audio. Never requests more data from upstream.
    pub fn seek_relative(&mut self, delta_seconds: f64) {
        if self.state == EngineState::Idle {
            return;
        }
        self.lock().timeline.seek_relative(delta_seconds);
    }

    /// Change the playback rate, effective from the next rendered
    /// sample, persisting for audio ingested later.
    pub fn set_speed(&mut self, multiplier: f64) {
        self.lock().speed = multiplier.clamp(MIN_SPEED, MAX_SPEED);
    }

    pub fn speed(&self) -> f64 {
        self.lock().speed
    }

    /// Halt output, discard the timeline, release the device, return
    /// to Idle. Safe from any state, including Idle.
    pub fn stop(&mut self) {
        self.device.stop();
        let mut shared = self.lock();
        shared.timeline.clear();
        shared.paused = false;
        shared.lead_in_remaining = 0;
        drop(shared);
        self.state = EngineState::Idle;
    }

    pub fn position_seconds(&self) -> f64 {
        self.lock().timeline.position_seconds()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.lock().timeline.duration_seconds()
    }

    /// Scheduled start of segment `index` on the timeline, in seconds
    /// past the lead-in.
    pub fn segment_start_seconds(&self, index: usize) -> Option<f64> {
        self.lock().timeline.segment_start_seconds(index)
    }

    pub fn segment_count(&self) -> usize {
        self.lock().timeline.segment_count()
    }
}

impl Drop for StreamingEngine {
    fn drop(&mut self) {
        self.device.stop();
    }
}
