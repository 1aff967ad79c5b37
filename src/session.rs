//! One play action, end to end.
//!
//! Builds the playlist, starts the prefetcher and the engine, and runs
//! a control loop that interleaves transport commands with ordered
//! segment delivery. The control loop is the only context that touches
//! engine state, so transport and ingest never race.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, never, select};

use crate::book::{Book, build_playlist};
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::error::ProgressReporter;
use crate::pipeline::prefetch::Prefetcher;
use crate::pipeline::types::PrefetchEvent;
use crate::player::engine::{EngineState, StreamingEngine};
use crate::player::output::OutputDevice;
use crate::synth::SpeechSynthesizer;
use crate::transport::{TransportCommand, TransportHandle, transport_channel};

const TICK: Duration = Duration::from_millis(100);

/// Everything a play action needs beyond the book itself.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// 0-based chapter to start from.
    pub start_chapter: usize,
    /// 1-based segment position within that chapter.
    pub start_position: usize,
    pub words_per_segment: usize,
    pub lookahead: usize,
    pub lead_in_ms: u64,
    pub speed: f64,
}

impl SessionParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_chapter: 0,
            start_position: 1,
            words_per_segment: config.reader.words_per_segment,
            lookahead: config.reader.lookahead,
            lead_in_ms: config.playback.lead_in_ms,
            speed: config.playback.speed,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// Segments ingested into the engine.
    pub delivered: usize,
    pub total: usize,
    /// Set when synthesis failed partway; everything delivered before
    /// the failure was still played.
    pub failure: Option<String>,
}

/// A running play action. Exactly one should be active at a time;
/// dropping or stopping it cancels prefetch and releases the device.
pub struct PlaybackSession {
    transport: TransportHandle,
    control: Option<JoinHandle<SessionOutcome>>,
}

/// Start playing `book` from the position in `params`.
///
/// Fails up front on an empty playlist or an unavailable output
/// device; after that, synthesis failures end the session gracefully
/// once already-delivered audio has played out.
pub fn start_session(
    book: &Book,
    params: &SessionParams,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    reporter: Arc<dyn ProgressReporter>,
    device: Box<dyn OutputDevice>,
) -> Result<PlaybackSession> {
    let playlist = build_playlist(
        book,
        params.start_chapter,
        params.start_position,
        params.words_per_segment,
    )?;
    let total = playlist.len();

    let mut engine = StreamingEngine::new(device, params.lead_in_ms, params.speed);
    engine.start()?;

    let prefetcher = Prefetcher::new(synthesizer, reporter, params.lookahead);
    let prefetch = prefetcher.spawn(playlist);

    let (transport, commands) = transport_channel();

    let control = thread::Builder::new()
        .name("session-control".to_string())
        .spawn(move || control_loop(engine, prefetch, commands, total))
        .expect("failed to spawn session control thread");

    Ok(PlaybackSession {
        transport,
        control: Some(control),
    })
}

fn control_loop(
    mut engine: StreamingEngine,
    prefetch: crate::pipeline::prefetch::PrefetchHandle,
    commands: Receiver<TransportCommand>,
    total: usize,
) -> SessionOutcome {
    let mut events = prefetch.events.clone();
    let mut delivery_done = false;
    let mut delivered = 0usize;
    let mut failure: Option<String> = None;

    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(PrefetchEvent::Segment(segment)) => {
                    if let Err(e) = engine.ingest(segment) {
                        failure = Some(e.to_string());
                        break;
                    }
                    delivered += 1;
                }
                Ok(PrefetchEvent::Failed { label, error, .. }) => {
                    failure = Some(format!("{label}: {error}"));
                    delivery_done = true;
                }
                Ok(PrefetchEvent::Finished) => delivery_done = true,
                Err(_) => {
                    // Pipeline threads are gone; stop selecting on a
                    // disconnected channel.
                    delivery_done = true;
                    events = never();
                }
            },
            recv(commands) -> msg => match msg {
                Ok(TransportCommand::PauseToggle) => {
                    engine.toggle_pause();
                }
                Ok(TransportCommand::Seek(delta)) => engine.seek_relative(delta),
                Ok(TransportCommand::SetSpeed(multiplier)) => engine.set_speed(multiplier),
                Ok(TransportCommand::Stop) | Err(_) => break,
            },
            default(TICK) => {}
        }

        // Done once everything that will ever arrive has played out.
        // A paused engine never exits on its own.
        if delivery_done
            && engine.state() == EngineState::Streaming
            && engine.position_seconds() + 1e-9 >= engine.duration_seconds()
        {
            break;
        }
    }

    prefetch.stop();
    engine.stop();

    SessionOutcome {
        delivered,
        total,
        failure,
    }
}

impl PlaybackSession {
    /// Command relay into the control loop. Cloneable, fire-and-forget.
    pub fn transport(&self) -> TransportHandle {
        self.transport.clone()
    }

    /// Block until playback finishes, fails, or is stopped.
    pub fn wait(mut self) -> SessionOutcome {
        self.join()
    }

    /// Stop playback and wait for teardown.
    pub fn stop(mut self) -> SessionOutcome {
        self.transport.stop();
        self.join()
    }

    fn join(&mut self) -> SessionOutcome {
        match self.control.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                eprintln!("bookvox: session control thread panicked");
                SessionOutcome {
                    delivered: 0,
                    total: 0,
                    failure: Some("session control thread panicked".to_string()),
                }
            }),
            None => SessionOutcome {
                delivered: 0,
                total: 0,
                failure: None,
            },
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if self.control.is_some() {
            self.transport.stop();
            self.join();
        }
    }
}
