//! The look-ahead prefetcher.
//!
//! A dispatcher thread feeds playlist entries to a small worker pool
//! over a rendezvous channel; workers drive the synthesizer; a
//! collector reorders completions by ordinal and delivers them over a
//! bounded channel. Channel capacities bound how far synthesis runs
//! ahead of consumption: with the default budget of one, a stalled
//! consumer stops synthesis after budget + 1 segments.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, bounded};

use crate::defaults::SHUTDOWN_TIMEOUT_MS;
use crate::error::Result;
use crate::pipeline::error::{PipelineReport, ProgressReporter};
use crate::pipeline::types::{AudioSegment, PlaylistEntry, PrefetchEvent};
use crate::synth::SpeechSynthesizer;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One synthesis completion on its way to the collector.
struct Completion {
    ordinal: u64,
    label: String,
    result: Result<Vec<i16>>,
}

pub struct Prefetcher {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    reporter: Arc<dyn ProgressReporter>,
    lookahead: usize,
}

impl Prefetcher {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        reporter: Arc<dyn ProgressReporter>,
        lookahead: usize,
    ) -> Self {
        Self {
            synthesizer,
            reporter,
            lookahead: lookahead.max(1),
        }
    }

    /// Start prefetching `playlist`. Events arrive on the handle's
    /// receiver strictly in ordinal order, ending with exactly one
    /// terminal event (`Finished` or `Failed`) unless cancelled first.
    pub fn spawn(&self, playlist: Vec<PlaylistEntry>) -> PrefetchHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        // Set once any entry fails permanently; stops dispatch of
        // later entries without tearing down delivery of earlier ones.
        let halted = Arc::new(AtomicBool::new(false));
        let total = playlist.len();

        let (work_tx, work_rx) = bounded::<PlaylistEntry>(0);
        let (done_tx, done_rx) = bounded::<Completion>(0);
        // The collector always has one segment in hand while it blocks
        // in `deliver`, so it counts against the look-ahead budget and
        // the event channel buffers one less.
        let (event_tx, event_rx) = bounded::<PrefetchEvent>(self.lookahead.saturating_sub(1));

        let mut threads = Vec::new();

        // Dispatcher
        {
            let cancel = Arc::clone(&cancel);
            let halted = Arc::clone(&halted);
            threads.push(
                thread::Builder::new()
                    .name("prefetch-dispatch".to_string())
                    .spawn(move || {
                        for entry in playlist {
                            let mut pending = entry;
                            loop {
                                if cancel.load(Ordering::SeqCst) || halted.load(Ordering::SeqCst) {
                                    return;
                                }
                                match work_tx.send_timeout(pending, POLL_INTERVAL) {
                                    Ok(()) => break,
                                    Err(SendTimeoutError::Timeout(back)) => pending = back,
                                    Err(SendTimeoutError::Disconnected(_)) => return,
                                }
                            }
                        }
                    })
                    .expect("failed to spawn prefetch dispatcher"),
            );
        }

        // Workers
        for i in 0..self.lookahead {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            let synthesizer = Arc::clone(&self.synthesizer);
            let cancel = Arc::clone(&cancel);
            let halted = Arc::clone(&halted);
            threads.push(
                thread::Builder::new()
                    .name(format!("prefetch-worker-{i}"))
                    .spawn(move || {
                        loop {
                            let entry = match work_rx.recv_timeout(POLL_INTERVAL) {
                                Ok(entry) => entry,
                                Err(RecvTimeoutError::Timeout) => {
                                    if cancel.load(Ordering::SeqCst) {
                                        return;
                                    }
                                    continue;
                                }
                                Err(RecvTimeoutError::Disconnected) => return,
                            };
                            // A cancellation or failure may have landed
                            // while this entry sat in the channel.
                            if cancel.load(Ordering::SeqCst) || halted.load(Ordering::SeqCst) {
                                continue;
                            }

                            let result = synthesizer.synthesize(&entry.text);
                            if result.is_err() {
                                halted.store(true, Ordering::SeqCst);
                            }
                            let mut completion = Completion {
                                ordinal: entry.ordinal,
                                label: entry.label(),
                                result,
                            };
                            loop {
                                if cancel.load(Ordering::SeqCst) {
                                    return;
                                }
                                match done_tx.send_timeout(completion, POLL_INTERVAL) {
                                    Ok(()) => break,
                                    Err(SendTimeoutError::Timeout(back)) => completion = back,
                                    Err(SendTimeoutError::Disconnected(_)) => return,
                                }
                            }
                        }
                    })
                    .expect("failed to spawn prefetch worker"),
            );
        }
        drop(done_tx);
        drop(work_rx);

        // Collector: reorder by ordinal, deliver ascending.
        {
            let cancel = Arc::clone(&cancel);
            let reporter = Arc::clone(&self.reporter);
            threads.push(
                thread::Builder::new()
                    .name("prefetch-collect".to_string())
                    .spawn(move || {
                        let mut buffer: BTreeMap<u64, (String, Result<Vec<i16>>)> = BTreeMap::new();
                        let mut next = 0u64;
                        let mut delivered = 0usize;

                        let deliver = |event: PrefetchEvent, cancel: &AtomicBool| -> bool {
                            let mut pending = event;
                            loop {
                                if cancel.load(Ordering::SeqCst) {
                                    return false;
                                }
                                match event_tx.send_timeout(pending, POLL_INTERVAL) {
                                    Ok(()) => return true,
                                    Err(SendTimeoutError::Timeout(back)) => pending = back,
                                    Err(SendTimeoutError::Disconnected(_)) => return false,
                                }
                            }
                        };

                        'collect: loop {
                            let completion = match done_rx.recv_timeout(POLL_INTERVAL) {
                                Ok(c) => c,
                                Err(RecvTimeoutError::Timeout) => {
                                    if cancel.load(Ordering::SeqCst) {
                                        return;
                                    }
                                    continue;
                                }
                                // All workers gone: playlist exhausted.
                                Err(RecvTimeoutError::Disconnected) => break,
                            };
                            buffer.insert(completion.ordinal, (completion.label, completion.result));

                            while let Some((label, result)) = buffer.remove(&next) {
                                match result {
                                    Ok(samples) => {
                                        let ordinal = next;
                                        reporter.report(&PipelineReport::Delivered {
                                            label,
                                            ordinal,
                                            total,
                                        });
                                        if !deliver(
                                            PrefetchEvent::Segment(AudioSegment {
                                                ordinal,
                                                samples,
                                            }),
                                            &cancel,
                                        ) {
                                            return;
                                        }
                                        delivered += 1;
                                        next += 1;
                                    }
                                    Err(error) => {
                                        reporter.report(&PipelineReport::Failed {
                                            label: label.clone(),
                                            detail: error.to_string(),
                                        });
                                        deliver(
                                            PrefetchEvent::Failed {
                                                ordinal: next,
                                                label,
                                                error,
                                            },
                                            &cancel,
                                        );
                                        return;
                                    }
                                }
                            }

                            if delivered == total {
                                break 'collect;
                            }
                        }

                        if !cancel.load(Ordering::SeqCst) && delivered == total {
                            reporter.report(&PipelineReport::Complete { total });
                            deliver(PrefetchEvent::Finished, &cancel);
                        }
                    })
                    .expect("failed to spawn prefetch collector"),
            );
        }

        PrefetchHandle {
            events: event_rx,
            cancel,
            threads,
        }
    }
}

/// Handle to a running prefetch. Dropping it cancels the work.
pub struct PrefetchHandle {
    /// Ordered event stream: zero or more `Segment`s, then one
    /// terminal `Finished` or `Failed`.
    pub events: Receiver<PrefetchEvent>,
    cancel: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl PrefetchHandle {
    /// Ask the pipeline to abandon queued work. In-flight synthesis
    /// finishes or times out on its own; its result is discarded.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Cancel and wait for the worker threads, joining finished ones
    /// to surface panics. Threads still alive past the deadline are
    /// detached and reported.
    pub fn stop(mut self) {
        self.cancel();

        let deadline = Instant::now() + Duration::from_millis(SHUTDOWN_TIMEOUT_MS);
        loop {
            let mut remaining = Vec::new();
            for handle in self.threads.drain(..) {
                if handle.is_finished() {
                    if let Err(panic_info) = handle.join() {
                        let msg = panic_info
                            .downcast_ref::<&str>()
                            .copied()
                            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                            .unwrap_or("unknown panic");
                        eprintln!("bookvox: prefetch thread panicked: {msg}");
                    }
                } else {
                    remaining.push(handle);
                }
            }
            self.threads = remaining;

            if self.threads.is_empty() {
                return;
            }
            if Instant::now() >= deadline {
                eprintln!(
                    "bookvox: {} prefetch thread(s) did not stop in time",
                    self.threads.len()
                );
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for PrefetchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
