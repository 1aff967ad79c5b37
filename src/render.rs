//! Offline render: synthesize a playlist straight to a WAV file.
//!
//! Reuses the prefetch pipeline without the playback engine, so the
//! same ordering and failure semantics apply. On a synthesis failure
//! the segments rendered so far are kept in the file.

use std::path::Path;
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::book::{Book, build_playlist};
use crate::defaults::{CHANNELS, SAMPLE_RATE};
use crate::error::{BookvoxError, Result};
use crate::pipeline::error::ProgressReporter;
use crate::pipeline::prefetch::Prefetcher;
use crate::pipeline::types::PrefetchEvent;
use crate::session::SessionParams;
use crate::synth::SpeechSynthesizer;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub segments: usize,
    pub duration_seconds: f64,
}

pub fn render_to_wav(
    book: &Book,
    params: &SessionParams,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    reporter: Arc<dyn ProgressReporter>,
    path: &Path,
) -> Result<RenderSummary> {
    let playlist = build_playlist(
        book,
        params.start_chapter,
        params.start_position,
        params.words_per_segment,
    )?;

    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(|e| {
        BookvoxError::Other(format!("failed to create {}: {e}", path.display()))
    })?;

    let prefetcher = Prefetcher::new(synthesizer, reporter, params.lookahead);
    let prefetch = prefetcher.spawn(playlist);

    let mut segments = 0usize;
    let mut samples_written = 0u64;
    let mut failure: Option<BookvoxError> = None;

    for event in prefetch.events.clone().iter() {
        match event {
            PrefetchEvent::Segment(segment) => {
                for sample in &segment.samples {
                    writer.write_sample(*sample).map_err(|e| {
                        BookvoxError::Other(format!("failed to write WAV sample: {e}"))
                    })?;
                }
                samples_written += segment.samples.len() as u64;
                segments += 1;
            }
            PrefetchEvent::Failed { error, .. } => {
                failure = Some(error);
                break;
            }
            PrefetchEvent::Finished => break,
        }
    }
    prefetch.stop();

    writer
        .finalize()
        .map_err(|e| BookvoxError::Other(format!("failed to finalize WAV: {e}")))?;

    match failure {
        Some(error) => Err(error),
        None => Ok(RenderSummary {
            segments,
            duration_seconds: samples_written as f64 / SAMPLE_RATE as f64,
        }),
    }
}
