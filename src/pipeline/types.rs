//! Data types flowing through the prefetch pipeline.

use crate::defaults::SAMPLE_RATE;
use crate::error::BookvoxError;

/// One entry of the flattened playlist: a text segment plus where it
/// sits in the book. Rebuilt per play action, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    /// Position in the playlist, 0-based, dense.
    pub ordinal: u64,
    pub chapter_index: usize,
    /// 1-based position within the chapter.
    pub position_in_chapter: usize,
    pub total_in_chapter: usize,
    pub chapter_title: String,
    /// Non-blank after trimming. Blank segments are filtered out
    /// during playlist construction.
    pub text: String,
}

impl PlaylistEntry {
    /// Human-readable position, e.g. `"Chapter Two (3/7)"`.
    pub fn label(&self) -> String {
        format!(
            "{} ({}/{})",
            self.chapter_title, self.position_in_chapter, self.total_in_chapter
        )
    }

    /// First few words of the segment, for error reports.
    pub fn preview(&self) -> String {
        const MAX_CHARS: usize = 60;
        if self.text.chars().count() <= MAX_CHARS {
            self.text.clone()
        } else {
            let cut: String = self.text.chars().take(MAX_CHARS).collect();
            format!("{}...", cut.trim_end())
        }
    }
}

/// PCM audio synthesized for one playlist entry. Mono, 24 kHz,
/// immutable once produced.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Matches the `PlaylistEntry` ordinal it was synthesized from.
    pub ordinal: u64,
    pub samples: Vec<i16>,
}

impl AudioSegment {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }
}

/// What the prefetcher hands to its consumer, in ordinal order.
#[derive(Debug)]
pub enum PrefetchEvent {
    /// The next segment's audio, strictly ascending by ordinal.
    Segment(AudioSegment),
    /// Terminal: entry `ordinal` failed after retries. No further
    /// entries were dispatched; everything already delivered stays
    /// playable.
    Failed {
        ordinal: u64,
        label: String,
        error: BookvoxError,
    },
    /// Terminal: every entry was delivered.
    Finished,
}
