//! Document model and playlist construction.
//!
//! Books arrive pre-parsed: either a JSON chapter list produced by an
//! external converter, or a plain text/markdown file read as a single
//! chapter. Parsing real book formats is out of scope here.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{BookvoxError, Result};
use crate::pipeline::types::PlaylistEntry;
use crate::segment::segment_words;

/// One chapter of a book. The text may be empty, in which case the
/// chapter contributes no playlist entries.
#[derive(Debug, Clone, Deserialize)]
pub struct Chapter {
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// An ordered sequence of chapters. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Book {
    pub name: String,
    pub chapters: Vec<Chapter>,
}

impl Book {
    /// Load a book from disk. A `.json` file must contain an array of
    /// `{"title": ..., "text": ...}` chapters; anything else is read
    /// as one chapter titled after the file stem.
    pub fn load(path: &Path) -> Result<Book> {
        let raw = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book".to_string());

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            let chapters: Vec<Chapter> =
                serde_json::from_str(&raw).map_err(|e| BookvoxError::DocumentLoad {
                    message: format!("{}: {e}", path.display()),
                })?;
            if chapters.is_empty() {
                return Err(BookvoxError::DocumentLoad {
                    message: format!("{}: no chapters", path.display()),
                });
            }
            Ok(Book { name, chapters })
        } else {
            Ok(Book::from_text(&name, &raw))
        }
    }

    /// Wrap loose text as a single-chapter book.
    pub fn from_text(name: &str, text: &str) -> Book {
        Book {
            name: name.to_string(),
            chapters: vec![Chapter {
                title: name.to_string(),
                text: text.to_string(),
            }],
        }
    }
}

/// Build the flattened playlist from `(start_chapter, start_position)`
/// through the last segment of the last chapter.
///
/// `start_chapter` is a 0-based chapter index; `start_position` is the
/// 1-based segment position within that chapter (positions below 1 are
/// treated as 1, positions past the chapter's end skip to the next
/// chapter). Blank segments are filtered out. An empty result is
/// `SegmentationEmpty`, not an empty playlist.
pub fn build_playlist(
    book: &Book,
    start_chapter: usize,
    start_position: usize,
    words_per_segment: usize,
) -> Result<Vec<PlaylistEntry>> {
    if start_chapter >= book.chapters.len() {
        return Err(BookvoxError::SegmentationEmpty {
            detail: format!(
                "chapter {} requested but the book has {}",
                start_chapter + 1,
                book.chapters.len()
            ),
        });
    }

    let mut entries = Vec::new();
    let mut ordinal = 0u64;

    for (chapter_index, chapter) in book.chapters.iter().enumerate().skip(start_chapter) {
        let segments: Vec<String> = segment_words(&chapter.text, words_per_segment)
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        let total = segments.len();

        let first_position = if chapter_index == start_chapter {
            start_position.max(1)
        } else {
            1
        };

        for (i, text) in segments.into_iter().enumerate() {
            let position = i + 1;
            if position < first_position {
                continue;
            }
            entries.push(PlaylistEntry {
                ordinal,
                chapter_index,
                position_in_chapter: position,
                total_in_chapter: total,
                chapter_title: chapter.title.clone(),
                text,
            });
            ordinal += 1;
        }
    }

    if entries.is_empty() {
        let title = &book.chapters[start_chapter].title;
        return Err(BookvoxError::SegmentationEmpty {
            detail: format!("no playable segments from chapter '{title}' onward"),
        });
    }

    Ok(entries)
}
