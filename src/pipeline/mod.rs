//! Bounded look-ahead prefetch: turns an ordered playlist of text
//! segments into an ordered stream of PCM audio segments.

pub mod error;
pub mod prefetch;
pub mod types;

pub use error::{LogReporter, MemoryReporter, PipelineReport, ProgressReporter};
pub use prefetch::{PrefetchHandle, Prefetcher};
pub use types::{AudioSegment, PlaylistEntry, PrefetchEvent};
