//! Gapless playback: the sample timeline, the streaming engine, and
//! the output devices it drives.

pub mod engine;
pub mod output;
pub mod timeline;

pub use engine::{EngineState, StreamingEngine};
pub use output::{ManualHandle, ManualOutput, OutputDevice, RenderFn};
pub use timeline::Timeline;

#[cfg(feature = "cpal-audio")]
pub use output::{CpalOutput, list_output_devices};
