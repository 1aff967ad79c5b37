//! Progress and failure reporting for the prefetch pipeline.

use std::fmt;
use std::sync::Mutex;

/// Events the pipeline surfaces while working through a playlist.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineReport {
    /// A synthesis attempt failed and the client is about to retry.
    Retrying {
        label: String,
        attempt: u32,
        max_attempts: u32,
        detail: String,
    },
    /// An entry's audio was handed to the player.
    Delivered {
        label: String,
        ordinal: u64,
        total: usize,
    },
    /// An entry failed permanently; dispatch has stopped.
    Failed { label: String, detail: String },
    /// Every entry in the playlist was delivered.
    Complete { total: usize },
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineReport::Retrying {
                label,
                attempt,
                max_attempts,
                detail,
            } => write!(
                f,
                "{label}: attempt {attempt}/{max_attempts} failed ({detail}), retrying"
            ),
            PipelineReport::Delivered {
                label,
                ordinal,
                total,
            } => write!(f, "{label}: ready ({} of {total})", ordinal + 1),
            PipelineReport::Failed { label, detail } => {
                write!(f, "{label}: failed ({detail})")
            }
            PipelineReport::Complete { total } => {
                write!(f, "all {total} segment(s) delivered")
            }
        }
    }
}

/// Trait for observing pipeline progress.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, report: &PipelineReport);
}

/// Reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, report: &PipelineReport) {
        eprintln!("bookvox: {}", report);
    }
}

/// Reporter that collects reports in memory. Mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    reports: Mutex<Vec<PipelineReport>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<PipelineReport> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ProgressReporter for MemoryReporter {
    fn report(&self, report: &PipelineReport) {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report.clone());
    }
}
