//! The logical sample timeline.
//!
//! An append-only sequence of audio segments with one playhead cursor.
//! Segments only ever append and the playhead only reads, so seek and
//! speed change never touch segment data. The playhead is fractional
//! to support non-integer playback rates.

use crate::defaults::SAMPLE_RATE;
use crate::error::{BookvoxError, Result};
use crate::pipeline::types::AudioSegment;

#[derive(Debug, Default)]
pub struct Timeline {
    segments: Vec<AudioSegment>,
    /// Cumulative start offset of each segment, parallel to `segments`.
    starts: Vec<u64>,
    total_samples: u64,
    /// Fractional position in samples, in `[0, total_samples]`.
    playhead: f64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next segment. Ordinals must arrive dense and
    /// ascending; anything else is a caller contract violation.
    pub fn append(&mut self, segment: AudioSegment) -> Result<()> {
        let expected = self.segments.len() as u64;
        if segment.ordinal != expected {
            return Err(BookvoxError::OrdinalOutOfOrder {
                expected,
                got: segment.ordinal,
            });
        }
        self.starts.push(self.total_samples);
        self.total_samples += segment.samples.len() as u64;
        self.segments.push(segment);
        Ok(())
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn duration_seconds(&self) -> f64 {
        self.total_samples as f64 / SAMPLE_RATE as f64
    }

    pub fn playhead_sample(&self) -> u64 {
        (self.playhead.max(0.0) as u64).min(self.total_samples)
    }

    pub fn position_seconds(&self) -> f64 {
        self.playhead / SAMPLE_RATE as f64
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Where segment `index` begins on the timeline, in seconds.
    /// Consecutive segments abut exactly: each starts where the
    /// previous one ends.
    pub fn segment_start_seconds(&self, index: usize) -> Option<f64> {
        self.starts
            .get(index)
            .map(|&s| s as f64 / SAMPLE_RATE as f64)
    }

    fn sample_at(&self, index: u64) -> Option<i16> {
        if index >= self.total_samples {
            return None;
        }
        // partition_point gives the first start > index; the segment
        // holding index is the one before it.
        let seg = self.starts.partition_point(|&s| s <= index) - 1;
        let offset = (index - self.starts[seg]) as usize;
        Some(self.segments[seg].samples[offset])
    }

    /// Pull the next output sample at playback rate `speed`, linearly
    /// interpolating between neighbouring samples for fractional
    /// positions. Returns `None` past the end of ingested audio
    /// without moving the playhead, so playback resumes cleanly when
    /// more audio arrives.
    pub fn advance(&mut self, speed: f64) -> Option<i16> {
        if self.playhead >= self.total_samples as f64 {
            return None;
        }
        let base = self.playhead.floor() as u64;
        let frac = self.playhead - base as f64;
        let current = self.sample_at(base)? as f64;
        let next = self.sample_at(base + 1).unwrap_or(0) as f64;
        let value = current + (next - current) * frac;

        self.playhead = (self.playhead + speed).min(self.total_samples as f64);
        Some(value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
    }

    /// Move the playhead by `delta_seconds`, clamped to the ingested
    /// audio: `[0, total_samples - 1]`, or 0 while empty. Never asks
    /// upstream for more data.
    pub fn seek_relative(&mut self, delta_seconds: f64) {
        let target = self.playhead + delta_seconds * SAMPLE_RATE as f64;
        let max = self.total_samples.saturating_sub(1) as f64;
        self.playhead = target.clamp(0.0, max);
    }

    /// Discard everything and rewind. Used by `stop()`.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.starts.clear();
        self.total_samples = 0;
        self.playhead = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(ordinal: u64, samples: Vec<i16>) -> AudioSegment {
        AudioSegment { ordinal, samples }
    }

    fn seconds(n: f64) -> usize {
        (n * SAMPLE_RATE as f64) as usize
    }

    #[test]
    fn test_append_tracks_totals() {
        let mut timeline = Timeline::new();
        timeline.append(seg(0, vec![0; seconds(1.0)])).unwrap();
        timeline.append(seg(1, vec![0; seconds(0.5)])).unwrap();

        assert_eq!(timeline.total_samples(), seconds(1.5) as u64);
        assert!((timeline.duration_seconds() - 1.5).abs() < 1e-9);
        assert_eq!(timeline.segment_count(), 2);
    }

    #[test]
    fn test_out_of_order_append_rejected() {
        let mut timeline = Timeline::new();
        timeline.append(seg(0, vec![0; 10])).unwrap();
        let err = timeline.append(seg(2, vec![0; 10])).unwrap_err();
        assert!(matches!(
            err,
            BookvoxError::OrdinalOutOfOrder { expected: 1, got: 2 }
        ));
    }

    #[test]
    fn test_segments_abut_exactly() {
        // Durations 1.0s, 0.5s, 2.0s must schedule at 0.0, 1.0, 1.5.
        let mut timeline = Timeline::new();
        timeline.append(seg(0, vec![0; seconds(1.0)])).unwrap();
        timeline.append(seg(1, vec![0; seconds(0.5)])).unwrap();
        timeline.append(seg(2, vec![0; seconds(2.0)])).unwrap();

        assert_eq!(timeline.segment_start_seconds(0), Some(0.0));
        assert_eq!(timeline.segment_start_seconds(1), Some(1.0));
        assert_eq!(timeline.segment_start_seconds(2), Some(1.5));
        assert_eq!(timeline.segment_start_seconds(3), None);
    }

    #[test]
    fn test_advance_crosses_segment_boundary_without_gap() {
        let mut timeline = Timeline::new();
        timeline.append(seg(0, vec![10, 20])).unwrap();
        timeline.append(seg(1, vec![30, 40])).unwrap();

        let pulled: Vec<i16> = std::iter::from_fn(|| timeline.advance(1.0)).collect();
        assert_eq!(pulled, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_advance_past_end_is_underrun_not_corruption() {
        let mut timeline = Timeline::new();
        timeline.append(seg(0, vec![1, 2])).unwrap();

        assert_eq!(timeline.advance(1.0), Some(1));
        assert_eq!(timeline.advance(1.0), Some(2));
        assert_eq!(timeline.advance(1.0), None);
        assert_eq!(timeline.advance(1.0), None);

        // More audio arriving resumes exactly where output stopped.
        timeline.append(seg(1, vec![3])).unwrap();
        assert_eq!(timeline.advance(1.0), Some(3));
    }

    #[test]
    fn test_double_speed_halves_pulled_samples() {
        let mut timeline = Timeline::new();
        timeline.append(seg(0, vec![0; 1000])).unwrap();

        let pulled = std::iter::from_fn(|| timeline.advance(2.0)).count();
        assert_eq!(pulled, 500);
    }

    #[test]
    fn test_interpolation_at_half_step() {
        let mut timeline = Timeline::new();
        timeline.append(seg(0, vec![0, 100, 200])).unwrap();

        assert_eq!(timeline.advance(0.5), Some(0)); // at 0.0
        assert_eq!(timeline.advance(0.5), Some(50)); // at 0.5
        assert_eq!(timeline.advance(0.5), Some(100)); // at 1.0
        assert_eq!(timeline.advance(0.5), Some(150)); // at 1.5
    }

    #[test]
    fn test_seek_clamps_to_bounds() {
        let mut timeline = Timeline::new();
        for i in 0..10 {
            timeline.append(seg(i, vec![0; seconds(1.0)])).unwrap();
        }
        // Play 3 seconds in.
        for _ in 0..seconds(3.0) {
            timeline.advance(1.0);
        }

        timeline.seek_relative(-15.0);
        assert_eq!(timeline.playhead_sample(), 0);

        timeline.seek_relative(100.0);
        assert_eq!(timeline.playhead_sample(), timeline.total_samples() - 1);
    }

    #[test]
    fn test_seek_on_empty_timeline_stays_at_zero() {
        let mut timeline = Timeline::new();
        timeline.seek_relative(-15.0);
        assert_eq!(timeline.playhead_sample(), 0);
        timeline.seek_relative(15.0);
        assert_eq!(timeline.playhead_sample(), 0);
    }

    #[test]
    fn test_seek_then_advance_reads_correct_samples() {
        let mut timeline = Timeline::new();
        let samples: Vec<i16> = (0..SAMPLE_RATE as i16).map(|i| i % 1000).collect();
        timeline.append(seg(0, samples.clone())).unwrap();

        timeline.seek_relative(0.5);
        let expected_index = seconds(0.5);
        assert_eq!(timeline.advance(1.0), Some(samples[expected_index]));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut timeline = Timeline::new();
        timeline.append(seg(0, vec![1; 100])).unwrap();
        timeline.advance(1.0);

        timeline.clear();
        assert_eq!(timeline.total_samples(), 0);
        assert_eq!(timeline.playhead_sample(), 0);
        assert_eq!(timeline.segment_count(), 0);
        // Ordinals restart from zero after a clear.
        timeline.append(seg(0, vec![2; 50])).unwrap();
    }
}
