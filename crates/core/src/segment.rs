// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Segment model: the per-port mapping from presentation timestamps to the
//! shared output running time.
//!
//! A [`Segment`] declares which slice of a port's timeline is valid output
//! (`start..stop`), how fast it plays (`rate`), and where it lands on the
//! output clock (`base`). Buffers are clipped against their port's segment
//! before aggregation; [`Segment::to_running_time`] then places the clipped
//! data on the output timeline.

use crate::error::{MixerError, Result};
use crate::types::ClockTime;
use serde::{Deserialize, Serialize};

/// Time range plus rate/base mapping defining which portion of a port's
/// data is currently valid output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Playback rate. Must be finite and non-zero.
    pub rate: f64,
    /// First valid presentation timestamp.
    pub start: ClockTime,
    /// Exclusive end of the valid range; `None` is unbounded.
    pub stop: Option<ClockTime>,
    /// Stream time corresponding to `start`.
    pub time: ClockTime,
    /// Running time at which `start` is rendered.
    pub base: ClockTime,
}

impl Default for Segment {
    fn default() -> Self {
        Self { rate: 1.0, start: 0, stop: None, time: 0, base: 0 }
    }
}

impl Segment {
    /// A segment covering `start..stop` at unity rate.
    pub fn new(start: ClockTime, stop: Option<ClockTime>) -> Self {
        Self { start, stop, ..Self::default() }
    }

    /// Checks the segment invariants: finite non-zero rate and
    /// `start <= stop` when stop is bounded.
    pub fn validate(&self) -> Result<()> {
        if !self.rate.is_finite() || self.rate == 0.0 {
            return Err(MixerError::InvalidSegment(format!("rate {} out of range", self.rate)));
        }
        if let Some(stop) = self.stop {
            if stop < self.start {
                return Err(MixerError::InvalidSegment(format!(
                    "start {} > stop {}",
                    self.start, stop
                )));
            }
        }
        Ok(())
    }

    /// True when `pts` falls inside `start..stop`.
    pub fn contains(&self, pts: ClockTime) -> bool {
        pts >= self.start && self.stop.is_none_or(|stop| pts < stop)
    }

    /// Maps a presentation timestamp inside the segment to output running
    /// time. Returns `None` for timestamps outside the segment.
    ///
    /// For non-unity rates the scaled offset truncates to whole
    /// nanoseconds, matching the truncating time/sample conversions used
    /// by the clipper.
    pub fn to_running_time(&self, pts: ClockTime) -> Option<ClockTime> {
        if pts < self.start || self.stop.is_some_and(|stop| pts > stop) {
            return None;
        }
        let offset = pts - self.start;
        let scaled = if (self.rate - 1.0).abs() < f64::EPSILON {
            offset
        } else {
            #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
            {
                (offset as f64 / self.rate.abs()) as ClockTime
            }
        };
        Some(self.base.saturating_add(scaled))
    }
}

/// Seek behavior modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekFlags {
    /// Discard queued data and reset the output cursor before switching
    /// segments.
    pub flush: bool,
    /// Arm a segment-done notification at segment end instead of
    /// end-of-stream, enabling seamless looping.
    pub segment: bool,
}

/// A seek request, propagated by the coordinator to every non-live port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeekRequest {
    pub rate: f64,
    pub flags: SeekFlags,
    pub start: ClockTime,
    pub stop: Option<ClockTime>,
}

impl SeekRequest {
    /// The segment this seek installs on accepting ports.
    pub fn segment(&self) -> Segment {
        Segment { rate: self.rate, start: self.start, stop: self.stop, time: self.start, base: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MSECOND, SECOND};

    #[test]
    fn test_validation() {
        assert!(Segment::default().validate().is_ok());
        assert!(Segment::new(SECOND, Some(2 * SECOND)).validate().is_ok());

        let backwards = Segment::new(2 * SECOND, Some(SECOND));
        assert!(matches!(backwards.validate(), Err(MixerError::InvalidSegment(_))));

        let stuck = Segment { rate: 0.0, ..Segment::default() };
        assert!(matches!(stuck.validate(), Err(MixerError::InvalidSegment(_))));
    }

    #[test]
    fn test_running_time_identity() {
        let segment = Segment::default();
        assert_eq!(segment.to_running_time(0), Some(0));
        assert_eq!(segment.to_running_time(1500 * MSECOND), Some(1500 * MSECOND));
    }

    #[test]
    fn test_running_time_offset_segment() {
        let segment = Segment::new(SECOND, Some(2 * SECOND));
        assert_eq!(segment.to_running_time(SECOND), Some(0));
        assert_eq!(segment.to_running_time(1500 * MSECOND), Some(500 * MSECOND));
        // The exclusive stop edge still maps (zero-length tail).
        assert_eq!(segment.to_running_time(2 * SECOND), Some(SECOND));
        assert_eq!(segment.to_running_time(500 * MSECOND), None);
        assert_eq!(segment.to_running_time(2 * SECOND + 1), None);
    }

    #[test]
    fn test_running_time_scales_with_rate() {
        let segment = Segment { rate: 2.0, ..Segment::new(0, Some(4 * SECOND)) };
        assert_eq!(segment.to_running_time(2 * SECOND), Some(SECOND));
    }

    #[test]
    fn test_seek_segment() {
        let seek = SeekRequest {
            rate: 1.0,
            flags: SeekFlags { flush: true, segment: true },
            start: 0,
            stop: Some(2 * SECOND),
        };
        let segment = seek.segment();
        assert_eq!(segment.start, 0);
        assert_eq!(segment.stop, Some(2 * SECOND));
        assert!(segment.validate().is_ok());
    }
}
