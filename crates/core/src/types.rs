// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Core data types that flow through the aggregation engine.
//!
//! This module defines the fundamental data structures used throughout the system:
//! - [`AudioBuffer`]: Timestamped raw audio data with zero-copy [`bytes::Bytes`] payloads
//! - [`AudioFormat`]: Fully-specified audio stream format descriptor
//! - [`FormatCaps`]: Partially-specified capability set used during negotiation
//! - [`SampleFormat`]: Supported raw sample encodings
//! - Clock-time constants and conversion helpers

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Nanosecond-denominated stream time. "Unknown"/"none" is expressed as
/// `Option<ClockTime>` throughout the API.
pub type ClockTime = u64;

/// One second in [`ClockTime`] units.
pub const SECOND: ClockTime = 1_000_000_000;
/// One millisecond in [`ClockTime`] units.
pub const MSECOND: ClockTime = 1_000_000;
/// One microsecond in [`ClockTime`] units.
pub const USECOND: ClockTime = 1_000;

/// Stable identifier for an input port, unique among currently active ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u64);

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "port_{}", self.0)
    }
}

/// Describes the specific encoding of raw audio samples.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum SampleFormat {
    F32,   // 32-bit floating point
    S16Le, // 16-bit signed integer, little-endian
}

impl SampleFormat {
    /// Size of a single sample in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::S16Le => 2,
        }
    }
}

/// Contains the detailed metadata for a raw audio stream.
///
/// All active ports and the output share a single negotiated `AudioFormat`
/// for the duration of a streaming session.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    /// Size of one interleaved frame (one sample per channel) in bytes.
    pub const fn bytes_per_frame(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channels as usize
    }

    /// Convert a duration to a whole number of sample frames.
    ///
    /// Always truncates (rounds toward zero): a boundary that falls inside a
    /// sample maps to that sample's index. Applying the same rule to both
    /// edges of a range keeps sample-granularity trimming exact and
    /// idempotent.
    pub fn duration_to_frames(&self, duration: ClockTime) -> u64 {
        let frames = u128::from(duration) * u128::from(self.sample_rate) / u128::from(SECOND);
        u64::try_from(frames).unwrap_or(u64::MAX)
    }

    /// Convert a number of sample frames to a duration, truncating.
    pub fn frames_to_duration(&self, frames: u64) -> ClockTime {
        if self.sample_rate == 0 {
            return 0;
        }
        let ns = u128::from(frames) * u128::from(SECOND) / u128::from(self.sample_rate);
        u64::try_from(ns).unwrap_or(u64::MAX)
    }
}

/// A partially-specified capability set used during format negotiation.
///
/// `None` fields are wildcards. A fixed output constraint, a port's caps
/// hint, and the session format all meet through [`FormatCaps::intersect`];
/// a caps set with no wildcards left can be [fixated](FormatCaps::fixate)
/// into an [`AudioFormat`].
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct FormatCaps {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub sample_format: Option<SampleFormat>,
}

impl FormatCaps {
    /// The fully-unconstrained capability set.
    pub const ANY: Self = Self { sample_rate: None, channels: None, sample_format: None };

    /// Intersect two capability sets. Returns `None` when the intersection
    /// is empty (two conflicting constraints on the same field).
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        fn meet<T: PartialEq + Copy>(a: Option<T>, b: Option<T>) -> Result<Option<T>, ()> {
            match (a, b) {
                (Some(x), Some(y)) if x != y => Err(()),
                (Some(x), _) => Ok(Some(x)),
                (None, y) => Ok(y),
            }
        }
        Some(Self {
            sample_rate: meet(self.sample_rate, other.sample_rate).ok()?,
            channels: meet(self.channels, other.channels).ok()?,
            sample_format: meet(self.sample_format, other.sample_format).ok()?,
        })
    }

    /// Returns the concrete format if every field is specified.
    pub fn fixate(&self) -> Option<AudioFormat> {
        Some(AudioFormat {
            sample_rate: self.sample_rate?,
            channels: self.channels?,
            sample_format: self.sample_format?,
        })
    }

    /// True when no wildcards remain.
    pub fn is_fixed(&self) -> bool {
        self.sample_rate.is_some() && self.channels.is_some() && self.sample_format.is_some()
    }
}

impl From<AudioFormat> for FormatCaps {
    fn from(format: AudioFormat) -> Self {
        Self {
            sample_rate: Some(format.sample_rate),
            channels: Some(format.channels),
            sample_format: Some(format.sample_format),
        }
    }
}

/// A single timestamped chunk of raw interleaved audio.
///
/// The payload is a [`Bytes`] handle, so clipping and slice extraction are
/// cheap subslices of shared storage rather than copies. Timestamps are in
/// the producing port's segment domain until mapped to running time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    /// Presentation timestamp of the first sample.
    pub pts: ClockTime,
    /// Duration covered by the payload.
    pub duration: ClockTime,
    /// Raw interleaved samples in the negotiated format.
    pub data: Bytes,
    /// Marks a timestamp jump relative to the preceding buffer.
    pub discont: bool,
}

impl AudioBuffer {
    pub fn new(pts: ClockTime, duration: ClockTime, data: Bytes) -> Self {
        Self { pts, duration, data, discont: false }
    }

    /// Exclusive end timestamp.
    pub const fn end(&self) -> ClockTime {
        self.pts.saturating_add(self.duration)
    }

    /// Number of whole sample frames in the payload for `format`.
    pub fn num_frames(&self, format: &AudioFormat) -> u64 {
        (self.data.len() / format.bytes_per_frame()) as u64
    }

    /// An all-zero (silent) buffer of `frames` frames starting at `pts`.
    pub fn silence(format: &AudioFormat, pts: ClockTime, frames: u64) -> Self {
        let len = usize::try_from(frames).unwrap_or(usize::MAX) * format.bytes_per_frame();
        Self::new(pts, format.frames_to_duration(frames), Bytes::from(vec![0u8; len]))
    }
}
