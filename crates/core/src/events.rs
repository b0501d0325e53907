// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Control events and out-of-band messages exchanged with the driving
//! pipeline.
//!
//! - [`PortEvent`]: per-port control events delivered alongside data
//! - [`EngineMessage`]: out-of-band notifications emitted by the engine
//! - [`PushResult`]/[`RejectReason`]: data-path push outcomes
//! - [`Format`]: the unit a position/duration value is expressed in

use crate::segment::Segment;
use crate::types::{ClockTime, FormatCaps};
use serde::{Deserialize, Serialize};

/// A per-port control event, delivered in-band with that port's data.
#[derive(Debug, Clone, PartialEq)]
pub enum PortEvent {
    /// Marks the beginning of a new logical stream on the port.
    StreamStart,
    /// Proposes (possibly partial) capabilities for the port's data.
    CapsHint(FormatCaps),
    /// Replaces the port's active segment.
    Segment(Segment),
    /// Starts a flush: queued data is discarded and inbound data rejected
    /// until the matching `FlushStop`.
    FlushStart,
    /// Ends a flush. `reset_time` additionally resets the output cursor.
    FlushStop { reset_time: bool },
    /// No more data will arrive on this port.
    Eos,
}

/// The unit a queried position or duration is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Nanoseconds.
    Time,
    /// Sample frames in the negotiated format.
    Samples,
}

/// Out-of-band notification emitted by the engine toward the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineMessage {
    /// The stream is complete: every port reached end-of-stream and all
    /// queued data has been consumed.
    Eos,
    /// One looped segment finished playing; the stream stays open for the
    /// next seek.
    SegmentDone { format: Format, position: ClockTime },
    /// A terminal condition; the engine is heading toward teardown.
    Error { message: String },
    /// A recoverable anomaly (for example a malformed segment event).
    Warning { message: String },
}

/// Outcome of pushing a buffer into a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// The buffer was taken (possibly clipped away entirely).
    Accepted,
    /// The buffer was not taken; the reason says why. Not an error.
    Rejected(RejectReason),
}

/// Why a pushed buffer was not taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The port (or the whole engine) is flushing; the buffer is dropped.
    Flushing,
    /// No concrete format has been negotiated for the port yet.
    NotNegotiated,
    /// The port already delivered end-of-stream.
    Eos,
    /// The engine is not in a data-accepting state.
    NotActive,
}
