// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for MixKit.
//!
//! The taxonomy distinguishes conditions that are fatal to a single port
//! (format negotiation failures), conditions where the offending input is
//! dropped with a warning (malformed segment events), and outright API
//! misuse (operating on a released port). Recoverable data-path conditions
//! such as a buffer arriving during a flush are not errors at all; they are
//! reported through `PushResult::Rejected`.

use crate::types::PortId;
use thiserror::Error;

/// Main error type for MixKit operations.
#[derive(Debug, Error)]
pub enum MixerError {
    /// Format negotiation failed: a port's capabilities do not intersect
    /// with the fixed output constraint and/or the already-fixed session
    /// format. Fatal to the offending port, not to the engine.
    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    /// A segment or seek carried an invalid time range or rate. The event
    /// is dropped and a warning is raised; streaming continues.
    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    /// An operation referenced a port that was never opened or has been
    /// released. This is a programming error in the driving pipeline.
    #[error("unknown port {0}")]
    UnknownPort(PortId),
}

/// Convenience type alias for Results using `MixerError`.
pub type Result<T> = std::result::Result<T, MixerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MixerError::FormatMismatch("rate 44100 vs 48000".to_string());
        assert_eq!(err.to_string(), "format mismatch: rate 44100 vs 48000");

        let err = MixerError::UnknownPort(PortId(3));
        assert_eq!(err.to_string(), "unknown port port_3");
    }
}
