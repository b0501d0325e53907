// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Format negotiation: resolving the single sample format shared by every
//! port and the output.
//!
//! Negotiation meets three capability sets: an optional fixed output
//! constraint supplied by configuration, the session format once one port
//! has fixed it, and the proposing port's caps. The first proposal that
//! fixates a fully-specified format fixes it for the session; later
//! proposals must intersect with it or negotiation fails with
//! `FormatMismatch`.

use crate::error::{MixerError, Result};
use crate::types::{AudioFormat, FormatCaps};

/// Outcome of a caps proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The session format is fixed (either newly fixed by this proposal or
    /// confirmed compatible with the existing one).
    Fixed(AudioFormat),
    /// The proposal is compatible but still leaves wildcards; data cannot
    /// flow on the proposing port until a concrete format exists.
    Underspecified(FormatCaps),
}

/// Resolve a port's caps proposal against the fixed constraint and the
/// current session format.
///
/// # Errors
///
/// Returns [`MixerError::FormatMismatch`] when the intersection of the
/// three capability sets is empty.
pub fn resolve(
    session: Option<&AudioFormat>,
    fixed: Option<&FormatCaps>,
    proposed: &FormatCaps,
) -> Result<Resolution> {
    let constrained = match fixed {
        Some(filter) => filter.intersect(proposed).ok_or_else(|| {
            MixerError::FormatMismatch(format!(
                "caps {proposed:?} do not satisfy fixed constraint {filter:?}"
            ))
        })?,
        None => *proposed,
    };

    if let Some(format) = session {
        // Renegotiation: the already-fixed session format must survive the
        // intersection untouched.
        let session_caps = FormatCaps::from(*format);
        constrained.intersect(&session_caps).ok_or_else(|| {
            MixerError::FormatMismatch(format!(
                "caps {constrained:?} are incompatible with session format {format:?}"
            ))
        })?;
        return Ok(Resolution::Fixed(*format));
    }

    match constrained.fixate() {
        Some(format) => {
            tracing::debug!(?format, "session format fixed");
            Ok(Resolution::Fixed(format))
        },
        None => Ok(Resolution::Underspecified(constrained)),
    }
}
