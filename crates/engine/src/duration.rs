// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Aggregate duration arbitration.
//!
//! The aggregate stream duration is the maximum of all currently connected
//! ports' reported durations, with one deliberate wrinkle: unknown
//! dominates the maximum. As long as any connected port has not reported
//! a known duration, the aggregate is unknown, even if other ports report
//! large known values. The result is recomputed on every query rather than
//! cached across port changes.

use mixkit_core::ClockTime;

/// Folds per-port duration reports into the aggregate. `None` anywhere in
/// the input (including an empty input) yields `None`.
pub(crate) fn aggregate_duration<I>(reported: I) -> Option<ClockTime>
where
    I: IntoIterator<Item = Option<ClockTime>>,
{
    let mut max: Option<ClockTime> = None;
    for duration in reported {
        let known = duration?;
        max = Some(max.map_or(known, |current| current.max(known)));
    }
    max
}
