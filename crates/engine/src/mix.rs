// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Sample summation.
//!
//! Contributions from overlapping ports are summed in place into the
//! output slice. Overflow policy per format:
//!
//! - `S16Le`: saturating addition, clamping at ±32767/−32768. Wraparound
//!   would be audible as a full-scale click, so the sum pins instead.
//! - `F32`: plain IEEE addition. The format's representable range is the
//!   whole float range; values outside [-1.0, 1.0] pass through untouched
//!   so downstream gain staging keeps its headroom.

use mixkit_core::SampleFormat;

/// Adds `src` into `out` sample-by-sample. The shorter of the two spans
/// bounds the operation; trailing bytes that do not form a whole sample
/// are ignored.
pub fn mix_into(out: &mut [u8], src: &[u8], sample_format: SampleFormat) {
    match sample_format {
        SampleFormat::S16Le => {
            for (o, s) in out.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
                let sum = i16::from_le_bytes([o[0], o[1]])
                    .saturating_add(i16::from_le_bytes([s[0], s[1]]));
                o.copy_from_slice(&sum.to_le_bytes());
            }
        },
        SampleFormat::F32 => {
            for (o, s) in out.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let sum = f32::from_le_bytes([o[0], o[1], o[2], o[3]])
                    + f32::from_le_bytes([s[0], s[1], s[2], s[3]]);
                o.copy_from_slice(&sum.to_le_bytes());
            }
        },
    }
}
