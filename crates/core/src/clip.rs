// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Buffer clipping against a port's active segment.
//!
//! Incoming buffers are trimmed to the overlap with their segment before
//! they become eligible for aggregation. Trimming is at sample granularity
//! and never splits a sample; fully out-of-segment buffers are dropped
//! silently. Clipping an already-clipped buffer against the same segment
//! returns it unchanged.

use crate::segment::Segment;
use crate::types::{AudioBuffer, AudioFormat};

/// Trims `buffer` to the overlap with `segment`.
///
/// Returns `None` when the overlap is empty; the full buffer (no copy)
/// when it lies entirely inside the segment; otherwise a subslice of the
/// original payload with timestamp and duration adjusted to the kept
/// sample range.
///
/// Time/sample conversion truncates toward zero on both edges (see
/// [`AudioFormat::duration_to_frames`]), so a boundary landing exactly on
/// a sample edge keeps that sample on the in-segment side and the result
/// is stable under repeated clipping.
pub fn clip_buffer(
    buffer: &AudioBuffer,
    segment: &Segment,
    format: &AudioFormat,
) -> Option<AudioBuffer> {
    let total_frames = buffer.num_frames(format);
    if total_frames == 0 {
        return None;
    }

    // Overlap of [pts, end) with [start, stop), expressed in whole frames
    // relative to the buffer's first sample.
    let first_frame = if segment.start > buffer.pts {
        format.duration_to_frames(segment.start - buffer.pts)
    } else {
        0
    };

    let end_frame = match segment.stop {
        Some(stop) if stop < buffer.end() => {
            if stop <= buffer.pts {
                return None;
            }
            format.duration_to_frames(stop - buffer.pts).min(total_frames)
        },
        _ => total_frames,
    };

    if first_frame >= end_frame {
        tracing::debug!(
            pts = buffer.pts,
            end = buffer.end(),
            start = segment.start,
            stop = ?segment.stop,
            "buffer entirely outside segment, dropping"
        );
        return None;
    }

    if first_frame == 0 && end_frame == total_frames {
        return Some(buffer.clone());
    }

    let bpf = format.bytes_per_frame();
    let kept = end_frame - first_frame;
    let data = buffer
        .data
        .slice(usize::try_from(first_frame).ok()? * bpf..usize::try_from(end_frame).ok()? * bpf);

    Some(AudioBuffer {
        pts: buffer.pts + format.frames_to_duration(first_frame),
        duration: format.frames_to_duration(kept),
        data,
        discont: buffer.discont,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{SampleFormat, MSECOND, SECOND};
    use bytes::Bytes;

    const FORMAT: AudioFormat =
        AudioFormat { sample_rate: 44100, channels: 2, sample_format: SampleFormat::S16Le };

    fn quarter_second_buffer(pts: u64) -> AudioBuffer {
        // 250ms at 44.1kHz stereo S16: 11025 frames, 4 bytes each.
        AudioBuffer::new(pts, 250 * MSECOND, Bytes::from(vec![1u8; 11025 * 4]))
    }

    fn one_to_two_seconds() -> Segment {
        Segment::new(SECOND, Some(2 * SECOND))
    }

    #[test]
    fn test_fully_before_segment_dropped() {
        let buffer = quarter_second_buffer(0);
        assert!(clip_buffer(&buffer, &one_to_two_seconds(), &FORMAT).is_none());
    }

    #[test]
    fn test_partial_overlap_trims_front() {
        let buffer = quarter_second_buffer(900 * MSECOND);
        let clipped =
            clip_buffer(&buffer, &one_to_two_seconds(), &FORMAT).expect("overlaps segment");

        // 100ms (4410 frames) trimmed off the front: [1s, 1.15s) remains.
        assert_eq!(clipped.pts, SECOND);
        assert_eq!(clipped.duration, 150 * MSECOND);
        assert_eq!(clipped.num_frames(&FORMAT), 11025 - 4410);
    }

    #[test]
    fn test_fully_inside_unchanged() {
        let buffer = quarter_second_buffer(SECOND);
        let clipped =
            clip_buffer(&buffer, &one_to_two_seconds(), &FORMAT).expect("inside segment");
        assert_eq!(clipped, buffer);
    }

    #[test]
    fn test_at_stop_edge_dropped() {
        let buffer = quarter_second_buffer(2 * SECOND);
        assert!(clip_buffer(&buffer, &one_to_two_seconds(), &FORMAT).is_none());
    }

    #[test]
    fn test_trims_tail_at_stop() {
        let buffer = quarter_second_buffer(1900 * MSECOND);
        let clipped =
            clip_buffer(&buffer, &one_to_two_seconds(), &FORMAT).expect("overlaps segment");
        assert_eq!(clipped.pts, 1900 * MSECOND);
        assert_eq!(clipped.duration, 100 * MSECOND);
        assert_eq!(clipped.num_frames(&FORMAT), 4410);
    }

    #[test]
    fn test_idempotent() {
        let buffer = quarter_second_buffer(900 * MSECOND);
        let segment = one_to_two_seconds();
        let once = clip_buffer(&buffer, &segment, &FORMAT).expect("overlaps");
        let twice = clip_buffer(&once, &segment, &FORMAT).expect("still overlaps");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unaligned_boundary_truncates() {
        // Segment start 10.5 sample periods into the buffer: the half-covered
        // sample index 10 stays on the kept side per the truncating rule.
        let start = SECOND * 21 / 2 / 44100;
        let segment = Segment::new(start, None);
        let buffer = AudioBuffer::new(0, 250 * MSECOND, Bytes::from(vec![1u8; 11025 * 4]));

        let clipped = clip_buffer(&buffer, &segment, &FORMAT).expect("overlaps");
        assert_eq!(clipped.num_frames(&FORMAT), 11025 - 10);
    }

    #[test]
    fn test_unbounded_segment_keeps_everything() {
        let buffer = quarter_second_buffer(5 * SECOND);
        let clipped = clip_buffer(&buffer, &Segment::default(), &FORMAT).expect("kept");
        assert_eq!(clipped, buffer);
    }
}
