// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The aggregation task.
//!
//! One task per session advances the shared output cursor: it completes
//! the preroll gate, then produces fixed-width output slices by summing
//! every port's overlapping samples, and finally emits end-of-stream (or
//! segment-done for looped segments) once every port is exhausted.
//!
//! Each iteration takes a single consistent snapshot of all port state
//! under the engine lock, decides on exactly one action, and performs the
//! channel I/O outside the lock.

use std::sync::Arc;

use bytes::Bytes;
use mixkit_core::{
    AudioBuffer, AudioFormat, ClockTime, EngineMessage, EngineState, Format,
};
use tokio_util::sync::CancellationToken;

use crate::engine::{Inner, MixerConfig, Shared};
use crate::mix::mix_into;
use crate::port::PortState;

/// The single action chosen by one pass over the shared state.
enum Action {
    /// The preroll gate opened; the pending transition settled here.
    Settled(EngineState),
    /// One output slice was produced.
    Output(AudioBuffer),
    /// The stream drained; deliver the final notification.
    Finish(EngineMessage),
    /// Nothing to do until the state changes.
    Wait,
}

pub(crate) async fn run(inner: Arc<Inner>, cancel: CancellationToken) {
    tracing::debug!("aggregation task started");

    loop {
        // Register for wakeups before inspecting state so a notification
        // arriving between the check and the wait is not lost.
        let mut notified = std::pin::pin!(inner.cond.notified());
        notified.as_mut().enable();
        if cancel.is_cancelled() {
            break;
        }

        let action = {
            let mut shared = inner.lock();
            decide(&inner.config, &mut shared)
        };

        match action {
            Action::Settled(state) => {
                tracing::info!(%state, "preroll complete, transition settled");
                {
                    let shared = inner.lock();
                    inner.publish_state(&shared);
                }
                inner.cond.notify_waiters();
            },
            Action::Output(buffer) => {
                tracing::trace!(pts = buffer.pts, bytes = buffer.data.len(), "output slice");
                if inner.output_tx.send(buffer).await.is_err() {
                    tracing::debug!("output receiver dropped, stopping aggregation");
                    {
                        let mut shared = inner.lock();
                        shared.failed = true;
                        inner.publish_state(&shared);
                    }
                    let _ = inner.message_tx.try_send(EngineMessage::Error {
                        message: "output channel closed".to_string(),
                    });
                    break;
                }
                // Consumed queues freed pusher slots.
                inner.cond.notify_waiters();
            },
            Action::Finish(message) => {
                tracing::info!(?message, "stream drained");
                if inner.message_tx.send(message).await.is_err() {
                    tracing::debug!("message receiver dropped");
                }
                inner.cond.notify_waiters();
            },
            Action::Wait => {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = &mut notified => {},
                }
            },
        }
    }

    tracing::debug!("aggregation task stopped");
}

/// One decision pass under the engine lock.
fn decide(config: &MixerConfig, shared: &mut Shared) -> Action {
    // An in-flight transition settles as soon as every port prerolled.
    if let Some(target) = shared.pending {
        if shared.preroll_satisfied() {
            shared.state = target;
            shared.pending = None;
            return Action::Settled(target);
        }
        return Action::Wait;
    }

    if shared.state != EngineState::Playing || shared.finished {
        return Action::Wait;
    }
    // Any flush pauses the whole output side.
    if shared.output_flushing || shared.ports.values().any(|p| p.flushing) {
        return Action::Wait;
    }
    if shared.ports.is_empty() {
        return Action::Wait;
    }
    let Some(format) = shared.session_format else {
        return Action::Wait;
    };

    let cursor = shared.position;

    // Queued data entirely behind the cursor can never be mixed; drain it
    // so its pusher slot frees up and exhaustion can be detected.
    for port in shared.ports.values_mut() {
        if port.queue.as_ref().is_some_and(|q| frame_end(q, &format) <= cursor) {
            tracing::debug!(port = %port.id, "dropping stale queued buffer behind cursor");
            port.queue = None;
        }
    }

    let stop_frames = shared
        .output_segment
        .stop
        .and_then(|stop| shared.output_segment.to_running_time(stop))
        .map(|running| format.duration_to_frames(running));

    let end_reached = stop_frames.is_some_and(|stop| cursor >= stop);
    if end_reached || shared.ports.values().all(PortState::exhausted) {
        shared.finished = true;
        return Action::Finish(final_message(shared, &format));
    }

    // The slice cannot be produced until every port has data or is EOS.
    if shared.ports.values().any(|p| p.queue.is_none() && !p.eos) {
        return Action::Wait;
    }

    let mut slice_end = cursor + config.blocksize.max(1);
    if let Some(stop) = stop_frames {
        slice_end = slice_end.min(stop);
    }
    // Once every port is EOS the remaining queued data bounds the stream:
    // emit a partial tail instead of padding to a whole slice.
    if shared.ports.values().all(|p| p.eos) {
        if let Some(data_end) =
            shared.ports.values().filter_map(|p| p.queue.as_ref()).map(|q| frame_end(q, &format)).max()
        {
            slice_end = slice_end.min(data_end);
        }
    }
    if slice_end <= cursor {
        shared.finished = true;
        return Action::Finish(final_message(shared, &format));
    }

    let bpf = format.bytes_per_frame();
    let slice_frames = slice_end - cursor;
    let mut data = vec![0u8; usize::try_from(slice_frames).unwrap_or(usize::MAX) * bpf];

    for port in shared.ports.values_mut() {
        let Some(queued) = port.queue.as_ref() else {
            continue;
        };
        let q_start = format.duration_to_frames(queued.pts);
        let q_end = q_start + queued.num_frames(&format);

        let overlap_start = q_start.max(cursor);
        let overlap_end = q_end.min(slice_end);
        if overlap_start < overlap_end {
            let src_off = usize::try_from(overlap_start - q_start).unwrap_or(usize::MAX) * bpf;
            let dst_off = usize::try_from(overlap_start - cursor).unwrap_or(usize::MAX) * bpf;
            let len = usize::try_from(overlap_end - overlap_start).unwrap_or(usize::MAX) * bpf;
            mix_into(
                &mut data[dst_off..dst_off + len],
                &queued.data[src_off..src_off + len],
                format.sample_format,
            );
        }

        if q_end <= slice_end {
            port.queue = None;
        }
    }

    let pts = format.frames_to_duration(cursor);
    let duration = format.frames_to_duration(slice_end) - pts;
    shared.position = slice_end;

    Action::Output(AudioBuffer::new(pts, duration, Bytes::from(data)))
}

/// End frame (exclusive) of a queued buffer on the output timeline.
fn frame_end(queued: &AudioBuffer, format: &AudioFormat) -> u64 {
    format.duration_to_frames(queued.pts) + queued.num_frames(format)
}

/// The notification that ends the current segment: segment-done for an
/// armed segment seek, end-of-stream otherwise.
fn final_message(shared: &Shared, format: &AudioFormat) -> EngineMessage {
    if shared.segment_seek {
        let position: ClockTime =
            shared.output_segment.time.saturating_add(shared.position_time(format));
        EngineMessage::SegmentDone { format: Format::Time, position }
    } else {
        EngineMessage::Eos
    }
}
