// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The `MixerEngine`: lifecycle and control coordination around the
//! aggregation loop.
//!
//! The engine owns every port record and the output time cursor. The
//! driving pipeline opens ports, pushes buffers and control events into
//! them from independent execution contexts, and walks the engine through
//! `Stopped ↔ Ready ↔ Paused ↔ Playing`. All shared state lives under one
//! mutex; wakeups between pushers, control calls, and the aggregation task
//! go through a single [`Notify`], and every structural mutation that
//! could satisfy the preroll gate signals it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexMap;
use mixkit_core::{
    clip_buffer, resolve, AudioBuffer, AudioFormat, ClockTime, CurrentState, EngineMessage,
    EngineState, Format, FormatCaps, MixerError, PortEvent, PortId, PushResult, RejectReason,
    Resolution, Result, SeekRequest, Segment, StateChange, StateWait,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;

use crate::aggregator;
use crate::duration::aggregate_duration;
use crate::port::{PortConfig, PortState};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Aggregation slice width in sample frames per output buffer.
    pub blocksize: u64,
    /// Optional fixed output-format constraint. Every port's caps must
    /// intersect with it or negotiation fails on that port.
    pub fixed_caps: Option<FormatCaps>,
    /// Capacity of the output buffer channel (downstream backpressure).
    pub output_capacity: usize,
    /// Capacity of the out-of-band message channel.
    pub message_capacity: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self { blocksize: 1024, fixed_caps: None, output_capacity: 64, message_capacity: 32 }
    }
}

/// The downstream-facing half of an engine: produced buffers and
/// out-of-band notifications.
pub struct EngineOutput {
    pub buffers: mpsc::Receiver<AudioBuffer>,
    pub messages: mpsc::Receiver<EngineMessage>,
}

pub(crate) struct Shared {
    pub(crate) state: EngineState,
    /// Target of an in-flight asynchronous transition, if any.
    pub(crate) pending: Option<EngineState>,
    pub(crate) ports: IndexMap<PortId, PortState>,
    pub(crate) next_port: u64,
    pub(crate) session_format: Option<AudioFormat>,
    /// The output timeline; replaced by seeks.
    pub(crate) output_segment: Segment,
    /// Output cursor in sample frames since the segment start. Never moves
    /// backwards except through a flush-stop/seek reset.
    pub(crate) position: u64,
    /// Downstream-facing flushing indicator.
    pub(crate) output_flushing: bool,
    /// The active seek asked for segment-done notification at segment end.
    pub(crate) segment_seek: bool,
    /// End-of-stream or segment-done has been emitted for this segment.
    pub(crate) finished: bool,
    pub(crate) failed: bool,
    pub(crate) cancel: CancellationToken,
}

impl Shared {
    pub(crate) fn preroll_satisfied(&self) -> bool {
        self.ports.values().all(PortState::prerolled)
    }

    /// Output cursor as running time.
    pub(crate) fn position_time(&self, format: &AudioFormat) -> ClockTime {
        format.frames_to_duration(self.position)
    }

    fn reset_session(&mut self) {
        self.position = 0;
        self.output_segment = Segment::default();
        self.segment_seek = false;
        self.finished = false;
        self.output_flushing = false;
        for port in self.ports.values_mut() {
            port.reset_session();
        }
    }
}

pub(crate) struct Inner {
    pub(crate) config: MixerConfig,
    shared: Mutex<Shared>,
    pub(crate) cond: Notify,
    pub(crate) state_tx: watch::Sender<(EngineState, Option<EngineState>)>,
    pub(crate) output_tx: mpsc::Sender<AudioBuffer>,
    pub(crate) message_tx: mpsc::Sender<EngineMessage>,
}

impl Inner {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the current (state, pending) pair to state waiters.
    pub(crate) fn publish_state(&self, shared: &Shared) {
        self.state_tx.send_replace((shared.state, shared.pending));
    }
}

/// Synchronized multi-input audio aggregation engine.
///
/// Created together with its [`EngineOutput`] half. The engine must live
/// inside a Tokio runtime: upward state changes spawn the aggregation
/// task.
pub struct MixerEngine {
    inner: Arc<Inner>,
}

impl MixerEngine {
    /// Creates an engine in the `Stopped` state.
    pub fn new(config: MixerConfig) -> (Self, EngineOutput) {
        let (output_tx, buffers) = mpsc::channel(config.output_capacity.max(1));
        let (message_tx, messages) = mpsc::channel(config.message_capacity.max(1));
        let (state_tx, _state_rx) = watch::channel((EngineState::Stopped, None));

        let inner = Arc::new(Inner {
            config,
            shared: Mutex::new(Shared {
                state: EngineState::Stopped,
                pending: None,
                ports: IndexMap::new(),
                next_port: 0,
                session_format: None,
                output_segment: Segment::default(),
                position: 0,
                output_flushing: false,
                segment_seek: false,
                finished: false,
                failed: false,
                cancel: CancellationToken::new(),
            }),
            cond: Notify::new(),
            state_tx,
            output_tx,
            message_tx,
        });

        (Self { inner }, EngineOutput { buffers, messages })
    }

    /// Opens a new input port. Allowed in any state; a port added past
    /// preroll joins aggregation as soon as its data starts arriving.
    pub fn open_port(&self, config: PortConfig) -> PortId {
        let mut shared = self.inner.lock();
        let id = PortId(shared.next_port);
        shared.next_port += 1;
        shared.ports.insert(id, PortState::new(id, config));
        tracing::info!(%id, live = config.live, "port opened");
        drop(shared);
        self.inner.cond.notify_waiters();
        id
    }

    /// Releases a port: queued data is discarded and the port leaves all
    /// aggregation and duration computations. If the engine is blocked in
    /// the preroll gate waiting on this port, the gate re-evaluates with
    /// the remaining ports.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::UnknownPort`] if the port was never opened or
    /// has already been released.
    pub fn close_port(&self, port: PortId) -> Result<()> {
        let mut shared = self.inner.lock();
        shared.ports.shift_remove(&port).ok_or(MixerError::UnknownPort(port))?;
        tracing::info!(%port, "port released");
        drop(shared);
        self.inner.cond.notify_waiters();
        Ok(())
    }

    /// Pushes a buffer into a port. The buffer is clipped to the port's
    /// active segment; a fully out-of-segment buffer is accepted and
    /// dropped. With the single-slot queue occupied the call waits until
    /// the aggregator consumes the queued buffer; a flush racing the wait
    /// discards the buffer instead.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::UnknownPort`] when pushing to a released
    /// port (a programming error in the driving pipeline).
    pub async fn push(&self, port: PortId, buffer: AudioBuffer) -> Result<PushResult> {
        // Clipped payload in output running time, prepared on first entry.
        let mut prepared: Option<AudioBuffer> = None;
        let mut admitted_generation: Option<u64> = None;

        loop {
            // Register for wakeups before inspecting state so a slot freed
            // between the check and the wait is not missed.
            let mut notified = std::pin::pin!(self.inner.cond.notified());
            notified.as_mut().enable();
            {
                let mut shared = self.inner.lock();

                let accepting = matches!(shared.state, EngineState::Paused | EngineState::Playing)
                    || shared.pending.is_some();
                if !accepting {
                    return Ok(PushResult::Rejected(RejectReason::NotActive));
                }

                let cursor_frames = shared.position;
                let session = shared.session_format;
                let Some(state) = shared.ports.get_mut(&port) else {
                    if admitted_generation.is_some() {
                        // Port released while we were waiting for a slot.
                        return Ok(PushResult::Rejected(RejectReason::Flushing));
                    }
                    return Err(MixerError::UnknownPort(port));
                };

                if state.flushing {
                    tracing::debug!(%port, "push during flush, dropping buffer");
                    return Ok(PushResult::Rejected(RejectReason::Flushing));
                }
                if state.eos {
                    return Ok(PushResult::Rejected(RejectReason::Eos));
                }
                if admitted_generation.is_some_and(|g| g != state.generation) {
                    tracing::debug!(%port, "flush raced a queued push, dropping buffer");
                    return Ok(PushResult::Rejected(RejectReason::Flushing));
                }

                if admitted_generation.is_none() {
                    let format = match state.format {
                        Some(format) => format,
                        // The port's caps left wildcards earlier; the
                        // session format may have filled them in since.
                        None => match resolve(
                            session.as_ref(),
                            self.inner.config.fixed_caps.as_ref(),
                            &state.caps,
                        ) {
                            Ok(Resolution::Fixed(format)) => {
                                state.format = Some(format);
                                format
                            },
                            _ => return Ok(PushResult::Rejected(RejectReason::NotNegotiated)),
                        },
                    };
                    admitted_generation = Some(state.generation);

                    match clip_buffer(&buffer, &state.segment, &format) {
                        None => {
                            // Entirely outside the segment: consumed, no output.
                            state.received_buffer = true;
                            drop(shared);
                            self.inner.cond.notify_waiters();
                            return Ok(PushResult::Accepted);
                        },
                        Some(clipped) => {
                            let running = state
                                .segment
                                .to_running_time(clipped.pts)
                                .unwrap_or(clipped.pts);
                            let scaled_duration = scale_duration(clipped.duration, state.segment.rate);
                            prepared = Some(AudioBuffer {
                                pts: running,
                                duration: scaled_duration,
                                ..clipped
                            });
                        },
                    }
                }

                let slot_free = match (&state.queue, &state.format) {
                    (None, _) => true,
                    // A queued buffer entirely behind the cursor will never
                    // be mixed; overwrite it rather than waiting on it.
                    (Some(queued), Some(format)) => {
                        format.duration_to_frames(queued.pts) + queued.num_frames(format)
                            <= cursor_frames
                    },
                    (Some(_), None) => false,
                };

                if slot_free {
                    state.queue = prepared.take();
                    state.received_buffer = true;
                    drop(shared);
                    self.inner.cond.notify_waiters();
                    return Ok(PushResult::Accepted);
                }
            }
            notified.await;
        }
    }

    /// Delivers a control event to a port.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::UnknownPort`] for released ports and
    /// [`MixerError::FormatMismatch`] when a caps hint cannot be
    /// reconciled with the fixed constraint or the session format.
    /// Malformed segments are not errors: the event is dropped and a
    /// warning message is posted.
    pub async fn push_event(&self, port: PortId, event: PortEvent) -> Result<()> {
        let mut warning = None;
        {
            let mut shared = self.inner.lock();
            let session = shared.session_format;
            let state =
                shared.ports.get_mut(&port).ok_or(MixerError::UnknownPort(port))?;

            match event {
                PortEvent::StreamStart => {
                    tracing::debug!(%port, "stream start");
                    state.eos = false;
                },
                PortEvent::CapsHint(caps) => {
                    match resolve(session.as_ref(), self.inner.config.fixed_caps.as_ref(), &caps)? {
                        Resolution::Fixed(format) => {
                            state.caps = caps;
                            state.format = Some(format);
                            if session.is_none() {
                                tracing::info!(?format, "session format negotiated");
                                shared.session_format = Some(format);
                            }
                        },
                        Resolution::Underspecified(met) => {
                            tracing::debug!(%port, ?met, "caps accepted but not concrete yet");
                            state.caps = met;
                        },
                    }
                },
                PortEvent::Segment(segment) => match segment.validate() {
                    Ok(()) => {
                        tracing::debug!(%port, ?segment, "segment replaced");
                        state.segment = segment;
                    },
                    Err(err) => {
                        warning = Some(format!("segment event on {port} dropped: {err}"));
                    },
                },
                PortEvent::FlushStart => {
                    tracing::debug!(%port, "flush start");
                    state.start_flush();
                    shared.output_flushing = true;
                },
                PortEvent::FlushStop { reset_time } => {
                    tracing::debug!(%port, reset_time, "flush stop");
                    state.flushing = false;
                    shared.output_flushing = false;
                    if reset_time {
                        shared.position = 0;
                        shared.finished = false;
                    }
                },
                PortEvent::Eos => {
                    tracing::debug!(%port, "end of stream");
                    state.eos = true;
                },
            }
        }
        self.inner.cond.notify_waiters();

        if let Some(message) = warning {
            tracing::warn!("{message}");
            self.post(EngineMessage::Warning { message }).await;
        }
        Ok(())
    }

    /// Propagates a new segment to every non-live port. Live ports ignore
    /// the request entirely; the return value reports whether any port
    /// accepted it. A flushing seek discards all queued data and resets
    /// the output cursor; a `segment`-flagged seek arms one segment-done
    /// notification at segment end instead of end-of-stream.
    pub async fn seek(&self, request: SeekRequest) -> bool {
        let segment = request.segment();
        if let Err(err) = segment.validate() {
            let message = format!("seek rejected: {err}");
            tracing::warn!("{message}");
            self.post(EngineMessage::Warning { message }).await;
            return false;
        }

        {
            let mut shared = self.inner.lock();
            let seekable = shared.ports.values().filter(|p| !p.live).count();
            if seekable == 0 && !shared.ports.is_empty() {
                tracing::debug!("all ports are live, ignoring seek");
                return false;
            }

            if request.flags.flush {
                for port in shared.ports.values_mut() {
                    port.queue = None;
                    port.generation += 1;
                }
                shared.position = 0;
            }
            for port in shared.ports.values_mut() {
                if !port.live {
                    port.segment = segment;
                    port.eos = false;
                }
            }
            shared.output_segment = segment;
            shared.segment_seek = request.flags.segment;
            shared.finished = false;
            tracing::info!(
                start = request.start,
                stop = ?request.stop,
                flush = request.flags.flush,
                segment = request.flags.segment,
                "seek applied to {seekable} ports"
            );
        }
        self.inner.cond.notify_waiters();
        true
    }

    /// Records a port's upstream duration; `None` means unknown.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::UnknownPort`] for released ports.
    pub fn report_duration(&self, port: PortId, duration: Option<ClockTime>) -> Result<()> {
        let mut shared = self.inner.lock();
        let state = shared.ports.get_mut(&port).ok_or(MixerError::UnknownPort(port))?;
        state.duration = duration;
        Ok(())
    }

    /// Aggregate stream duration in the requested unit, recomputed from
    /// the currently connected ports. Unknown dominates: any connected
    /// port without a known duration makes the aggregate unknown.
    pub fn duration(&self, format: Format) -> Option<u64> {
        let shared = self.inner.lock();
        let ns = aggregate_duration(shared.ports.values().map(|p| p.duration))?;
        match format {
            Format::Time => Some(ns),
            Format::Samples => shared.session_format.map(|f| f.duration_to_frames(ns)),
        }
    }

    /// The downstream-facing flushing indicator: raised synchronously by
    /// flush-start on any port, cleared by the corresponding flush-stop.
    pub fn is_output_flushing(&self) -> bool {
        self.inner.lock().output_flushing
    }

    /// The negotiated session format, once fixed.
    pub fn output_format(&self) -> Option<AudioFormat> {
        self.inner.lock().session_format
    }

    /// Requests a transition toward `target`, walking the state ladder one
    /// rung at a time. `Ready → Paused` gates on preroll and reports
    /// [`StateChange::Async`] until every connected port has delivered a
    /// buffer or reached end-of-stream.
    pub fn set_state(&self, target: EngineState) -> StateChange {
        let mut shared = self.inner.lock();

        if shared.pending.is_some() {
            if target > shared.state {
                // Retarget the in-flight upward transition.
                shared.pending = Some(target);
                self.inner.publish_state(&shared);
                return StateChange::Async;
            }
            // A downward request cancels the pending upward move together
            // with the session it was prerolling.
            shared.pending = None;
            shared.cancel.cancel();
            shared.reset_session();
        }

        while let Some(next) = shared.state.step_toward(target) {
            match (shared.state, next) {
                (EngineState::Stopped, EngineState::Ready) => {
                    shared.state = EngineState::Ready;
                },
                (EngineState::Ready, EngineState::Paused) => {
                    shared.cancel = CancellationToken::new();
                    tokio::spawn(aggregator::run(
                        Arc::clone(&self.inner),
                        shared.cancel.clone(),
                    ));
                    if shared.preroll_satisfied() {
                        shared.state = EngineState::Paused;
                    } else {
                        shared.pending = Some(target);
                        self.inner.publish_state(&shared);
                        drop(shared);
                        self.inner.cond.notify_waiters();
                        tracing::info!("prerolling, transition pending");
                        return StateChange::Async;
                    }
                },
                (EngineState::Paused, EngineState::Playing) => {
                    shared.state = EngineState::Playing;
                },
                (EngineState::Playing, EngineState::Paused) => {
                    shared.state = EngineState::Paused;
                },
                (EngineState::Paused, EngineState::Ready) => {
                    shared.cancel.cancel();
                    shared.reset_session();
                    shared.state = EngineState::Ready;
                },
                (EngineState::Ready, EngineState::Stopped) => {
                    shared.session_format = None;
                    for port in shared.ports.values_mut() {
                        port.format = None;
                        port.caps = FormatCaps::ANY;
                        port.duration = None;
                    }
                    shared.state = EngineState::Stopped;
                },
                (from, to) => {
                    tracing::warn!(%from, %to, "unexpected transition step");
                    return StateChange::Failure;
                },
            }
            tracing::info!(state = %shared.state, "state changed");
        }

        self.inner.publish_state(&shared);
        drop(shared);
        self.inner.cond.notify_waiters();
        StateChange::Success
    }

    /// Snapshot of the current lifecycle state.
    pub fn current_state(&self) -> CurrentState {
        let shared = self.inner.lock();
        if shared.pending.is_some() {
            CurrentState::TransitionPending
        } else {
            shared.state.into()
        }
    }

    /// Bounded wait for a pending transition to settle. Distinguishes a
    /// settled transition from one still pending at the deadline and from
    /// terminal engine failure.
    pub async fn await_state_change(&self, timeout: Duration) -> StateWait {
        let mut state_rx = self.inner.state_tx.subscribe();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            if self.inner.lock().failed {
                return StateWait::Failure;
            }
            let (state, pending) = *state_rx.borrow_and_update();
            if pending.is_none() {
                return StateWait::Success(state);
            }
            tokio::select! {
                () = &mut deadline => return StateWait::Pending,
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return StateWait::Failure;
                    }
                },
            }
        }
    }

    async fn post(&self, message: EngineMessage) {
        if self.inner.message_tx.send(message).await.is_err() {
            tracing::debug!("message receiver dropped");
        }
    }
}

impl Drop for MixerEngine {
    fn drop(&mut self) {
        self.inner.lock().cancel.cancel();
    }
}

/// Scales a duration by the segment rate, truncating to whole nanoseconds.
fn scale_duration(duration: ClockTime, rate: f64) -> ClockTime {
    if (rate - 1.0).abs() < f64::EPSILON {
        duration
    } else {
        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
        {
            (duration as f64 / rate.abs()) as ClockTime
        }
    }
}
