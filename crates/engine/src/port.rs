// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-port state.
//!
//! A port is one logical input stream: its negotiated format, active
//! segment, single-slot buffer queue, and flow flags. Ports live in an
//! insertion-ordered registry keyed by [`PortId`], so adding or releasing
//! a port during an in-flight aggregation step never disturbs the other
//! ports' handles.

use mixkit_core::{AudioBuffer, AudioFormat, ClockTime, FormatCaps, PortId, Segment};
use serde::{Deserialize, Serialize};

/// Settings supplied when a port is opened.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PortConfig {
    /// Marks the port as backed by a live, unseekable source. Live ports
    /// ignore seek requests and end on natural end-of-stream.
    pub live: bool,
}

/// Internal state of a single input port.
#[derive(Debug)]
pub(crate) struct PortState {
    pub(crate) id: PortId,
    /// Last proposed capability set (may still hold wildcards).
    pub(crate) caps: FormatCaps,
    /// Concrete negotiated format; identical to the session format once set.
    pub(crate) format: Option<AudioFormat>,
    /// Active segment; buffers are clipped against it on push.
    pub(crate) segment: Segment,
    /// At most one pending clipped buffer, in output running time.
    pub(crate) queue: Option<AudioBuffer>,
    pub(crate) eos: bool,
    pub(crate) flushing: bool,
    pub(crate) live: bool,
    /// True once the port has delivered at least one buffer this session
    /// (the preroll criterion, together with `eos`).
    pub(crate) received_buffer: bool,
    /// Most recently reported upstream duration; `None` means unknown.
    pub(crate) duration: Option<ClockTime>,
    /// Bumped by flushes and session resets; a push that was admitted
    /// under an older generation is discarded instead of queued.
    pub(crate) generation: u64,
}

impl PortState {
    pub(crate) fn new(id: PortId, config: PortConfig) -> Self {
        Self {
            id,
            caps: FormatCaps::ANY,
            format: None,
            segment: Segment::default(),
            queue: None,
            eos: false,
            flushing: false,
            live: config.live,
            received_buffer: false,
            duration: None,
            generation: 0,
        }
    }

    /// Preroll criterion: the port has shown signs of life.
    pub(crate) const fn prerolled(&self) -> bool {
        self.received_buffer || self.eos
    }

    /// A port contributes nothing further once it is past end-of-stream
    /// with an empty queue.
    pub(crate) const fn exhausted(&self) -> bool {
        self.eos && self.queue.is_none()
    }

    /// Discards queued data and rejects any in-flight push.
    pub(crate) fn start_flush(&mut self) {
        self.flushing = true;
        self.queue = None;
        self.generation += 1;
    }

    /// Clears all per-session streaming state. The negotiated format and
    /// caps survive (they are cleared separately on teardown to Stopped).
    pub(crate) fn reset_session(&mut self) {
        self.segment = Segment::default();
        self.queue = None;
        self.eos = false;
        self.flushing = false;
        self.received_buffer = false;
        self.generation += 1;
    }
}
