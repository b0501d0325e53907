// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! MixKit Core - Types and leaf components for synchronized audio aggregation.
//!
//! This crate defines the vocabulary shared by the aggregation engine and
//! the pipeline driving it:
//!
//! ## Core Modules
//!
//! - [`types`]: Core data types (`AudioBuffer`, `AudioFormat`, `FormatCaps`, clock time)
//! - [`segment`]: Per-port time ranges and the running-time mapping
//! - [`clip`]: Sample-granular trimming of buffers to their segment
//! - [`format`]: Resolution of the single session-wide sample format
//! - [`events`]: Port control events and out-of-band engine messages
//! - [`state`]: The `Stopped/Ready/Paused/Playing` lifecycle vocabulary
//! - [`error`]: Error types and handling

// Module declarations
pub mod clip;
pub mod error;
pub mod events;
pub mod format;
pub mod segment;
pub mod state;
pub mod types;

// Convenience re-exports for commonly used types

// Error handling
pub use error::{MixerError, Result};

// Core data types
pub use types::{
    AudioBuffer, AudioFormat, ClockTime, FormatCaps, PortId, SampleFormat, MSECOND, SECOND,
    USECOND,
};

// Segment model
pub use segment::{SeekFlags, SeekRequest, Segment};

// Clipping
pub use clip::clip_buffer;

// Negotiation
pub use format::{resolve, Resolution};

// Events and messages
pub use events::{EngineMessage, Format, PortEvent, PushResult, RejectReason};

// Lifecycle vocabulary
pub use state::{CurrentState, EngineState, StateChange, StateWait};
