// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! engine: The synchronized multi-input audio aggregation engine.
//!
//! An arbitrary, dynamically changing number of timestamped input ports is
//! aligned on a shared running-time cursor, clipped to per-port segments,
//! summed sample-accurately, and emitted as one continuous output stream.
//! The driving pipeline delivers buffers and control events per port and
//! walks the engine through `Stopped ↔ Ready ↔ Paused ↔ Playing`; output
//! buffers and out-of-band notifications come back over channels.
//!
//! ```ignore
//! use mixkit_engine::{MixerConfig, MixerEngine, PortConfig};
//! use mixkit_core::{EngineState, PortEvent, FormatCaps};
//!
//! let (engine, mut output) = MixerEngine::new(MixerConfig::default());
//! let port = engine.open_port(PortConfig::default());
//! engine.push_event(port, PortEvent::CapsHint(FormatCaps::from(format))).await?;
//! engine.set_state(EngineState::Playing);
//! engine.push(port, buffer).await?;
//! while let Some(slice) = output.buffers.recv().await { /* ... */ }
//! ```

// --- Public Modules ---

pub mod engine;
pub mod mix;
pub mod port;

// Internal modules
mod aggregator;
mod duration;

// Re-exports
pub use engine::{EngineOutput, MixerConfig, MixerEngine};
pub use port::PortConfig;

#[cfg(test)]
mod tests;
