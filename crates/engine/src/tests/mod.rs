// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the aggregation engine.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod clipping;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mixkit_core::{
    AudioBuffer, AudioFormat, ClockTime, EngineMessage, FormatCaps, PortEvent, PortId,
    SampleFormat,
};
use tokio::sync::mpsc;

use crate::{EngineOutput, MixerConfig, MixerEngine, PortConfig};

/// 1 kHz mono S16: one frame per millisecond keeps the expected sample
/// counts easy to read.
pub(crate) const MONO_1K: AudioFormat =
    AudioFormat { sample_rate: 1000, channels: 1, sample_format: SampleFormat::S16Le };

pub(crate) fn engine_with_blocksize(blocksize: u64) -> (Arc<MixerEngine>, EngineOutput) {
    let (engine, output) =
        MixerEngine::new(MixerConfig { blocksize, ..MixerConfig::default() });
    (Arc::new(engine), output)
}

/// Opens a port and runs it through stream-start and caps negotiation.
pub(crate) async fn open_negotiated_port(engine: &MixerEngine, format: AudioFormat) -> PortId {
    let port = engine.open_port(PortConfig::default());
    engine.push_event(port, PortEvent::StreamStart).await.unwrap();
    engine.push_event(port, PortEvent::CapsHint(FormatCaps::from(format))).await.unwrap();
    port
}

/// A buffer of constant S16 samples.
pub(crate) fn s16_buffer(
    format: &AudioFormat,
    pts: ClockTime,
    duration: ClockTime,
    fill: i16,
) -> AudioBuffer {
    let samples =
        usize::try_from(format.duration_to_frames(duration)).unwrap() * format.channels as usize;
    let data: Vec<u8> = std::iter::repeat(fill.to_le_bytes()).take(samples).flatten().collect();
    AudioBuffer::new(pts, duration, Bytes::from(data))
}

pub(crate) fn s16_samples(buffer: &AudioBuffer) -> Vec<i16> {
    buffer.data.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect()
}

pub(crate) async fn recv_buffer(buffers: &mut mpsc::Receiver<AudioBuffer>) -> AudioBuffer {
    tokio::time::timeout(Duration::from_secs(5), buffers.recv())
        .await
        .expect("timed out waiting for an output buffer")
        .expect("output channel closed")
}

pub(crate) async fn recv_message(messages: &mut mpsc::Receiver<EngineMessage>) -> EngineMessage {
    tokio::time::timeout(Duration::from_secs(5), messages.recv())
        .await
        .expect("timed out waiting for an engine message")
        .expect("message channel closed")
}

/// Asserts that no output buffer shows up within `wait`.
pub(crate) async fn expect_no_buffer(buffers: &mut mpsc::Receiver<AudioBuffer>, wait: Duration) {
    assert!(
        tokio::time::timeout(wait, buffers.recv()).await.is_err(),
        "unexpected output buffer"
    );
}

/// Call at the top of a test to see engine logs under `--nocapture`.
#[allow(dead_code)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::TRACE).try_init();
}
