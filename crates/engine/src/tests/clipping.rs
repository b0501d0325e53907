// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Segment clipping observed through the engine.

use super::*;
use mixkit_core::{EngineState, PushResult, Segment, MSECOND, SECOND};

/// Mirrors the classic clip scenario: a port with segment [1s, 2s) is fed
/// buffers straddling both edges. Out-of-segment data is accepted but
/// never reaches the output; the in-segment ranges come through at their
/// mapped running times.
#[tokio::test]
async fn test_out_of_segment_data_never_reaches_output() {
    let (engine, mut output) = engine_with_blocksize(50);

    let port = open_negotiated_port(&engine, MONO_1K).await;
    engine
        .push_event(port, PortEvent::Segment(Segment::new(SECOND, Some(2 * SECOND))))
        .await
        .unwrap();

    engine.set_state(EngineState::Playing);

    // Entirely before the segment: accepted, dropped, no output.
    let result = engine.push(port, s16_buffer(&MONO_1K, 0, 250 * MSECOND, 1)).await.unwrap();
    assert_eq!(result, PushResult::Accepted);
    expect_no_buffer(&mut output.buffers, Duration::from_millis(100)).await;

    // Straddles the segment start: the [1s, 1.15s) tail survives.
    engine.push(port, s16_buffer(&MONO_1K, 900 * MSECOND, 250 * MSECOND, 2)).await.unwrap();

    // Entirely inside: survives unchanged as [1.15s, 1.4s).
    engine.push(port, s16_buffer(&MONO_1K, 1150 * MSECOND, 250 * MSECOND, 3)).await.unwrap();

    // At the exclusive stop edge: accepted, dropped.
    let result =
        engine.push(port, s16_buffer(&MONO_1K, 2 * SECOND, 250 * MSECOND, 4)).await.unwrap();
    assert_eq!(result, PushResult::Accepted);

    engine.push_event(port, PortEvent::Eos).await.unwrap();

    // Segment time starts at 0, so the kept ranges land at running time
    // [0, 150ms) and [150ms, 400ms): 400 frames in 50-frame slices.
    let mut samples = Vec::new();
    for _ in 0..8 {
        let buffer = recv_buffer(&mut output.buffers).await;
        samples.extend(s16_samples(&buffer));
    }

    assert_eq!(samples.len(), 400);
    assert!(samples[..150].iter().all(|s| *s == 2));
    assert!(samples[150..].iter().all(|s| *s == 3));

    assert_eq!(recv_message(&mut output.messages).await, EngineMessage::Eos);
}

/// A buffer that only grazes the segment stop is trimmed to it and the
/// stream still drains cleanly.
#[tokio::test]
async fn test_tail_trimmed_at_segment_stop() {
    let (engine, mut output) = engine_with_blocksize(100);

    let port = open_negotiated_port(&engine, MONO_1K).await;
    engine
        .push_event(port, PortEvent::Segment(Segment::new(SECOND, Some(2 * SECOND))))
        .await
        .unwrap();
    engine.set_state(EngineState::Playing);

    engine.push(port, s16_buffer(&MONO_1K, 1900 * MSECOND, 250 * MSECOND, 5)).await.unwrap();
    engine.push_event(port, PortEvent::Eos).await.unwrap();

    // Only [1.9s, 2s) survives, mapped to running [900ms, 1s). Everything
    // before it is silence the aggregator renders on its own.
    let mut samples = Vec::new();
    loop {
        let buffer = recv_buffer(&mut output.buffers).await;
        samples.extend(s16_samples(&buffer));
        if samples.len() >= 1000 {
            break;
        }
    }

    assert_eq!(samples.len(), 1000);
    assert!(samples[..900].iter().all(|s| *s == 0));
    assert!(samples[900..].iter().all(|s| *s == 5));

    assert_eq!(recv_message(&mut output.messages).await, EngineMessage::Eos);
}
