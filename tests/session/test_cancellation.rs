// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cancellation semantics: resolve-with-partial-output, best-effort
//! cancel notice, and a transport that stays usable.

use std::sync::{Arc, Mutex};

use fabstir_llm_client::session::SessionPhase;
use tokio_util::sync::CancellationToken;

use super::util::{connected_protocol, HostBehavior};

#[tokio::test]
async fn test_pre_cancelled_prompt_sends_nothing() {
    let (mut protocol, host) = connected_protocol(HostBehavior {
        chunks: vec!["never"],
        ..Default::default()
    });
    protocol.initialize().await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let response = protocol.send_prompt("hello", &cancel, |_| {}).await.unwrap();
    assert_eq!(response, "");

    // Nothing after the handshake reached the wire, and the index was
    // not consumed.
    assert_eq!(host.observed_types(), vec!["encrypted_session_init"]);
    assert_eq!(protocol.state().message_index(), 0);
    assert_eq!(protocol.phase(), SessionPhase::Active);
}

#[tokio::test]
async fn test_mid_stream_cancel_resolves_with_partial_output() {
    let (mut protocol, host) = connected_protocol(HostBehavior {
        chunks: vec!["A", "B", "C"],
        end_stream: false,
        ..Default::default()
    });
    protocol.initialize().await.unwrap();

    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&collected);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let response = protocol
        .send_prompt("stream please", &cancel, move |chunk| {
            let mut seen = sink.lock().unwrap();
            seen.push(chunk.to_string());
            if seen.len() == 2 {
                trigger.cancel();
            }
        })
        .await
        .unwrap();

    // Two observed chunks, concatenated; the third never surfaced.
    assert_eq!(response, "AB");
    assert_eq!(*collected.lock().unwrap(), vec!["A", "B"]);

    // The cancel notice went out on the wire...
    assert!(host.observed_types().contains(&"stream_cancel"));
    // ...and the session survived it.
    assert_eq!(protocol.phase(), SessionPhase::Active);
    assert!(protocol.is_encrypted());
}

#[tokio::test]
async fn test_session_is_usable_immediately_after_cancel() {
    let (mut protocol, _host) = connected_protocol(HostBehavior {
        chunks: vec!["A", "B", "C"],
        end_stream: false,
        ..Default::default()
    });
    protocol.initialize().await.unwrap();

    // First prompt: cancel after one chunk.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let first = protocol
        .send_prompt("first", &cancel, move |_| trigger.cancel())
        .await
        .unwrap();
    assert_eq!(first, "A");

    // Second prompt goes straight out on the same transport.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let seen = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&seen);
    let second = protocol
        .send_prompt("second", &cancel, move |_| {
            let mut count = counter.lock().unwrap();
            *count += 1;
            if *count == 2 {
                trigger.cancel();
            }
        })
        .await
        .unwrap();

    assert_eq!(second, "AB");
    assert_eq!(protocol.phase(), SessionPhase::Active);
    assert_eq!(protocol.state().message_index(), 2);
}

#[tokio::test]
async fn test_cancelled_output_is_recorded_in_transcript() {
    let (mut protocol, _host) = connected_protocol(HostBehavior {
        chunks: vec!["A", "B", "C"],
        end_stream: false,
        ..Default::default()
    });
    protocol.initialize().await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    protocol
        .send_prompt("first", &cancel, move |_| trigger.cancel())
        .await
        .unwrap();

    assert_eq!(protocol.state().prompts(), ["first"]);
    assert_eq!(protocol.state().responses(), ["A"]);
    assert_eq!(protocol.state().checkpoints().len(), 1);
}
