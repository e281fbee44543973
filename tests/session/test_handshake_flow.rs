// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session handshake: encrypted happy path, plaintext fallback, and
//! lifecycle transitions.

use fabstir_llm_client::session::{
    validate_session_init, SessionError, SessionPhase, WireMessage,
};
use tokio_util::sync::CancellationToken;

use super::util::{connected_protocol, HostBehavior};

#[tokio::test]
async fn test_encrypted_handshake_activates_session() {
    let (mut protocol, host) = connected_protocol(HostBehavior::default());

    protocol.initialize().await.unwrap();

    assert_eq!(protocol.phase(), SessionPhase::Active);
    assert!(protocol.is_encrypted());

    let observed = host.observed.lock().unwrap();
    assert_eq!(observed.len(), 1);
    match &observed[0] {
        WireMessage::EncryptedSessionInit {
            chain_id,
            session_id,
            job_id,
            ..
        } => {
            assert_eq!(chain_id, "84532");
            assert_eq!(session_id, "7");
            assert_eq!(job_id, "456");
        }
        other => panic!("expected encrypted_session_init, got {:?}", other),
    }

    // The emitted init is schema-valid on the wire.
    let raw = serde_json::to_value(&observed[0]).unwrap();
    validate_session_init(&raw).unwrap();
}

#[tokio::test]
async fn test_fallback_reuses_identifiers_and_drops_key() {
    let (mut protocol, host) = connected_protocol(HostBehavior {
        accept_encryption: false,
        ..Default::default()
    });

    protocol.initialize().await.unwrap();

    assert_eq!(protocol.phase(), SessionPhase::Active);
    assert!(!protocol.is_encrypted());

    assert_eq!(
        host.observed_types(),
        vec!["encrypted_session_init", "session_init"]
    );
    let observed = host.observed.lock().unwrap();
    let (first_sid, first_jid) = match &observed[0] {
        WireMessage::EncryptedSessionInit {
            session_id, job_id, ..
        } => (session_id.clone(), job_id.clone()),
        other => panic!("unexpected {:?}", other),
    };
    match &observed[1] {
        WireMessage::SessionInit {
            session_id, job_id, ..
        } => {
            assert_eq!(session_id, &first_sid);
            assert_eq!(job_id, &first_jid);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_silent_host_times_out_and_fails_session() {
    let (mut protocol, _host) = connected_protocol(HostBehavior {
        ack_init: false,
        ..Default::default()
    });

    let err = protocol.initialize().await.unwrap_err();
    assert!(matches!(err, SessionError::Timeout(_)));
    assert_eq!(protocol.phase(), SessionPhase::Failed);
}

#[tokio::test]
async fn test_initialize_twice_is_invalid_phase() {
    let (mut protocol, _host) = connected_protocol(HostBehavior::default());

    protocol.initialize().await.unwrap();
    let err = protocol.initialize().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidPhase { .. }));
}

#[tokio::test]
async fn test_prompt_before_handshake_is_invalid_phase() {
    let (mut protocol, _host) = connected_protocol(HostBehavior::default());

    let cancel = CancellationToken::new();
    let err = protocol
        .send_prompt("hello", &cancel, |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidPhase { .. }));
}

#[tokio::test]
async fn test_completion_is_idempotent_and_destroys_key() {
    let (mut protocol, host) = connected_protocol(HostBehavior::default());

    protocol.initialize().await.unwrap();
    assert!(protocol.is_encrypted());

    protocol.complete(42, Some("proof".to_string())).await.unwrap();
    assert_eq!(protocol.phase(), SessionPhase::Completed);
    assert!(!protocol.is_encrypted());
    assert_eq!(protocol.state().tokens_generated(), 42);

    // Completing again is a no-op, not an error.
    protocol.complete(42, None).await.unwrap();
    assert_eq!(protocol.phase(), SessionPhase::Completed);

    let types = host.observed_types();
    assert_eq!(
        types.iter().filter(|t| *t == &"session_complete").count(),
        1
    );
}

#[tokio::test]
async fn test_pause_and_resume() {
    let (mut protocol, _host) = connected_protocol(HostBehavior::default());
    protocol.initialize().await.unwrap();

    protocol.pause().unwrap();
    assert_eq!(protocol.phase(), SessionPhase::Paused);

    let cancel = CancellationToken::new();
    let err = protocol
        .send_prompt("hello", &cancel, |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidPhase { .. }));

    protocol.resume().unwrap();
    assert_eq!(protocol.phase(), SessionPhase::Active);
}

#[tokio::test]
async fn test_abort_is_terminal() {
    let (mut protocol, _host) = connected_protocol(HostBehavior::default());
    protocol.initialize().await.unwrap();

    protocol.abort().await;
    assert_eq!(protocol.phase(), SessionPhase::Aborted);
    assert!(!protocol.is_encrypted());

    let err = protocol.complete(0, None).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidPhase { .. }));
}
