// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sender address recovery from sealed envelopes.

use fabstir_llm_client::crypto::{
    recover_sender_address, CryptoError, HandshakePayload, SealOptions, U256,
};

use super::util::engine_from_label;

fn sealed_by(label: &str) -> (fabstir_llm_client::crypto::SealedEnvelope, String, [u8; 33]) {
    let sender = engine_from_label(label);
    let host = engine_from_label("host/recovery");

    let payload = HandshakePayload {
        job_id: U256::from(1u64),
        model_name: "m".to_string(),
        session_key: hex::encode([9u8; 32]),
        price_per_token: 1,
        recovery_public_key: None,
    };

    let envelope = sender
        .seal_handshake(&host.public_key(), &payload, &SealOptions::default())
        .unwrap();
    (envelope, sender.address().to_string(), host.public_key())
}

#[test]
fn test_recovery_matches_sealer() {
    let (envelope, sender_address, host_pub) = sealed_by("client/recovery-1");
    assert_eq!(
        recover_sender_address(&envelope, &host_pub).unwrap(),
        sender_address
    );
}

#[test]
fn test_distinct_senders_recover_distinct_addresses() {
    let (envelope_a, address_a, host_pub) = sealed_by("client/recovery-a");
    let (envelope_b, address_b, _) = sealed_by("client/recovery-b");

    assert_ne!(address_a, address_b);
    assert_eq!(
        recover_sender_address(&envelope_a, &host_pub).unwrap(),
        address_a
    );
    assert_eq!(
        recover_sender_address(&envelope_b, &host_pub).unwrap(),
        address_b
    );
}

#[test]
fn test_signature_length_is_validated() {
    let (mut envelope, _, host_pub) = sealed_by("client/recovery-1");

    envelope.signature_hex = hex::encode([0u8; 65]);
    let err = recover_sender_address(&envelope, &host_pub).unwrap_err();
    assert!(matches!(
        err,
        CryptoError::InvalidSignatureLength { actual: 65 }
    ));

    envelope.signature_hex = "abcd".to_string();
    let err = recover_sender_address(&envelope, &host_pub).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidSignatureLength { actual: 2 }));
}

#[test]
fn test_wrong_recid_changes_recovered_address() {
    let (mut envelope, sender_address, host_pub) = sealed_by("client/recovery-1");

    envelope.recid ^= 1;
    match recover_sender_address(&envelope, &host_pub) {
        Ok(address) => assert_ne!(address, sender_address),
        Err(err) => assert!(matches!(
            err,
            CryptoError::RecoveryFailed(_) | CryptoError::VerificationFailed
        )),
    }
}

#[test]
fn test_zeroed_signature_fails_recovery() {
    let (mut envelope, _, host_pub) = sealed_by("client/recovery-1");

    envelope.signature_hex = hex::encode([0u8; 64]);
    let err = recover_sender_address(&envelope, &host_pub).unwrap_err();
    assert!(matches!(
        err,
        CryptoError::RecoveryFailed(_) | CryptoError::VerificationFailed
    ));
}
