// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Big-integer sentinel encoding on the handshake payload.

use fabstir_llm_client::crypto::{HandshakePayload, U256};

fn payload(job_id: U256) -> HandshakePayload {
    HandshakePayload {
        job_id,
        model_name: "m".to_string(),
        session_key: hex::encode([0u8; 32]),
        price_per_token: 2000,
        recovery_public_key: None,
    }
}

#[test]
fn test_job_id_serializes_with_sentinel() {
    let value = serde_json::to_value(payload(U256::from(456u64))).unwrap();
    assert_eq!(value["jobId"], "456n");
}

#[test]
fn test_wire_field_names_are_camel_case() {
    let value = serde_json::to_value(payload(U256::from(1u64))).unwrap();
    assert!(value.get("jobId").is_some());
    assert!(value.get("modelName").is_some());
    assert!(value.get("sessionKey").is_some());
    assert!(value.get("pricePerToken").is_some());
    // Absent optional key is omitted entirely
    assert!(value.get("recoveryPublicKey").is_none());
}

#[test]
fn test_large_job_id_preserved_exactly() {
    let big = U256::from_dec_str("999999999999999999").unwrap();
    let text = serde_json::to_string(&payload(big)).unwrap();
    assert!(text.contains("\"999999999999999999n\""));

    let back: HandshakePayload = serde_json::from_str(&text).unwrap();
    assert_eq!(back.job_id, big);
}

#[test]
fn test_deserializes_legacy_forms() {
    let from_bare: HandshakePayload = serde_json::from_str(
        r#"{"jobId":"456","modelName":"m","sessionKey":"00","pricePerToken":1}"#,
    )
    .unwrap();
    assert_eq!(from_bare.job_id, U256::from(456u64));

    let from_number: HandshakePayload = serde_json::from_str(
        r#"{"jobId":456,"modelName":"m","sessionKey":"00","pricePerToken":1}"#,
    )
    .unwrap();
    assert_eq!(from_number.job_id, U256::from(456u64));
}

#[test]
fn test_beyond_u64_range() {
    let huge = U256::from_dec_str("340282366920938463463374607431768211456").unwrap(); // 2^128
    let text = serde_json::to_string(&payload(huge)).unwrap();
    let back: HandshakePayload = serde_json::from_str(&text).unwrap();
    assert_eq!(back.job_id, huge);
}
