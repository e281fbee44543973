// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Symmetric streaming mode: roundtrips, nonce freshness, key
//! isolation, and tamper detection.

use fabstir_llm_client::crypto::{CryptoError, EncryptionEngine};
use rand::{rngs::OsRng, RngCore};

fn random_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

#[test]
fn test_roundtrip_carries_message_index() {
    let engine = EncryptionEngine::random();
    let key = random_key();

    for index in [0u64, 1, 7, u64::MAX] {
        let sealed = engine
            .seal_symmetric(&key, b"streaming payload", index)
            .unwrap();
        let opened = engine.open_symmetric(&key, &sealed).unwrap();

        assert_eq!(opened.plaintext, b"streaming payload");
        assert_eq!(opened.message_index, index);
    }
}

#[test]
fn test_two_message_exchange() {
    let client = EncryptionEngine::random();
    let host = EncryptionEngine::random();
    let key = random_key();

    let first = client.seal_symmetric(&key, b"hello", 0).unwrap();
    let second = client.seal_symmetric(&key, b"world", 1).unwrap();

    let opened_first = host.open_symmetric(&key, &first).unwrap();
    let opened_second = host.open_symmetric(&key, &second).unwrap();

    assert_eq!(opened_first.plaintext, b"hello");
    assert_eq!(opened_first.message_index, 0);
    assert_eq!(opened_second.plaintext, b"world");
    assert_eq!(opened_second.message_index, 1);
}

#[test]
fn test_repeated_encryption_never_reuses_nonces() {
    let engine = EncryptionEngine::random();
    let key = random_key();

    let mut nonces = std::collections::HashSet::new();
    let mut ciphertexts = std::collections::HashSet::new();
    for _ in 0..64 {
        let sealed = engine.seal_symmetric(&key, b"same plaintext", 0).unwrap();
        assert!(nonces.insert(sealed.nonce_hex.clone()), "nonce reused");
        assert!(
            ciphertexts.insert(sealed.ciphertext_hex.clone()),
            "ciphertext repeated"
        );
    }
}

#[test]
fn test_tampered_ciphertext_is_decryption_failed() {
    let engine = EncryptionEngine::random();
    let key = random_key();

    let mut sealed = engine.seal_symmetric(&key, b"hello", 0).unwrap();
    let mut bytes = hex::decode(&sealed.ciphertext_hex).unwrap();
    bytes[0] ^= 0x01;
    sealed.ciphertext_hex = hex::encode(bytes);

    let err = engine.open_symmetric(&key, &sealed).unwrap_err();
    assert!(matches!(err, CryptoError::DecryptionFailed { .. }));
}

#[test]
fn test_tampered_aad_is_decryption_failed() {
    let engine = EncryptionEngine::random();
    let key = random_key();

    let mut sealed = engine.seal_symmetric(&key, b"hello", 3).unwrap();
    // Rewrite the AAD to claim a different index; the tag must not verify
    let mut aad = hex::decode(&sealed.aad_hex).unwrap();
    let text = String::from_utf8(aad.clone()).unwrap();
    aad = text.replace("\"message_index\":3", "\"message_index\":4").into_bytes();
    sealed.aad_hex = hex::encode(aad);

    let err = engine.open_symmetric(&key, &sealed).unwrap_err();
    assert!(matches!(err, CryptoError::DecryptionFailed { .. }));
}

#[test]
fn test_malformed_fields_are_decryption_failed() {
    let engine = EncryptionEngine::random();
    let key = random_key();
    let sealed = engine.seal_symmetric(&key, b"hello", 0).unwrap();

    let mut short_nonce = sealed.clone();
    short_nonce.nonce_hex = "abcd".to_string();
    assert!(matches!(
        engine.open_symmetric(&key, &short_nonce).unwrap_err(),
        CryptoError::DecryptionFailed { .. }
    ));

    let mut bad_hex = sealed;
    bad_hex.ciphertext_hex = "zz".to_string();
    assert!(matches!(
        engine.open_symmetric(&key, &bad_hex).unwrap_err(),
        CryptoError::DecryptionFailed { .. }
    ));
}

#[test]
fn test_sessions_are_isolated_by_key() {
    let engine = EncryptionEngine::random();
    let keys = [random_key(), random_key(), random_key()];
    let plaintexts: [&[u8]; 3] = [b"alpha", b"bravo", b"charlie"];

    let sealed: Vec<_> = keys
        .iter()
        .zip(plaintexts)
        .map(|(key, plaintext)| engine.seal_symmetric(key, plaintext, 0).unwrap())
        .collect();

    for (i, message) in sealed.iter().enumerate() {
        for (j, key) in keys.iter().enumerate() {
            if i == j {
                assert_eq!(
                    engine.open_symmetric(key, message).unwrap().plaintext,
                    plaintexts[i]
                );
            } else {
                assert!(engine.open_symmetric(key, message).is_err());
            }
        }
    }
}
