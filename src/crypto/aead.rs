// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! XChaCha20-Poly1305 Encryption/Decryption
//!
//! Authenticated encryption with associated data. The ciphertext carries
//! the 16-byte Poly1305 tag appended; decryption verifies the tag against
//! the key, nonce, and AAD before releasing any plaintext.
//!
//! Nonces are 24 bytes and MUST be unique per encryption under a given
//! key; callers draw them from a CSPRNG.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};

use super::error::CryptoError;

/// Poly1305 tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// XChaCha20 nonce length.
pub const NONCE_LEN: usize = 24;

/// Symmetric key length.
pub const KEY_LEN: usize = 32;

/// Encrypt `plaintext` under `key`/`nonce`, binding `aad` into the tag.
///
/// # Returns
///
/// `ciphertext || tag` (plaintext length + 16 bytes)
pub fn encrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    cipher
        .encrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::CryptoUnavailable {
            operation: "aead_encrypt",
            reason: "cipher rejected input".to_string(),
        })
}

/// Decrypt `ciphertext || tag`, verifying the tag against `aad`.
///
/// # Errors
///
/// `CryptoError::DecryptionFailed` on tag mismatch, tampered AAD, or a
/// wrong key. The error deliberately carries no detail beyond the
/// operation name.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
    operation: &'static str,
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::invalid_input(
            "ciphertextHex",
            format!("shorter than the {}-byte tag", TAG_LEN),
        ));
    }

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed { operation })
}
