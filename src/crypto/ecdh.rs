// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDH Key Agreement and HKDF Key Derivation
//!
//! Ephemeral-static key exchange on secp256k1 (the curve used by Ethereum
//! wallets), followed by HKDF-SHA256 to derive the 32-byte AEAD key for a
//! sealed envelope. The shared secret is the x-coordinate of the ECDH
//! point, serialized as 32 bytes.

use hkdf::Hkdf;
use k256::{
    ecdh::diffie_hellman,
    elliptic_curve::sec1::FromEncodedPoint,
    EncodedPoint, PublicKey, SecretKey,
};
use sha2::Sha256;

use super::error::CryptoError;

/// Parse a secp256k1 public key from its SEC1 encoding.
///
/// Accepts compressed (33 bytes) and uncompressed (65 bytes) points.
pub fn parse_public_key(field: &'static str, bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.len() != 33 && bytes.len() != 65 {
        return Err(CryptoError::invalid_input(
            field,
            format!("expected 33 or 65 bytes, got {}", bytes.len()),
        ));
    }

    let encoded = EncodedPoint::from_bytes(bytes)
        .map_err(|e| CryptoError::invalid_input(field, format!("not a SEC1 point: {}", e)))?;

    let parsed = PublicKey::from_encoded_point(&encoded);
    if parsed.is_some().into() {
        Ok(parsed.unwrap())
    } else {
        Err(CryptoError::invalid_input(field, "not a point on secp256k1"))
    }
}

/// Parse a 32-byte secp256k1 private scalar.
pub fn parse_secret_key(field: &'static str, bytes: &[u8]) -> Result<SecretKey, CryptoError> {
    if bytes.len() != 32 {
        return Err(CryptoError::invalid_input(
            field,
            format!("expected 32 bytes, got {}", bytes.len()),
        ));
    }

    SecretKey::from_slice(bytes)
        .map_err(|e| CryptoError::invalid_input(field, format!("not a valid scalar: {}", e)))
}

/// Compute the ECDH shared secret d·P and return its x-coordinate.
pub fn shared_secret(secret: &SecretKey, peer: &PublicKey) -> [u8; 32] {
    let shared = diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());

    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes());
    out
}

/// Derive a 32-byte symmetric key: HKDF-SHA256 extract(salt, ikm) then
/// expand(prk, info, 32).
///
/// An empty `info` is a zero-length byte string, not absent; both sides
/// must agree on this for the derived keys to match.
pub fn derive_key(salt: &[u8; 16], ikm: &[u8; 32], info: &[u8]) -> Result<[u8; 32], CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut key = [0u8; 32];
    hkdf.expand(info, &mut key)
        .map_err(|e| CryptoError::CryptoUnavailable {
            operation: "hkdf_expand",
            reason: e.to_string(),
        })?;
    Ok(key)
}
