// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDSA Sender Recovery
//!
//! Recovers the Ethereum address of whoever sealed an envelope. The
//! transcript is rebuilt exactly as the sealer built it (same field
//! order, empty `info`/`aad` as zero-length byte arrays), the public key
//! is recovered from the compact signature and recovery id, and the
//! signature is then re-verified against the recovered key before the
//! address is derived. The re-verification step rejects forged
//! (signature, recid) pairs that recover to *some* key without being a
//! valid signature by it.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::PublicKey;

use super::address::public_key_to_address;
use super::envelope::SealedEnvelope;
use super::error::CryptoError;
use super::transcript::transcript_digest;

/// Recover and verify the signer's public key for a sealed envelope.
pub fn recover_sender_key(
    envelope: &SealedEnvelope,
    recipient_pub: &[u8; 33],
) -> Result<PublicKey, CryptoError> {
    let bytes = envelope.decode()?;

    let digest = transcript_digest(
        &bytes.eph_pub,
        recipient_pub,
        &bytes.salt,
        &bytes.nonce,
        &bytes.info,
        &bytes.aad,
    );

    let signature = Signature::from_slice(&bytes.signature)
        .map_err(|e| CryptoError::RecoveryFailed(format!("malformed r||s: {}", e)))?;

    let recovery_id = RecoveryId::from_byte(bytes.recid)
        .ok_or_else(|| CryptoError::RecoveryFailed(format!("recid {} out of range", bytes.recid)))?;

    let recovered = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;

    // Defense in depth: a recovered key must independently verify.
    recovered
        .verify_prehash(&digest, &signature)
        .map_err(|_| CryptoError::VerificationFailed)?;

    Ok(PublicKey::from(&recovered))
}

/// Recover the signer's EIP-55 checksummed address for a sealed envelope.
///
/// # Arguments
///
/// * `envelope` - The sealed envelope as received
/// * `recipient_pub` - The recipient's static compressed public key; part
///   of the transcript, so the wrong recipient key fails recovery
pub fn recover_sender_address(
    envelope: &SealedEnvelope,
    recipient_pub: &[u8; 33],
) -> Result<String, CryptoError> {
    let key = recover_sender_key(envelope, recipient_pub)?;
    Ok(public_key_to_address(&key))
}
