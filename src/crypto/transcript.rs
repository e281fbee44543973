// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Signed Handshake Transcript
//!
//! The transcript binds every public parameter of a sealed envelope into
//! the ECDSA signature: ephemeral key, recipient key, salt, nonce, HKDF
//! info, and AAD, concatenated in that exact order with no length
//! prefixes. The keccak256 digest of the concatenation is the message
//! signed and recovered against. The ordering is part of the wire
//! contract; both ends must rebuild it byte-for-byte.

use tiny_keccak::{Hasher, Keccak};

/// Upper bound on the variable-length `info` and `aad` transcript fields.
pub const MAX_CONTEXT_LEN: usize = 4096;

/// keccak256 helper used for transcripts and address derivation.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut out = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut out);
    out
}

/// Concatenate the six transcript fields.
///
/// The fixed-length fields need no delimiters; `info` and `aad` are
/// length-bounded by the sealer (see [`MAX_CONTEXT_LEN`]) so the
/// concatenation stays unambiguous in practice. Empty `info`/`aad`
/// contribute zero bytes.
pub fn transcript(
    eph_pub: &[u8; 33],
    recipient_pub: &[u8; 33],
    salt: &[u8; 16],
    nonce: &[u8; 24],
    info: &[u8],
    aad: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(33 + 33 + 16 + 24 + info.len() + aad.len());
    out.extend_from_slice(eph_pub);
    out.extend_from_slice(recipient_pub);
    out.extend_from_slice(salt);
    out.extend_from_slice(nonce);
    out.extend_from_slice(info);
    out.extend_from_slice(aad);
    out
}

/// keccak256 digest of the transcript; the ECDSA message.
pub fn transcript_digest(
    eph_pub: &[u8; 33],
    recipient_pub: &[u8; 33],
    salt: &[u8; 16],
    nonce: &[u8; 24],
    info: &[u8],
    aad: &[u8],
) -> [u8; 32] {
    keccak256(&transcript(eph_pub, recipient_pub, salt, nonce, info, aad))
}
