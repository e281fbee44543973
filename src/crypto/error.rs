// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Error taxonomy for all cryptographic operations. Every failure surfaces
//! to the caller without mutating engine state, so callers can retry or
//! tear down a session based on the variant alone:
//!
//! - **InvalidInput**: malformed hex, wrong length, missing required field
//! - **InvalidSignatureLength**: signature is not 64-byte r||s (or 65 with recid)
//! - **CryptoUnavailable**: an underlying primitive failed or is misconfigured
//! - **RecoveryFailed**: ECDSA recovery produced no candidate public key
//! - **VerificationFailed**: the recovered key does not verify the signature
//! - **DecryptionFailed**: AEAD tag mismatch, tampered AAD, or wrong key

use thiserror::Error;

/// Error type for all cryptographic operations
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// Malformed or wrong-sized input before any crypto ran
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Which field or parameter failed validation
        field: &'static str,
        /// Specific failure reason
        reason: String,
    },

    /// Signature blob is not 64 bytes r||s (65 with a trailing recovery id)
    #[error("invalid signature length: expected 64 bytes r||s, got {actual}")]
    InvalidSignatureLength { actual: usize },

    /// An underlying primitive failed (key parse, HKDF expand, signing)
    #[error("crypto backend unavailable during {operation}: {reason}")]
    CryptoUnavailable {
        operation: &'static str,
        reason: String,
    },

    /// ECDSA public key recovery produced no candidate key
    #[error("public key recovery failed: {0}")]
    RecoveryFailed(String),

    /// Recovered key does not verify the signature over the transcript
    #[error("signature verification failed for recovered key")]
    VerificationFailed,

    /// AEAD decryption failed: tag mismatch, tampered AAD, or wrong key
    #[error("decryption failed during {operation}")]
    DecryptionFailed {
        /// Which operation was being performed (e.g. "handshake", "stream_message")
        operation: &'static str,
    },
}

impl CryptoError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        CryptoError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// True when a fresh session is required; retrying the same material
    /// cannot succeed.
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(
            self,
            CryptoError::DecryptionFailed { .. } | CryptoError::VerificationFailed
        )
    }
}
