// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sealed Envelope Wire Format
//!
//! The authenticated ciphertext produced by the handshake and record
//! sealing modes. Field names are part of the wire contract and are
//! case-sensitive; `signatureHex` in particular must appear under exactly
//! that name (older `sigHex` payloads are rejected by schema validation).

use serde::{Deserialize, Serialize};

use super::error::CryptoError;
use super::hex::{hex_to_array, hex_to_bytes};

/// Algorithm identifier carried in every sealed envelope.
pub const ENVELOPE_ALG: &str = "ecdh-secp256k1/hkdf-sha256/xchacha20-poly1305";

/// Authenticated ciphertext envelope for handshake and record payloads.
///
/// All hex fields are lowercase and unprefixed. `info` and `aadHex` may
/// be empty strings, equivalent to zero-length byte arrays in the
/// transcript, HKDF, and AEAD inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SealedEnvelope {
    /// 33-byte ephemeral compressed public key
    #[serde(rename = "ephPubHex")]
    pub eph_pub_hex: String,

    /// 16-byte HKDF salt
    #[serde(rename = "saltHex")]
    pub salt_hex: String,

    /// 24-byte AEAD nonce
    #[serde(rename = "nonceHex")]
    pub nonce_hex: String,

    /// AEAD output: ciphertext followed by the 16-byte tag
    #[serde(rename = "ciphertextHex")]
    pub ciphertext_hex: String,

    /// 64-byte compact ECDSA r||s signature over the transcript digest
    #[serde(rename = "signatureHex")]
    pub signature_hex: String,

    /// ECDSA recovery id, 0..=3
    pub recid: u8,

    /// Algorithm identifier, constant for this protocol
    pub alg: String,

    /// HKDF context label, hex, may be empty
    pub info: String,

    /// Additional authenticated data, hex, may be empty
    #[serde(rename = "aadHex")]
    pub aad_hex: String,
}

/// Length-validated binary view of a [`SealedEnvelope`].
#[derive(Debug, Clone)]
pub struct EnvelopeBytes {
    pub eph_pub: [u8; 33],
    pub salt: [u8; 16],
    pub nonce: [u8; 24],
    pub ciphertext: Vec<u8>,
    pub signature: [u8; 64],
    pub recid: u8,
    pub info: Vec<u8>,
    pub aad: Vec<u8>,
}

impl SealedEnvelope {
    /// Decode every hex field, validating the stated lengths.
    pub fn decode(&self) -> Result<EnvelopeBytes, CryptoError> {
        let eph_pub = hex_to_array::<33>("ephPubHex", &self.eph_pub_hex)?;
        let salt = hex_to_array::<16>("saltHex", &self.salt_hex)?;
        let nonce = hex_to_array::<24>("nonceHex", &self.nonce_hex)?;

        let ciphertext = hex_to_bytes("ciphertextHex", &self.ciphertext_hex)?;
        if ciphertext.len() < super::aead::TAG_LEN {
            return Err(CryptoError::invalid_input(
                "ciphertextHex",
                "shorter than the AEAD tag",
            ));
        }

        let signature_bytes = hex_to_bytes("signatureHex", &self.signature_hex)?;
        if signature_bytes.len() != 64 {
            return Err(CryptoError::InvalidSignatureLength {
                actual: signature_bytes.len(),
            });
        }
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&signature_bytes);

        if self.recid > 3 {
            return Err(CryptoError::invalid_input(
                "recid",
                format!("expected 0..=3, got {}", self.recid),
            ));
        }

        Ok(EnvelopeBytes {
            eph_pub,
            salt,
            nonce,
            ciphertext,
            signature,
            recid: self.recid,
            info: hex_to_bytes("info", &self.info)?,
            aad: hex_to_bytes("aadHex", &self.aad_hex)?,
        })
    }
}
