// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encryption Engine
//!
//! The sealing and opening core shared by the session protocol and the
//! encrypted store. Three modes compose over one identity:
//!
//! 1. **Handshake**: ephemeral-static ECDH + HKDF-SHA256 + XChaCha20-
//!    Poly1305, with an ECDSA-recoverable signature over the keccak256
//!    transcript so the recipient learns the sender's wallet address.
//! 2. **Symmetric streaming**: AEAD under the 32-byte session key chosen
//!    by the client, with the message index and a timestamp bound into
//!    the AAD.
//! 3. **Records**: the handshake mode plus a random conversation id and
//!    a storage timestamp, for encrypt-at-rest persistence.
//!
//! The engine owns the identity key through its wallet and is shareable
//! read-only across sessions; no operation mutates engine state.

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wallet::{LocalWallet, Signer};

use super::aead;
use super::bigint::{bigint_str, U256};
use super::ecdh::{derive_key, parse_public_key, shared_secret};
use super::envelope::{SealedEnvelope, ENVELOPE_ALG};
use super::error::CryptoError;
use super::hex::{bytes_to_hex, hex_to_array, hex_to_bytes};
use super::recovery::recover_sender_address;
use super::transcript::{transcript_digest, MAX_CONTEXT_LEN};

/// Session parameters sealed to the host during session init.
///
/// Field names are case-sensitive on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakePayload {
    /// On-chain job id; wire form is a decimal string with `n` sentinel
    #[serde(rename = "jobId", with = "bigint_str")]
    pub job_id: U256,

    #[serde(rename = "modelName")]
    pub model_name: String,

    /// Client-chosen 32-byte session key, lowercase hex, no 0x
    #[serde(rename = "sessionKey")]
    pub session_key: String,

    #[serde(rename = "pricePerToken")]
    pub price_per_token: u64,

    /// Key under which the host seals recovery artefacts back to us
    #[serde(rename = "recoveryPublicKey", skip_serializing_if = "Option::is_none")]
    pub recovery_public_key: Option<String>,
}

/// Result of opening a handshake envelope.
#[derive(Debug, Clone)]
pub struct OpenedHandshake {
    pub payload: HandshakePayload,
    /// EIP-55 address recovered from the envelope signature
    pub sender_address: String,
}

/// AEAD-sealed streaming message under a session key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetricMessage {
    #[serde(rename = "ciphertextHex")]
    pub ciphertext_hex: String,

    #[serde(rename = "nonceHex")]
    pub nonce_hex: String,

    /// Hex encoding of the UTF-8 JSON AAD (`message_index`, `timestamp`)
    #[serde(rename = "aadHex")]
    pub aad_hex: String,
}

/// The AAD bound into every symmetric message.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricAad {
    message_index: u64,
    timestamp: u64,
}

/// Result of opening a symmetric message.
#[derive(Debug, Clone)]
pub struct OpenedSymmetric {
    pub plaintext: Vec<u8>,
    /// Index the sender bound into the AAD
    pub message_index: u64,
    /// Sender's wall-clock milliseconds at seal time
    pub timestamp: u64,
}

/// Encrypt-at-rest record envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub payload: SealedEnvelope,

    #[serde(rename = "storedAt")]
    pub stored_at: DateTime<Utc>,

    /// 16-byte random hex id, distinct from the record's storage key
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
}

/// Result of opening an encrypted record.
#[derive(Debug, Clone)]
pub struct OpenedRecord<T> {
    pub value: T,
    pub sender_address: String,
    pub stored_at: DateTime<Utc>,
    pub conversation_id: String,
}

/// Optional context for handshake/record sealing.
#[derive(Debug, Clone, Default)]
pub struct SealOptions {
    /// HKDF context label; empty means a zero-length byte array
    pub info: Vec<u8>,
    /// Additional authenticated data bound into tag and transcript
    pub aad: Vec<u8>,
}

/// Sealing/opening engine bound to one wallet identity.
pub struct EncryptionEngine {
    wallet: LocalWallet,
    public_key: [u8; 33],
}

impl EncryptionEngine {
    pub fn new(wallet: LocalWallet) -> Self {
        let public_key = wallet.public_key();
        Self { wallet, public_key }
    }

    /// Throwaway engine over a random identity, for tests and demos.
    pub fn random() -> Self {
        Self::new(LocalWallet::random())
    }

    /// The identity's stable 33-byte compressed public key.
    pub fn public_key(&self) -> [u8; 33] {
        self.public_key
    }

    /// Key under which counterparties seal recovery artefacts addressed
    /// to this identity. Aliases the static identity key.
    pub fn recovery_public_key(&self) -> [u8; 33] {
        self.public_key
    }

    /// EIP-55 checksummed address of the identity.
    pub fn address(&self) -> &str {
        self.wallet.address()
    }

    /// Seal a handshake payload to the recipient's static public key.
    pub fn seal_handshake(
        &self,
        recipient_pub: &[u8],
        payload: &HandshakePayload,
        opts: &SealOptions,
    ) -> Result<SealedEnvelope, CryptoError> {
        let plaintext = serde_json::to_vec(payload).map_err(|e| CryptoError::CryptoUnavailable {
            operation: "serialize_handshake",
            reason: e.to_string(),
        })?;
        self.seal_envelope(recipient_pub, &plaintext, opts)
    }

    /// Open a handshake envelope sealed to this identity.
    ///
    /// Returns the payload and the EIP-55 address recovered from the
    /// envelope signature.
    pub fn open_handshake(&self, envelope: &SealedEnvelope) -> Result<OpenedHandshake, CryptoError> {
        let (plaintext, sender_address) = self.open_envelope(envelope, "handshake")?;

        let payload: HandshakePayload =
            serde_json::from_slice(&plaintext).map_err(|e| CryptoError::InvalidInput {
                field: "payload",
                reason: format!("handshake JSON: {}", e),
            })?;

        Ok(OpenedHandshake {
            payload,
            sender_address,
        })
    }

    /// Seal a streaming message under a session key.
    ///
    /// The AAD is UTF-8 JSON carrying `message_index` and the current
    /// wall clock in milliseconds; tampering with either fails the tag.
    pub fn seal_symmetric(
        &self,
        session_key: &[u8; 32],
        plaintext: &[u8],
        message_index: u64,
    ) -> Result<SymmetricMessage, CryptoError> {
        let mut nonce = [0u8; aead::NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let aad = serde_json::to_vec(&SymmetricAad {
            message_index,
            timestamp: Utc::now().timestamp_millis() as u64,
        })
        .map_err(|e| CryptoError::CryptoUnavailable {
            operation: "serialize_aad",
            reason: e.to_string(),
        })?;

        let ciphertext = aead::encrypt(session_key, &nonce, &aad, plaintext)?;

        Ok(SymmetricMessage {
            ciphertext_hex: bytes_to_hex(&ciphertext),
            nonce_hex: bytes_to_hex(&nonce),
            aad_hex: bytes_to_hex(&aad),
        })
    }

    /// Open a streaming message under a session key.
    ///
    /// Tag failure, tampered AAD, and malformed fields all surface as
    /// `DecryptionFailed`; a streaming peer gets no oracle about which.
    pub fn open_symmetric(
        &self,
        session_key: &[u8; 32],
        message: &SymmetricMessage,
    ) -> Result<OpenedSymmetric, CryptoError> {
        const OP: &str = "stream_message";
        let failed = || CryptoError::DecryptionFailed { operation: OP };

        let nonce =
            hex_to_array::<{ aead::NONCE_LEN }>("nonceHex", &message.nonce_hex).map_err(|_| failed())?;
        let ciphertext = hex_to_bytes("ciphertextHex", &message.ciphertext_hex).map_err(|_| failed())?;
        let aad = hex_to_bytes("aadHex", &message.aad_hex).map_err(|_| failed())?;

        let plaintext =
            aead::decrypt(session_key, &nonce, &aad, &ciphertext, OP).map_err(|_| failed())?;

        let parsed: SymmetricAad = serde_json::from_slice(&aad).map_err(|_| failed())?;

        Ok(OpenedSymmetric {
            plaintext,
            message_index: parsed.message_index,
            timestamp: parsed.timestamp,
        })
    }

    /// Seal a value as an encrypted record for persistence.
    pub fn seal_record<T: Serialize>(
        &self,
        recipient_pub: &[u8],
        value: &T,
    ) -> Result<EncryptedRecord, CryptoError> {
        let plaintext = serde_json::to_vec(value).map_err(|e| CryptoError::CryptoUnavailable {
            operation: "serialize_record",
            reason: e.to_string(),
        })?;

        let payload = self.seal_envelope(recipient_pub, &plaintext, &SealOptions::default())?;

        Ok(EncryptedRecord {
            payload,
            stored_at: Utc::now(),
            // 16 random bytes as lowercase hex
            conversation_id: Uuid::new_v4().simple().to_string(),
        })
    }

    /// Open an encrypted record sealed to this identity.
    pub fn open_record<T: DeserializeOwned>(
        &self,
        record: &EncryptedRecord,
    ) -> Result<OpenedRecord<T>, CryptoError> {
        let (plaintext, sender_address) = self.open_envelope(&record.payload, "record")?;

        let value: T = serde_json::from_slice(&plaintext).map_err(|e| CryptoError::InvalidInput {
            field: "payload",
            reason: format!("record JSON: {}", e),
        })?;

        Ok(OpenedRecord {
            value,
            sender_address,
            stored_at: record.stored_at,
            conversation_id: record.conversation_id.clone(),
        })
    }

    /// Seal plaintext to a recipient: ECDH + HKDF + AEAD + transcript
    /// signature, assembled into the wire envelope.
    fn seal_envelope(
        &self,
        recipient_pub: &[u8],
        plaintext: &[u8],
        opts: &SealOptions,
    ) -> Result<SealedEnvelope, CryptoError> {
        if opts.info.len() > MAX_CONTEXT_LEN {
            return Err(CryptoError::invalid_input("info", "context label too long"));
        }
        if opts.aad.len() > MAX_CONTEXT_LEN {
            return Err(CryptoError::invalid_input("aadHex", "aad too long"));
        }

        let recipient = parse_public_key("recipientPub", recipient_pub)?;
        let recipient_compressed = compress(&recipient);

        // Fresh ephemeral keypair per envelope; the private half never
        // outlives this call.
        let ephemeral = k256::SecretKey::random(&mut OsRng);
        let eph_pub = compress(&ephemeral.public_key());

        let ss = shared_secret(&ephemeral, &recipient);

        let mut salt = [0u8; 16];
        let mut nonce = [0u8; aead::NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = derive_key(&salt, &ss, &opts.info)?;

        let digest = transcript_digest(
            &eph_pub,
            &recipient_compressed,
            &salt,
            &nonce,
            &opts.info,
            &opts.aad,
        );
        let (signature, recid) = self.wallet.sign_digest(&digest)?;

        let ciphertext = aead::encrypt(&key, &nonce, &opts.aad, plaintext)?;

        Ok(SealedEnvelope {
            eph_pub_hex: bytes_to_hex(&eph_pub),
            salt_hex: bytes_to_hex(&salt),
            nonce_hex: bytes_to_hex(&nonce),
            ciphertext_hex: bytes_to_hex(&ciphertext),
            signature_hex: bytes_to_hex(&signature),
            recid,
            alg: ENVELOPE_ALG.to_string(),
            info: bytes_to_hex(&opts.info),
            aad_hex: bytes_to_hex(&opts.aad),
        })
    }

    /// Open an envelope sealed to this identity; returns plaintext and
    /// the recovered sender address.
    fn open_envelope(
        &self,
        envelope: &SealedEnvelope,
        operation: &'static str,
    ) -> Result<(Vec<u8>, String), CryptoError> {
        let bytes = envelope.decode()?;

        let eph_pub = parse_public_key("ephPubHex", &bytes.eph_pub)?;
        let ss = shared_secret(self.wallet.secret_key(), &eph_pub);
        let key = derive_key(&bytes.salt, &ss, &bytes.info)?;

        let plaintext = aead::decrypt(&key, &bytes.nonce, &bytes.aad, &bytes.ciphertext, operation)?;

        let sender_address = recover_sender_address(envelope, &self.public_key)?;

        Ok((plaintext, sender_address))
    }
}

impl std::fmt::Debug for EncryptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionEngine")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

fn compress(public_key: &k256::PublicKey) -> [u8; 33] {
    use k256::elliptic_curve::sec1::ToEncodedPoint;

    let encoded = public_key.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(encoded.as_bytes());
    out
}
