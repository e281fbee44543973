// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire Message Types
//!
//! The typed envelopes exchanged between client and host, modeled as a
//! discriminated union over the `type` string. Identifiers (`chain_id`,
//! `session_id`, `job_id`) ride at the top level of session-init
//! messages as stringified integers and are all required; their absence
//! is a schema error, not a default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::{SealedEnvelope, SymmetricMessage};

use super::error::SessionError;

/// Error codes a counterpart may signal. Codes this client does not
/// know deserialize as `Unknown` instead of failing the whole envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    EncryptionNotSupported,
    DecryptionFailed,
    Unauthorized,
    RateLimited,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EncryptionNotSupported => "EncryptionNotSupported",
            ErrorCode::DecryptionFailed => "DecryptionFailed",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::RateLimited => "RateLimited",
            ErrorCode::Unknown => "Unknown",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(match code.as_str() {
            "EncryptionNotSupported" => ErrorCode::EncryptionNotSupported,
            "DecryptionFailed" => ErrorCode::DecryptionFailed,
            "Unauthorized" => ErrorCode::Unauthorized,
            "RateLimited" => ErrorCode::RateLimited,
            _ => ErrorCode::Unknown,
        })
    }
}

/// Body of a counterpart `error` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: ErrorCode,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Every envelope either side puts on the transport.
///
/// The discriminant is the `type` string; new variants must be handled
/// exhaustively wherever this is matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Encrypted session init: handshake envelope plus routing ids
    EncryptedSessionInit {
        chain_id: String,
        session_id: String,
        job_id: String,
        payload: SealedEnvelope,
    },

    /// Plaintext session init, used after an encryption fallback
    SessionInit {
        chain_id: String,
        session_id: String,
        job_id: String,
        model_name: String,
        price_per_token: u64,
    },

    /// Encrypted prompt or control content under the session key
    EncryptedMessage {
        session_id: String,
        #[serde(flatten)]
        body: SymmetricMessage,
    },

    /// Plaintext prompt (fallback mode only)
    Prompt {
        session_id: String,
        content: String,
        message_index: u64,
    },

    /// Handshake acknowledgement carrying the session identifier
    #[serde(alias = "ok")]
    Ack { session_id: String },

    /// Counterpart-signalled failure
    Error {
        #[serde(flatten)]
        error: ErrorMessage,
    },

    /// Plaintext response chunk (fallback mode only)
    StreamChunk { content: String },

    /// Encrypted response chunk under the session key
    EncryptedChunk {
        #[serde(flatten)]
        body: SymmetricMessage,
    },

    /// End of a streamed response
    StreamEnd {
        #[serde(skip_serializing_if = "Option::is_none")]
        total_tokens: Option<u64>,
    },

    /// Cancel an in-flight stream, either direction
    StreamCancel {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Session completion control message
    SessionComplete {
        session_id: String,
        token_count: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        final_proof: Option<String>,
    },
}

impl WireMessage {
    /// The `type` discriminant as it appears on the wire.
    pub fn message_type(&self) -> &'static str {
        match self {
            WireMessage::EncryptedSessionInit { .. } => "encrypted_session_init",
            WireMessage::SessionInit { .. } => "session_init",
            WireMessage::EncryptedMessage { .. } => "encrypted_message",
            WireMessage::Prompt { .. } => "prompt",
            WireMessage::Ack { .. } => "ack",
            WireMessage::Error { .. } => "error",
            WireMessage::StreamChunk { .. } => "stream_chunk",
            WireMessage::EncryptedChunk { .. } => "encrypted_chunk",
            WireMessage::StreamEnd { .. } => "stream_end",
            WireMessage::StreamCancel { .. } => "stream_cancel",
            WireMessage::SessionComplete { .. } => "session_complete",
        }
    }
}

/// Fields a sealed envelope must carry, by wire name.
const ENVELOPE_FIELDS: [&str; 9] = [
    "ephPubHex",
    "saltHex",
    "nonceHex",
    "ciphertextHex",
    "signatureHex",
    "recid",
    "alg",
    "info",
    "aadHex",
];

/// Validate a raw session-init message against the wire schema.
///
/// Checks the `type` discriminant, the three required stringified-integer
/// identifiers, and that the payload carries exactly the sealed-envelope
/// fields under their canonical names. Legacy field names (`sigHex`) are
/// rejected.
pub fn validate_session_init(value: &Value) -> Result<(), SessionError> {
    let object = value
        .as_object()
        .ok_or_else(|| SessionError::Schema("session init is not an object".to_string()))?;

    match object.get("type").and_then(Value::as_str) {
        Some("encrypted_session_init") => {}
        Some(other) => {
            return Err(SessionError::Schema(format!(
                "unexpected type '{}', wanted 'encrypted_session_init'",
                other
            )))
        }
        None => return Err(SessionError::Schema("missing 'type'".to_string())),
    }

    for field in ["chain_id", "session_id", "job_id"] {
        let id = object
            .get(field)
            .ok_or_else(|| SessionError::Schema(format!("missing '{}'", field)))?;
        let id = id
            .as_str()
            .ok_or_else(|| SessionError::Schema(format!("'{}' must be a string", field)))?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SessionError::Schema(format!(
                "'{}' must be a stringified integer, got '{}'",
                field, id
            )));
        }
    }

    let payload = object
        .get("payload")
        .and_then(Value::as_object)
        .ok_or_else(|| SessionError::Schema("missing 'payload' object".to_string()))?;

    for field in ENVELOPE_FIELDS {
        if !payload.contains_key(field) {
            return Err(SessionError::Schema(format!("payload missing '{}'", field)));
        }
    }
    for key in payload.keys() {
        if !ENVELOPE_FIELDS.contains(&key.as_str()) {
            return Err(SessionError::Schema(format!(
                "payload has unexpected field '{}'",
                key
            )));
        }
    }

    Ok(())
}
