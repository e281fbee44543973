// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Error Types
//!
//! Errors surfaced by the session protocol. Cryptographic failures and
//! counterpart-signalled fatal errors move the session to a terminal
//! state; `EncryptionNotSupported` is recoverable by falling back to a
//! plaintext session; timeouts during streaming leave an Active session
//! alive.

use std::time::Duration;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::session::messages::ErrorCode;
use crate::session::state::SessionPhase;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Counterpart cannot operate in encrypted mode; the caller may fall
    /// back to a plaintext session (the protocol does this itself).
    #[error("counterpart does not support encryption")]
    EncryptionNotSupported,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport closed")]
    TransportClosed,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Counterpart error envelope that maps to no dedicated variant
    #[error("counterpart error {code:?}: {message}")]
    Host { code: ErrorCode, message: String },

    /// Message ordering or framing violated the wire contract
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Inbound message failed schema validation
    #[error("schema error: {0}")]
    Schema(String),

    /// Operation not valid in the session's current phase
    #[error("session is {actual:?}, operation requires {required:?}")]
    InvalidPhase {
        required: SessionPhase,
        actual: SessionPhase,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => SessionError::TransportClosed,
            other => SessionError::Protocol(other.to_string()),
        }
    }
}
