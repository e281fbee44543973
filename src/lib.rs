// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client SDK for end-to-end encrypted LLM inference sessions.
//!
//! The crate wires three cryptographic modes into one protocol:
//!
//! - an authenticated **session-init** handshake binding a secp256k1
//!   wallet identity to session parameters via ECDSA-recoverable
//!   signatures ([`crypto::EncryptionEngine::seal_handshake`]),
//! - high-throughput **symmetric streaming** of prompts and response
//!   chunks under a per-session key ([`session::SessionProtocol`]),
//! - **encrypt-at-rest persistence** of conversation histories with the
//!   same handshake primitive ([`store::ConversationStore`]).

pub mod crypto;
pub mod session;
pub mod store;
pub mod wallet;

pub use crypto::{
    CryptoError, EncryptedRecord, EncryptionEngine, HandshakePayload, SealedEnvelope,
    SymmetricMessage,
};
pub use session::{
    ProtocolConfig, SessionConfig, SessionError, SessionPhase, SessionProtocol, Transport,
    WireMessage,
};
pub use store::{Conversation, ConversationStore, ObjectStore, StoreError};
pub use wallet::{LocalWallet, Signer};
