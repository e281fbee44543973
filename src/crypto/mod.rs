// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-End Encryption Module
//!
//! Cryptographic core for encrypted inference sessions:
//!
//! - **ECDH**: Ephemeral-static key exchange on secp256k1
//! - **HKDF**: SHA-256 extract-then-expand key derivation
//! - **AEAD**: XChaCha20-Poly1305 message encryption
//! - **Transcript**: keccak256-digested handshake transcript for ECDSA
//! - **Recovery**: signer address recovery with EIP-55 checksumming
//! - **Engine**: the three sealing modes (handshake, symmetric, record)
//!
//! ## Security Considerations
//!
//! - Session keys live in memory only and are zeroized at session end
//! - Nonces are drawn fresh from the OS RNG per encryption
//! - Signatures are re-verified after recovery before trusting an address
//! - AAD binds the message index, so replay and reorder are detected

pub mod address;
pub mod aead;
pub mod bigint;
pub mod ecdh;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod hex;
pub mod recovery;
pub mod transcript;

pub use bigint::U256;
pub use engine::{
    EncryptedRecord, EncryptionEngine, HandshakePayload, OpenedHandshake, OpenedRecord,
    OpenedSymmetric, SealOptions, SymmetricMessage,
};
pub use envelope::{SealedEnvelope, ENVELOPE_ALG};
pub use error::CryptoError;
pub use recovery::recover_sender_address;
