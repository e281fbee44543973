// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wallet Signer
//!
//! The signing seam the encryption engine builds on: a small capability
//! set of `{address, sign_digest}`. The only implementation shipped here
//! is [`LocalWallet`], which holds the raw secp256k1 private key in
//! process memory; external signers (hardware, browser wallets) plug in
//! behind the same trait.
//!
//! ## Security Considerations
//!
//! - The private key is read from `WALLET_PRIVATE_KEY` and NEVER logged
//! - The key is owned by the wallet and not returned by reference outside
//!   the crate
//! - k256 key types zeroize themselves on drop

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use std::env;
use tracing::info;

use crate::crypto::address::public_key_to_address;
use crate::crypto::error::CryptoError;

/// Capability set required of a signing identity.
pub trait Signer: Send + Sync {
    /// EIP-55 checksummed address of this identity.
    fn address(&self) -> &str;

    /// Sign a 32-byte digest, returning compact r||s and the recovery id.
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<([u8; 64], u8), CryptoError>;
}

/// In-process wallet over a raw secp256k1 private key.
pub struct LocalWallet {
    secret_key: SecretKey,
    signing_key: SigningKey,
    public_key: [u8; 33],
    address: String,
}

impl LocalWallet {
    /// Build a wallet from a raw 32-byte private key.
    pub fn from_bytes(private_key: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret_key = SecretKey::from_slice(private_key).map_err(|e| {
            CryptoError::invalid_input("private_key", format!("not a valid scalar: {}", e))
        })?;
        let signing_key = SigningKey::from(&secret_key);

        let public = secret_key.public_key();
        let encoded = public.to_encoded_point(true);
        let mut public_key = [0u8; 33];
        public_key.copy_from_slice(encoded.as_bytes());

        let address = public_key_to_address(&public);

        Ok(Self {
            secret_key,
            signing_key,
            public_key,
            address,
        })
    }

    /// Build a wallet from a hex private key, with or without `0x` prefix.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes = crate::crypto::hex::hex_to_array::<32>("private_key", private_key_hex.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Load the wallet key from the `WALLET_PRIVATE_KEY` environment
    /// variable (0x-prefixed hex, 32 bytes).
    pub fn from_env() -> Result<Self, CryptoError> {
        let key_str = env::var("WALLET_PRIVATE_KEY").map_err(|_| {
            CryptoError::invalid_input("private_key", "WALLET_PRIVATE_KEY not set")
        })?;

        let key_str = key_str.trim();
        if !key_str.starts_with("0x") {
            return Err(CryptoError::invalid_input(
                "private_key",
                "WALLET_PRIVATE_KEY must start with '0x' (Ethereum format)",
            ));
        }

        let wallet = Self::from_hex(key_str)?;
        // Log success WITHOUT logging the key itself
        info!("✅ Wallet private key loaded (address: {})", wallet.address);
        Ok(wallet)
    }

    /// Generate a throwaway identity from the OS RNG.
    pub fn random() -> Self {
        let secret_key = SecretKey::random(&mut rand::rngs::OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&secret_key.to_bytes());
        Self::from_bytes(&bytes).expect("random scalar is always valid")
    }

    /// The identity's 33-byte compressed public key.
    pub fn public_key(&self) -> [u8; 33] {
        self.public_key
    }

    /// The identity's public key as a curve point.
    pub fn public_key_point(&self) -> PublicKey {
        self.secret_key.public_key()
    }

    /// Raw key access for ECDH inside the engine; not exported.
    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }
}

impl Signer for LocalWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> Result<([u8; 64], u8), CryptoError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| CryptoError::CryptoUnavailable {
                operation: "sign_digest",
                reason: e.to_string(),
            })?;

        let mut compact = [0u8; 64];
        compact.copy_from_slice(&signature.to_bytes());
        Ok((compact, recovery_id.to_byte()))
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material through Debug
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
