// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic Storage Seed Derivation
//!
//! Persisting user data must not require a wallet signature per session,
//! so the storage seed is derived deterministically from the owner's
//! address and chain id via HKDF-SHA256 over a fixed label. The entropy
//! is address- and chain-scoped, then rendered as a 15-token phrase for
//! the object store login.
//!
//! The only process-wide state in the crate lives here: a cache mapping
//! lower-cased owner address to its derived phrase. It initializes
//! lazily, evicts on explicit request, and never hands one owner's seed
//! to another.

use hkdf::Hkdf;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use zeroize::Zeroizing;

/// Domain-separation label for storage seed derivation.
const SEED_LABEL: &[u8] = b"fabstir-llm-client/storage-seed/v1";

/// Number of tokens in a storage seed phrase.
const PHRASE_TOKENS: usize = 15;

/// Derive the stable 32-byte storage entropy for an owner on a chain.
///
/// Address comparison is case-insensitive; the checksummed and lowercase
/// forms of an address derive the same entropy.
pub fn derive_seed_entropy(owner_address: &str, chain_id: u64) -> [u8; 32] {
    let address = owner_address.trim().to_lowercase();

    let hkdf = Hkdf::<Sha256>::new(Some(SEED_LABEL), address.as_bytes());
    let mut entropy = [0u8; 32];
    hkdf.expand(&chain_id.to_be_bytes(), &mut entropy)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    entropy
}

/// Render seed entropy as a deterministic 15-token phrase.
pub fn seed_phrase(entropy: &[u8; 32]) -> String {
    let hkdf = Hkdf::<Sha256>::new(None, entropy);
    let mut expanded = Zeroizing::new([0u8; PHRASE_TOKENS * 2]);
    hkdf.expand(b"seed-phrase", &mut expanded[..])
        .expect("30 bytes is a valid HKDF-SHA256 output length");

    let tokens: Vec<String> = expanded
        .chunks(2)
        .map(|pair| format!("{:02x}{:02x}", pair[0], pair[1]))
        .collect();
    tokens.join(" ")
}

/// Derive the storage seed phrase for an owner on a chain.
pub fn derive_seed(owner_address: &str, chain_id: u64) -> String {
    let entropy = Zeroizing::new(derive_seed_entropy(owner_address, chain_id));
    seed_phrase(&entropy)
}

/// Process-wide seed phrase cache, keyed by lower-cased owner address.
pub struct SeedCache {
    entries: Mutex<HashMap<String, Zeroizing<String>>>,
}

impl SeedCache {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The lazily-initialized process-wide cache.
    pub fn global() -> &'static SeedCache {
        static CACHE: OnceLock<SeedCache> = OnceLock::new();
        CACHE.get_or_init(SeedCache::new)
    }

    /// Fetch the cached phrase for an owner, deriving it on first use.
    pub fn get_or_derive(&self, owner_address: &str, chain_id: u64) -> String {
        let key = owner_address.trim().to_lowercase();
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(key)
            .or_insert_with(|| Zeroizing::new(derive_seed(owner_address, chain_id)))
            .to_string()
    }

    /// Drop an owner's cached phrase.
    pub fn evict(&self, owner_address: &str) {
        let key = owner_address.trim().to_lowercase();
        self.entries.lock().unwrap().remove(&key);
    }

    /// Number of cached owners; for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
