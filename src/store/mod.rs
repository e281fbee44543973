// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encrypted Persistence
//!
//! Object-store seam, the encrypt-at-rest conversation store, and the
//! deterministic storage seed derivation.

pub mod conversations;
pub mod object_store;
pub mod seed;

pub use conversations::{
    Conversation, ConversationMessage, ConversationStore, PutOptions, RetryPolicy,
};
pub use object_store::{
    EntryType, MemoryObjectStore, ObjectStore, StoreEntry, StoreError, StoreMetadata,
};
pub use seed::{derive_seed, derive_seed_entropy, seed_phrase, SeedCache};
