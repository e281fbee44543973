// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::crypto::CryptoError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    SerializationError(String),
    #[error("operation timed out")]
    Timeout,
    #[error("record id mismatch: expected '{expected}', got '{actual}'")]
    InvalidRecord { expected: String, actual: String },
    #[error("write of '{record_id}' could not be confirmed by re-read")]
    NetworkVerificationFailed { record_id: String },
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl StoreError {
    /// Transient failures are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::NetworkError(_) | StoreError::Timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryType {
    File,
    Directory,
}

/// One child of a listed path.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub name: String,
    pub entry_type: EntryType,
}

/// Metadata handle from a probe that does not read or decrypt content.
#[derive(Debug, Clone)]
pub struct StoreMetadata {
    pub size: u64,
}

/// Minimal capability set the encrypted store consumes from an object
/// store backend. The backend carries opaque bytes only.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), StoreError>;
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn list(&self, path: &str) -> Result<Vec<StoreEntry>, StoreError>;
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
    async fn metadata(&self, path: &str) -> Result<Option<StoreMetadata>, StoreError>;
}

/// In-memory backend for tests and local development.
///
/// Errors queued with [`MemoryObjectStore::inject_error`] are returned by
/// subsequent operations, one per call, before any real work happens;
/// this drives the retry/backoff paths in tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    injected_errors: Arc<Mutex<VecDeque<StoreError>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn inject_error(&self, error: StoreError) {
        self.injected_errors.lock().await.push_back(error);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn validate_path(path: &str) -> Result<(), StoreError> {
        if path.is_empty() {
            return Err(StoreError::InvalidPath("empty path".to_string()));
        }
        if path.starts_with('/') {
            return Err(StoreError::InvalidPath(
                "path cannot start with /".to_string(),
            ));
        }
        if path.contains("../") {
            return Err(StoreError::InvalidPath(
                "path traversal not allowed".to_string(),
            ));
        }
        Ok(())
    }

    async fn take_injected_error(&self) -> Result<(), StoreError> {
        if let Some(error) = self.injected_errors.lock().await.pop_front() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), StoreError> {
        self.take_injected_error().await?;
        Self::validate_path(path)?;

        self.entries.lock().await.insert(path.to_string(), data);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.take_injected_error().await?;
        Self::validate_path(path)?;

        Ok(self.entries.lock().await.get(path).cloned())
    }

    async fn list(&self, path: &str) -> Result<Vec<StoreEntry>, StoreError> {
        self.take_injected_error().await?;
        Self::validate_path(path)?;

        let prefix = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };

        let entries = self.entries.lock().await;
        let mut out = Vec::new();
        let mut directories = std::collections::HashSet::new();

        for stored_path in entries.keys() {
            if let Some(relative) = stored_path.strip_prefix(&prefix) {
                if let Some(slash) = relative.find('/') {
                    let dir_name = &relative[..slash];
                    if directories.insert(dir_name.to_string()) {
                        out.push(StoreEntry {
                            name: dir_name.to_string(),
                            entry_type: EntryType::Directory,
                        });
                    }
                } else {
                    out.push(StoreEntry {
                        name: relative.to_string(),
                        entry_type: EntryType::File,
                    });
                }
            }
        }

        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.take_injected_error().await?;
        Self::validate_path(path)?;

        self.entries
            .lock()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn metadata(&self, path: &str) -> Result<Option<StoreMetadata>, StoreError> {
        self.take_injected_error().await?;
        Self::validate_path(path)?;

        Ok(self
            .entries
            .lock()
            .await
            .get(path)
            .map(|data| StoreMetadata {
                size: data.len() as u64,
            }))
    }
}
