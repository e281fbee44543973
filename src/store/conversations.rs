// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encrypted Conversation Store
//!
//! Encrypt-at-rest persistence for conversation histories. Records are
//! sealed with the same authenticated handshake primitive the session
//! protocol uses, so a stored blob is attributable to its signer, and
//! laid out as `root/<owner-address>/<record-id>.json` for tenant
//! isolation.
//!
//! Writes go through bounded retries with exponential backoff; with
//! `wait_for_network` (the default) the store re-reads the record from
//! the backend, decrypts it, and checks the embedded id before reporting
//! durability. A snapshot cache keyed by record id serves reads; the
//! cache is consistent for a single writer per process.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::crypto::{EncryptedRecord, EncryptionEngine, OpenedRecord};

use super::object_store::{EntryType, ObjectStore, StoreError};

/// One message of a stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
}

/// A conversation history as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub messages: Vec<ConversationMessage>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_message(&mut self, role: &str, content: &str) {
        self.messages.push(ConversationMessage {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Some(Utc::now().timestamp_millis() as u64),
            tokens: None,
        });
        self.updated_at = Utc::now();
    }
}

/// Bounded retry with exponential backoff, applied to backend calls and
/// to the post-write verification loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// Options for [`ConversationStore::put`].
#[derive(Debug, Clone)]
pub struct PutOptions {
    /// Re-read and decrypt the record from the backend before reporting
    /// success. On by default for durable records.
    pub wait_for_network: bool,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            wait_for_network: true,
        }
    }
}

/// Encrypt-at-rest store for one owner identity.
pub struct ConversationStore {
    engine: Arc<EncryptionEngine>,
    backend: Arc<dyn ObjectStore>,
    root: String,
    owner: String,
    recipient_pub: [u8; 33],
    cache: RwLock<HashMap<String, Conversation>>,
    retry: RetryPolicy,
}

impl ConversationStore {
    /// Records are sealed to the engine's own recovery public key, so
    /// only this identity can read them back.
    pub fn new(
        engine: Arc<EncryptionEngine>,
        backend: Arc<dyn ObjectStore>,
        root: impl Into<String>,
    ) -> Self {
        let owner = engine.address().to_string();
        let recipient_pub = engine.recovery_public_key();
        Self {
            engine,
            backend,
            root: root.into(),
            owner,
            recipient_pub,
            cache: RwLock::new(HashMap::new()),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The owner address whose path this store writes under.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn owner_dir(&self) -> String {
        format!("{}/{}", self.root, self.owner)
    }

    fn record_path(&self, record_id: &str) -> String {
        format!("{}/{}.json", self.owner_dir(), record_id)
    }

    fn validate_record_id(record_id: &str) -> Result<(), StoreError> {
        if record_id.is_empty() || record_id.contains('/') || record_id.contains("..") {
            return Err(StoreError::InvalidPath(format!(
                "invalid record id '{}'",
                record_id
            )));
        }
        Ok(())
    }

    /// Seal and persist a conversation under `record_id`.
    ///
    /// The local write (and cache entry) survives even when network
    /// verification fails; the caller learns durability could not be
    /// confirmed through `NetworkVerificationFailed`.
    pub async fn put(
        &self,
        record_id: &str,
        mut conversation: Conversation,
        opts: PutOptions,
    ) -> Result<(), StoreError> {
        Self::validate_record_id(record_id)?;

        if conversation.id.is_empty() {
            conversation.id = record_id.to_string();
        } else if conversation.id != record_id {
            return Err(StoreError::InvalidRecord {
                expected: record_id.to_string(),
                actual: conversation.id,
            });
        }
        conversation.updated_at = Utc::now();

        let record = self
            .engine
            .seal_record(&self.recipient_pub, &conversation)?;
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let path = self.record_path(record_id);
        let backend = Arc::clone(&self.backend);
        self.retrying("put", move || {
            let backend = Arc::clone(&backend);
            let path = path.clone();
            let bytes = bytes.clone();
            async move { backend.put(&path, bytes).await }.boxed()
        })
        .await?;

        self.cache
            .write()
            .await
            .insert(record_id.to_string(), conversation);
        debug!("📥 stored conversation '{}'", record_id);

        if opts.wait_for_network {
            self.verify_write(record_id).await?;
        }

        Ok(())
    }

    /// Re-read a just-written record from the backend and confirm it
    /// decrypts to the expected id.
    async fn verify_write(&self, record_id: &str) -> Result<(), StoreError> {
        // Evict so the verification read cannot be served locally.
        self.cache.write().await.remove(record_id);

        let mut delay = self.retry.base_delay;
        for attempt in 1..=self.retry.max_attempts {
            match self.read_and_decrypt(record_id).await {
                Ok(conversation) => {
                    if conversation.id == record_id {
                        info!("✅ network-verified conversation '{}'", record_id);
                        self.cache
                            .write()
                            .await
                            .insert(record_id.to_string(), conversation);
                        return Ok(());
                    }
                    // A different id cannot heal with more retries.
                    warn!(
                        "❌ verification read of '{}' decrypted to id '{}'",
                        record_id, conversation.id
                    );
                    break;
                }
                Err(e) => {
                    warn!(
                        "verification read of '{}' failed (attempt {}/{}): {}",
                        record_id, attempt, self.retry.max_attempts, e
                    );
                    if attempt < self.retry.max_attempts {
                        sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(StoreError::NetworkVerificationFailed {
            record_id: record_id.to_string(),
        })
    }

    /// Fetch a conversation, cache-first.
    pub async fn get(&self, record_id: &str) -> Result<Conversation, StoreError> {
        Self::validate_record_id(record_id)?;

        if let Some(cached) = self.cache.read().await.get(record_id) {
            debug!("cache hit for '{}'", record_id);
            return Ok(cached.clone());
        }

        let conversation = self.read_and_decrypt(record_id).await?;
        if conversation.id != record_id {
            return Err(StoreError::InvalidRecord {
                expected: record_id.to_string(),
                actual: conversation.id,
            });
        }

        self.cache
            .write()
            .await
            .insert(record_id.to_string(), conversation.clone());
        Ok(conversation)
    }

    /// Enumerate and decrypt every record under the owner's path.
    ///
    /// Entries that fail to decrypt are logged and skipped; they can be
    /// artefacts of another session or a rotated identity.
    pub async fn list(&self) -> Result<Vec<Conversation>, StoreError> {
        let dir = self.owner_dir();
        let backend = Arc::clone(&self.backend);
        let entries = match self
            .retrying("list", move || {
                let backend = Arc::clone(&backend);
                let dir = dir.clone();
                async move { backend.list(&dir).await }.boxed()
            })
            .await
        {
            Ok(entries) => entries,
            Err(StoreError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut conversations = Vec::new();
        for entry in entries {
            if entry.entry_type != EntryType::File {
                continue;
            }
            let Some(record_id) = entry.name.strip_suffix(".json") else {
                continue;
            };
            match self.read_and_decrypt(record_id).await {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => {
                    warn!("skipping undecryptable record '{}': {}", record_id, e);
                }
            }
        }
        Ok(conversations)
    }

    /// Hard-delete a record from the backend and the cache.
    pub async fn delete(&self, record_id: &str) -> Result<(), StoreError> {
        Self::validate_record_id(record_id)?;

        let path = self.record_path(record_id);
        let backend = Arc::clone(&self.backend);
        self.retrying("delete", move || {
            let backend = Arc::clone(&backend);
            let path = path.clone();
            async move { backend.delete(&path).await }.boxed()
        })
        .await?;

        self.cache.write().await.remove(record_id);
        info!("🗑️  deleted conversation '{}'", record_id);
        Ok(())
    }

    /// Cheap existence check: cache, then a metadata probe that neither
    /// reads nor decrypts the record.
    pub async fn exists(&self, record_id: &str) -> Result<bool, StoreError> {
        Self::validate_record_id(record_id)?;

        if self.cache.read().await.contains_key(record_id) {
            return Ok(true);
        }
        let metadata = self.backend.metadata(&self.record_path(record_id)).await?;
        Ok(metadata.is_some())
    }

    async fn read_and_decrypt(&self, record_id: &str) -> Result<Conversation, StoreError> {
        let path = self.record_path(record_id);
        let backend = Arc::clone(&self.backend);
        let bytes = self
            .retrying("get", move || {
                let backend = Arc::clone(&backend);
                let path = path.clone();
                async move { backend.get(&path).await }.boxed()
            })
            .await?
            .ok_or_else(|| StoreError::NotFound(record_id.to_string()))?;

        let record: EncryptedRecord = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let opened: OpenedRecord<Conversation> = self.engine.open_record(&record)?;
        debug!(
            "decrypted '{}' sealed by {} at {}",
            record_id, opened.sender_address, opened.stored_at
        );
        Ok(opened.value)
    }

    /// Run a backend call with per-attempt timeout and exponential
    /// backoff on transient failures.
    async fn retrying<T>(
        &self,
        operation: &str,
        mut attempt_fn: impl FnMut() -> BoxFuture<'static, Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let mut delay = self.retry.base_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match timeout(self.retry.attempt_timeout, attempt_fn()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(StoreError::Timeout),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation, attempt, self.retry.max_attempts, delay, e
                    );
                    sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
