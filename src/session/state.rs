// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session State
//!
//! Per-session bookkeeping: identifiers, lifecycle phase, the outgoing
//! message index, transcripts, token counts, and the session key. The
//! key is owned exclusively by this state and is zeroized the moment the
//! session reaches a terminal phase; it is never reused across sessions
//! or reconnects.

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

/// Session lifecycle phase.
///
/// Initializing → (Active ↔ Paused) → Completing → Completed; any phase
/// may move to Aborted on explicit cancel or Failed on unrecoverable
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Initializing,
    Active,
    Paused,
    Completing,
    Completed,
    Aborted,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Completed | SessionPhase::Aborted | SessionPhase::Failed
        )
    }
}

/// 32-byte symmetric session key, zeroized on drop.
pub struct SessionKey(Zeroizing<[u8; 32]>);

impl SessionKey {
    /// Draw a fresh key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut *bytes);
        SessionKey(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        SessionKey(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, as carried in the handshake payload.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(…)")
    }
}

/// Immutable parameters a session is opened with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub session_id: u64,
    pub job_id: u64,
    pub chain_id: u64,
    pub model_name: String,
    pub price_per_token: u64,
}

/// A point-in-time marker in the conversation, recorded after each
/// completed round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub message_index: u64,
    pub created_at: DateTime<Utc>,
}

/// Mutable per-session state, owned by the session task.
pub struct SessionState {
    config: SessionConfig,
    phase: SessionPhase,
    message_index: u64,
    session_key: Option<SessionKey>,
    prompts: Vec<String>,
    responses: Vec<String>,
    tokens_generated: u64,
    checkpoints: Vec<SessionCheckpoint>,
    last_chunk_index: Option<u64>,
}

impl SessionState {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            phase: SessionPhase::Initializing,
            message_index: 0,
            session_key: None,
            prompts: Vec::new(),
            responses: Vec::new(),
            tokens_generated: 0,
            checkpoints: Vec::new(),
            last_chunk_index: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Move to a new phase. Terminal transitions destroy the session key.
    pub fn transition(&mut self, phase: SessionPhase) {
        if self.phase == phase {
            return;
        }
        debug!(
            "session {} phase {:?} -> {:?}",
            self.config.session_id, self.phase, phase
        );
        self.phase = phase;
        if phase.is_terminal() {
            // Dropping the key zeroizes it.
            self.session_key = None;
        }
    }

    pub fn set_session_key(&mut self, key: SessionKey) {
        self.session_key = Some(key);
    }

    /// Discard the session key without a phase change (encryption
    /// fallback path).
    pub fn clear_session_key(&mut self) {
        self.session_key = None;
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    /// Encrypted mode is active iff a session key is held.
    pub fn is_encrypted(&self) -> bool {
        self.session_key.is_some()
    }

    /// Current outgoing index; bound into the next sealed message.
    pub fn message_index(&self) -> u64 {
        self.message_index
    }

    /// Advance the outgoing index after a successful send.
    pub fn advance_message_index(&mut self) {
        self.message_index += 1;
    }

    /// Enforce monotonic non-decreasing indices from the counterpart.
    pub fn accept_chunk_index(&mut self, index: u64) -> Result<(), u64> {
        if let Some(last) = self.last_chunk_index {
            if index < last {
                return Err(last);
            }
        }
        self.last_chunk_index = Some(index);
        Ok(())
    }

    pub fn record_prompt(&mut self, prompt: &str) {
        self.prompts.push(prompt.to_string());
    }

    pub fn record_response(&mut self, response: &str) {
        self.responses.push(response.to_string());
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn add_tokens(&mut self, count: u64) {
        self.tokens_generated += count;
    }

    pub fn tokens_generated(&self) -> u64 {
        self.tokens_generated
    }

    pub fn checkpoint(&mut self) {
        self.checkpoints.push(SessionCheckpoint {
            message_index: self.message_index,
            created_at: Utc::now(),
        });
    }

    pub fn checkpoints(&self) -> &[SessionCheckpoint] {
        &self.checkpoints
    }
}
