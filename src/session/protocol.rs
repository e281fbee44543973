// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Protocol
//!
//! Client-side state machine multiplexing handshake, streaming
//! inference, cancellation, and completion over one in-order duplex
//! transport.
//!
//! ## Protocol Flow
//!
//! 1. Generate a random 32-byte session key
//! 2. Seal it (with job id, model, price) to the host's static key and
//!    send the encrypted session init
//! 3. On ack, the session is Active; every prompt is sealed under the
//!    session key with a strictly increasing message index
//! 4. Response chunks arrive sealed under the same key with monotonic
//!    non-decreasing indices; out-of-order chunks are a protocol error
//! 5. If the host answers the init with `EncryptionNotSupported`, the
//!    client falls back to a plaintext session with the same ids and
//!    discards the session key
//!
//! Cancellation never destroys the session: a cancelled prompt resolves
//! with whatever output accumulated and the transport stays open for the
//! next prompt. Only `abort()` tears the session down.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::crypto::{EncryptionEngine, HandshakePayload, SealOptions, U256};

use super::error::SessionError;
use super::messages::{ErrorCode, ErrorMessage, WireMessage};
use super::state::{SessionConfig, SessionKey, SessionPhase, SessionState};
use super::transport::{Subscription, Transport};

/// Tunables for timeouts.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Budget for a single outbound operation (handshake, send, complete)
    pub operation_timeout: Duration,
    /// Maximum silence between streamed chunks
    pub inactivity_timeout: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(60),
        }
    }
}

/// Client-side session over one transport.
///
/// All methods are driven by the owning session task; the protocol holds
/// no internal concurrency.
pub struct SessionProtocol {
    engine: Arc<EncryptionEngine>,
    transport: Arc<dyn Transport>,
    host_public_key: [u8; 33],
    state: SessionState,
    config: ProtocolConfig,
}

impl SessionProtocol {
    pub fn new(
        engine: Arc<EncryptionEngine>,
        transport: Arc<dyn Transport>,
        host_public_key: [u8; 33],
        session: SessionConfig,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            engine,
            transport,
            host_public_key,
            state: SessionState::new(session),
            config,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether streaming currently runs under a session key.
    pub fn is_encrypted(&self) -> bool {
        self.state.is_encrypted()
    }

    /// Perform the session handshake.
    ///
    /// Seals a fresh session key to the host and waits for the ack. If
    /// the host signals `EncryptionNotSupported`, re-sends a plaintext
    /// session init with the same identifiers and continues unencrypted.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        if self.state.phase() != SessionPhase::Initializing {
            return Err(SessionError::InvalidPhase {
                required: SessionPhase::Initializing,
                actual: self.state.phase(),
            });
        }

        let key = SessionKey::generate();
        let cfg = self.state.config().clone();

        let payload = HandshakePayload {
            job_id: U256::from(cfg.job_id),
            model_name: cfg.model_name.clone(),
            session_key: key.to_hex(),
            price_per_token: cfg.price_per_token,
            recovery_public_key: Some(hex::encode(self.engine.recovery_public_key())),
        };

        let envelope = match self
            .engine
            .seal_handshake(&self.host_public_key, &payload, &SealOptions::default())
        {
            Ok(envelope) => envelope,
            Err(e) => return Err(self.fail(e.into())),
        };

        let init = WireMessage::EncryptedSessionInit {
            chain_id: cfg.chain_id.to_string(),
            session_id: cfg.session_id.to_string(),
            job_id: cfg.job_id.to_string(),
            payload: envelope,
        };

        let (mut rx, _sub) = self.subscribe();
        if let Err(e) = self.transport.send(init).await {
            return Err(self.fail(e.into()));
        }

        match self.await_ack(&mut rx).await {
            Ok(()) => {
                self.state.set_session_key(key);
                self.state.transition(SessionPhase::Active);
                info!("🔐 session {} active (encrypted)", cfg.session_id);
                Ok(())
            }
            Err(SessionError::EncryptionNotSupported) => {
                warn!(
                    "🔓 host rejected encryption for session {}; falling back to plaintext",
                    cfg.session_id
                );
                drop(key); // never sent in the clear; zeroized here

                let fallback = WireMessage::SessionInit {
                    chain_id: cfg.chain_id.to_string(),
                    session_id: cfg.session_id.to_string(),
                    job_id: cfg.job_id.to_string(),
                    model_name: cfg.model_name.clone(),
                    price_per_token: cfg.price_per_token,
                };
                if let Err(e) = self.transport.send(fallback).await {
                    return Err(self.fail(e.into()));
                }

                match self.await_ack(&mut rx).await {
                    Ok(()) => {
                        self.state.transition(SessionPhase::Active);
                        info!("session {} active (plaintext fallback)", cfg.session_id);
                        Ok(())
                    }
                    Err(e) => Err(self.fail_handshake(e)),
                }
            }
            Err(e) => Err(self.fail_handshake(e)),
        }
    }

    /// Send a prompt and stream the response.
    ///
    /// `on_chunk` runs once per received chunk, in order. Returns the
    /// concatenation of all chunks. Cancellation resolves with the
    /// partial output; if the token is already signalled nothing is
    /// sent at all.
    pub async fn send_prompt<F>(
        &mut self,
        prompt: &str,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> Result<String, SessionError>
    where
        F: FnMut(&str),
    {
        if cancel.is_cancelled() {
            return Ok(String::new());
        }
        if self.state.phase() != SessionPhase::Active {
            return Err(SessionError::InvalidPhase {
                required: SessionPhase::Active,
                actual: self.state.phase(),
            });
        }

        let session_id = self.state.config().session_id.to_string();
        let (mut rx, sub) = self.subscribe();

        let outbound = if let Some(key) = self.state.session_key() {
            let body = match self.engine.seal_symmetric(
                key.as_bytes(),
                prompt.as_bytes(),
                self.state.message_index(),
            ) {
                Ok(body) => body,
                Err(e) => return Err(self.fail(e.into())),
            };
            WireMessage::EncryptedMessage {
                session_id: session_id.clone(),
                body,
            }
        } else {
            WireMessage::Prompt {
                session_id: session_id.clone(),
                content: prompt.to_string(),
                message_index: self.state.message_index(),
            }
        };

        match timeout(self.config.operation_timeout, self.transport.send(outbound)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.fail(e.into())),
            // Handshake already completed; a timed-out send does not
            // fail the session.
            Err(_) => return Err(SessionError::Timeout(self.config.operation_timeout)),
        }
        self.state.advance_message_index();
        self.state.record_prompt(prompt);

        let mut accumulated = String::new();
        loop {
            tokio::select! {
                // Cancellation is checked first at every suspension point.
                biased;
                _ = cancel.cancelled() => {
                    sub.unsubscribe();
                    let notice = WireMessage::StreamCancel {
                        session_id: Some(session_id),
                        reason: Some("client_cancelled".to_string()),
                    };
                    // Best effort; a failed cancel notice is not an error.
                    if let Err(e) = self.transport.send(notice).await {
                        debug!("cancel notice not delivered: {}", e);
                    }
                    self.state.record_response(&accumulated);
                    self.state.checkpoint();
                    return Ok(accumulated);
                }
                received = timeout(self.config.inactivity_timeout, rx.recv()) => {
                    let message = match received {
                        Err(_) => return Err(SessionError::Timeout(self.config.inactivity_timeout)),
                        Ok(None) => return Err(self.fail(SessionError::TransportClosed)),
                        Ok(Some(message)) => message,
                    };

                    match message {
                        WireMessage::EncryptedChunk { body } => {
                            let Some(key) = self.state.session_key() else {
                                return Err(self.fail(SessionError::Protocol(
                                    "encrypted chunk on a plaintext session".to_string(),
                                )));
                            };
                            let opened = match self.engine.open_symmetric(key.as_bytes(), &body) {
                                Ok(opened) => opened,
                                Err(e) => return Err(self.fail(e.into())),
                            };
                            if let Err(last) = self.state.accept_chunk_index(opened.message_index) {
                                return Err(self.fail(SessionError::Protocol(format!(
                                    "chunk index {} after {}",
                                    opened.message_index, last
                                ))));
                            }
                            let text = String::from_utf8_lossy(&opened.plaintext).into_owned();
                            on_chunk(&text);
                            accumulated.push_str(&text);
                        }
                        WireMessage::StreamChunk { content } => {
                            if self.state.is_encrypted() {
                                return Err(self.fail(SessionError::Protocol(
                                    "plaintext chunk on an encrypted session".to_string(),
                                )));
                            }
                            on_chunk(&content);
                            accumulated.push_str(&content);
                        }
                        WireMessage::StreamEnd { total_tokens } => {
                            if let Some(tokens) = total_tokens {
                                self.state.add_tokens(tokens);
                            }
                            self.state.record_response(&accumulated);
                            self.state.checkpoint();
                            return Ok(accumulated);
                        }
                        WireMessage::StreamCancel { reason, .. } => {
                            debug!("host cancelled stream: {:?}", reason);
                            self.state.record_response(&accumulated);
                            return Ok(accumulated);
                        }
                        WireMessage::Error { error } => {
                            return Err(self.apply_host_error(error));
                        }
                        other => {
                            debug!("ignoring {} during stream", other.message_type());
                        }
                    }
                }
            }
        }
    }

    /// Pause an active session; prompts are rejected until `resume`.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.state.phase() != SessionPhase::Active {
            return Err(SessionError::InvalidPhase {
                required: SessionPhase::Active,
                actual: self.state.phase(),
            });
        }
        self.state.transition(SessionPhase::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.state.phase() != SessionPhase::Paused {
            return Err(SessionError::InvalidPhase {
                required: SessionPhase::Paused,
                actual: self.state.phase(),
            });
        }
        self.state.transition(SessionPhase::Active);
        Ok(())
    }

    /// Finish the session: emit the completion control message, destroy
    /// the session key, and move to Completed. Idempotent once Completed.
    pub async fn complete(
        &mut self,
        token_count: u64,
        final_proof: Option<String>,
    ) -> Result<(), SessionError> {
        match self.state.phase() {
            SessionPhase::Completed => return Ok(()),
            SessionPhase::Active | SessionPhase::Paused | SessionPhase::Completing => {}
            other => {
                return Err(SessionError::InvalidPhase {
                    required: SessionPhase::Active,
                    actual: other,
                })
            }
        }

        self.state.transition(SessionPhase::Completing);

        let message = WireMessage::SessionComplete {
            session_id: self.state.config().session_id.to_string(),
            token_count,
            final_proof,
        };
        match timeout(self.config.operation_timeout, self.transport.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.fail(e.into())),
            Err(_) => {
                return Err(self.fail(SessionError::Timeout(self.config.operation_timeout)))
            }
        }

        self.state.add_tokens(token_count);
        self.state.transition(SessionPhase::Completed);
        info!(
            "✅ session {} completed ({} tokens)",
            self.state.config().session_id,
            self.state.tokens_generated()
        );
        Ok(())
    }

    /// Destroy the session. The transport is left to its owner.
    pub async fn abort(&mut self) {
        if self.state.phase().is_terminal() {
            return;
        }
        let notice = WireMessage::StreamCancel {
            session_id: Some(self.state.config().session_id.to_string()),
            reason: Some("aborted".to_string()),
        };
        let _ = self.transport.send(notice).await;
        self.state.transition(SessionPhase::Aborted);
    }

    fn subscribe(&self) -> (mpsc::UnboundedReceiver<WireMessage>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self
            .transport
            .on_message(Arc::new(move |message| {
                let _ = tx.send(message);
            }));
        (rx, subscription)
    }

    async fn await_ack(
        &self,
        rx: &mut mpsc::UnboundedReceiver<WireMessage>,
    ) -> Result<(), SessionError> {
        let budget = self.config.operation_timeout;
        loop {
            let message = timeout(budget, rx.recv())
                .await
                .map_err(|_| SessionError::Timeout(budget))?
                .ok_or(SessionError::TransportClosed)?;

            match message {
                WireMessage::Ack { session_id } => {
                    debug!("ack for session {}", session_id);
                    return Ok(());
                }
                WireMessage::Error { error } => return Err(host_error(error)),
                other => {
                    debug!("ignoring {} while awaiting ack", other.message_type());
                }
            }
        }
    }

    /// Mark the session Failed and pass the error through.
    fn fail(&mut self, err: SessionError) -> SessionError {
        self.state.transition(SessionPhase::Failed);
        err
    }

    /// Terminal classification for handshake failures.
    fn fail_handshake(&mut self, err: SessionError) -> SessionError {
        match &err {
            SessionError::Host {
                code: ErrorCode::DecryptionFailed,
                ..
            } => self.state.transition(SessionPhase::Aborted),
            _ => self.state.transition(SessionPhase::Failed),
        }
        err
    }

    /// Host-signalled errors during streaming. `DecryptionFailed` aborts
    /// the session (the caller must open a new one); rate limiting is
    /// transient and leaves the session Active.
    fn apply_host_error(&mut self, error: ErrorMessage) -> SessionError {
        let err = host_error(error);
        match &err {
            SessionError::Host {
                code: ErrorCode::DecryptionFailed,
                ..
            } => self.state.transition(SessionPhase::Aborted),
            SessionError::RateLimited(_) | SessionError::EncryptionNotSupported => {}
            _ => self.state.transition(SessionPhase::Failed),
        }
        err
    }
}

fn host_error(error: ErrorMessage) -> SessionError {
    match error.code {
        ErrorCode::EncryptionNotSupported => SessionError::EncryptionNotSupported,
        ErrorCode::Unauthorized => SessionError::Unauthorized(error.message),
        ErrorCode::RateLimited => SessionError::RateLimited(error.message),
        ErrorCode::DecryptionFailed | ErrorCode::Unknown => SessionError::Host {
            code: error.code,
            message: error.message,
        },
    }
}
