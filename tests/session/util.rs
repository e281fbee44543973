// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scripted host simulator driving the client protocol over an
//! in-memory transport pair.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use fabstir_llm_client::crypto::EncryptionEngine;
use fabstir_llm_client::session::{
    ChannelTransport, ErrorCode, ErrorMessage, ProtocolConfig, SessionConfig, SessionProtocol,
    Transport, WireMessage,
};

/// What the scripted host does with inbound messages.
pub struct HostBehavior {
    /// Accept encrypted session init (false answers `EncryptionNotSupported`)
    pub accept_encryption: bool,
    /// Response chunks streamed per prompt
    pub chunks: Vec<&'static str>,
    /// Send `stream_end` after the chunks
    pub end_stream: bool,
    /// Acknowledge session inits at all (false simulates a dead host)
    pub ack_init: bool,
    /// Answer every prompt with a `DecryptionFailed` error
    pub fail_decryption: bool,
    /// Send chunk indices in decreasing order
    pub scramble_indices: bool,
    /// Token count reported on `stream_end`
    pub total_tokens: Option<u64>,
}

impl Default for HostBehavior {
    fn default() -> Self {
        Self {
            accept_encryption: true,
            chunks: Vec::new(),
            end_stream: true,
            ack_init: true,
            fail_decryption: false,
            scramble_indices: false,
            total_tokens: None,
        }
    }
}

pub struct TestHost {
    pub engine: Arc<EncryptionEngine>,
    /// Every envelope the host saw, in arrival order
    pub observed: Arc<Mutex<Vec<WireMessage>>>,
}

impl TestHost {
    pub fn observed_types(&self) -> Vec<&'static str> {
        self.observed
            .lock()
            .unwrap()
            .iter()
            .map(|message| message.message_type())
            .collect()
    }
}

pub fn spawn_host(transport: ChannelTransport, behavior: HostBehavior) -> TestHost {
    let engine = Arc::new(EncryptionEngine::random());
    let observed = Arc::new(Mutex::new(Vec::new()));

    let host_engine = Arc::clone(&engine);
    let host_observed = Arc::clone(&observed);

    // Register the inbound handler before returning so no client send
    // can race the spawn. Recording happens in the handler itself, so
    // `observed` is synchronous with the client's sends.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = transport.on_message(Arc::new(move |message: WireMessage| {
        host_observed.lock().unwrap().push(message.clone());
        let _ = tx.send(message);
    }));

    tokio::spawn(async move {
        let _subscription = subscription;
        let mut session_key: Option<[u8; 32]> = None;
        let mut chunk_index: u64 = 0;

        while let Some(message) = rx.recv().await {
            match message {
                WireMessage::EncryptedSessionInit {
                    session_id,
                    payload,
                    ..
                } => {
                    if !behavior.ack_init {
                        continue;
                    }
                    if !behavior.accept_encryption {
                        let _ = transport
                            .send(WireMessage::Error {
                                error: ErrorMessage {
                                    code: ErrorCode::EncryptionNotSupported,
                                    message: "plaintext only".to_string(),
                                    details: None,
                                },
                            })
                            .await;
                        continue;
                    }

                    let opened = host_engine
                        .open_handshake(&payload)
                        .expect("host failed to open handshake");
                    let key: [u8; 32] = hex::decode(&opened.payload.session_key)
                        .unwrap()
                        .try_into()
                        .unwrap();
                    session_key = Some(key);

                    let _ = transport.send(WireMessage::Ack { session_id }).await;
                }

                WireMessage::SessionInit { session_id, .. } => {
                    if behavior.ack_init {
                        let _ = transport.send(WireMessage::Ack { session_id }).await;
                    }
                }

                WireMessage::EncryptedMessage { body, .. } => {
                    if behavior.fail_decryption {
                        let _ = transport
                            .send(WireMessage::Error {
                                error: ErrorMessage {
                                    code: ErrorCode::DecryptionFailed,
                                    message: "authentication tag mismatch".to_string(),
                                    details: None,
                                },
                            })
                            .await;
                        continue;
                    }

                    let key = session_key.expect("prompt before handshake");
                    host_engine
                        .open_symmetric(&key, &body)
                        .expect("host failed to decrypt prompt");

                    let count = behavior.chunks.len() as u64;
                    let indices: Vec<u64> = if behavior.scramble_indices {
                        (0..count).rev().map(|i| chunk_index + i).collect()
                    } else {
                        (0..count).map(|i| chunk_index + i).collect()
                    };
                    for (text, index) in behavior.chunks.iter().zip(&indices) {
                        let sealed = host_engine
                            .seal_symmetric(&key, text.as_bytes(), *index)
                            .unwrap();
                        let _ = transport
                            .send(WireMessage::EncryptedChunk { body: sealed })
                            .await;
                    }
                    chunk_index += count;

                    if behavior.end_stream {
                        let _ = transport
                            .send(WireMessage::StreamEnd {
                                total_tokens: behavior.total_tokens,
                            })
                            .await;
                    }
                }

                WireMessage::Prompt { .. } => {
                    for text in &behavior.chunks {
                        let _ = transport
                            .send(WireMessage::StreamChunk {
                                content: text.to_string(),
                            })
                            .await;
                    }
                    if behavior.end_stream {
                        let _ = transport
                            .send(WireMessage::StreamEnd {
                                total_tokens: behavior.total_tokens,
                            })
                            .await;
                    }
                }

                // Cancels and completions are observed, not answered.
                _ => {}
            }
        }
    });

    TestHost { engine, observed }
}

pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        session_id: 7,
        job_id: 456,
        chain_id: 84532,
        model_name: "m".to_string(),
        price_per_token: 2000,
    }
}

pub fn test_protocol_config() -> ProtocolConfig {
    ProtocolConfig {
        operation_timeout: Duration::from_millis(500),
        inactivity_timeout: Duration::from_millis(500),
    }
}

/// A client protocol wired to a freshly spawned scripted host.
pub fn connected_protocol(behavior: HostBehavior) -> (SessionProtocol, TestHost) {
    let (client_end, host_end) = ChannelTransport::pair();
    let host = spawn_host(host_end, behavior);

    let protocol = SessionProtocol::new(
        Arc::new(EncryptionEngine::random()),
        Arc::new(client_end),
        host.engine.public_key(),
        test_session_config(),
        test_protocol_config(),
    );
    (protocol, host)
}
