// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! WebSocket Transport
//!
//! tokio-tungstenite implementation of the transport seam. Envelopes
//! travel as JSON text frames; a writer task serializes outbound sends
//! and a reader task dispatches inbound frames to registered handlers.
//! Frames that fail to parse as a known envelope are logged and dropped
//! rather than killing the connection.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::error::TransportError;
use super::messages::WireMessage;
use super::transport::{HandlerRegistry, MessageHandler, Subscription, Transport};

/// WebSocket-backed transport for a single session.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Message>,
    registry: Arc<HandlerRegistry>,
    closed: Arc<AtomicBool>,
}

impl WsTransport {
    /// Connect to a host endpoint, e.g. `ws://host:8080/ws`.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        debug!("🔌 WebSocket connected: {}", url);

        let (mut sink, mut source) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let registry = Arc::new(HandlerRegistry::default());
        let closed = Arc::new(AtomicBool::new(false));

        // Writer: drains the outbound queue so sends stay serialized.
        let writer_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if sink.send(frame).await.is_err() {
                    writer_closed.store(true, Ordering::SeqCst);
                    break;
                }
            }
        });

        // Reader: parses text frames into envelopes and dispatches.
        let reader_registry = Arc::clone(&registry);
        let reader_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<WireMessage>(&text) {
                        Ok(message) => reader_registry.dispatch(message),
                        Err(e) => warn!("⚠️ dropping unparseable frame: {}", e),
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {} // binary/ping/pong handled by tungstenite
                }
            }
            reader_closed.store(true, Ordering::SeqCst);
            debug!("🔌 WebSocket reader finished");
        });

        Ok(Self {
            outbound,
            registry,
            closed,
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, message: WireMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let text = serde_json::to_string(&message)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        self.outbound
            .send(Message::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn on_message(&self, handler: MessageHandler) -> Subscription {
        HandlerRegistry::register(&self.registry, handler)
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.outbound.send(Message::Close(None));
        Ok(())
    }
}
