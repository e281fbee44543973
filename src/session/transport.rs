// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Transport Adapter
//!
//! A thin seam over a bidirectional channel of typed envelopes. The
//! adapter delivers messages in FIFO order with best-effort reliability
//! and never inspects or transforms payloads; all cryptography happens
//! above it. A session uses exactly one adapter instance and serializes
//! its sends.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::error::TransportError;
use super::messages::WireMessage;

/// Inbound message callback. Handlers must be cheap; heavy work belongs
/// on a task fed through a channel.
pub type MessageHandler = Arc<dyn Fn(WireMessage) + Send + Sync>;

/// Handler registry shared between an adapter and its reader.
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<u64, MessageHandler>>,
}

impl HandlerRegistry {
    pub fn register(registry: &Arc<Self>, handler: MessageHandler) -> Subscription {
        let id = registry.next_id.fetch_add(1, Ordering::Relaxed);
        registry.handlers.lock().unwrap().insert(id, handler);

        let registry = Arc::clone(registry);
        Subscription {
            cancel: Some(Box::new(move || {
                registry.handlers.lock().unwrap().remove(&id);
            })),
        }
    }

    /// Deliver a message to every registered handler, outside the lock.
    pub fn dispatch(&self, message: WireMessage) {
        let snapshot: Vec<MessageHandler> = {
            let handlers = self.handlers.lock().unwrap();
            handlers.values().cloned().collect()
        };
        for handler in snapshot {
            handler(message.clone());
        }
    }
}

/// Active message subscription; dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Explicitly unsubscribe now rather than at drop.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Duplex channel of typed envelopes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver an envelope to the counterpart, FIFO, best effort.
    async fn send(&self, message: WireMessage) -> Result<(), TransportError>;

    /// Register an inbound handler; the returned subscription
    /// unsubscribes when dropped.
    fn on_message(&self, handler: MessageHandler) -> Subscription;

    /// Whether the underlying channel is still usable.
    fn is_open(&self) -> bool;

    /// Tear the channel down. Further sends fail with `Closed`.
    async fn close(&self) -> Result<(), TransportError>;
}

/// In-memory paired transport; each endpoint's `send` dispatches into
/// the other endpoint's handlers on the caller's task.
pub struct ChannelTransport {
    local: Arc<HandlerRegistry>,
    peer: Arc<HandlerRegistry>,
    closed: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Create two connected endpoints.
    pub fn pair() -> (ChannelTransport, ChannelTransport) {
        let a = Arc::new(HandlerRegistry::default());
        let b = Arc::new(HandlerRegistry::default());
        let closed = Arc::new(AtomicBool::new(false));

        (
            ChannelTransport {
                local: Arc::clone(&a),
                peer: Arc::clone(&b),
                closed: Arc::clone(&closed),
            },
            ChannelTransport {
                local: b,
                peer: a,
                closed,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, message: WireMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.peer.dispatch(message);
        Ok(())
    }

    fn on_message(&self, handler: MessageHandler) -> Subscription {
        HandlerRegistry::register(&self.local, handler)
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
