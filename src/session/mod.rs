// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encrypted Session Layer
//!
//! Typed wire envelopes, the transport seam, per-session state, and the
//! client protocol state machine that ties them to the encryption
//! engine.

pub mod error;
pub mod messages;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod ws;

pub use error::{SessionError, TransportError};
pub use messages::{validate_session_init, ErrorCode, ErrorMessage, WireMessage};
pub use protocol::{ProtocolConfig, SessionProtocol};
pub use state::{SessionConfig, SessionKey, SessionPhase, SessionState};
pub use transport::{ChannelTransport, MessageHandler, Subscription, Transport};
pub use ws::WsTransport;
