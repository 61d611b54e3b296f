//! Transport boundary.
//!
//! The network transport is an external collaborator. This module defines the
//! trait the connection state machine drives and the sink through which a
//! transport reports connect/disconnect/message events. `LoopbackTransport`
//! is the in-process implementation used by desktop builds, tests and the
//! diagnostics CLI.

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, QueryInterface};
use crate::error::TransportError;
use crate::message::{ConnectionMessage, MessagePayload};

mod dispatcher;
mod loopback;

pub use dispatcher::{DispatchEvent, EventDispatcher};
pub use loopback::LoopbackTransport;

/// Whether the backend should expect a multi-turn session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    SingleShot,
    Continuous,
}

impl SessionMode {
    pub fn from_continuous(for_continuous_mode: bool) -> Self {
        if for_continuous_mode {
            SessionMode::Continuous
        } else {
            SessionMode::SingleShot
        }
    }
}

/// Message handed to a transport for sending.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub path: String,
    pub payload: MessagePayload,
    /// Caller-set message properties for `path`, in insertion order.
    pub properties: Vec<(String, String)>,
}

/// Receiver of transport-originated events.
///
/// Called from the transport's dispatch thread, never from the thread that
/// issued the command.
pub trait TransportEvents: Send + Sync {
    fn connected(&self, session_id: &str);

    fn disconnected(&self, session_id: &str, reason: &str);

    fn message_received(&self, message: Arc<dyn ConnectionMessage>);
}

/// Transport driven by a connection.
///
/// `open`, `close` and `send` validate and enqueue; they never block on I/O.
pub trait Transport: QueryInterface {
    fn open(&self, mode: SessionMode, events: Weak<dyn TransportEvents>)
        -> Result<(), TransportError>;

    fn close(&self) -> Result<(), TransportError>;

    fn send(&self, message: OutboundMessage) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn session_id(&self) -> &str;
}

impl Capability for dyn Transport {
    const NAME: &'static str = "transport";
}
