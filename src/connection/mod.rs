//! Explicit connections derived from recognizers.
//!
//! A [`Connection`] is a tracked object with a `Closed`/`Open` lifecycle. It
//! forwards commands to the recognizer session's transport and fans transport
//! events out to at most one registered handler per event kind.

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, QueryInterface};
use crate::error::ApiError;
use crate::message::MessagePayload;

mod events;
mod session;

pub use events::{
    CallbackSlot, ConnectionCallback, ConnectionEventArgs, ConnectionMessageEventArgs,
    MessageCallback,
};
pub use session::SessionConnection;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// Connection lifecycle and event subscription.
pub trait Connection: QueryInterface {
    /// `Closed -> Open`. Opening an open connection is a no-op.
    fn open(&self, for_continuous_mode: bool) -> Result<(), ApiError>;

    /// `Open -> Closed`; closing a closed connection is a no-op.
    fn close(&self) -> Result<(), ApiError>;

    fn state(&self) -> ConnectionState;

    /// Replace the Connected handler. `None` clears it.
    fn set_connected_callback(&self, callback: Option<ConnectionCallback>);

    /// Replace the Disconnected handler. `None` clears it.
    fn set_disconnected_callback(&self, callback: Option<ConnectionCallback>);

    /// Replace the MessageReceived handler. `None` clears it.
    fn set_message_received_callback(&self, callback: Option<MessageCallback>);

    fn clear_callbacks(&self) {
        self.set_connected_callback(None);
        self.set_disconnected_callback(None);
        self.set_message_received_callback(None);
    }
}

impl Capability for dyn Connection {
    const NAME: &'static str = "connection";
}

/// Caller-supplied message parameters and raw network messages.
pub trait MessageParamFromUser: Send + Sync {
    /// Attach `name=value` to every later message sent on `path`.
    fn set_parameter(&self, path: &str, name: &str, value: &str) -> Result<(), ApiError>;

    fn send_network_message(&self, path: &str, payload: MessagePayload) -> Result<(), ApiError>;
}

impl Capability for dyn MessageParamFromUser {
    const NAME: &'static str = "custom message parameters";
}
