// Event arguments and handler slots for connection events

use std::sync::{Arc, Mutex};

use crate::message::ConnectionMessage;

/// Handler for Connected/Disconnected.
pub type ConnectionCallback = Arc<dyn Fn(Arc<ConnectionEventArgs>) + Send + Sync>;

/// Handler for MessageReceived.
pub type MessageCallback = Arc<dyn Fn(Arc<ConnectionMessageEventArgs>) + Send + Sync>;

/// Arguments of a Connected or Disconnected event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEventArgs {
    session_id: String,
    reason: Option<String>,
}

impl ConnectionEventArgs {
    pub fn connected(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            reason: None,
        }
    }

    pub fn disconnected(session_id: &str, reason: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            reason: Some(reason.to_string()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Disconnect reason; `None` for Connected.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Arguments of a MessageReceived event.
pub struct ConnectionMessageEventArgs {
    message: Arc<dyn ConnectionMessage>,
}

impl ConnectionMessageEventArgs {
    pub fn new(message: Arc<dyn ConnectionMessage>) -> Self {
        Self { message }
    }

    pub fn message(&self) -> Arc<dyn ConnectionMessage> {
        Arc::clone(&self.message)
    }
}

/// Holds at most one handler.
///
/// Setting replaces the previous handler. The handler is cloned out of the
/// lock before it runs, so a handler may re-register itself or another one
/// without deadlocking.
pub struct CallbackSlot<F: ?Sized> {
    slot: Mutex<Option<Arc<F>>>,
}

impl<F: ?Sized> CallbackSlot<F> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store `callback`, returning whether a previous handler was replaced.
    pub fn set(&self, callback: Option<Arc<F>>) -> bool {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        let replaced = slot.is_some();
        *slot = callback;
        replaced
    }

    pub fn current(&self) -> Option<Arc<F>> {
        match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.current().is_some()
    }
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}
