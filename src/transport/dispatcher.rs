// EventDispatcher: delivers transport events on a dedicated thread

use std::sync::{Arc, Mutex, Weak};
use std::thread;

use tokio::sync::mpsc;

use super::TransportEvents;
use crate::error::TransportError;
use crate::message::ConnectionMessage;

/// Event queued for delivery to a sink.
pub enum DispatchEvent {
    Connected {
        sink: Weak<dyn TransportEvents>,
        session_id: String,
    },
    Disconnected {
        sink: Weak<dyn TransportEvents>,
        session_id: String,
        reason: String,
    },
    Message {
        sink: Weak<dyn TransportEvents>,
        message: Arc<dyn ConnectionMessage>,
    },
}

impl DispatchEvent {
    fn deliver(self) {
        match self {
            DispatchEvent::Connected { sink, session_id } => {
                if let Some(sink) = sink.upgrade() {
                    tracing::debug!(session_id = %session_id, "delivering connected");
                    sink.connected(&session_id);
                }
            }
            DispatchEvent::Disconnected {
                sink,
                session_id,
                reason,
            } => {
                if let Some(sink) = sink.upgrade() {
                    tracing::debug!(session_id = %session_id, reason = %reason, "delivering disconnected");
                    sink.disconnected(&session_id, &reason);
                }
            }
            DispatchEvent::Message { sink, message } => {
                if let Some(sink) = sink.upgrade() {
                    tracing::debug!(path = %message.path(), size = message.payload_size(), "delivering message");
                    sink.message_received(message);
                }
            }
        }
    }
}

/// Single-consumer event queue drained by one worker thread.
///
/// Events are delivered in the order they were enqueued. The worker starts on
/// first use and exits once the dispatcher is dropped and the queue drains.
pub struct EventDispatcher {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<DispatchEvent>>>,
}

impl EventDispatcher {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sender: Mutex::new(None),
        }
    }

    /// Start the worker thread if it is not running yet.
    pub fn ensure_started(&self) -> Result<(), TransportError> {
        let mut sender = self.sender.lock().map_err(|_| TransportError::Shutdown)?;
        if sender.is_some() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<DispatchEvent>();
        let thread_name = format!("{}-dispatch", self.name);
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                log::debug!("[EventDispatcher] {} started", thread_name);
                // No async runtime on this thread; blocking_recv is safe here
                while let Some(event) = rx.blocking_recv() {
                    event.deliver();
                }
                log::debug!("[EventDispatcher] {} stopped", thread_name);
            })
            .map_err(|err| TransportError::OpenFailed {
                reason: format!("failed to spawn dispatch thread: {}", err),
            })?;

        *sender = Some(tx);
        Ok(())
    }

    pub fn dispatch(&self, event: DispatchEvent) -> Result<(), TransportError> {
        let sender = self.sender.lock().map_err(|_| TransportError::Shutdown)?;
        match sender.as_ref() {
            Some(tx) => tx.send(event).map_err(|_| TransportError::Shutdown),
            None => Err(TransportError::Shutdown),
        }
    }
}
