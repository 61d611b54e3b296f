// LoopbackTransport: in-process transport that echoes sent messages

use std::any::TypeId;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::{DispatchEvent, EventDispatcher, OutboundMessage, SessionMode, Transport, TransportEvents};
use crate::capability::{InterfaceView, QueryInterface};
use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::interface_map;
use crate::message::{ConnectionMessage, ReceivedMessage};

pub const CLIENT_CLOSE_REASON: &str = "closed by client";

struct LoopbackState {
    connected: bool,
    mode: Option<SessionMode>,
    events: Option<Weak<dyn TransportEvents>>,
    sent: VecDeque<OutboundMessage>,
}

/// Transport that completes its open sequence immediately and, when
/// `echo_messages` is set, reflects every sent message back as a received one.
///
/// Events go through an [`EventDispatcher`], so they arrive on a worker thread
/// just as they would from a network transport.
pub struct LoopbackTransport {
    config: TransportConfig,
    session_id: String,
    state: Mutex<LoopbackState>,
    dispatcher: EventDispatcher,
}

impl LoopbackTransport {
    pub fn new(config: TransportConfig) -> Self {
        let session_id = format!("{}{:016x}", config.session_id_prefix, rand::random::<u64>());
        Self {
            config,
            session_id,
            state: Mutex::new(LoopbackState {
                connected: false,
                mode: None,
                events: None,
                sent: VecDeque::new(),
            }),
            dispatcher: EventDispatcher::new("loopback"),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, LoopbackState>, TransportError> {
        self.state.lock().map_err(|_| TransportError::Shutdown)
    }

    /// Mode requested by the last successful open.
    pub fn mode(&self) -> Option<SessionMode> {
        self.lock_state().ok().and_then(|state| state.mode)
    }

    /// The last `sent_history` messages accepted by `send`, oldest first.
    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.lock_state()
            .map(|state| state.sent.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Deliver `message` as if it arrived from the backend.
    pub fn inject_message(&self, message: Arc<dyn ConnectionMessage>) -> Result<(), TransportError> {
        let sink = self.current_sink()?;
        self.dispatcher.dispatch(DispatchEvent::Message { sink, message })
    }

    /// Simulate a transport-initiated disconnect (network drop, server close).
    pub fn inject_disconnect(&self, reason: &str) -> Result<(), TransportError> {
        let sink = {
            let mut state = self.lock_state()?;
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            state.connected = false;
            state.events.clone().ok_or(TransportError::NotConnected)?
        };
        log::warn!(
            "[LoopbackTransport] session {} disconnected: {}",
            self.session_id,
            reason
        );
        self.dispatcher.dispatch(DispatchEvent::Disconnected {
            sink,
            session_id: self.session_id.clone(),
            reason: reason.to_string(),
        })
    }

    fn current_sink(&self) -> Result<Weak<dyn TransportEvents>, TransportError> {
        let state = self.lock_state()?;
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.events.clone().ok_or(TransportError::NotConnected)
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport for LoopbackTransport {
    fn open(
        &self,
        mode: SessionMode,
        events: Weak<dyn TransportEvents>,
    ) -> Result<(), TransportError> {
        self.dispatcher.ensure_started()?;

        let mut state = self.lock_state()?;
        if state.connected {
            return Ok(());
        }
        state.connected = true;
        state.mode = Some(mode);
        state.events = Some(events.clone());
        drop(state);

        log::info!(
            "[LoopbackTransport] session {} opened ({:?})",
            self.session_id,
            mode
        );
        self.dispatcher.dispatch(DispatchEvent::Connected {
            sink: events,
            session_id: self.session_id.clone(),
        })
    }

    fn close(&self) -> Result<(), TransportError> {
        let sink = {
            let mut state = self.lock_state()?;
            if !state.connected {
                return Ok(());
            }
            state.connected = false;
            state.events.clone()
        };

        log::info!("[LoopbackTransport] session {} closed", self.session_id);
        match sink {
            Some(sink) => self.dispatcher.dispatch(DispatchEvent::Disconnected {
                sink,
                session_id: self.session_id.clone(),
                reason: CLIENT_CLOSE_REASON.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        let sink = {
            let mut state = self.lock_state()?;
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            let history = self.config.sent_history;
            if history > 0 {
                if state.sent.len() == history {
                    state.sent.pop_front();
                }
                state.sent.push_back(message.clone());
            }
            state.events.clone()
        };

        log::debug!(
            "[LoopbackTransport] sent {} byte(s) on '{}'",
            message.payload.len(),
            message.path
        );

        match (self.config.echo_messages, sink) {
            (true, Some(sink)) => {
                let echoed = ReceivedMessage::new(&message.path, message.payload, message.properties);
                self.dispatcher.dispatch(DispatchEvent::Message {
                    sink,
                    message: Arc::new(echoed),
                })
            }
            _ => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.lock_state()
            .map(|state| state.connected)
            .unwrap_or(false)
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl QueryInterface for LoopbackTransport {
    fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
        interface_map!(self, interface; dyn Transport)
    }
}
