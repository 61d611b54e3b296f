// Recognizers: root tracked objects from which connections are derived

use std::any::TypeId;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::capability::{Capability, InterfaceView, QueryInterface};
use crate::connection::{Connection, SessionConnection};
use crate::interface_map;
use crate::transport::Transport;

/// A speech recognizer reachable through a handle.
pub trait Recognizer: QueryInterface {
    fn name(&self) -> &str;

    /// Backend session id, for recognizers that have one.
    fn session_id(&self) -> Option<String>;
}

impl Capability for dyn Recognizer {
    const NAME: &'static str = "recognizer";
}

/// Recognizers that expose their backend session as an explicit connection.
pub trait ConnectionFromRecognizer: Send + Sync {
    fn connection(&self) -> Arc<dyn Connection>;
}

impl Capability for dyn ConnectionFromRecognizer {
    const NAME: &'static str = "explicit connections";
}

/// Backend session shared by a recognizer and its connection.
///
/// The session owns the transport and at most one connection. The connection
/// points back with a weak reference only.
pub struct RecognizerSession {
    transport: Arc<dyn Transport>,
    connection: OnceCell<Arc<SessionConnection>>,
}

impl RecognizerSession {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            connection: OnceCell::new(),
        })
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn session_id(&self) -> &str {
        self.transport.session_id()
    }

    /// The session's connection, created on first request.
    pub fn connection(self: &Arc<Self>) -> Arc<SessionConnection> {
        Arc::clone(
            self.connection
                .get_or_init(|| SessionConnection::new(Arc::downgrade(self))),
        )
    }
}

impl Drop for RecognizerSession {
    fn drop(&mut self) {
        if let Err(err) = self.transport.close() {
            log::warn!(
                "[RecognizerSession] failed to close transport for {}: {}",
                self.transport.session_id(),
                err
            );
        }
    }
}

/// Online recognizer backed by a transport session. Supports explicit connections.
pub struct SessionRecognizer {
    name: String,
    session: Arc<RecognizerSession>,
}

impl SessionRecognizer {
    pub fn new(name: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.to_string(),
            session: RecognizerSession::new(transport),
        }
    }

    pub fn session(&self) -> &Arc<RecognizerSession> {
        &self.session
    }
}

impl Recognizer for SessionRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn session_id(&self) -> Option<String> {
        Some(self.session.session_id().to_string())
    }
}

impl ConnectionFromRecognizer for SessionRecognizer {
    fn connection(&self) -> Arc<dyn Connection> {
        self.session.connection()
    }
}

impl QueryInterface for SessionRecognizer {
    fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
        interface_map!(self, interface; dyn Recognizer, dyn ConnectionFromRecognizer)
    }
}

/// On-device keyword spotter. Has no backend session, so no connection.
pub struct KeywordRecognizer {
    name: String,
    keyword: String,
}

impl KeywordRecognizer {
    pub fn new(name: &str, keyword: &str) -> Self {
        Self {
            name: name.to_string(),
            keyword: keyword.to_string(),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }
}

impl Recognizer for KeywordRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn session_id(&self) -> Option<String> {
        None
    }
}

impl QueryInterface for KeywordRecognizer {
    fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
        interface_map!(self, interface; dyn Recognizer)
    }
}
