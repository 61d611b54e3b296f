// SessionConnection: connection state machine bound to a recognizer session

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::{
    CallbackSlot, Connection, ConnectionCallback, ConnectionEventArgs, ConnectionMessageEventArgs,
    ConnectionState, MessageCallback, MessageParamFromUser,
};
use crate::capability::{InterfaceView, QueryInterface};
use crate::error::ApiError;
use crate::interface_map;
use crate::message::{ConnectionMessage, MessagePayload};
use crate::properties::{NamedProperties, PropertyBag};
use crate::recognizer::RecognizerSession;
use crate::transport::{OutboundMessage, SessionMode, TransportEvents};

struct Lifecycle {
    state: ConnectionState,
    mode: Option<SessionMode>,
}

/// Connection to the backend session of a [`crate::recognizer::SessionRecognizer`].
///
/// Holds only a weak reference to its session: once the recognizer is gone,
/// commands fail with `InvalidHandle` and the connection reads as `Closed`.
///
/// Lifecycle commands serialize on one lock, so `close` racing an in-flight
/// `open` always leaves a consistent state. Events arrive on the transport's
/// dispatch thread.
pub struct SessionConnection {
    me: Weak<SessionConnection>,
    session: Weak<RecognizerSession>,
    lifecycle: Mutex<Lifecycle>,
    parameters: Mutex<HashMap<String, PropertyBag>>,
    connected: CallbackSlot<dyn Fn(Arc<ConnectionEventArgs>) + Send + Sync>,
    disconnected: CallbackSlot<dyn Fn(Arc<ConnectionEventArgs>) + Send + Sync>,
    message_received: CallbackSlot<dyn Fn(Arc<ConnectionMessageEventArgs>) + Send + Sync>,
}

impl SessionConnection {
    pub fn new(session: Weak<RecognizerSession>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            session,
            lifecycle: Mutex::new(Lifecycle {
                state: ConnectionState::Closed,
                mode: None,
            }),
            parameters: Mutex::new(HashMap::new()),
            connected: CallbackSlot::new(),
            disconnected: CallbackSlot::new(),
            message_received: CallbackSlot::new(),
        })
    }

    fn lock_lifecycle(&self) -> Result<MutexGuard<'_, Lifecycle>, ApiError> {
        self.lifecycle
            .lock()
            .map_err(|_| ApiError::lock_poisoned("connection_lifecycle"))
    }

    fn lock_parameters(&self) -> Result<MutexGuard<'_, HashMap<String, PropertyBag>>, ApiError> {
        self.parameters
            .lock()
            .map_err(|_| ApiError::lock_poisoned("connection_parameters"))
    }

    fn session(&self) -> Result<Arc<RecognizerSession>, ApiError> {
        self.session
            .upgrade()
            .ok_or(ApiError::InvalidHandle { kind: "recognizer" })
    }

    /// Mode requested by the last successful open.
    pub fn mode(&self) -> Option<SessionMode> {
        self.lock_lifecycle().ok().and_then(|lifecycle| lifecycle.mode)
    }

    /// Parameters currently attached to `path`, in insertion order.
    pub fn parameters_for(&self, path: &str) -> Vec<(String, String)> {
        self.lock_parameters()
            .ok()
            .and_then(|parameters| {
                parameters.get(path).map(|bag| {
                    bag.snapshot()
                        .into_iter()
                        .map(|property| (property.name, property.value))
                        .collect()
                })
            })
            .unwrap_or_default()
    }
}

impl Connection for SessionConnection {
    fn open(&self, for_continuous_mode: bool) -> Result<(), ApiError> {
        let session = self.session()?;
        let mut lifecycle = self.lock_lifecycle()?;
        if lifecycle.state == ConnectionState::Open {
            if session.transport().is_connected() {
                log::debug!(
                    "[Connection] open ignored, session {} already open",
                    session.session_id()
                );
                return Ok(());
            }
            // Transport dropped; its Disconnected event is still queued
            log::info!(
                "[Connection] session {} dropped before disconnect delivery, reopening",
                session.session_id()
            );
        }

        let mode = SessionMode::from_continuous(for_continuous_mode);
        let sink: Weak<dyn TransportEvents> = self.me.clone();
        session.transport().open(mode, sink)?;

        lifecycle.state = ConnectionState::Open;
        lifecycle.mode = Some(mode);
        log::info!(
            "[Connection] opened session {} ({:?})",
            session.session_id(),
            mode
        );
        Ok(())
    }

    fn close(&self) -> Result<(), ApiError> {
        let mut lifecycle = self.lock_lifecycle()?;
        if lifecycle.state == ConnectionState::Closed {
            return Ok(());
        }

        match self.session.upgrade() {
            Some(session) => {
                log::info!("[Connection] closing session {}", session.session_id());
                session.transport().close()?;
            }
            None => log::debug!("[Connection] close after session release"),
        }
        lifecycle.state = ConnectionState::Closed;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        match self.lifecycle.lock() {
            Ok(lifecycle) => lifecycle.state,
            Err(poisoned) => poisoned.into_inner().state,
        }
    }

    fn set_connected_callback(&self, callback: Option<ConnectionCallback>) {
        self.connected.set(callback);
    }

    fn set_disconnected_callback(&self, callback: Option<ConnectionCallback>) {
        self.disconnected.set(callback);
    }

    fn set_message_received_callback(&self, callback: Option<MessageCallback>) {
        self.message_received.set(callback);
    }
}

impl MessageParamFromUser for SessionConnection {
    fn set_parameter(&self, path: &str, name: &str, value: &str) -> Result<(), ApiError> {
        ApiError::require_non_empty(path, "path")?;
        ApiError::require_non_empty(name, "name")?;
        ApiError::require_non_empty(value, "value")?;

        self.lock_parameters()?
            .entry(path.to_string())
            .or_default()
            .set(name, value);
        Ok(())
    }

    fn send_network_message(&self, path: &str, payload: MessagePayload) -> Result<(), ApiError> {
        ApiError::require_non_empty(path, "path")?;
        if let MessagePayload::Text(text) = &payload {
            ApiError::require_non_empty(text, "payload")?;
        }

        if self.state() != ConnectionState::Open {
            return Err(ApiError::InvalidState {
                reason: "connection is not open".to_string(),
            });
        }

        let session = self.session()?;
        let properties = self.parameters_for(path);
        session.transport().send(OutboundMessage {
            path: path.to_string(),
            payload,
            properties,
        })?;
        Ok(())
    }
}

impl TransportEvents for SessionConnection {
    fn connected(&self, session_id: &str) {
        if let Some(callback) = self.connected.current() {
            callback(Arc::new(ConnectionEventArgs::connected(session_id)));
        }
    }

    fn disconnected(&self, session_id: &str, reason: &str) {
        {
            let mut lifecycle = match self.lifecycle.lock() {
                Ok(lifecycle) => lifecycle,
                Err(poisoned) => poisoned.into_inner(),
            };
            // A late event for an earlier session must not close a reopened one
            let still_connected = self
                .session
                .upgrade()
                .map(|session| session.transport().is_connected())
                .unwrap_or(false);
            if !still_connected {
                lifecycle.state = ConnectionState::Closed;
            }
        }

        if let Some(callback) = self.disconnected.current() {
            callback(Arc::new(ConnectionEventArgs::disconnected(session_id, reason)));
        }
    }

    fn message_received(&self, message: Arc<dyn ConnectionMessage>) {
        if let Some(callback) = self.message_received.current() {
            callback(Arc::new(ConnectionMessageEventArgs::new(message)));
        }
    }
}

impl QueryInterface for SessionConnection {
    fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
        interface_map!(self, interface; dyn Connection, dyn MessageParamFromUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::query;
    use crate::config::TransportConfig;
    use crate::recognizer::RecognizerSession;
    use crate::error::TransportError;
    use crate::transport::{LoopbackTransport, Transport};
    use std::sync::mpsc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn session() -> (Arc<RecognizerSession>, Arc<LoopbackTransport>) {
        let transport = Arc::new(LoopbackTransport::new(TransportConfig::default()));
        let session = RecognizerSession::new(Arc::clone(&transport) as Arc<dyn Transport>);
        (session, transport)
    }

    #[test]
    fn test_initial_state_closed() {
        let (session, _) = session();
        let connection = session.connection();
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_open_close_lifecycle() {
        let (session, transport) = session();
        let connection = session.connection();

        connection.open(true).unwrap();
        assert_eq!(connection.state(), ConnectionState::Open);
        assert_eq!(connection.mode(), Some(SessionMode::Continuous));
        assert!(transport.is_connected());

        connection.close().unwrap();
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(!transport.is_connected());

        // Idempotent close
        connection.close().unwrap();
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_open_while_open_is_noop() {
        let (session, _) = session();
        let connection = session.connection();
        connection.open(false).unwrap();
        connection.open(true).unwrap();
        assert_eq!(connection.state(), ConnectionState::Open);
        assert_eq!(connection.mode(), Some(SessionMode::SingleShot));
    }

    #[test]
    fn test_send_requires_open() {
        let (session, transport) = session();
        let connection = session.connection();
        let result =
            connection.send_network_message("speech.context", MessagePayload::Text("{}".into()));
        assert!(matches!(result, Err(ApiError::InvalidState { .. })));
        assert!(transport.sent_messages().is_empty());
    }

    #[test]
    fn test_parameters_attached_to_path() {
        let (session, transport) = session();
        let connection = session.connection();
        connection
            .set_parameter("speech.context", "phraseDetection", "on")
            .unwrap();
        connection
            .set_parameter("speech.context", "phraseDetection", "off")
            .unwrap();
        connection.set_parameter("other", "x", "y").unwrap();

        connection.open(false).unwrap();
        connection
            .send_network_message("speech.context", MessagePayload::Text("{}".into()))
            .unwrap();

        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].properties,
            vec![("phraseDetection".to_string(), "off".to_string())]
        );
    }

    #[test]
    fn test_set_parameter_validates_arguments() {
        let (session, _) = session();
        let connection = session.connection();
        assert_eq!(
            connection.set_parameter("", "name", "value"),
            Err(ApiError::InvalidArgument { name: "path" })
        );
        assert_eq!(
            connection.set_parameter("path", "", "value"),
            Err(ApiError::InvalidArgument { name: "name" })
        );
        assert_eq!(
            connection.set_parameter("path", "name", ""),
            Err(ApiError::InvalidArgument { name: "value" })
        );
        assert!(connection.parameters_for("path").is_empty());
    }

    #[test]
    fn test_events_reach_callbacks() {
        let (session, _) = session();
        let connection = session.connection();
        let (tx, rx) = mpsc::channel::<String>();

        let sender = Mutex::new(tx.clone());
        connection.set_connected_callback(Some(Arc::new(move |args: Arc<ConnectionEventArgs>| {
            let _ = sender
                .lock()
                .unwrap()
                .send(format!("connected:{}", args.session_id()));
        })));
        let sender = Mutex::new(tx.clone());
        connection.set_message_received_callback(Some(Arc::new(
            move |args: Arc<ConnectionMessageEventArgs>| {
                let message = args.message();
                let _ = sender.lock().unwrap().send(format!(
                    "message:{}:{}",
                    message.path(),
                    String::from_utf8_lossy(message.payload())
                ));
            },
        )));
        let sender = Mutex::new(tx);
        connection.set_disconnected_callback(Some(Arc::new(move |args: Arc<ConnectionEventArgs>| {
            let _ = sender
                .lock()
                .unwrap()
                .send(format!("disconnected:{}", args.reason().unwrap_or("")));
        })));

        connection.open(false).unwrap();
        connection
            .send_network_message("turn.start", MessagePayload::Text("hello".into()))
            .unwrap();
        connection.close().unwrap();

        assert_eq!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            format!("connected:{}", session.session_id())
        );
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "message:turn.start:hello");
        assert!(rx
            .recv_timeout(TIMEOUT)
            .unwrap()
            .starts_with("disconnected:"));
    }

    #[test]
    fn test_transport_disconnect_closes_connection() {
        let (session, transport) = session();
        let connection = session.connection();
        let (tx, rx) = mpsc::channel::<()>();
        let sender = Mutex::new(tx);
        connection.set_disconnected_callback(Some(Arc::new(move |_: Arc<ConnectionEventArgs>| {
            let _ = sender.lock().unwrap().send(());
        })));

        connection.open(false).unwrap();
        transport.inject_disconnect("server closed").unwrap();
        rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_open_reopens_after_undelivered_disconnect() {
        let (session, transport) = session();
        let connection = session.connection();

        // Park the dispatch thread inside the message handler
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered = Mutex::new(entered_tx);
        let release = Mutex::new(release_rx);
        connection.set_message_received_callback(Some(Arc::new(
            move |_: Arc<ConnectionMessageEventArgs>| {
                let _ = entered.lock().unwrap().send(());
                let _ = release.lock().unwrap().recv_timeout(TIMEOUT);
            },
        )));
        let (disconnected_tx, disconnected_rx) = mpsc::channel::<()>();
        let disconnected = Mutex::new(disconnected_tx);
        connection.set_disconnected_callback(Some(Arc::new(move |_: Arc<ConnectionEventArgs>| {
            let _ = disconnected.lock().unwrap().send(());
        })));

        connection.open(false).unwrap();
        connection
            .send_network_message("turn.start", MessagePayload::Text("block".into()))
            .unwrap();
        entered_rx.recv_timeout(TIMEOUT).unwrap();

        transport.inject_disconnect("network lost").unwrap();
        assert_eq!(connection.state(), ConnectionState::Open);
        assert!(!transport.is_connected());

        connection.open(false).unwrap();
        assert!(transport.is_connected());
        connection
            .send_network_message("turn.start", MessagePayload::Text("after".into()))
            .unwrap();

        // Let the stale Disconnected through; the reopened session stays open
        release_tx.send(()).unwrap();
        drop(release_tx);
        disconnected_rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(connection.state(), ConnectionState::Open);
        assert!(transport.is_connected());
    }

    struct StuckTransport;

    impl Transport for StuckTransport {
        fn open(
            &self,
            _mode: SessionMode,
            _events: Weak<dyn TransportEvents>,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        fn close(&self) -> Result<(), TransportError> {
            Err(TransportError::Shutdown)
        }

        fn send(&self, _message: OutboundMessage) -> Result<(), TransportError> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn session_id(&self) -> &str {
            "stuck"
        }
    }

    impl QueryInterface for StuckTransport {
        fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
            interface_map!(self, interface; dyn Transport)
        }
    }

    #[test]
    fn test_failed_close_keeps_connection_open() {
        let session = RecognizerSession::new(Arc::new(StuckTransport) as Arc<dyn Transport>);
        let connection = session.connection();
        connection.open(false).unwrap();

        assert_eq!(
            connection.close(),
            Err(ApiError::Transport {
                source: TransportError::Shutdown
            })
        );
        assert_eq!(connection.state(), ConnectionState::Open);
        assert!(connection
            .send_network_message("p", MessagePayload::Text("still open".into()))
            .is_ok());
    }

    #[test]
    fn test_session_release_invalidates_connection() {
        let (session, _) = session();
        let connection = session.connection();
        drop(session);

        assert_eq!(
            connection.open(false),
            Err(ApiError::InvalidHandle { kind: "recognizer" })
        );
        assert!(connection.close().is_ok());
    }

    #[test]
    fn test_capabilities_offered() {
        let (session, _) = session();
        let connection: Arc<dyn Connection> = session.connection();
        assert!(query::<dyn MessageParamFromUser, _>(&connection).is_some());
        assert!(query::<dyn NamedProperties, _>(&connection).is_none());
    }
}
