// SpeechContext: service context owning every handle table
// Replaces process-wide table state with one explicitly constructed object

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::capability::require;
use crate::config::BridgeConfig;
use crate::connection::{
    ConnectionCallback, ConnectionEventArgs, ConnectionMessageEventArgs, ConnectionState,
    MessageCallback, MessageParamFromUser,
};
use crate::error::{log_api_error, ApiError};
use crate::factory::{module_factory, FactoryTable, ModuleFactory, ModuleObject};
use crate::factory::{LOOPBACK_TRANSPORT_CLASS, TRANSPORT_INTERFACE};
use crate::handles::{
    ConnectionEventKind, ConnectionKind, ConnectionMessageEventKind, ConnectionMessageKind,
    Handle, HandleTable, HandleTableRegistry, PropertyBagKind, RecognizerKind, TokenAllocator,
    TrackedKind,
};
use crate::message::{copy_payload, MessagePayload};
use crate::properties::NamedProperties;
use crate::recognizer::{ConnectionFromRecognizer, KeywordRecognizer, SessionRecognizer};
use crate::telemetry::{HandleOperation, LifecyclePhase, TelemetryHub};
use crate::transport::Transport;

/// Handler for Connected/Disconnected events. Receives a tracked event handle
/// the handler is responsible for releasing.
pub type ConnectionEventHandler = Arc<dyn Fn(Handle<ConnectionEventKind>) + Send + Sync>;

/// Handler for MessageReceived events. Receives a tracked event handle.
pub type MessageEventHandler = Arc<dyn Fn(Handle<ConnectionMessageEventKind>) + Send + Sync>;

/// SpeechContext: owner of the handle table registry and module factory
///
/// Every boundary operation goes through a context:
/// - Handles are issued and resolved against its registry
/// - Recognizer transports come from its module factory
/// - Activity is published on its telemetry hub
///
/// Arguments are validated before any handle lookup, and the first failing
/// precondition returns without side effects.
///
/// Teardown order: `shutdown()` (or drop) clears every table, which drops
/// the table references to connections, recognizers and messages.
pub struct SpeechContext {
    registry: Arc<HandleTableRegistry>,
    config: BridgeConfig,
    factory: FactoryTable,
    telemetry: Arc<TelemetryHub>,
}

impl SpeechContext {
    pub fn new(config: BridgeConfig) -> Self {
        let allocator = match config.handles.salt_seed {
            Some(salt) => TokenAllocator::with_salt(salt),
            None => TokenAllocator::new(),
        };
        let context = Self {
            registry: Arc::new(HandleTableRegistry::with_allocator(allocator)),
            factory: module_factory(&config.transport),
            config,
            telemetry: Arc::new(TelemetryHub::default()),
        };
        context.telemetry.record_lifecycle(LifecyclePhase::ContextCreated);
        log::info!("[SpeechContext] created");
        context
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<HandleTableRegistry> {
        &self.registry
    }

    pub fn telemetry(&self) -> &Arc<TelemetryHub> {
        &self.telemetry
    }

    /// Live handle count per kind.
    pub fn live_handles(&self) -> BTreeMap<String, usize> {
        self.registry.live_handles()
    }

    /// Release every outstanding handle. Tables stay registered, so the
    /// context remains usable afterwards.
    pub fn shutdown(&self) {
        let dropped = self.registry.clear();
        for (&kind, &count) in &dropped {
            for _ in 0..count {
                self.telemetry.record_handle(kind, HandleOperation::Released);
            }
        }
        self.telemetry.record_lifecycle(LifecyclePhase::Shutdown);
        log::info!(
            "[SpeechContext] shutdown released {} handle(s)",
            dropped.values().sum::<usize>()
        );
    }

    // ========================================================================
    // HANDLE HELPERS
    // ========================================================================

    fn table<K: TrackedKind>(&self) -> Result<Arc<HandleTable<K>>, ApiError> {
        self.registry.table_for::<K>()
    }

    fn track<K: TrackedKind>(&self, object: Arc<K::Object>) -> Result<Handle<K>, ApiError> {
        let handle = self.table::<K>()?.track(object)?;
        self.telemetry.record_handle(K::NAME, HandleOperation::Tracked);
        Ok(handle)
    }

    fn get<K: TrackedKind>(&self, handle: Handle<K>) -> Result<Arc<K::Object>, ApiError> {
        self.table::<K>()?.get(handle)
    }

    /// Log and publish a failure, then hand the result back.
    fn report<T>(&self, context: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(err) = &result {
            log_api_error(err, context);
            self.telemetry.record_error(err, context);
        }
        result
    }

    /// True if `handle` currently resolves in its kind's table.
    pub fn handle_is_valid<K: TrackedKind>(&self, handle: Handle<K>) -> bool {
        self.table::<K>()
            .map(|table| table.is_tracked(handle))
            .unwrap_or(false)
    }

    /// Drop the table's reference. A second release fails with `InvalidHandle`.
    pub fn handle_release<K: TrackedKind>(&self, handle: Handle<K>) -> Result<(), ApiError> {
        let result = self.table::<K>().and_then(|table| table.release(handle));
        if result.is_ok() {
            self.telemetry.record_handle(K::NAME, HandleOperation::Released);
        }
        self.report("handle_release", result)
    }

    // ========================================================================
    // RECOGNIZERS AND MODULES
    // ========================================================================

    /// Resolve a module object through the root factory.
    pub fn create_module_object(
        &self,
        class_name: &str,
        interface_name: &str,
    ) -> Option<ModuleObject> {
        let object = self.factory.create(class_name, interface_name);
        if object.is_none() {
            log::debug!(
                "[SpeechContext] no module provides {} as {}",
                class_name,
                interface_name
            );
        }
        object
    }

    /// Create a recognizer backed by a transport session.
    pub fn create_session_recognizer(
        &self,
        name: &str,
    ) -> Result<Handle<RecognizerKind>, ApiError> {
        let result = ApiError::require_non_empty(name, "name").and_then(|_| {
            let transport = self
                .create_module_object(LOOPBACK_TRANSPORT_CLASS, TRANSPORT_INTERFACE)
                .and_then(ModuleObject::into_interface::<dyn Transport>)
                .ok_or(ApiError::CapabilityUnsupported {
                    capability: "transport",
                })?;
            let recognizer = SessionRecognizer::new(name, transport);
            log::info!(
                "[SpeechContext] created recognizer '{}' on session {}",
                name,
                recognizer.session().session_id()
            );
            self.track::<RecognizerKind>(Arc::new(recognizer))
        });
        self.report("create_session_recognizer", result)
    }

    /// Create an offline keyword recognizer. It offers no explicit connection.
    pub fn create_keyword_recognizer(
        &self,
        keyword: &str,
    ) -> Result<Handle<RecognizerKind>, ApiError> {
        let result = ApiError::require_non_empty(keyword, "keyword").and_then(|_| {
            let recognizer = KeywordRecognizer::new("keyword", keyword);
            self.track::<RecognizerKind>(Arc::new(recognizer))
        });
        self.report("create_keyword_recognizer", result)
    }

    // ========================================================================
    // CONNECTION
    // ========================================================================

    /// Derive the connection of a recognizer that supports explicit connections.
    pub fn connection_from_recognizer(
        &self,
        recognizer: Handle<RecognizerKind>,
    ) -> Result<Handle<ConnectionKind>, ApiError> {
        let result = self.get(recognizer).and_then(|recognizer| {
            let source = require::<dyn ConnectionFromRecognizer, _>(&recognizer)?;
            self.track::<ConnectionKind>(source.connection())
        });
        self.report("connection_from_recognizer", result)
    }

    pub fn connection_open(
        &self,
        connection: Handle<ConnectionKind>,
        for_continuous_mode: bool,
    ) -> Result<(), ApiError> {
        let result = self
            .get(connection)
            .and_then(|connection| connection.open(for_continuous_mode));
        self.report("connection_open", result)
    }

    pub fn connection_close(&self, connection: Handle<ConnectionKind>) -> Result<(), ApiError> {
        let result = self
            .get(connection)
            .and_then(|connection| connection.close());
        self.report("connection_close", result)
    }

    pub fn connection_state(
        &self,
        connection: Handle<ConnectionKind>,
    ) -> Result<ConnectionState, ApiError> {
        let result = self.get(connection).map(|connection| connection.state());
        self.report("connection_state", result)
    }

    fn message_params(
        &self,
        connection: Handle<ConnectionKind>,
    ) -> Result<Arc<dyn MessageParamFromUser>, ApiError> {
        let connection = self.get(connection)?;
        require::<dyn MessageParamFromUser, _>(&connection)
    }

    /// Attach `name=value` to later messages on `path`.
    pub fn connection_set_message_property(
        &self,
        connection: Handle<ConnectionKind>,
        path: &str,
        name: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        let result = ApiError::require_non_empty(path, "path")
            .and_then(|_| ApiError::require_non_empty(name, "name"))
            .and_then(|_| ApiError::require_non_empty(value, "value"))
            .and_then(|_| self.message_params(connection))
            .and_then(|params| params.set_parameter(path, name, value));
        self.report("connection_set_message_property", result)
    }

    /// Send a text message on `path`.
    pub fn connection_send_message(
        &self,
        connection: Handle<ConnectionKind>,
        path: &str,
        payload: &str,
    ) -> Result<(), ApiError> {
        let result = ApiError::require_non_empty(payload, "payload")
            .and_then(|_| ApiError::require_non_empty(path, "path"))
            .and_then(|_| self.message_params(connection))
            .and_then(|params| {
                params.send_network_message(path, MessagePayload::Text(payload.to_string()))
            });
        self.report("connection_send_message", result)
    }

    /// Send a binary message on `path`. An empty payload is allowed.
    pub fn connection_send_message_data(
        &self,
        connection: Handle<ConnectionKind>,
        path: &str,
        data: &[u8],
    ) -> Result<(), ApiError> {
        let result = ApiError::require_non_empty(path, "path")
            .and_then(|_| self.message_params(connection))
            .and_then(|params| {
                params.send_network_message(path, MessagePayload::Binary(data.to_vec()))
            });
        self.report("connection_send_message_data", result)
    }

    // ========================================================================
    // EVENT SUBSCRIPTION
    // ========================================================================

    fn wrap_connection_event(
        &self,
        state: ConnectionState,
        handler: ConnectionEventHandler,
    ) -> Result<ConnectionCallback, ApiError> {
        let table = self.table::<ConnectionEventKind>()?;
        let telemetry = Arc::clone(&self.telemetry);
        Ok(Arc::new(move |args: Arc<ConnectionEventArgs>| {
            telemetry.record_connection_state(args.session_id(), state);
            match table.track(args) {
                Ok(handle) => {
                    telemetry.record_handle(ConnectionEventKind::NAME, HandleOperation::Tracked);
                    handler(handle);
                }
                Err(err) => log_api_error(&err, "connection_event"),
            }
        }))
    }

    fn wrap_message_event(&self, handler: MessageEventHandler) -> Result<MessageCallback, ApiError> {
        let table = self.table::<ConnectionMessageEventKind>()?;
        let telemetry = Arc::clone(&self.telemetry);
        Ok(Arc::new(move |args: Arc<ConnectionMessageEventArgs>| {
            let message = args.message();
            telemetry.record_message(message.path(), message.payload_size());
            match table.track(args) {
                Ok(handle) => {
                    telemetry.record_handle(
                        ConnectionMessageEventKind::NAME,
                        HandleOperation::Tracked,
                    );
                    handler(handle);
                }
                Err(err) => log_api_error(&err, "connection_message_event"),
            }
        }))
    }

    /// Replace the Connected handler. `None` clears it.
    pub fn connection_set_connected_callback(
        &self,
        connection: Handle<ConnectionKind>,
        handler: Option<ConnectionEventHandler>,
    ) -> Result<(), ApiError> {
        let result = self.get(connection).and_then(|connection| {
            let callback = handler
                .map(|handler| self.wrap_connection_event(ConnectionState::Open, handler))
                .transpose()?;
            connection.set_connected_callback(callback);
            Ok(())
        });
        self.report("connection_connected_set_callback", result)
    }

    /// Replace the Disconnected handler. `None` clears it.
    pub fn connection_set_disconnected_callback(
        &self,
        connection: Handle<ConnectionKind>,
        handler: Option<ConnectionEventHandler>,
    ) -> Result<(), ApiError> {
        let result = self.get(connection).and_then(|connection| {
            let callback = handler
                .map(|handler| self.wrap_connection_event(ConnectionState::Closed, handler))
                .transpose()?;
            connection.set_disconnected_callback(callback);
            Ok(())
        });
        self.report("connection_disconnected_set_callback", result)
    }

    /// Replace the MessageReceived handler. `None` clears it.
    pub fn connection_set_message_received_callback(
        &self,
        connection: Handle<ConnectionKind>,
        handler: Option<MessageEventHandler>,
    ) -> Result<(), ApiError> {
        let result = self.get(connection).and_then(|connection| {
            let callback = handler
                .map(|handler| self.wrap_message_event(handler))
                .transpose()?;
            connection.set_message_received_callback(callback);
            Ok(())
        });
        self.report("connection_message_received_set_callback", result)
    }

    // ========================================================================
    // EVENTS, MESSAGES AND PROPERTY BAGS
    // ========================================================================

    pub fn connection_event_session_id(
        &self,
        event: Handle<ConnectionEventKind>,
    ) -> Result<String, ApiError> {
        let result = self.get(event).map(|args| args.session_id().to_string());
        self.report("connection_event_session_id", result)
    }

    /// Track the message carried by a MessageReceived event.
    pub fn connection_message_received_event_get_message(
        &self,
        event: Handle<ConnectionMessageEventKind>,
    ) -> Result<Handle<ConnectionMessageKind>, ApiError> {
        let result = self
            .get(event)
            .and_then(|args| self.track::<ConnectionMessageKind>(args.message()));
        self.report("connection_message_received_event_get_message", result)
    }

    /// Track the property bag attached to a message.
    pub fn connection_message_get_property_bag(
        &self,
        message: Handle<ConnectionMessageKind>,
    ) -> Result<Handle<PropertyBagKind>, ApiError> {
        let result = self.get(message).and_then(|message| {
            let properties = require::<dyn NamedProperties, _>(&message)?;
            self.track::<PropertyBagKind>(properties)
        });
        self.report("connection_message_get_property_bag", result)
    }

    /// Copy the first `size` payload bytes into `destination`.
    pub fn connection_message_get_data(
        &self,
        message: Handle<ConnectionMessageKind>,
        destination: &mut [u8],
        size: usize,
    ) -> Result<(), ApiError> {
        let result = self
            .get(message)
            .and_then(|message| copy_payload(message.as_ref(), destination, size));
        self.report("connection_message_get_data", result)
    }

    pub fn connection_message_get_data_size(
        &self,
        message: Handle<ConnectionMessageKind>,
    ) -> Result<u32, ApiError> {
        let result = self.get(message).map(|message| message.payload_size());
        self.report("connection_message_get_data_size", result)
    }

    pub fn property_bag_get(
        &self,
        bag: Handle<PropertyBagKind>,
        name: &str,
    ) -> Result<Option<String>, ApiError> {
        let result = ApiError::require_non_empty(name, "name")
            .and_then(|_| self.get(bag))
            .map(|bag| bag.get(name));
        self.report("property_bag_get", result)
    }

    pub fn property_bag_set(
        &self,
        bag: Handle<PropertyBagKind>,
        name: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        let result = ApiError::require_non_empty(name, "name")
            .and_then(|_| self.get(bag))
            .map(|bag| bag.set(name, value));
        self.report("property_bag_set", result)
    }
}

impl Default for SpeechContext {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}
