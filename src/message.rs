// Connection messages: immutable payload plus property bag

use std::any::TypeId;
use std::sync::Arc;

use crate::capability::{Capability, InterfaceView, QueryInterface};
use crate::error::ApiError;
use crate::interface_map;
use crate::properties::{NamedProperties, PropertyBag};

pub const PATH_PROPERTY: &str = "Path";
pub const CONTENT_TYPE_PROPERTY: &str = "Content-Type";

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Outbound or inbound message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    Text(String),
    Binary(Vec<u8>),
}

impl MessagePayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MessagePayload::Text(text) => text.as_bytes(),
            MessagePayload::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_text(&self) -> bool {
        matches!(self, MessagePayload::Text(_))
    }

    pub fn content_type(&self) -> &'static str {
        if self.is_text() {
            TEXT_CONTENT_TYPE
        } else {
            BINARY_CONTENT_TYPE
        }
    }
}

/// A message received on a connection.
pub trait ConnectionMessage: QueryInterface {
    fn path(&self) -> &str;

    fn payload(&self) -> &[u8];

    fn is_text(&self) -> bool;

    /// True payload length. Saturates at `u32::MAX`.
    fn payload_size(&self) -> u32 {
        u32::try_from(self.payload().len()).unwrap_or(u32::MAX)
    }
}

impl Capability for dyn ConnectionMessage {
    const NAME: &'static str = "connection message";
}

/// Message snapshot created by a transport on receipt.
#[derive(Debug)]
pub struct ReceivedMessage {
    path: String,
    payload: MessagePayload,
    properties: PropertyBag,
}

impl ReceivedMessage {
    /// Build a message; `Path` and `Content-Type` are always set, caller
    /// headers are added after them in order.
    pub fn new<I>(path: &str, payload: MessagePayload, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let properties = PropertyBag::new();
        properties.set(PATH_PROPERTY, path);
        properties.set(CONTENT_TYPE_PROPERTY, payload.content_type());
        for (name, value) in headers {
            properties.set(&name, &value);
        }

        Self {
            path: path.to_string(),
            payload,
            properties,
        }
    }

    pub fn text(path: &str, text: &str) -> Self {
        Self::new(path, MessagePayload::Text(text.to_string()), Vec::new())
    }

    pub fn binary(path: &str, bytes: Vec<u8>) -> Self {
        Self::new(path, MessagePayload::Binary(bytes), Vec::new())
    }
}

impl ConnectionMessage for ReceivedMessage {
    fn path(&self) -> &str {
        &self.path
    }

    fn payload(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    fn is_text(&self) -> bool {
        self.payload.is_text()
    }
}

impl NamedProperties for ReceivedMessage {
    fn get(&self, name: &str) -> Option<String> {
        self.properties.get(name)
    }

    fn set(&self, name: &str, value: &str) {
        self.properties.set(name, value)
    }

    fn names(&self) -> Vec<String> {
        self.properties.names()
    }
}

impl QueryInterface for ReceivedMessage {
    fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
        interface_map!(self, interface; dyn ConnectionMessage, dyn NamedProperties)
    }
}

/// Copy the first `requested` payload bytes into `destination`.
///
/// Fails with `OutOfRange`, leaving `destination` untouched, when `requested`
/// exceeds the payload or the destination.
pub fn copy_payload(
    message: &dyn ConnectionMessage,
    destination: &mut [u8],
    requested: usize,
) -> Result<(), ApiError> {
    let payload = message.payload();
    if requested > payload.len() {
        return Err(ApiError::OutOfRange {
            requested,
            available: payload.len(),
        });
    }
    if requested > destination.len() {
        return Err(ApiError::OutOfRange {
            requested,
            available: destination.len(),
        });
    }

    destination[..requested].copy_from_slice(&payload[..requested]);
    Ok(())
}
