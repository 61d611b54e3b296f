//! Telemetry event types describing bridge activity exposed to the CLI and
//! to in-process subscribers.

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionState;

/// What happened to a handle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandleOperation {
    Tracked,
    Released,
}

/// Bridge lifecycle stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    ContextCreated,
    LoggingInitialized,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BridgeEvent {
    Handle {
        kind: String,
        operation: HandleOperation,
    },
    Connection {
        session_id: String,
        state: ConnectionState,
    },
    Message {
        path: String,
        size: u32,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
    Error {
        code: i32,
        context: String,
    },
}
