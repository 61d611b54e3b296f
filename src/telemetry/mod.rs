//! Bridge telemetry collector and helpers.
//!
//! The collector multiplexes handle, connection, message, and lifecycle events
//! into a bounded history plus an async broadcast stream. Per-kind handle
//! counters back the `live_handles` style diagnostics printed by `spx_diag`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::connection::ConnectionState;
use crate::error::{ApiError, ErrorCode};

pub mod events;

pub use events::{BridgeEvent, HandleOperation, LifecyclePhase};

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<BridgeEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub handles: BTreeMap<String, HandleCounters>,
}

/// Lifetime handle counts for one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HandleCounters {
    pub tracked: u64,
    pub released: u64,
}

/// Broadcast-based collector retaining a bounded history of events.
pub struct TelemetryCollector {
    tx: broadcast::Sender<BridgeEvent>,
    history: Mutex<VecDeque<BridgeEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: BridgeEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = lock_recovering(&self.history);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a stream; lagged gaps are skipped.
    pub fn stream(&self) -> impl Stream<Item = BridgeEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|result| async move { result.ok() })
    }

    fn recent(&self) -> Vec<BridgeEvent> {
        lock_recovering(&self.history).iter().cloned().collect()
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Top-level hub wrapping the collector plus per-kind handle counters.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    handles: Mutex<BTreeMap<String, HandleCounters>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            handles: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            recent: self.collector.recent(),
            total_events: self.collector.total_events.load(Ordering::Relaxed),
            dropped_events: self.collector.dropped_history.load(Ordering::Relaxed),
            handles: lock_recovering(&self.handles).clone(),
        }
    }

    pub fn record_handle(&self, kind: &str, operation: HandleOperation) {
        {
            let mut handles = lock_recovering(&self.handles);
            let counters = handles.entry(kind.to_string()).or_default();
            match operation {
                HandleOperation::Tracked => counters.tracked += 1,
                HandleOperation::Released => counters.released += 1,
            }
        }
        self.collector.publish(BridgeEvent::Handle {
            kind: kind.to_string(),
            operation,
        });
    }

    pub fn record_connection_state(&self, session_id: &str, state: ConnectionState) {
        self.collector.publish(BridgeEvent::Connection {
            session_id: session_id.to_string(),
            state,
        });
    }

    pub fn record_message(&self, path: &str, size: u32) {
        self.collector.publish(BridgeEvent::Message {
            path: path.to_string(),
            size,
        });
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.collector.publish(BridgeEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_error(&self, err: &ApiError, context: impl Into<String>) {
        self.collector.publish(BridgeEvent::Error {
            code: err.code(),
            context: context.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
