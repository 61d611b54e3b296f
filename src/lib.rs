// Speech Bridge - handle-based C ABI for speech engine objects
// Opaque handles, runtime capability query and explicit connections

// Module declarations
pub mod adapters;
pub mod capability;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod factory;
pub mod ffi;
pub mod handles;
pub mod message;
pub mod properties;
pub mod recognizer;
pub mod telemetry;
pub mod transport;

// Re-exports for convenience
pub use capability::{query, require, Capability, QueryInterface};
pub use config::BridgeConfig;
pub use context::SpeechContext;
pub use error::{ApiError, ErrorCode, StatusCode, TransportError};
pub use handles::{Handle, HandleTable, HandleTableRegistry, TrackedKind};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter`. `log` records are captured too.
/// Output goes to stderr. Calling again is harmless: the first subscriber
/// stays installed.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => log::info!("[SpeechBridge] logging initialized"),
        Err(err) => log::debug!("[SpeechBridge] logging already initialized: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_idempotent() {
        init_logging("debug");
        init_logging("info");
    }
}
