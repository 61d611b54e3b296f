// Transport error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Transport error code constants
///
/// Error code range: 2001-2004
pub struct TransportErrorCodes {}

impl TransportErrorCodes {
    /// The transport could not complete its open sequence
    pub const OPEN_FAILED: i32 = 2001;

    /// A message could not be handed to the transport
    pub const SEND_FAILED: i32 = 2002;

    /// The operation needs an open transport
    pub const NOT_CONNECTED: i32 = 2003;

    /// The transport dispatch worker has shut down
    pub const SHUTDOWN: i32 = 2004;
}

/// Errors raised by a transport implementation.
///
/// Transports are external collaborators; these errors never cross the
/// boundary directly and are folded into [`crate::error::ApiError`] first.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Open sequence failed
    OpenFailed { reason: String },

    /// Send was rejected by the transport
    SendFailed { path: String, reason: String },

    /// Transport is not connected
    NotConnected,

    /// Dispatch worker is gone
    Shutdown,
}

impl ErrorCode for TransportError {
    fn code(&self) -> i32 {
        match self {
            TransportError::OpenFailed { .. } => TransportErrorCodes::OPEN_FAILED,
            TransportError::SendFailed { .. } => TransportErrorCodes::SEND_FAILED,
            TransportError::NotConnected => TransportErrorCodes::NOT_CONNECTED,
            TransportError::Shutdown => TransportErrorCodes::SHUTDOWN,
        }
    }

    fn message(&self) -> String {
        match self {
            TransportError::OpenFailed { reason } => {
                format!("Transport failed to open: {}", reason)
            }
            TransportError::SendFailed { path, reason } => {
                format!("Failed to send message on path '{}': {}", path, reason)
            }
            TransportError::NotConnected => {
                "Transport not connected. Open the connection first.".to_string()
            }
            TransportError::Shutdown => "Transport dispatch worker has shut down".to_string(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransportError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TransportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_codes() {
        assert_eq!(
            TransportError::OpenFailed {
                reason: "test".to_string()
            }
            .code(),
            TransportErrorCodes::OPEN_FAILED
        );
        assert_eq!(
            TransportError::SendFailed {
                path: "speech.context".to_string(),
                reason: "test".to_string()
            }
            .code(),
            TransportErrorCodes::SEND_FAILED
        );
        assert_eq!(
            TransportError::NotConnected.code(),
            TransportErrorCodes::NOT_CONNECTED
        );
        assert_eq!(TransportError::Shutdown.code(), TransportErrorCodes::SHUTDOWN);
    }

    #[test]
    fn test_transport_error_messages() {
        let err = TransportError::SendFailed {
            path: "speech.context".to_string(),
            reason: "queue closed".to_string(),
        };
        assert!(err.message().contains("speech.context"));
        assert!(err.message().contains("queue closed"));

        let display = format!("{}", TransportError::NotConnected);
        assert!(display.contains("TransportError"));
        assert!(display.contains("2003"));
    }
}
