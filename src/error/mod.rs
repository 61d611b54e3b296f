// Error types for the speech bridge
//
// This module defines the error taxonomy shared by the handle tables, the
// connection state machine and the C ABI layer. Every error carries a
// numeric code suitable for crossing the FFI boundary.

mod api;
mod transport;

pub use api::{log_api_error, ApiError, ApiErrorCodes, StatusCode};
pub use transport::{TransportError, TransportErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the FFI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
