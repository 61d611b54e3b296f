// Boundary error types and status codes

use crate::error::{ErrorCode, TransportError};
use log::error;
use std::fmt;

/// Status code constants returned across the C ABI
///
/// These constants are the single source of truth for the numeric values
/// callers see. `0` is success; failures use the 1001-1006 range.
pub struct ApiErrorCodes {}

impl ApiErrorCodes {
    /// Operation completed
    pub const SUCCESS: i32 = 0;

    /// Null or empty required argument
    pub const INVALID_ARGUMENT: i32 = 1001;

    /// Handle absent, of the wrong kind, or already released
    pub const INVALID_HANDLE: i32 = 1002;

    /// Object exists but does not implement the requested capability
    pub const CAPABILITY_UNSUPPORTED: i32 = 1003;

    /// Requested length exceeds the available data
    pub const OUT_OF_RANGE: i32 = 1004;

    /// Operation not valid in the object's current state
    pub const INVALID_STATE: i32 = 1005;

    /// Internal fault with no closer match
    pub const RUNTIME_ERROR: i32 = 1006;
}

/// Status code returned by every `extern "C"` entry point.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StatusCode {
    Success = ApiErrorCodes::SUCCESS,
    InvalidArgument = ApiErrorCodes::INVALID_ARGUMENT,
    InvalidHandle = ApiErrorCodes::INVALID_HANDLE,
    CapabilityUnsupported = ApiErrorCodes::CAPABILITY_UNSUPPORTED,
    OutOfRange = ApiErrorCodes::OUT_OF_RANGE,
    InvalidState = ApiErrorCodes::INVALID_STATE,
    RuntimeError = ApiErrorCodes::RUNTIME_ERROR,
}

impl StatusCode {
    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }
}

impl From<&ApiError> for StatusCode {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::InvalidArgument { .. } => StatusCode::InvalidArgument,
            ApiError::InvalidHandle { .. } => StatusCode::InvalidHandle,
            ApiError::CapabilityUnsupported { .. } => StatusCode::CapabilityUnsupported,
            ApiError::OutOfRange { .. } => StatusCode::OutOfRange,
            ApiError::InvalidState { .. } => StatusCode::InvalidState,
            ApiError::LockPoisoned { .. } | ApiError::Transport { .. } => {
                StatusCode::RuntimeError
            }
        }
    }
}

impl<T> From<Result<T, ApiError>> for StatusCode {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(_) => StatusCode::Success,
            Err(err) => StatusCode::from(&err),
        }
    }
}

/// Log a boundary error with structured context
///
/// Logs the numeric code, the component and the message. Used by every
/// entry point that turns an error into a status code.
pub fn log_api_error(err: &ApiError, context: &str) {
    error!(
        "API error in {}: code={}, component=SpeechBridge, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors produced by handle resolution, capability dispatch and the
/// connection state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// A required argument was null or empty
    InvalidArgument { name: &'static str },

    /// Handle is unknown, of another kind, or already released
    InvalidHandle { kind: &'static str },

    /// The object does not offer the requested capability
    CapabilityUnsupported { capability: &'static str },

    /// Copy length exceeds the source or destination
    OutOfRange { requested: usize, available: usize },

    /// Operation rejected by the current lifecycle state
    InvalidState { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Transport collaborator failed
    Transport { source: TransportError },
}

impl ApiError {
    pub fn lock_poisoned(component: &str) -> Self {
        ApiError::LockPoisoned {
            component: component.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from(self)
    }

    /// `InvalidArgument` unless `value` is non-empty.
    pub fn require_non_empty(value: &str, name: &'static str) -> Result<(), ApiError> {
        if value.is_empty() {
            return Err(ApiError::InvalidArgument { name });
        }
        Ok(())
    }
}

impl ErrorCode for ApiError {
    fn code(&self) -> i32 {
        self.status() as i32
    }

    fn message(&self) -> String {
        match self {
            ApiError::InvalidArgument { name } => {
                format!("Argument '{}' must be non-null and non-empty", name)
            }
            ApiError::InvalidHandle { kind } => {
                format!("Invalid {} handle", kind)
            }
            ApiError::CapabilityUnsupported { capability } => {
                format!("Object does not support {}", capability)
            }
            ApiError::OutOfRange {
                requested,
                available,
            } => format!(
                "Requested {} bytes but only {} are available",
                requested, available
            ),
            ApiError::InvalidState { reason } => format!("Invalid state: {}", reason),
            ApiError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            ApiError::Transport { source } => source.message(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ApiError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport { source } => Some(source),
            _ => None,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotConnected => ApiError::InvalidState {
                reason: err.message(),
            },
            other => ApiError::Transport { source: other },
        }
    }
}
