//! C ABI surface.
//!
//! Every entry point resolves its handles against one process-wide
//! [`SpeechContext`], catches panics, and reports failures as [`StatusCode`]
//! values. Accessors that return a raw value return `0` or null on failure.

use std::ffi::{c_char, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::Lazy;

use crate::config::BridgeConfig;
use crate::context::SpeechContext;
use crate::error::{ApiError, StatusCode};
use crate::telemetry::LifecyclePhase;
use crate::handles::{
    ConnectionEventKind, ConnectionKind, ConnectionMessageEventKind, ConnectionMessageKind,
    Handle, PropertyBagKind, RecognizerKind,
};

mod connection;
mod message;
mod module;

pub use connection::*;
pub use message::*;
pub use module::*;

pub type RecognizerHandle = Handle<RecognizerKind>;
pub type ConnectionHandle = Handle<ConnectionKind>;
pub type ConnectionEventHandle = Handle<ConnectionEventKind>;
pub type ConnectionMessageEventHandle = Handle<ConnectionMessageEventKind>;
pub type ConnectionMessageHandle = Handle<ConnectionMessageKind>;
pub type PropertyBagHandle = Handle<PropertyBagKind>;

/// Context shared by every `extern "C"` entry point
static CONTEXT: Lazy<SpeechContext> = Lazy::new(|| SpeechContext::new(BridgeConfig::load()));

/// The context behind the C ABI.
pub fn context() -> &'static SpeechContext {
    &CONTEXT
}

/// Run `f`, mapping its result to a status code and any panic to `RuntimeError`.
pub(crate) fn guard_status<F>(operation: &str, f: F) -> StatusCode
where
    F: FnOnce() -> Result<(), ApiError>,
{
    guard_value(operation, StatusCode::RuntimeError, || {
        Ok(StatusCode::from(f()))
    })
}

/// Run `f`, returning `fallback` on error or panic.
pub(crate) fn guard_value<T, F>(operation: &str, fallback: T, f: F) -> T
where
    F: FnOnce() -> Result<T, ApiError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(_)) => fallback,
        Err(_) => {
            log::error!("[FFI] panic caught in {}", operation);
            fallback
        }
    }
}

/// Borrow a caller string. Null and invalid UTF-8 are `InvalidArgument`;
/// emptiness is checked by the operation itself.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn read_str<'a>(ptr: *const c_char, name: &'static str) -> Result<&'a str, ApiError> {
    if ptr.is_null() {
        return Err(ApiError::InvalidArgument { name });
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| ApiError::InvalidArgument { name })
}

/// Write through an out-parameter.
///
/// # Safety
/// `out` must be null or valid for writes.
pub(crate) unsafe fn write_out<T>(out: *mut T, value: T) -> Result<(), ApiError> {
    if out.is_null() {
        return Err(ApiError::InvalidArgument { name: "out" });
    }
    out.write(value);
    Ok(())
}

/// Caller context pointer handed back verbatim to callbacks.
#[derive(Clone, Copy)]
pub(crate) struct UserContext(*mut c_void);

// SAFETY: the pointer is never dereferenced here, only passed back to the
// caller's own callback, which owns whatever synchronization it needs.
unsafe impl Send for UserContext {}
unsafe impl Sync for UserContext {}

impl UserContext {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub(crate) fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

/// Generate `<kind>_handle_is_valid` / `<kind>_handle_release` for one kind.
macro_rules! handle_lifecycle {
    ($is_valid:ident, $release:ident, $handle:ty) => {
        #[no_mangle]
        pub extern "C" fn $is_valid(handle: $handle) -> bool {
            $crate::ffi::guard_value(stringify!($is_valid), false, || {
                Ok($crate::ffi::context().handle_is_valid(handle))
            })
        }

        #[no_mangle]
        pub extern "C" fn $release(handle: $handle) -> $crate::error::StatusCode {
            $crate::ffi::guard_status(stringify!($release), || {
                $crate::ffi::context().handle_release(handle)
            })
        }
    };
}

pub(crate) use handle_lifecycle;

/// Install the log subscriber using the configured filter.
#[no_mangle]
pub extern "C" fn speech_bridge_init_logging() -> StatusCode {
    guard_status("speech_bridge_init_logging", || {
        let context = context();
        crate::init_logging(&context.config().logging.filter);
        context
            .telemetry()
            .record_lifecycle(LifecyclePhase::LoggingInitialized);
        Ok(())
    })
}

/// Release every outstanding handle.
#[no_mangle]
pub extern "C" fn speech_bridge_shutdown() -> StatusCode {
    guard_status("speech_bridge_shutdown", || {
        context().shutdown();
        Ok(())
    })
}
