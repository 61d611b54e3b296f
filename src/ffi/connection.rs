// Connection entry points

use std::ffi::{c_char, c_void};
use std::sync::Arc;

use super::{
    context, guard_status, handle_lifecycle, read_str, write_out, ConnectionEventHandle,
    ConnectionHandle, ConnectionMessageEventHandle, RecognizerHandle, UserContext,
};
use crate::context::{ConnectionEventHandler, MessageEventHandler};
use crate::error::{ApiError, StatusCode};

/// Connected/Disconnected callback: `(event handle, user context)`.
pub type ConnectionEventCallback = Option<extern "C" fn(ConnectionEventHandle, *mut c_void)>;

/// MessageReceived callback: `(event handle, user context)`.
pub type MessageEventCallback = Option<extern "C" fn(ConnectionMessageEventHandle, *mut c_void)>;

handle_lifecycle!(connection_handle_is_valid, connection_handle_release, ConnectionHandle);
handle_lifecycle!(
    connection_event_handle_is_valid,
    connection_event_handle_release,
    ConnectionEventHandle
);
handle_lifecycle!(
    connection_message_received_event_handle_is_valid,
    connection_message_received_event_handle_release,
    ConnectionMessageEventHandle
);

/// Derive the connection of `recognizer`. `*connection` is set to the invalid
/// handle before any check.
///
/// # Safety
/// `connection` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn connection_from_recognizer(
    recognizer: RecognizerHandle,
    connection: *mut ConnectionHandle,
) -> StatusCode {
    guard_status("connection_from_recognizer", || {
        write_out(connection, ConnectionHandle::INVALID)?;
        let handle = context().connection_from_recognizer(recognizer)?;
        write_out(connection, handle)
    })
}

#[no_mangle]
pub extern "C" fn connection_open(
    connection: ConnectionHandle,
    for_continuous_recognition: bool,
) -> StatusCode {
    guard_status("connection_open", || {
        context().connection_open(connection, for_continuous_recognition)
    })
}

#[no_mangle]
pub extern "C" fn connection_close(connection: ConnectionHandle) -> StatusCode {
    guard_status("connection_close", || context().connection_close(connection))
}

/// # Safety
/// String arguments must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn connection_set_message_property(
    connection: ConnectionHandle,
    path: *const c_char,
    name: *const c_char,
    value: *const c_char,
) -> StatusCode {
    guard_status("connection_set_message_property", || {
        let path = read_str(path, "path")?;
        let name = read_str(name, "name")?;
        let value = read_str(value, "value")?;
        context().connection_set_message_property(connection, path, name, value)
    })
}

/// # Safety
/// String arguments must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn connection_send_message(
    connection: ConnectionHandle,
    path: *const c_char,
    payload: *const c_char,
) -> StatusCode {
    guard_status("connection_send_message", || {
        let payload = read_str(payload, "payload")?;
        let path = read_str(path, "path")?;
        context().connection_send_message(connection, path, payload)
    })
}

/// # Safety
/// `path` must be null or NUL-terminated; `data` must be null or valid for
/// `size` bytes of reads.
#[no_mangle]
pub unsafe extern "C" fn connection_send_message_data(
    connection: ConnectionHandle,
    path: *const c_char,
    data: *const u8,
    size: u32,
) -> StatusCode {
    guard_status("connection_send_message_data", || {
        let path = read_str(path, "path")?;
        if data.is_null() {
            return Err(ApiError::InvalidArgument { name: "data" });
        }
        let data = std::slice::from_raw_parts(data, size as usize);
        context().connection_send_message_data(connection, path, data)
    })
}

fn connection_event_handler(
    callback: ConnectionEventCallback,
    user_context: *mut c_void,
) -> Option<ConnectionEventHandler> {
    let user = UserContext::new(user_context);
    callback.map(|callback| {
        Arc::new(move |event: ConnectionEventHandle| callback(event, user.as_ptr()))
            as ConnectionEventHandler
    })
}

/// Register (or with a null callback, clear) the Connected handler.
#[no_mangle]
pub extern "C" fn connection_connected_set_callback(
    connection: ConnectionHandle,
    callback: ConnectionEventCallback,
    user_context: *mut c_void,
) -> StatusCode {
    guard_status("connection_connected_set_callback", || {
        let handler = connection_event_handler(callback, user_context);
        context().connection_set_connected_callback(connection, handler)
    })
}

/// Register (or with a null callback, clear) the Disconnected handler.
#[no_mangle]
pub extern "C" fn connection_disconnected_set_callback(
    connection: ConnectionHandle,
    callback: ConnectionEventCallback,
    user_context: *mut c_void,
) -> StatusCode {
    guard_status("connection_disconnected_set_callback", || {
        let handler = connection_event_handler(callback, user_context);
        context().connection_set_disconnected_callback(connection, handler)
    })
}

/// Register (or with a null callback, clear) the MessageReceived handler.
#[no_mangle]
pub extern "C" fn connection_message_received_set_callback(
    connection: ConnectionHandle,
    callback: MessageEventCallback,
    user_context: *mut c_void,
) -> StatusCode {
    guard_status("connection_message_received_set_callback", || {
        let user = UserContext::new(user_context);
        let handler = callback.map(|callback| {
            Arc::new(move |event: ConnectionMessageEventHandle| callback(event, user.as_ptr()))
                as MessageEventHandler
        });
        context().connection_set_message_received_callback(connection, handler)
    })
}
