// Message, event and property bag entry points

use std::ffi::{c_char, CString};

use super::{
    context, guard_status, guard_value, handle_lifecycle, read_str, write_out,
    ConnectionMessageEventHandle, ConnectionMessageHandle, PropertyBagHandle,
};
use crate::error::{ApiError, StatusCode};

handle_lifecycle!(
    connection_message_handle_is_valid,
    connection_message_handle_release,
    ConnectionMessageHandle
);
handle_lifecycle!(
    property_bag_handle_is_valid,
    property_bag_handle_release,
    PropertyBagHandle
);

/// # Safety
/// `message` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn connection_message_received_event_get_message(
    event: ConnectionMessageEventHandle,
    message: *mut ConnectionMessageHandle,
) -> StatusCode {
    guard_status("connection_message_received_event_get_message", || {
        write_out(message, ConnectionMessageHandle::INVALID)?;
        let handle = context().connection_message_received_event_get_message(event)?;
        write_out(message, handle)
    })
}

/// # Safety
/// `bag` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn connection_message_get_property_bag(
    message: ConnectionMessageHandle,
    bag: *mut PropertyBagHandle,
) -> StatusCode {
    guard_status("connection_message_get_property_bag", || {
        write_out(bag, PropertyBagHandle::INVALID)?;
        let handle = context().connection_message_get_property_bag(message)?;
        write_out(bag, handle)
    })
}

/// Copy `size` payload bytes into `data`. `OutOfRange` if `size` exceeds the
/// payload; nothing is written in that case.
///
/// # Safety
/// `data` must be null or valid for `size` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn connection_message_get_data(
    message: ConnectionMessageHandle,
    data: *mut u8,
    size: u32,
) -> StatusCode {
    guard_status("connection_message_get_data", || {
        if data.is_null() {
            return Err(ApiError::InvalidArgument { name: "data" });
        }
        let size = size as usize;
        let destination = std::slice::from_raw_parts_mut(data, size);
        context().connection_message_get_data(message, destination, size)
    })
}

/// Payload length in bytes, or `0` if the handle is invalid.
#[no_mangle]
pub extern "C" fn connection_message_get_data_size(message: ConnectionMessageHandle) -> u32 {
    guard_value("connection_message_get_data_size", 0, || {
        context().connection_message_get_data_size(message)
    })
}

/// Look up `name`. Returns a string to free with [`property_bag_free_string`]:
/// the value, else a copy of `default_value`, else null.
///
/// # Safety
/// String arguments must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn property_bag_get_string(
    bag: PropertyBagHandle,
    name: *const c_char,
    default_value: *const c_char,
) -> *mut c_char {
    guard_value("property_bag_get_string", std::ptr::null_mut(), || {
        let name = read_str(name, "name")?;
        let value = match context().property_bag_get(bag, name)? {
            Some(value) => value,
            None if default_value.is_null() => return Ok(std::ptr::null_mut()),
            None => read_str(default_value, "default_value")?.to_string(),
        };
        let value = CString::new(value).map_err(|_| ApiError::InvalidState {
            reason: format!("property '{}' contains an interior NUL", name),
        })?;
        Ok(value.into_raw())
    })
}

/// # Safety
/// String arguments must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn property_bag_set_string(
    bag: PropertyBagHandle,
    name: *const c_char,
    value: *const c_char,
) -> StatusCode {
    guard_status("property_bag_set_string", || {
        let name = read_str(name, "name")?;
        let value = read_str(value, "value")?;
        context().property_bag_set(bag, name, value)
    })
}

/// Free a string returned by [`property_bag_get_string`]. Null is ignored.
///
/// # Safety
/// `value` must be null or a pointer from `property_bag_get_string` not yet freed.
#[no_mangle]
pub unsafe extern "C" fn property_bag_free_string(value: *mut c_char) -> StatusCode {
    guard_status("property_bag_free_string", || {
        if !value.is_null() {
            drop(CString::from_raw(value));
        }
        Ok(())
    })
}
