// Recognizer creation and module factory entry points

use std::ffi::{c_char, c_void};

use super::{context, guard_status, guard_value, handle_lifecycle, read_str, write_out, RecognizerHandle};
use crate::error::StatusCode;
use crate::factory::ModuleObject;

handle_lifecycle!(recognizer_handle_is_valid, recognizer_handle_release, RecognizerHandle);

/// Create a recognizer with its own transport session.
///
/// # Safety
/// `name` must be null or NUL-terminated; `recognizer` null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn recognizer_create_session(
    name: *const c_char,
    recognizer: *mut RecognizerHandle,
) -> StatusCode {
    guard_status("recognizer_create_session", || {
        write_out(recognizer, RecognizerHandle::INVALID)?;
        let name = read_str(name, "name")?;
        let handle = context().create_session_recognizer(name)?;
        write_out(recognizer, handle)
    })
}

/// Create an offline keyword recognizer (no explicit connection support).
///
/// # Safety
/// `keyword` must be null or NUL-terminated; `recognizer` null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn recognizer_create_keyword(
    keyword: *const c_char,
    recognizer: *mut RecognizerHandle,
) -> StatusCode {
    guard_status("recognizer_create_keyword", || {
        write_out(recognizer, RecognizerHandle::INVALID)?;
        let keyword = read_str(keyword, "keyword")?;
        let handle = context().create_keyword_recognizer(keyword)?;
        write_out(recognizer, handle)
    })
}

/// Construct `class_name` viewed as `interface_name`, or null if no module
/// provides that pair. Free a non-null result with [`module_object_release`].
///
/// # Safety
/// String arguments must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn create_module_object(
    class_name: *const c_char,
    interface_name: *const c_char,
) -> *mut c_void {
    guard_value("create_module_object", std::ptr::null_mut(), || {
        let class_name = read_str(class_name, "class_name")?;
        let interface_name = read_str(interface_name, "interface_name")?;
        Ok(context()
            .create_module_object(class_name, interface_name)
            .map(|object| Box::into_raw(Box::new(object)) as *mut c_void)
            .unwrap_or(std::ptr::null_mut()))
    })
}

/// Borrow the object behind a `create_module_object` pointer.
///
/// # Safety
/// `object` must be null or a live pointer from `create_module_object`.
pub unsafe fn module_object_ref<'a>(object: *const c_void) -> Option<&'a ModuleObject> {
    (object as *const ModuleObject).as_ref()
}

/// Drop an object returned by [`create_module_object`]. Null is ignored.
///
/// # Safety
/// `object` must be null or a pointer from `create_module_object` not yet released.
#[no_mangle]
pub unsafe extern "C" fn module_object_release(object: *mut c_void) -> StatusCode {
    guard_status("module_object_release", || {
        if !object.is_null() {
            drop(Box::from_raw(object as *mut ModuleObject));
        }
        Ok(())
    })
}
