//! Integration tests for the C ABI
//!
//! Calls the `extern "C"` entry points the way a C caller would: raw
//! handles, out-parameters, NUL-terminated strings and a callback with an
//! opaque user context.

use std::ffi::{c_void, CStr, CString};
use std::ptr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

use speech_bridge::ffi::*;
use speech_bridge::StatusCode;

const TIMEOUT: Duration = Duration::from_secs(2);

fn c(text: &str) -> CString {
    CString::new(text).unwrap()
}

fn session_connection() -> (RecognizerHandle, ConnectionHandle) {
    let mut recognizer = RecognizerHandle::INVALID;
    let mut connection = ConnectionHandle::INVALID;
    unsafe {
        assert_eq!(
            recognizer_create_session(c("ffi").as_ptr(), &mut recognizer),
            StatusCode::Success
        );
        assert_eq!(
            connection_from_recognizer(recognizer, &mut connection),
            StatusCode::Success
        );
    }
    (recognizer, connection)
}

struct MessageSink {
    tx: Mutex<Sender<u64>>,
}

extern "C" fn on_message(event: ConnectionMessageEventHandle, user_context: *mut c_void) {
    let sink = unsafe { &*(user_context as *const MessageSink) };
    let _ = sink.tx.lock().unwrap().send(event.raw());
}

fn message_sink() -> (Box<MessageSink>, Receiver<u64>) {
    let (tx, rx) = mpsc::channel();
    (Box::new(MessageSink { tx: Mutex::new(tx) }), rx)
}

#[test]
fn test_handle_validity_and_release() {
    let (recognizer, connection) = session_connection();
    assert!(recognizer_handle_is_valid(recognizer));
    assert!(connection_handle_is_valid(connection));

    assert_eq!(connection_handle_release(connection), StatusCode::Success);
    assert!(!connection_handle_is_valid(connection));
    assert_eq!(
        connection_handle_release(connection),
        StatusCode::InvalidHandle
    );
    assert_eq!(recognizer_handle_release(recognizer), StatusCode::Success);
}

#[test]
fn test_sentinel_handles_are_invalid() {
    assert!(!connection_handle_is_valid(ConnectionHandle::INVALID));
    assert!(!property_bag_handle_is_valid(PropertyBagHandle::INVALID));
    assert_eq!(
        connection_open(ConnectionHandle::INVALID, false),
        StatusCode::InvalidHandle
    );
    assert_eq!(
        connection_message_get_data_size(ConnectionMessageHandle::INVALID),
        0
    );
}

#[test]
fn test_connection_from_keyword_recognizer_unsupported() {
    let mut recognizer = RecognizerHandle::INVALID;
    let mut connection = ConnectionHandle::from_raw(7);
    unsafe {
        assert_eq!(
            recognizer_create_keyword(c("computer").as_ptr(), &mut recognizer),
            StatusCode::Success
        );
        assert_eq!(
            connection_from_recognizer(recognizer, &mut connection),
            StatusCode::CapabilityUnsupported
        );
    }
    assert_eq!(connection, ConnectionHandle::INVALID);
}

#[test]
fn test_connection_from_released_recognizer_invalid() {
    let mut recognizer = RecognizerHandle::INVALID;
    let mut connection = ConnectionHandle::INVALID;
    unsafe {
        recognizer_create_session(c("gone").as_ptr(), &mut recognizer);
        assert_eq!(recognizer_handle_release(recognizer), StatusCode::Success);
        assert_eq!(
            connection_from_recognizer(recognizer, &mut connection),
            StatusCode::InvalidHandle
        );
    }
}

#[test]
fn test_null_and_empty_arguments() {
    let (_, connection) = session_connection();
    unsafe {
        assert_eq!(
            connection_from_recognizer(RecognizerHandle::INVALID, ptr::null_mut()),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            connection_set_message_property(
                connection,
                c("").as_ptr(),
                c("name").as_ptr(),
                c("value").as_ptr()
            ),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            connection_set_message_property(connection, ptr::null(), ptr::null(), ptr::null()),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            connection_send_message(connection, c("path").as_ptr(), ptr::null()),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            connection_send_message_data(connection, c("path").as_ptr(), ptr::null(), 4),
            StatusCode::InvalidArgument
        );
    }
}

#[test]
fn test_send_on_closed_connection_is_invalid_state() {
    let (_, connection) = session_connection();
    unsafe {
        assert_eq!(
            connection_send_message(connection, c("path").as_ptr(), c("hello").as_ptr()),
            StatusCode::InvalidState
        );
    }
}

#[test]
fn test_message_flow_through_callback() {
    let (_, connection) = session_connection();
    let (sink, rx) = message_sink();
    let user_context = &*sink as *const MessageSink as *mut c_void;

    unsafe {
        assert_eq!(
            connection_message_received_set_callback(connection, Some(on_message), user_context),
            StatusCode::Success
        );
        assert_eq!(
            connection_set_message_property(
                connection,
                c("speech.context").as_ptr(),
                c("X-Client").as_ptr(),
                c("ffi-test").as_ptr()
            ),
            StatusCode::Success
        );
        assert_eq!(connection_open(connection, false), StatusCode::Success);
        assert_eq!(
            connection_send_message(
                connection,
                c("speech.context").as_ptr(),
                c("hello").as_ptr()
            ),
            StatusCode::Success
        );
    }

    let event = ConnectionMessageEventHandle::from_raw(rx.recv_timeout(TIMEOUT).unwrap());
    assert!(connection_message_received_event_handle_is_valid(event));

    let mut message = ConnectionMessageHandle::INVALID;
    let mut bag = PropertyBagHandle::INVALID;
    unsafe {
        assert_eq!(
            connection_message_received_event_get_message(event, &mut message),
            StatusCode::Success
        );
        assert_eq!(connection_message_get_data_size(message), 5);

        let mut buffer = [0u8; 5];
        assert_eq!(
            connection_message_get_data(message, buffer.as_mut_ptr(), 5),
            StatusCode::Success
        );
        assert_eq!(&buffer, b"hello");

        let mut oversized = [0xFFu8; 6];
        assert_eq!(
            connection_message_get_data(message, oversized.as_mut_ptr(), 6),
            StatusCode::OutOfRange
        );
        assert_eq!(oversized, [0xFF; 6]);

        assert_eq!(
            connection_message_get_property_bag(message, &mut bag),
            StatusCode::Success
        );
        let value = property_bag_get_string(bag, c("X-Client").as_ptr(), ptr::null());
        assert!(!value.is_null());
        assert_eq!(CStr::from_ptr(value).to_str().unwrap(), "ffi-test");
        assert_eq!(property_bag_free_string(value), StatusCode::Success);

        let missing = property_bag_get_string(bag, c("Missing").as_ptr(), ptr::null());
        assert!(missing.is_null());
        let defaulted =
            property_bag_get_string(bag, c("Missing").as_ptr(), c("fallback").as_ptr());
        assert_eq!(CStr::from_ptr(defaulted).to_str().unwrap(), "fallback");
        property_bag_free_string(defaulted);

        assert_eq!(
            property_bag_set_string(bag, c("Note").as_ptr(), c("added").as_ptr()),
            StatusCode::Success
        );
    }

    assert_eq!(property_bag_handle_release(bag), StatusCode::Success);
    assert_eq!(connection_message_handle_release(message), StatusCode::Success);
    assert_eq!(
        connection_message_received_event_handle_release(event),
        StatusCode::Success
    );
    assert_eq!(connection_close(connection), StatusCode::Success);
    assert_eq!(
        connection_message_received_set_callback(connection, None, ptr::null_mut()),
        StatusCode::Success
    );
    drop(sink);
}

#[test]
fn test_binary_send() {
    let (_, connection) = session_connection();
    assert_eq!(connection_open(connection, true), StatusCode::Success);
    let data = [1u8, 2, 3];
    unsafe {
        assert_eq!(
            connection_send_message_data(connection, c("audio").as_ptr(), data.as_ptr(), 3),
            StatusCode::Success
        );
    }
    assert_eq!(connection_close(connection), StatusCode::Success);
}

#[test]
fn test_logging_init_is_repeatable() {
    assert_eq!(speech_bridge_init_logging(), StatusCode::Success);
    assert_eq!(speech_bridge_init_logging(), StatusCode::Success);
}
