//! Shutdown through the C ABI
//!
//! Kept in its own test binary: shutdown releases every handle of the
//! process-wide context.

use std::ffi::CString;

use speech_bridge::ffi::*;
use speech_bridge::StatusCode;

#[test]
fn test_shutdown_invalidates_outstanding_handles() {
    let name = CString::new("shutdown").unwrap();
    let mut recognizer = RecognizerHandle::INVALID;
    let mut connection = ConnectionHandle::INVALID;
    unsafe {
        assert_eq!(
            recognizer_create_session(name.as_ptr(), &mut recognizer),
            StatusCode::Success
        );
        assert_eq!(
            connection_from_recognizer(recognizer, &mut connection),
            StatusCode::Success
        );
    }
    assert_eq!(connection_open(connection, false), StatusCode::Success);

    assert_eq!(speech_bridge_shutdown(), StatusCode::Success);
    assert!(!recognizer_handle_is_valid(recognizer));
    assert!(!connection_handle_is_valid(connection));
    assert_eq!(connection_close(connection), StatusCode::InvalidHandle);
    assert!(context().live_handles().values().all(|&count| count == 0));

    // New handles can be issued afterwards
    unsafe {
        assert_eq!(
            recognizer_create_keyword(name.as_ptr(), &mut recognizer),
            StatusCode::Success
        );
    }
    assert!(recognizer_handle_is_valid(recognizer));
}
