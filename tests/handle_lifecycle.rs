//! Integration tests for handle tables and the registry
//!
//! Covers the lifetime guarantees callers rely on:
//! - Never-issued and sentinel handles fail to resolve and to release
//! - A tracked object resolves to the same allocation
//! - Double release is observable and leaves other handles alone
//! - Tokens of one kind never resolve as another
//! - Concurrent track/resolve/release keeps the table consistent

use std::sync::Arc;
use std::thread;

use speech_bridge::connection::ConnectionEventArgs;
use speech_bridge::handles::{ConnectionEventKind, PropertyBagKind, TokenAllocator};
use speech_bridge::properties::{NamedProperties, PropertyBag};
use speech_bridge::{ApiError, Handle, HandleTableRegistry};

fn bag(value: &str) -> Arc<dyn NamedProperties> {
    Arc::new(PropertyBag::from_pairs([("value", value)]))
}

#[test]
fn test_never_issued_handles_fail() {
    let registry = HandleTableRegistry::new();
    let table = registry.table_for::<PropertyBagKind>().unwrap();

    for raw in [0u64, 1, 42, u64::MAX, 0x0106_0000_0000_0001] {
        let handle = Handle::<PropertyBagKind>::from_raw(raw);
        assert!(table.resolve(handle).is_none());
        assert_eq!(
            table.release(handle),
            Err(ApiError::InvalidHandle {
                kind: "property bag"
            })
        );
    }
}

#[test]
fn test_resolve_returns_same_object() {
    let registry = HandleTableRegistry::new();
    let table = registry.table_for::<PropertyBagKind>().unwrap();

    let object = bag("a");
    let handle = table.track(Arc::clone(&object)).unwrap();
    let resolved = table.resolve(handle).unwrap();
    assert!(Arc::ptr_eq(&object, &resolved));
}

#[test]
fn test_double_release_does_not_affect_others() {
    let registry = HandleTableRegistry::new();
    let table = registry.table_for::<PropertyBagKind>().unwrap();

    let first = table.track(bag("first")).unwrap();
    let second = table.track(bag("second")).unwrap();

    table.release(first).unwrap();
    assert!(table.release(first).is_err());
    assert_eq!(
        table.resolve(second).unwrap().get("value").as_deref(),
        Some("second")
    );
}

#[test]
fn test_release_keeps_object_alive_for_other_owners() {
    let registry = HandleTableRegistry::new();
    let table = registry.table_for::<PropertyBagKind>().unwrap();

    let object = bag("shared");
    let handle = table.track(Arc::clone(&object)).unwrap();
    assert_eq!(Arc::strong_count(&object), 2);

    table.release(handle).unwrap();
    assert_eq!(Arc::strong_count(&object), 1);
    assert_eq!(object.get("value").as_deref(), Some("shared"));
}

#[test]
fn test_token_of_other_kind_rejected() {
    let registry = HandleTableRegistry::new();
    let bags = registry.table_for::<PropertyBagKind>().unwrap();
    let events = registry.table_for::<ConnectionEventKind>().unwrap();

    let bag_handle = bags.track(bag("x")).unwrap();
    let event_handle = events
        .track(Arc::new(ConnectionEventArgs::connected("s")))
        .unwrap();

    let forged = Handle::<ConnectionEventKind>::from_raw(bag_handle.raw());
    assert!(events.resolve(forged).is_none());
    assert!(events.release(forged).is_err());

    // Both originals untouched
    assert!(bags.is_tracked(bag_handle));
    assert!(events.is_tracked(event_handle));
}

#[test]
fn test_handles_never_reused() {
    let registry = HandleTableRegistry::with_allocator(TokenAllocator::with_salt(0));
    let table = registry.table_for::<PropertyBagKind>().unwrap();

    let first = table.track(bag("a")).unwrap();
    table.release(first).unwrap();
    let second = table.track(bag("b")).unwrap();

    assert_ne!(first, second);
    assert!(table.resolve(first).is_none());
}

#[test]
fn test_registry_returns_single_table_per_kind() {
    let registry = HandleTableRegistry::new();
    let a = registry.table_for::<PropertyBagKind>().unwrap();
    let b = registry.table_for::<PropertyBagKind>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let handle = a.track(bag("x")).unwrap();
    assert!(b.is_tracked(handle));
    assert_eq!(registry.live_handles().get("property bag"), Some(&1));
}

#[test]
fn test_registry_drop_releases_objects() {
    let object = bag("owned");
    {
        let registry = HandleTableRegistry::new();
        let table = registry.table_for::<PropertyBagKind>().unwrap();
        table.track(Arc::clone(&object)).unwrap();
        assert_eq!(Arc::strong_count(&object), 2);
    }
    assert_eq!(Arc::strong_count(&object), 1);
}

#[test]
fn test_concurrent_track_resolve_release() {
    let registry = Arc::new(HandleTableRegistry::new());
    let mut workers = Vec::new();

    for worker in 0..8 {
        let registry = Arc::clone(&registry);
        workers.push(thread::spawn(move || {
            let table = registry.table_for::<PropertyBagKind>().unwrap();
            for i in 0..200 {
                let value = format!("{worker}-{i}");
                let handle = table.track(bag(&value)).unwrap();
                let resolved = table.resolve(handle).unwrap();
                assert_eq!(resolved.get("value"), Some(value));
                table.release(handle).unwrap();
                assert!(table.release(handle).is_err());
            }
        }));
    }

    for worker in workers {
        worker.join().unwrap();
    }

    let table = registry.table_for::<PropertyBagKind>().unwrap();
    assert!(table.is_empty());
}
