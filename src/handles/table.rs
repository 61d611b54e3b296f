// HandleTable: token -> shared reference for one tracked kind

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::registry::TokenAllocator;
use super::{Handle, TrackedKind};
use crate::error::ApiError;

/// Bidirectional mapping between handles and live objects of kind `K`.
///
/// The table owns one strong reference per issued handle. Releasing a handle
/// drops that reference; the object itself lives on while other owners
/// (sessions, event args, callers holding an `Arc`) keep it.
///
/// All operations take the single table lock for the duration of a map
/// operation only, never while calling into tracked objects.
pub struct HandleTable<K: TrackedKind> {
    allocator: Arc<TokenAllocator>,
    entries: Mutex<HashMap<u64, Arc<K::Object>>>,
}

impl<K: TrackedKind> HandleTable<K> {
    pub(crate) fn new(allocator: Arc<TokenAllocator>) -> Self {
        Self {
            allocator,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Safely acquire the entry lock
    ///
    /// Returns MutexGuard or ApiError::LockPoisoned on lock failure
    fn lock_entries(&self) -> Result<MutexGuard<'_, HashMap<u64, Arc<K::Object>>>, ApiError> {
        self.entries
            .lock()
            .map_err(|_| ApiError::lock_poisoned(K::NAME))
    }

    /// Issue a fresh handle for `object`.
    ///
    /// Tracking the same object twice yields two independent handles.
    pub fn track(&self, object: Arc<K::Object>) -> Result<Handle<K>, ApiError> {
        let raw = self.allocator.next_token(K::TAG);
        self.lock_entries()?.insert(raw, object);
        log::debug!("[HandleTable] tracked {} {:#018x}", K::NAME, raw);
        Ok(Handle::from_raw(raw))
    }

    /// Resolve a handle to its object.
    ///
    /// Returns `None` for the sentinel, tokens shaped for another kind,
    /// released handles, and handles never issued.
    pub fn resolve(&self, handle: Handle<K>) -> Option<Arc<K::Object>> {
        if !handle.has_kind_tag() {
            return None;
        }

        match self.lock_entries() {
            Ok(entries) => entries.get(&handle.raw()).cloned(),
            Err(err) => {
                log::warn!("[HandleTable] resolve failed: {}", err);
                None
            }
        }
    }

    /// Resolve or fail with `InvalidHandle`.
    pub fn get(&self, handle: Handle<K>) -> Result<Arc<K::Object>, ApiError> {
        self.resolve(handle)
            .ok_or(ApiError::InvalidHandle { kind: K::NAME })
    }

    /// Drop the table's reference for `handle`.
    ///
    /// A second release of the same handle fails with `InvalidHandle`.
    pub fn release(&self, handle: Handle<K>) -> Result<(), ApiError> {
        if !handle.has_kind_tag() {
            return Err(ApiError::InvalidHandle { kind: K::NAME });
        }

        // Drop the object outside the lock; its destructor may touch other tables.
        let removed = self.lock_entries()?.remove(&handle.raw());
        match removed {
            Some(object) => {
                drop(object);
                log::debug!("[HandleTable] released {} {:#018x}", K::NAME, handle.raw());
                Ok(())
            }
            None => Err(ApiError::InvalidHandle { kind: K::NAME }),
        }
    }

    pub fn is_tracked(&self, handle: Handle<K>) -> bool {
        self.resolve(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every reference held by this table. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let drained: Vec<Arc<K::Object>> = match self.lock_entries() {
            Ok(mut entries) => entries.drain().map(|(_, object)| object).collect(),
            Err(err) => {
                log::warn!("[HandleTable] clear failed: {}", err);
                Vec::new()
            }
        };
        if !drained.is_empty() {
            log::info!(
                "[HandleTable] dropped {} outstanding {} handle(s)",
                drained.len(),
                K::NAME
            );
        }
        drained.len()
    }
}
