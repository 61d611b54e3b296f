// HandleTableRegistry: one lazily created table per tracked kind

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rand::Rng;

use super::{HandleTable, TrackedKind, TAG_SHIFT};
use crate::error::ApiError;

const SEQUENCE_MASK: u64 = (1 << TAG_SHIFT) - 1;

/// Issues handle tokens for every table of one registry.
///
/// A token is `tag << 48 | (sequence ^ salt)`. The sequence only grows, so a
/// token is never issued twice by the same registry, and the salt keeps the
/// low bits from being a guessable counter.
pub struct TokenAllocator {
    sequence: AtomicU64,
    salt: u64,
}

impl TokenAllocator {
    /// Allocator with a random salt.
    pub fn new() -> Self {
        Self::with_salt(rand::thread_rng().gen())
    }

    /// Allocator with a fixed salt, for reproducible tokens.
    pub fn with_salt(salt: u64) -> Self {
        Self {
            sequence: AtomicU64::new(1),
            salt: salt & SEQUENCE_MASK,
        }
    }

    pub(crate) fn next_token(&self, tag: u16) -> u64 {
        debug_assert!(tag != 0 && tag != u16::MAX, "reserved kind tag");
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        (u64::from(tag) << TAG_SHIFT) | ((sequence ^ self.salt) & SEQUENCE_MASK)
    }
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a table used for diagnostics and teardown.
trait TableStats: Send + Sync {
    fn kind_name(&self) -> &'static str;
    fn live(&self) -> usize;
    fn clear(&self) -> usize;
}

impl<K: TrackedKind> TableStats for HandleTable<K> {
    fn kind_name(&self) -> &'static str {
        K::NAME
    }

    fn live(&self) -> usize {
        self.len()
    }

    fn clear(&self) -> usize {
        HandleTable::clear(self)
    }
}

struct RegisteredTable {
    table: Arc<dyn Any + Send + Sync>,
    stats: Arc<dyn TableStats>,
}

/// Owns exactly one [`HandleTable`] per tracked kind.
///
/// Tables are created on first use and live as long as the registry. The
/// registry is an explicit object held by the service context; dropping it
/// (or calling [`HandleTableRegistry::clear`]) releases every outstanding
/// table reference.
pub struct HandleTableRegistry {
    allocator: Arc<TokenAllocator>,
    tables: Mutex<HashMap<TypeId, RegisteredTable>>,
}

impl HandleTableRegistry {
    pub fn new() -> Self {
        Self::with_allocator(TokenAllocator::new())
    }

    pub fn with_allocator(allocator: TokenAllocator) -> Self {
        Self {
            allocator: Arc::new(allocator),
            tables: Mutex::new(HashMap::new()),
        }
    }

    fn lock_tables(&self) -> Result<MutexGuard<'_, HashMap<TypeId, RegisteredTable>>, ApiError> {
        self.tables
            .lock()
            .map_err(|_| ApiError::lock_poisoned("handle_table_registry"))
    }

    /// Return the table for `K`, creating it on first use.
    pub fn table_for<K: TrackedKind>(&self) -> Result<Arc<HandleTable<K>>, ApiError> {
        let mut tables = self.lock_tables()?;
        let entry = tables.entry(TypeId::of::<K>()).or_insert_with(|| {
            log::debug!("[HandleTableRegistry] creating {} table", K::NAME);
            let table = Arc::new(HandleTable::<K>::new(Arc::clone(&self.allocator)));
            RegisteredTable {
                table: Arc::clone(&table) as Arc<dyn Any + Send + Sync>,
                stats: table,
            }
        });

        Arc::clone(&entry.table)
            .downcast::<HandleTable<K>>()
            .map_err(|_| ApiError::InvalidState {
                reason: format!("table registered for {} has another type", K::NAME),
            })
    }

    /// Live handle count per kind, for kinds whose table exists.
    pub fn live_handles(&self) -> BTreeMap<String, usize> {
        match self.lock_tables() {
            Ok(tables) => tables
                .values()
                .map(|entry| (entry.stats.kind_name().to_string(), entry.stats.live()))
                .collect(),
            Err(_) => BTreeMap::new(),
        }
    }

    /// Drop every handle in every table. Tables stay registered.
    ///
    /// Returns the number of handles dropped per kind, omitting empty tables.
    pub fn clear(&self) -> BTreeMap<&'static str, usize> {
        let stats: Vec<Arc<dyn TableStats>> = match self.lock_tables() {
            Ok(tables) => tables.values().map(|entry| Arc::clone(&entry.stats)).collect(),
            Err(err) => {
                log::warn!("[HandleTableRegistry] clear failed: {}", err);
                return BTreeMap::new();
            }
        };
        stats
            .into_iter()
            .map(|table| (table.kind_name(), table.clear()))
            .filter(|&(_, dropped)| dropped > 0)
            .collect()
    }
}

impl Default for HandleTableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HandleTableRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}
