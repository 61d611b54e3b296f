//! Opaque handles for objects reachable across the C ABI.
//!
//! A [`Handle`] is a small token that stands in for a shared reference held by
//! a [`HandleTable`]. Tables are created per tracked kind by the
//! [`HandleTableRegistry`], which the service context owns.

mod kinds;
mod registry;
mod table;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

pub use kinds::{
    ConnectionEventKind, ConnectionKind, ConnectionMessageEventKind, ConnectionMessageKind,
    PropertyBagKind, RecognizerKind,
};
pub use registry::{HandleTableRegistry, TokenAllocator};
pub use table::HandleTable;

/// Marker describing one kind of tracked object.
///
/// `TAG` is embedded in the high 16 bits of every token issued for the kind,
/// so it must be unique per kind, non-zero, and never `0xFFFF`.
pub trait TrackedKind: Send + Sync + 'static {
    type Object: ?Sized + Send + Sync + 'static;

    const NAME: &'static str;
    const TAG: u16;
}

const TAG_SHIFT: u32 = 48;

/// Opaque token identifying one tracked object of kind `K`.
#[repr(transparent)]
pub struct Handle<K: TrackedKind> {
    raw: u64,
    _kind: PhantomData<fn() -> K>,
}

impl<K: TrackedKind> Handle<K> {
    /// Reserved "invalid/empty" value. Never issued by a table.
    pub const INVALID: Self = Self::from_raw(u64::MAX);

    pub const fn from_raw(raw: u64) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    pub const fn raw(self) -> u64 {
        self.raw
    }

    pub fn is_sentinel(self) -> bool {
        self.raw == u64::MAX
    }

    /// Kind tag carried by the token.
    pub fn tag(self) -> u16 {
        (self.raw >> TAG_SHIFT) as u16
    }

    /// True when the token was shaped for `K`. Says nothing about liveness.
    pub fn has_kind_tag(self) -> bool {
        !self.is_sentinel() && self.tag() == K::TAG
    }
}

impl<K: TrackedKind> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: TrackedKind> Copy for Handle<K> {}

impl<K: TrackedKind> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: TrackedKind> Eq for Handle<K> {}

impl<K: TrackedKind> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K: TrackedKind> Default for Handle<K> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<K: TrackedKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            write!(f, "Handle<{}>(INVALID)", K::NAME)
        } else {
            write!(f, "Handle<{}>({:#018x})", K::NAME, self.raw)
        }
    }
}
