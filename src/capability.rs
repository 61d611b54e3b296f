//! Runtime capability query.
//!
//! Tracked objects implement a variable set of optional capabilities. Each
//! capability is a trait; an object advertises the ones it implements through
//! [`QueryInterface::query_interface`], usually written with [`interface_map!`].
//! Callers ask with [`query`] and get `None` when the capability is absent.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::ApiError;

/// Type-erased `Arc<C>` for some capability `C`.
pub type InterfaceView = Box<dyn Any + Send>;

/// An optional interface an object may offer.
///
/// Implemented for `dyn Trait` types. `NAME` is what callers see in
/// "unsupported" errors.
pub trait Capability: 'static {
    const NAME: &'static str;
}

/// Objects that can be viewed through other capabilities.
pub trait QueryInterface: Send + Sync + 'static {
    /// Return an `Arc<C>` boxed as [`InterfaceView`] when `interface` is
    /// `TypeId::of::<C>()` for a capability this object implements.
    fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView>;
}

/// View `object` through capability `C`, or `None` if unsupported.
pub fn query<C, T>(object: &Arc<T>) -> Option<Arc<C>>
where
    C: ?Sized + Capability,
    T: ?Sized + QueryInterface,
{
    let view = Arc::clone(object).query_interface(TypeId::of::<C>())?;
    view.downcast::<Arc<C>>().ok().map(|boxed| *boxed)
}

/// Like [`query`] but maps absence to `CapabilityUnsupported`.
pub fn require<C, T>(object: &Arc<T>) -> Result<Arc<C>, ApiError>
where
    C: ?Sized + Capability,
    T: ?Sized + QueryInterface,
{
    query::<C, T>(object).ok_or(ApiError::CapabilityUnsupported {
        capability: C::NAME,
    })
}

/// Declare the capabilities a type offers inside `query_interface`.
///
/// ```ignore
/// fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
///     interface_map!(self, interface; dyn NamedProperties, dyn ConnectionMessage)
/// }
/// ```
#[macro_export]
macro_rules! interface_map {
    ($this:expr, $interface:expr; $($capability:ty),* $(,)?) => {{
        $(
            if $interface == ::std::any::TypeId::of::<$capability>() {
                let view: ::std::sync::Arc<$capability> = $this;
                return Some(Box::new(view) as $crate::capability::InterfaceView);
            }
        )*
        None
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    impl Capability for dyn Greeter {
        const NAME: &'static str = "greeting";
    }

    trait Counter: Send + Sync {
        fn count(&self) -> usize;
    }

    impl Capability for dyn Counter {
        const NAME: &'static str = "counting";
    }

    struct Friendly;

    impl Greeter for Friendly {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    impl QueryInterface for Friendly {
        fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
            interface_map!(self, interface; dyn Greeter)
        }
    }

    struct Silent;

    impl QueryInterface for Silent {
        fn query_interface(self: Arc<Self>, _interface: TypeId) -> Option<InterfaceView> {
            None
        }
    }

    #[test]
    fn test_supported_capability() {
        let object = Arc::new(Friendly);
        let greeter = query::<dyn Greeter, _>(&object).unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_unsupported_capability_is_none() {
        let object = Arc::new(Friendly);
        assert!(query::<dyn Counter, _>(&object).is_none());

        let silent = Arc::new(Silent);
        assert!(query::<dyn Greeter, _>(&silent).is_none());
    }

    #[test]
    fn test_query_through_trait_object() {
        let object: Arc<dyn QueryInterface> = Arc::new(Friendly);
        assert!(query::<dyn Greeter, _>(&object).is_some());
    }

    #[test]
    fn test_query_is_deterministic() {
        let object = Arc::new(Friendly);
        for _ in 0..10 {
            assert!(query::<dyn Greeter, _>(&object).is_some());
            assert!(query::<dyn Counter, _>(&object).is_none());
        }
    }

    #[test]
    fn test_view_shares_the_object() {
        let object = Arc::new(Friendly);
        let greeter = query::<dyn Greeter, _>(&object).unwrap();
        assert_eq!(Arc::strong_count(&object), 2);
        drop(greeter);
        assert_eq!(Arc::strong_count(&object), 1);
    }

    #[test]
    fn test_require_reports_capability_name() {
        let object = Arc::new(Silent);
        match require::<dyn Counter, _>(&object) {
            Err(ApiError::CapabilityUnsupported { capability }) => {
                assert_eq!(capability, "counting")
            }
            other => panic!("Expected CapabilityUnsupported, got {:?}", other.is_ok()),
        }
    }
}
