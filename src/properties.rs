// PropertyBag: insertion-ordered string properties attached to an object

use std::any::TypeId;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, InterfaceView, QueryInterface};
use crate::interface_map;

/// Named-property storage capability.
pub trait NamedProperties: QueryInterface {
    fn get(&self, name: &str) -> Option<String>;

    fn set(&self, name: &str, value: &str);

    fn names(&self) -> Vec<String>;

    fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl Capability for dyn NamedProperties {
    const NAME: &'static str = "named properties";
}

/// One name/value entry, as seen in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

/// Thread-safe property store that keeps insertion order.
///
/// Setting an existing name replaces its value in place; the entry keeps its
/// original position.
#[derive(Debug, Default)]
pub struct PropertyBag {
    entries: RwLock<Vec<Property>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let bag = Self::new();
        for (name, value) in pairs {
            let (name, value): (String, String) = (name.into(), value.into());
            bag.set(&name, &value);
        }
        bag
    }

    /// Copy of all entries in insertion order.
    pub fn snapshot(&self) -> Vec<Property> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NamedProperties for PropertyBag {
    fn get(&self, name: &str) -> Option<String> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.clone())
    }

    fn set(&self, name: &str, value: &str) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.value = value.to_string(),
            None => entries.push(Property {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    fn names(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|entry| entry.name).collect()
    }
}

impl QueryInterface for PropertyBag {
    fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
        interface_map!(self, interface; dyn NamedProperties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::query;

    #[test]
    fn test_set_and_get() {
        let bag = PropertyBag::new();
        assert!(bag.get("Path").is_none());

        bag.set("Path", "speech.config");
        assert_eq!(bag.get("Path").as_deref(), Some("speech.config"));
        assert!(bag.contains("Path"));
        assert_eq!(bag.get_or("Missing", "fallback"), "fallback");
    }

    #[test]
    fn test_insertion_order_kept_on_replace() {
        let bag = PropertyBag::from_pairs([("b", "1"), ("a", "2"), ("c", "3")]);
        bag.set("a", "20");

        assert_eq!(bag.names(), vec!["b", "a", "c"]);
        assert_eq!(bag.get("a").as_deref(), Some("20"));
        assert_eq!(bag.len(), 3);
    }

    #[test]
    fn test_queryable_as_named_properties() {
        let bag = Arc::new(PropertyBag::from_pairs([("X-RequestId", "42")]));
        let props = query::<dyn NamedProperties, _>(&bag).unwrap();
        assert_eq!(props.get("X-RequestId").as_deref(), Some("42"));
    }

    #[test]
    fn test_snapshot_serializes() {
        let bag = PropertyBag::from_pairs([("Content-Type", "application/json")]);
        let json = serde_json::to_string(&bag.snapshot()).unwrap();
        assert!(json.contains("Content-Type"));
    }
}
