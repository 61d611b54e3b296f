//! Module factory resolution.
//!
//! A [`FactoryTable`] maps class names to constructors and the interface
//! names each class can be viewed through. Names a table cannot resolve are
//! forwarded to its delegates in registration order, so modules compose into
//! one root factory the same way separately built plugins would.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::adapters::{MockTtsEngineAdapter, TtsEngineAdapter, MOCK_TTS_CLASS};
use crate::capability::{Capability, InterfaceView, QueryInterface};
use crate::config::TransportConfig;
use crate::transport::{LoopbackTransport, Transport};

pub const TTS_ENGINE_ADAPTER_INTERFACE: &str = "TtsEngineAdapter";
pub const TRANSPORT_INTERFACE: &str = "Transport";
pub const LOOPBACK_TRANSPORT_CLASS: &str = "LoopbackTransport";

/// Resolves `(class name, interface name)` to a new instance.
pub trait ModuleFactory: Send + Sync {
    fn create(&self, class_name: &str, interface_name: &str) -> Option<ModuleObject>;
}

impl<F> ModuleFactory for F
where
    F: Fn(&str, &str) -> Option<ModuleObject> + Send + Sync,
{
    fn create(&self, class_name: &str, interface_name: &str) -> Option<ModuleObject> {
        self(class_name, interface_name)
    }
}

/// A freshly constructed instance, already viewed through the requested interface.
pub struct ModuleObject {
    class_name: String,
    interface_name: String,
    view: InterfaceView,
}

impl ModuleObject {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// Recover the typed view. `None` if `C` is not the interface it was created for.
    pub fn into_interface<C>(self) -> Option<Arc<C>>
    where
        C: ?Sized + Capability,
    {
        self.view.downcast::<Arc<C>>().ok().map(|boxed| *boxed)
    }
}

impl fmt::Debug for ModuleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleObject")
            .field("class_name", &self.class_name)
            .field("interface_name", &self.interface_name)
            .finish()
    }
}

/// Interface name bound to the capability it resolves to.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceBinding {
    name: &'static str,
    type_id: TypeId,
}

impl InterfaceBinding {
    pub fn of<C>(name: &'static str) -> Self
    where
        C: ?Sized + Capability,
    {
        Self {
            name,
            type_id: TypeId::of::<C>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

type Constructor = Arc<dyn Fn() -> Arc<dyn QueryInterface> + Send + Sync>;

struct FactoryEntry {
    class_name: String,
    constructor: Constructor,
    interfaces: Vec<InterfaceBinding>,
}

/// Ordered class registrations followed by ordered delegates.
pub struct FactoryTable {
    name: &'static str,
    entries: Vec<FactoryEntry>,
    delegates: Vec<Arc<dyn ModuleFactory>>,
}

impl FactoryTable {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
            delegates: Vec::new(),
        }
    }

    /// Register `class_name`, constructible through any of `interfaces`.
    pub fn with_class<T, F>(
        mut self,
        class_name: &str,
        interfaces: Vec<InterfaceBinding>,
        constructor: F,
    ) -> Self
    where
        T: QueryInterface,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.entries.push(FactoryEntry {
            class_name: class_name.to_string(),
            constructor: Arc::new(move || Arc::new(constructor()) as Arc<dyn QueryInterface>),
            interfaces,
        });
        self
    }

    /// Forward unresolved names to `delegate`, after earlier delegates.
    pub fn with_delegate<D>(mut self, delegate: D) -> Self
    where
        D: ModuleFactory + 'static,
    {
        self.delegates.push(Arc::new(delegate));
        self
    }

    /// Classes registered directly on this table with their interface names.
    pub fn classes(&self) -> Vec<(String, Vec<&'static str>)> {
        self.entries
            .iter()
            .map(|entry| {
                (
                    entry.class_name.clone(),
                    entry.interfaces.iter().map(InterfaceBinding::name).collect(),
                )
            })
            .collect()
    }

    fn create_local(&self, class_name: &str, interface_name: &str) -> Option<ModuleObject> {
        for entry in self.entries.iter().filter(|e| e.class_name == class_name) {
            let Some(binding) = entry.interfaces.iter().find(|b| b.name == interface_name) else {
                continue;
            };

            let instance = (entry.constructor)();
            match instance.query_interface(binding.type_id) {
                Some(view) => {
                    log::debug!(
                        "[Factory:{}] created {} as {}",
                        self.name,
                        class_name,
                        interface_name
                    );
                    return Some(ModuleObject {
                        class_name: class_name.to_string(),
                        interface_name: interface_name.to_string(),
                        view,
                    });
                }
                None => log::warn!(
                    "[Factory:{}] {} is registered for {} but does not offer it",
                    self.name,
                    class_name,
                    interface_name
                ),
            }
        }
        None
    }
}

impl ModuleFactory for FactoryTable {
    fn create(&self, class_name: &str, interface_name: &str) -> Option<ModuleObject> {
        self.create_local(class_name, interface_name).or_else(|| {
            self.delegates
                .iter()
                .find_map(|delegate| delegate.create(class_name, interface_name))
        })
    }
}

/// The mock text-to-speech module.
pub fn mock_tts_module() -> FactoryTable {
    FactoryTable::new("tts_mock").with_class(
        MOCK_TTS_CLASS,
        vec![InterfaceBinding::of::<dyn TtsEngineAdapter>(
            TTS_ENGINE_ADAPTER_INTERFACE,
        )],
        MockTtsEngineAdapter::new,
    )
}

/// Resolver entry point of the mock text-to-speech module.
pub fn tts_mock_create_module_object(
    class_name: &str,
    interface_name: &str,
) -> Option<ModuleObject> {
    mock_tts_module().create(class_name, interface_name)
}

/// The in-process transport module.
pub fn transport_module(config: TransportConfig) -> FactoryTable {
    FactoryTable::new("transport").with_class(
        LOOPBACK_TRANSPORT_CLASS,
        vec![InterfaceBinding::of::<dyn Transport>(TRANSPORT_INTERFACE)],
        move || LoopbackTransport::new(config.clone()),
    )
}

/// Root factory: no classes of its own, delegates to every module.
pub fn module_factory(config: &TransportConfig) -> FactoryTable {
    FactoryTable::new("root")
        .with_delegate(tts_mock_create_module_object)
        .with_delegate(transport_module(config.clone()))
}
