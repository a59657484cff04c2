//! Name-keyed factory registries.
//!
//! One generic registry serves the three independent capability surfaces
//! (backends, notifiers, external providers). Registries are owned values
//! passed at construction time, which keeps the dispatcher and test
//! harnesses independently constructible. Registration is expected at
//! process start; a duplicate name is a programmer error and panics
//! immediately rather than surfacing at request time.

use crate::Backend;
use foreman_core::{DispatchError, ForemanResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Factory producing an instance from a JSON configuration blob.
pub type Factory<T> = Box<dyn Fn(&serde_json::Value) -> ForemanResult<Arc<T>> + Send + Sync>;

/// Generic name→factory registry.
pub struct FactoryRegistry<T: ?Sized> {
    kind: &'static str,
    factories: BTreeMap<String, Factory<T>>,
}

impl<T: ?Sized> FactoryRegistry<T> {
    /// Create an empty registry for the given kind (used in error messages).
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    /// Register a factory under a name.
    ///
    /// # Panics
    ///
    /// Panics when the name is already registered. Registration happens
    /// once at startup, so this is a fatal startup error, never a request
    /// time condition.
    pub fn register(&mut self, name: impl Into<String>, factory: Factory<T>) {
        let name = name.into();
        if self.factories.contains_key(&name) {
            panic!("duplicate {} registration: {name}", self.kind);
        }
        self.factories.insert(name, factory);
    }

    /// Instantiate the named factory with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotRegistered`] for an unknown name.
    pub fn create(&self, name: &str, config: &serde_json::Value) -> ForemanResult<Arc<T>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DispatchError::NotRegistered {
                kind: self.kind.to_string(),
                name: name.to_string(),
            })?;
        factory(config)
    }

    /// Names registered, in stable order.
    pub fn available(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Registry of worker backends.
pub type BackendRegistry = FactoryRegistry<dyn Backend>;

/// Registry of notification channels (gate providers build on these).
pub type NotifierRegistry = FactoryRegistry<dyn foreman_core::Notifier>;

/// Registry of external providers (git, spec, project-management).
pub type ProviderRegistry = FactoryRegistry<dyn ExternalProvider>;

/// Marker trait for external provider integrations (git hosting, spec
/// sources, project management). Only the registry surface is specified
/// here; concrete providers live out of tree.
pub trait ExternalProvider: Send + Sync {
    /// Registered name of this provider.
    fn name(&self) -> &str;
}

// =============================================================================
// TESTS
// =============================================================================
