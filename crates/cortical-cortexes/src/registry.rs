//! Name → factory lookup for configured cortexes.

use std::collections::BTreeMap;

use cortical_core::{CoreError, CortexFactory};
use cortical_settings::CortexSettings;
use tracing::debug;

use crate::errors::Result;
use crate::{classifier, dummy, echo, memory, ping, pong};

/// Known cortex factories, keyed by name.
#[derive(Clone, Default)]
pub struct CortexRegistry {
    factories: BTreeMap<String, CortexFactory>,
}

impl CortexRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in cortex, configured from `settings`.
    pub fn with_builtins(settings: &CortexSettings) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(echo::NAME, echo::factory());
        registry.register(pong::NAME, pong::factory());
        registry.register(ping::NAME, ping::factory(&settings.ping));
        registry.register(dummy::NAME, dummy::factory(&settings.dummy));
        registry.register(memory::NAME, memory::factory(&settings.memory));
        registry.register(classifier::NAME, classifier::factory(&settings.classifier)?);
        Ok(registry)
    }

    /// Add or replace a factory.
    pub fn register(&mut self, name: impl Into<String>, factory: CortexFactory) {
        let name = name.into();
        debug!(cortex = %name, "registered cortex");
        let _ = self.factories.insert(name, factory);
    }

    /// Look up one factory.
    pub fn get(&self, name: &str) -> Result<CortexFactory> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownCortex(name.to_owned()).into())
    }

    /// Resolve `names` in order. Fails on the first unknown name.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<(String, CortexFactory)>> {
        names
            .iter()
            .map(|n| {
                let n = n.as_ref();
                self.get(n).map(|f| (n.to_owned(), f))
            })
            .collect()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for CortexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CortexRegistry").field("names", &self.names()).finish()
    }
}
