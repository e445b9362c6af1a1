//! In-process registry. Used by tests and as the base of dry runs.

use super::{lookup, store, ParameterRegistry};
use crate::core::error::RegistryError;
use crate::core::types::{ParamName, PublishOutcome, ResolvedParameter, StoredParameter};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    environment: String,
    entries: IndexMap<ParamName, StoredParameter>,
}

impl MemoryRegistry {
    pub fn new(environment: &str) -> Self {
        Self {
            environment: environment.to_string(),
            entries: IndexMap::new(),
        }
    }

    /// Seed a registry as if earlier deployments had already published.
    pub fn with_values(environment: &str, values: &[(ParamName, &str)]) -> Self {
        let mut registry = Self::new(environment);
        for (name, value) in values {
            store(&mut registry.entries, *name, value, "seed");
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ParameterRegistry for MemoryRegistry {
    fn environment(&self) -> &str {
        &self.environment
    }

    fn publish(
        &mut self,
        name: ParamName,
        value: &str,
        publisher: &str,
    ) -> Result<PublishOutcome, RegistryError> {
        Ok(store(&mut self.entries, name, value, publisher))
    }

    fn resolve(&self, name: ParamName) -> Result<ResolvedParameter, RegistryError> {
        lookup(&self.entries, name, &self.environment)
    }

    fn snapshot(&self) -> Result<IndexMap<ParamName, StoredParameter>, RegistryError> {
        Ok(self.entries.clone())
    }
}
