//! Copy-on-write view over another registry.
//!
//! Publishes land in a pending map and never reach the base. Resolves see
//! pending values first. Dry runs compose against an overlay so the later
//! units of a pass observe what the earlier units would have published.

use super::{lookup, store, ParameterRegistry};
use crate::core::error::RegistryError;
use crate::core::types::{ParamName, PublishOutcome, ResolvedParameter, StoredParameter};
use indexmap::IndexMap;

pub struct OverlayRegistry<'a> {
    base: &'a dyn ParameterRegistry,
    pending: IndexMap<ParamName, StoredParameter>,
}

impl<'a> OverlayRegistry<'a> {
    pub fn new(base: &'a dyn ParameterRegistry) -> Self {
        Self {
            base,
            pending: IndexMap::new(),
        }
    }

    /// Values written through this overlay that differ from the base.
    pub fn pending(&self) -> &IndexMap<ParamName, StoredParameter> {
        &self.pending
    }
}

impl ParameterRegistry for OverlayRegistry<'_> {
    fn environment(&self) -> &str {
        self.base.environment()
    }

    fn publish(
        &mut self,
        name: ParamName,
        value: &str,
        publisher: &str,
    ) -> Result<PublishOutcome, RegistryError> {
        if !self.pending.contains_key(&name) {
            match self.base.resolve(name) {
                Ok(existing) => {
                    // Seed from the base so the outcome reflects what a real
                    // publish would report.
                    self.pending.insert(
                        name,
                        StoredParameter {
                            value: existing.value,
                            hash: existing.hash,
                            published_at: existing.published_at,
                            published_by: String::new(),
                        },
                    );
                    let outcome = store(&mut self.pending, name, value, publisher);
                    if outcome == PublishOutcome::Unchanged {
                        self.pending.shift_remove(&name);
                    }
                    return Ok(outcome);
                }
                Err(RegistryError::Unresolved { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(store(&mut self.pending, name, value, publisher))
    }

    fn resolve(&self, name: ParamName) -> Result<ResolvedParameter, RegistryError> {
        if self.pending.contains_key(&name) {
            return lookup(&self.pending, name, self.environment());
        }
        self.base.resolve(name)
    }

    fn snapshot(&self) -> Result<IndexMap<ParamName, StoredParameter>, RegistryError> {
        let mut merged = self.base.snapshot()?;
        for (name, stored) in &self.pending {
            merged.insert(*name, stored.clone());
        }
        Ok(merged)
    }
}
