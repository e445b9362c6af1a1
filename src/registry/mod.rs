//! Parameter registry — publish at apply time, resolve at plan time.
//!
//! Backends are injected into the composition root as
//! `&mut dyn ParameterRegistry`; nothing in the crate reaches a registry
//! through global state. No backend offers versioning, locking or
//! compare-and-swap: a second publish to the same name simply replaces the
//! first, and two concurrent publishers race.

pub mod file;
pub mod memory;
pub mod overlay;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;
pub use overlay::OverlayRegistry;

use crate::core::error::RegistryError;
use crate::core::types::{ParamName, PublishOutcome, ResolvedParameter, StoredParameter};
use crate::tripwire::{eventlog, hasher};
use indexmap::IndexMap;

/// A key-value store of well-known parameters, scoped to one environment.
pub trait ParameterRegistry {
    /// Environment this registry is scoped to.
    fn environment(&self) -> &str;

    /// Write `value` under `name`. Republishing an identical value is a
    /// no-op; a different value overwrites.
    fn publish(
        &mut self,
        name: ParamName,
        value: &str,
        publisher: &str,
    ) -> Result<PublishOutcome, RegistryError>;

    /// Read the current value. Fails with `RegistryError::Unresolved` if the
    /// name was never published in this environment.
    fn resolve(&self, name: ParamName) -> Result<ResolvedParameter, RegistryError>;

    /// Everything currently stored, in publish order.
    fn snapshot(&self) -> Result<IndexMap<ParamName, StoredParameter>, RegistryError>;
}

/// Last-write-wins insert shared by every backend.
pub(crate) fn store(
    entries: &mut IndexMap<ParamName, StoredParameter>,
    name: ParamName,
    value: &str,
    publisher: &str,
) -> PublishOutcome {
    let hash = hasher::hash_string(value);
    let outcome = match entries.get(&name) {
        None => PublishOutcome::Created,
        Some(existing) if existing.hash == hash => return PublishOutcome::Unchanged,
        Some(existing) => PublishOutcome::Overwritten {
            previous_hash: existing.hash.clone(),
        },
    };
    entries.insert(
        name,
        StoredParameter {
            value: value.to_string(),
            hash,
            published_at: eventlog::now_iso8601(),
            published_by: publisher.to_string(),
        },
    );
    outcome
}

/// Look up `name` and stamp the capture time.
pub(crate) fn lookup(
    entries: &IndexMap<ParamName, StoredParameter>,
    name: ParamName,
    environment: &str,
) -> Result<ResolvedParameter, RegistryError> {
    let stored = entries.get(&name).ok_or_else(|| RegistryError::Unresolved {
        name,
        environment: environment.to_string(),
    })?;
    Ok(ResolvedParameter {
        name,
        value: stored.value.clone(),
        hash: stored.hash.clone(),
        published_at: stored.published_at.clone(),
        resolved_at: eventlog::now_iso8601(),
    })
}
