//! Staleness detection — compare what each unit captured at plan time with
//! what the registry holds now.
//!
//! A finding is not an error. It means a consumer is still deployed with a
//! value its producer has since overwritten, and will keep it until the
//! consumer is composed again.

use super::eventlog;
use crate::core::state;
use crate::core::types::{CaptureLock, ParamName, ProvenanceEvent, StoredParameter};
use crate::registry::ParameterRegistry;
use indexmap::IndexMap;
use std::path::Path;

/// Marker used when a captured parameter no longer exists in the registry.
pub const MISSING: &str = "MISSING";

/// One captured value that no longer matches the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleFinding {
    pub unit: String,
    pub name: ParamName,
    pub captured_hash: String,
    pub current_hash: String,

    /// When the consumer captured its copy
    pub captured_at: String,

    /// When the current value was published, if it exists
    pub published_at: Option<String>,

    pub detail: String,
}

/// Check one capture lock against a registry snapshot.
pub fn detect_stale(
    lock: &CaptureLock,
    current: &IndexMap<ParamName, StoredParameter>,
) -> Vec<StaleFinding> {
    let mut findings = Vec::new();

    for (name, captured) in &lock.parameters {
        match current.get(name) {
            Some(stored) if stored.hash == captured.hash => {}
            Some(stored) => findings.push(StaleFinding {
                unit: lock.unit.clone(),
                name: *name,
                captured_hash: captured.hash.clone(),
                current_hash: stored.hash.clone(),
                captured_at: captured.resolved_at.clone(),
                published_at: Some(stored.published_at.clone()),
                detail: format!(
                    "{} republished by '{}' at {} after '{}' captured it at {}",
                    name.path(),
                    stored.published_by,
                    stored.published_at,
                    lock.unit,
                    captured.resolved_at
                ),
            }),
            None => findings.push(StaleFinding {
                unit: lock.unit.clone(),
                name: *name,
                captured_hash: captured.hash.clone(),
                current_hash: MISSING.to_string(),
                captured_at: captured.resolved_at.clone(),
                published_at: None,
                detail: format!("{} no longer exists in the registry", name.path()),
            }),
        }
    }

    findings
}

/// Check every capture lock in an environment. Findings are appended to the
/// event log when `tripwire` is set.
pub fn detect_all(
    state_dir: &Path,
    registry: &dyn ParameterRegistry,
    tripwire: bool,
) -> Result<Vec<StaleFinding>, String> {
    let environment = registry.environment();
    let current = registry.snapshot().map_err(|e| e.to_string())?;
    let mut findings = Vec::new();

    for lock in state::list_capture_locks(state_dir, environment)? {
        for finding in detect_stale(&lock, &current) {
            if tripwire {
                let _ = eventlog::append_event(
                    state_dir,
                    environment,
                    ProvenanceEvent::StaleDetected {
                        unit: finding.unit.clone(),
                        name: finding.name,
                        captured_hash: finding.captured_hash.clone(),
                        current_hash: finding.current_hash.clone(),
                    },
                );
            }
            findings.push(finding);
        }
    }

    Ok(findings)
}
