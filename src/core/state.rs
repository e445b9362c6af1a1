//! Capture locks — what each unit resolved at plan time. Load, save (atomic),
//! path derivation.

use super::types::{CaptureLock, ResolvedParameter};
use std::path::{Path, PathBuf};

/// Derive the capture lock path for a unit within an environment.
pub fn capture_lock_path(state_dir: &Path, environment: &str, unit: &str) -> PathBuf {
    state_dir
        .join(environment)
        .join(unit)
        .join("capture.lock.yaml")
}

/// Load a unit's capture lock. Returns None if the unit was never composed.
pub fn load_capture_lock(
    state_dir: &Path,
    environment: &str,
    unit: &str,
) -> Result<Option<CaptureLock>, String> {
    let path = capture_lock_path(state_dir, environment, unit);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let lock: CaptureLock = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("invalid capture lock {}: {}", path.display(), e))?;
    Ok(Some(lock))
}

/// Save a capture lock atomically (write to temp, then rename).
pub fn save_capture_lock(state_dir: &Path, lock: &CaptureLock) -> Result<(), String> {
    let path = capture_lock_path(state_dir, &lock.environment, &lock.unit);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
    }

    let yaml = serde_yaml_ng::to_string(lock).map_err(|e| format!("serialize error: {}", e))?;

    let tmp_path = path.with_extension("lock.yaml.tmp");
    std::fs::write(&tmp_path, &yaml)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;

    Ok(())
}

/// Create a capture lock from the parameters a unit just resolved.
pub fn new_capture_lock(environment: &str, unit: &str, resolved: &[ResolvedParameter]) -> CaptureLock {
    use crate::tripwire::eventlog::now_iso8601;
    CaptureLock {
        schema: "1.0".to_string(),
        environment: environment.to_string(),
        unit: unit.to_string(),
        generated_at: now_iso8601(),
        generator: format!("stackreg {}", env!("CARGO_PKG_VERSION")),
        blake3_version: "1.8".to_string(),
        parameters: resolved.iter().map(|r| (r.name, r.into())).collect(),
        descriptors: indexmap::IndexMap::new(),
    }
}

/// Load every capture lock in an environment, sorted by unit name.
pub fn list_capture_locks(state_dir: &Path, environment: &str) -> Result<Vec<CaptureLock>, String> {
    let env_dir = state_dir.join(environment);
    if !env_dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(&env_dir)
        .map_err(|e| format!("cannot read {}: {}", env_dir.display(), e))?;

    let mut units = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| format!("cannot read {}: {}", env_dir.display(), e))?;
        if entry.path().is_dir() {
            units.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    units.sort();

    let mut locks = Vec::new();
    for unit in units {
        if let Some(lock) = load_capture_lock(state_dir, environment, &unit)? {
            locks.push(lock);
        }
    }
    Ok(locks)
}
