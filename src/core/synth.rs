//! Engine manifest synthesis — the declared graph handed to the provisioning
//! engine.
//!
//! Every descriptor is checked here. The builder never validates, so this is
//! the last point a malformed descriptor can be caught before deployment.

use super::compose::CompositionResult;
use super::error::CompositionError;
use super::types::*;
use crate::fronts::Artifact;
use crate::tripwire::{eventlog, hasher};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema: String,
    pub name: String,
    pub environment: String,
    pub generator: String,
    pub generated_at: String,
    pub run_id: String,

    /// Composite BLAKE3 over every descriptor, in apply order
    pub fingerprint: String,

    pub order: Vec<String>,
    pub units: Vec<ManifestUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestUnit {
    pub name: String,
    pub kind: UnitKind,
    pub resolves: Vec<ParameterRef>,
    pub publishes: Vec<ParameterRef>,

    /// Engine-owned resource shape from `stacks.yaml`, copied verbatim
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, serde_yaml_ng::Value>,

    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefMode {
    /// Value baked in at plan time
    Captured,
    /// Read by the platform when a task starts
    Runtime,
    Published,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRef {
    pub name: ParamName,
    pub path: String,
    pub mode: RefMode,
}

impl ParameterRef {
    fn new(name: ParamName, mode: RefMode) -> Self {
        Self {
            name,
            path: name.path().to_string(),
            mode,
        }
    }
}

/// Derive the manifest path for an environment.
pub fn manifest_path(out_dir: &Path, environment: &str) -> PathBuf {
    out_dir.join(environment).join("manifest.json")
}

/// Check every descriptor in a pass result. Returns the first problem.
pub fn validate_artifacts(result: &CompositionResult) -> Result<(), CompositionError> {
    for unit in &result.units {
        for artifact in &unit.artifacts {
            if let Some(reason) = artifact.descriptor().problems().into_iter().next() {
                return Err(CompositionError::MalformedDescriptor {
                    unit: unit.unit.clone(),
                    compute_unit: artifact.name().to_string(),
                    reason,
                });
            }
        }
    }
    Ok(())
}

/// Render the manifest for a completed pass.
pub fn render_manifest(
    config: &StackConfig,
    result: &CompositionResult,
) -> Result<Manifest, CompositionError> {
    validate_artifacts(result)?;

    let mut descriptor_hashes = Vec::new();
    let mut units = Vec::new();
    for report in &result.units {
        let decl = config.units.get(&report.unit).ok_or_else(|| {
            CompositionError::Config(format!("unit '{}' missing from config", report.unit))
        })?;

        for artifact in &report.artifacts {
            descriptor_hashes
                .push(hasher::hash_json(artifact.descriptor()).map_err(CompositionError::State)?);
        }

        let mut resolves: Vec<ParameterRef> = decl
            .resolves
            .iter()
            .map(|n| ParameterRef::new(*n, RefMode::Captured))
            .collect();
        for name in decl.consumes() {
            if !decl.resolves.contains(&name) {
                resolves.push(ParameterRef::new(name, RefMode::Runtime));
            }
        }

        units.push(ManifestUnit {
            name: report.unit.clone(),
            kind: report.kind,
            resolves,
            publishes: report
                .published
                .iter()
                .map(|(n, _)| ParameterRef::new(*n, RefMode::Published))
                .collect(),
            properties: decl.properties.clone(),
            artifacts: report.artifacts.clone(),
        });
    }

    let refs: Vec<&str> = descriptor_hashes.iter().map(|s| s.as_str()).collect();
    Ok(Manifest {
        schema: "1.0".to_string(),
        name: config.name.clone(),
        environment: result.environment.clone(),
        generator: format!("stackreg {}", env!("CARGO_PKG_VERSION")),
        generated_at: eventlog::now_iso8601(),
        run_id: result.run_id.clone(),
        fingerprint: hasher::composite_hash(&refs),
        order: result.order.clone(),
        units,
    })
}

/// Write a manifest atomically (write to temp, then rename).
pub fn write_manifest(out_dir: &Path, manifest: &Manifest) -> Result<PathBuf, String> {
    let path = manifest_path(out_dir, &manifest.environment);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
    }
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| format!("JSON serialize error: {}", e))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(path)
}
