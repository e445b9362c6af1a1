//! Durable registry backed by one YAML store per environment.
//!
//! Layout: `<state_dir>/<environment>/parameters.yaml`, keyed by registry
//! path. Every publish is a full read-modify-write with an atomic
//! temp-file + rename, so a reader never sees a half-written store. There is
//! no lock around the read-modify-write: two processes publishing at once
//! race and the last rename wins.

use super::{lookup, store, ParameterRegistry};
use crate::core::error::RegistryError;
use crate::core::types::{ParamName, PublishOutcome, ResolvedParameter, StoredParameter};
use crate::tripwire::eventlog;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk shape of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFile {
    pub schema: String,
    pub environment: String,
    pub generator: String,
    pub updated_at: String,

    /// Registry path -> stored value
    pub parameters: IndexMap<String, StoredParameter>,
}

#[derive(Debug, Clone)]
pub struct FileRegistry {
    state_dir: PathBuf,
    environment: String,
}

/// Derive the store path for an environment.
pub fn registry_file_path(state_dir: &Path, environment: &str) -> PathBuf {
    state_dir.join(environment).join("parameters.yaml")
}

impl FileRegistry {
    pub fn open(state_dir: &Path, environment: &str) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            environment: environment.to_string(),
        }
    }

    pub fn path(&self) -> PathBuf {
        registry_file_path(&self.state_dir, &self.environment)
    }

    fn load(&self) -> Result<IndexMap<ParamName, StoredParameter>, RegistryError> {
        let path = self.path();
        if !path.exists() {
            return Ok(IndexMap::new());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RegistryError::Io(format!("cannot read {}: {}", path.display(), e)))?;
        let file: RegistryFile = serde_yaml_ng::from_str(&content)
            .map_err(|e| RegistryError::Corrupt(format!("{}: {}", path.display(), e)))?;
        if file.environment != self.environment {
            return Err(RegistryError::Corrupt(format!(
                "{} belongs to environment '{}', expected '{}'",
                path.display(),
                file.environment,
                self.environment
            )));
        }

        let mut entries = IndexMap::new();
        for (key, stored) in file.parameters {
            let name = ParamName::from_path(&key).ok_or_else(|| {
                RegistryError::Corrupt(format!("{}: unknown parameter path '{}'", path.display(), key))
            })?;
            entries.insert(name, stored);
        }
        Ok(entries)
    }

    fn save(&self, entries: &IndexMap<ParamName, StoredParameter>) -> Result<(), RegistryError> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RegistryError::Io(format!("cannot create dir {}: {}", parent.display(), e))
            })?;
        }

        let file = RegistryFile {
            schema: "1.0".to_string(),
            environment: self.environment.clone(),
            generator: format!("stackreg {}", env!("CARGO_PKG_VERSION")),
            updated_at: eventlog::now_iso8601(),
            parameters: entries
                .iter()
                .map(|(name, stored)| (name.path().to_string(), stored.clone()))
                .collect(),
        };
        let yaml = serde_yaml_ng::to_string(&file)
            .map_err(|e| RegistryError::Io(format!("serialize error: {}", e)))?;

        let tmp_path = path.with_extension("yaml.tmp");
        std::fs::write(&tmp_path, &yaml)
            .map_err(|e| RegistryError::Io(format!("cannot write {}: {}", tmp_path.display(), e)))?;
        std::fs::rename(&tmp_path, &path).map_err(|e| {
            RegistryError::Io(format!(
                "cannot rename {} → {}: {}",
                tmp_path.display(),
                path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

impl ParameterRegistry for FileRegistry {
    fn environment(&self) -> &str {
        &self.environment
    }

    fn publish(
        &mut self,
        name: ParamName,
        value: &str,
        publisher: &str,
    ) -> Result<PublishOutcome, RegistryError> {
        let mut entries = self.load()?;
        let outcome = store(&mut entries, name, value, publisher);
        if outcome != PublishOutcome::Unchanged {
            self.save(&entries)?;
        }
        Ok(outcome)
    }

    fn resolve(&self, name: ParamName) -> Result<ResolvedParameter, RegistryError> {
        lookup(&self.load()?, name, &self.environment)
    }

    fn snapshot(&self) -> Result<IndexMap<ParamName, StoredParameter>, RegistryError> {
        self.load()
    }
}
