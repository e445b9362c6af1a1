//! Error taxonomy for registry access and composition passes.
//!
//! Every variant is fatal to the current pass. There is no retry: resolving a
//! missing parameter again cannot succeed until its producing unit is applied.

use super::types::ParamName;
use thiserror::Error;

/// Errors raised by a registry backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Nothing was ever published under this name in this environment.
    #[error("parameter '{name}' ({path}) has not been published in environment '{environment}'", path = .name.path())]
    Unresolved {
        name: ParamName,
        environment: String,
    },

    /// The backing store could not be read or written.
    #[error("registry I/O error: {0}")]
    Io(String),

    /// The backing store holds something we cannot interpret.
    #[error("corrupt registry store: {0}")]
    Corrupt(String),
}

/// Errors that abort a composition pass.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompositionError {
    /// A resolve ran before any producer published the name.
    #[error("unresolved parameter '{name}' in environment '{environment}' (apply its producing unit first)")]
    UnresolvedParameter {
        name: ParamName,
        environment: String,
    },

    /// A consumer is declared before the unit that publishes what it needs.
    #[error("unit '{consumer}' consumes '{name}' but is declared before its producer '{producer}'")]
    OrderingViolation {
        consumer: String,
        producer: String,
        name: ParamName,
    },

    /// A descriptor missing a required field, caught at the engine boundary.
    #[error("malformed descriptor for '{unit}/{compute_unit}': {reason}")]
    MalformedDescriptor {
        unit: String,
        compute_unit: String,
        reason: String,
    },

    #[error("dependency cycle detected involving: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("template error in unit '{unit}': {message}")]
    Template { unit: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Registry(String),

    #[error("state error: {0}")]
    State(String),
}

impl From<RegistryError> for CompositionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unresolved { name, environment } => {
                Self::UnresolvedParameter { name, environment }
            }
            other => Self::Registry(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_maps_to_composition_error() {
        let err: CompositionError = RegistryError::Unresolved {
            name: ParamName::UserPoolId,
            environment: "dev".to_string(),
        }
        .into();
        assert_eq!(
            err,
            CompositionError::UnresolvedParameter {
                name: ParamName::UserPoolId,
                environment: "dev".to_string(),
            }
        );
    }

    #[test]
    fn test_io_maps_to_registry_variant() {
        let err: CompositionError = RegistryError::Io("disk full".to_string()).into();
        assert!(matches!(err, CompositionError::Registry(ref m) if m.contains("disk full")));
    }

    #[test]
    fn test_messages() {
        let err = RegistryError::Unresolved {
            name: ParamName::DbProxyEndpoint,
            environment: "prod".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("db-proxy-endpoint"));
        assert!(msg.contains("/rds/proxy/endpoint"));
        assert!(msg.contains("prod"));

        let cycle = CompositionError::Cycle(vec!["a".into(), "b".into()]);
        assert_eq!(cycle.to_string(), "dependency cycle detected involving: a, b");
    }
}
