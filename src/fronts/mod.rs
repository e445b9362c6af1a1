//! Compute front adapters — turn a finished descriptor into the artifact a
//! provisioning engine deploys.
//!
//! Each adapter takes the descriptor by value: one descriptor, one consumer.

pub mod container;
pub mod function;

use crate::core::builder::ResourceBuilder;
use crate::core::types::{Grant, NetworkDecl, PolicyStatement, ResourceDescriptor};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use container::ServiceArtifact;
pub use function::FunctionArtifact;

/// A deployable compute unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Function(FunctionArtifact),
    Service(ServiceArtifact),
}

impl Artifact {
    pub fn name(&self) -> &str {
        match self {
            Self::Function(f) => &f.function_name,
            Self::Service(s) => &s.service_name,
        }
    }

    pub fn logical_id(&self) -> &str {
        match self {
            Self::Function(f) => &f.logical_id,
            Self::Service(s) => &s.logical_id,
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        match self {
            Self::Function(f) => &f.descriptor,
            Self::Service(s) => &s.descriptor,
        }
    }
}

/// An HTTP route bound to a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub method: String,
}

/// `api-chats` → `ApiChats`.
pub fn pascal_case(name: &str) -> String {
    name.split(['-', '_', '.', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Settings shared by both fronts, applied in declaration order.
fn seed_builder(
    builder: &mut ResourceBuilder,
    description: Option<&str>,
    env: &IndexMap<String, String>,
    grants: &[Grant],
    policies: &[PolicyStatement],
    network: Option<&NetworkDecl>,
) {
    if let Some(text) = description {
        builder.set_description(text);
    }
    builder.set_env(env.iter().map(|(k, v)| (k.clone(), v.clone())));
    for grant in grants {
        builder.allow(*grant);
    }
    for statement in policies {
        builder.add_policy(statement.clone());
    }
    if let Some(n) = network {
        builder.connect_network(&n.vpc, n.security_groups.iter().cloned());
    }
}
