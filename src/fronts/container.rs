//! Container service front.
//!
//! Runtime `parameters` are not resolved here. The artifact carries their
//! registry paths and the container platform reads the current value every
//! time a task starts, so a service never runs on a value captured at plan
//! time.

use super::{pascal_case, seed_builder};
use crate::core::builder::ResourceBuilder;
use crate::core::types::{ResourceDescriptor, ServiceDecl};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CPU: u32 = 256;
pub const DEFAULT_MEMORY_MIB: u32 = 512;
pub const DEFAULT_CONTAINER_PORT: u16 = 80;
pub const DEFAULT_DESIRED_COUNT: u32 = 1;
pub const DEFAULT_MAX_CAPACITY: u32 = 10;
pub const DEFAULT_SCALING_TARGET_PERCENT: u32 = 50;
pub const DEFAULT_HEALTH_CHECK_PATH: &str = "/health";
pub const DEFAULT_IMAGE_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scaling {
    pub max_capacity: u32,
    pub cpu_target_percent: u32,
    pub memory_target_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceArtifact {
    /// Engine-side construct id: the service name in PascalCase plus
    /// `Service`, e.g. `chat-api` becomes `ChatApiService`
    pub logical_id: String,
    pub service_name: String,

    /// Task definition family
    pub family: String,
    pub image_tag: String,
    pub descriptor: ResourceDescriptor,
    pub cpu: u32,
    pub memory_mib: u32,
    pub container_port: u16,
    pub desired_count: u32,
    pub min_healthy_percent: u32,
    pub max_healthy_percent: u32,
    pub scaling: Scaling,
    pub health_check_path: String,

    /// Env var -> registry path, read at task start
    pub parameters: IndexMap<String, String>,

    /// Env var -> secret-store name
    pub secrets: IndexMap<String, String>,

    pub security_groups: Vec<String>,
}

/// Seed a builder from an already-templated service declaration.
pub fn builder(name: &str, decl: &ServiceDecl) -> ResourceBuilder {
    let mut b = ResourceBuilder::new(name);
    seed_builder(
        &mut b,
        decl.description.as_deref(),
        &decl.env,
        &decl.grants,
        &decl.policies,
        decl.network.as_ref(),
    );
    b.set_memory(decl.memory.unwrap_or(DEFAULT_MEMORY_MIB));
    b
}

/// Wrap a descriptor as a deployable container service.
pub fn attach(descriptor: ResourceDescriptor, decl: &ServiceDecl) -> ServiceArtifact {
    let name = descriptor.name.clone();
    let security_groups = descriptor
        .network
        .as_ref()
        .map(|n| n.security_groups.clone())
        .unwrap_or_default();
    ServiceArtifact {
        logical_id: format!("{}Service", pascal_case(&name)),
        family: name.clone(),
        image_tag: decl
            .image_tag
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE_TAG.to_string()),
        cpu: decl.cpu.unwrap_or(DEFAULT_CPU),
        memory_mib: descriptor.memory_mb,
        container_port: decl.container_port.unwrap_or(DEFAULT_CONTAINER_PORT),
        desired_count: decl.desired_count.unwrap_or(DEFAULT_DESIRED_COUNT),
        min_healthy_percent: 100,
        max_healthy_percent: 200,
        scaling: Scaling {
            max_capacity: decl.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY),
            cpu_target_percent: DEFAULT_SCALING_TARGET_PERCENT,
            memory_target_percent: DEFAULT_SCALING_TARGET_PERCENT,
        },
        health_check_path: decl
            .health_check_path
            .clone()
            .unwrap_or_else(|| DEFAULT_HEALTH_CHECK_PATH.to_string()),
        parameters: decl
            .parameters
            .iter()
            .map(|(env, name)| (env.clone(), name.path().to_string()))
            .collect(),
        secrets: decl.secrets.clone(),
        security_groups,
        service_name: name,
        descriptor,
    }
}
