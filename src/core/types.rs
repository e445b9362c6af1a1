//! Composition types — parameters, units, descriptors, policy, capture locks,
//! plans, and provenance events.
//!
//! Everything that crosses a file boundary derives Serialize/Deserialize so
//! `stacks.yaml`, the registry store, capture locks and the engine manifest
//! all round-trip through serde.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Parameters
// ============================================================================

/// Well-known registry keys. The set is closed: every cross-unit identifier
/// travels under one of these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamName {
    UserPoolId,
    ClientId,
    DbProxyEndpoint,
    DbSecurityGroupId,
    FunctionSecurityGroupId,
    ContainerSecurityGroupId,
    CertificateArn,
}

impl ParamName {
    pub const ALL: [ParamName; 7] = [
        Self::UserPoolId,
        Self::ClientId,
        Self::DbProxyEndpoint,
        Self::DbSecurityGroupId,
        Self::FunctionSecurityGroupId,
        Self::ContainerSecurityGroupId,
        Self::CertificateArn,
    ];

    /// Kebab-case name used in `stacks.yaml` and `{{param.<slug>}}` templates.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::UserPoolId => "user-pool-id",
            Self::ClientId => "client-id",
            Self::DbProxyEndpoint => "db-proxy-endpoint",
            Self::DbSecurityGroupId => "db-security-group-id",
            Self::FunctionSecurityGroupId => "function-security-group-id",
            Self::ContainerSecurityGroupId => "container-security-group-id",
            Self::CertificateArn => "certificate-arn",
        }
    }

    /// Key under which the value lives in the external store. Identical in
    /// every environment; isolation is the store's job.
    pub fn path(&self) -> &'static str {
        match self {
            Self::UserPoolId => "/cognito/userPoolId",
            Self::ClientId => "/cognito/clientId",
            Self::DbProxyEndpoint => "/rds/proxy/endpoint",
            Self::DbSecurityGroupId => "/sg/rds",
            Self::FunctionSecurityGroupId => "/sg/lambda",
            Self::ContainerSecurityGroupId => "/sg/ecs",
            Self::CertificateArn => "/acm/cert/arn",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.slug() == slug)
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.path() == path)
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// A value as kept by a registry backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredParameter {
    pub value: String,

    /// BLAKE3 of the value
    pub hash: String,

    pub published_at: String,

    /// Unit that wrote the value
    pub published_by: String,
}

/// A value as returned by `resolve` — the stored value plus the moment it
/// was captured into a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedParameter {
    pub name: ParamName,
    pub value: String,
    pub hash: String,
    pub published_at: String,
    pub resolved_at: String,
}

/// Result of a publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created,
    Overwritten { previous_hash: String },
    Unchanged,
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Overwritten { .. } => write!(f, "overwritten"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

// ============================================================================
// Top-level stacks.yaml
// ============================================================================

/// Root configuration — the unit graph of one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable deployment name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Deployment environment; scopes the registry and state
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Static inputs, templated as `{{params.key}}`
    #[serde(default)]
    pub params: HashMap<String, serde_yaml_ng::Value>,

    /// Units in hand-authored apply order
    pub units: IndexMap<String, UnitDecl>,

    #[serde(default)]
    pub policy: Policy,
}

fn default_environment() -> String {
    "dev".to_string()
}

// ============================================================================
// Units
// ============================================================================

/// One independently deployable unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDecl {
    pub kind: UnitKind,

    #[serde(default)]
    pub description: Option<String>,

    /// Parameters this unit writes once its resources exist (value templates)
    #[serde(default)]
    pub publishes: IndexMap<ParamName, String>,

    /// Parameters captured at plan time
    #[serde(default)]
    pub resolves: Vec<ParamName>,

    /// Serverless functions (function_front only)
    #[serde(default)]
    pub functions: IndexMap<String, FunctionDecl>,

    /// Container services (container_front only)
    #[serde(default)]
    pub services: IndexMap<String, ServiceDecl>,

    /// Engine-owned resource shape, copied untouched into the manifest
    #[serde(default)]
    pub properties: IndexMap<String, serde_yaml_ng::Value>,
}

impl UnitDecl {
    /// Every parameter that must exist before this unit is applied: plan-time
    /// resolves plus runtime references held by container services.
    pub fn consumes(&self) -> Vec<ParamName> {
        let mut names = self.resolves.clone();
        for service in self.services.values() {
            for name in service.parameters.values() {
                if !names.contains(name) {
                    names.push(*name);
                }
            }
        }
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Network,
    Certificate,
    Identity,
    Database,
    FunctionFront,
    ContainerFront,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Certificate => write!(f, "certificate"),
            Self::Identity => write!(f, "identity"),
            Self::Database => write!(f, "database"),
            Self::FunctionFront => write!(f, "function_front"),
            Self::ContainerFront => write!(f, "container_front"),
        }
    }
}

/// Lifecycle of a unit inside one composition pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPhase {
    Declared,
    ResourcesConstructed,
    ParametersPublished,
    Complete,
    Failed,
}

impl fmt::Display for UnitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared => write!(f, "DECLARED"),
            Self::ResourcesConstructed => write!(f, "RESOURCES-CONSTRUCTED"),
            Self::ParametersPublished => write!(f, "PARAMETERS-PUBLISHED"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Module list — a single name or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleList {
    Single(String),
    Multiple(Vec<String>),
}

impl Default for ModuleList {
    fn default() -> Self {
        Self::Multiple(Vec::new())
    }
}

impl ModuleList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(s) => vec![s.clone()],
            Self::Multiple(v) => v.clone(),
        }
    }
}

impl From<&str> for ModuleList {
    fn from(name: &str) -> Self {
        Self::Single(name.to_string())
    }
}

impl From<String> for ModuleList {
    fn from(name: String) -> Self {
        Self::Single(name)
    }
}

impl<S: Into<String>> From<Vec<S>> for ModuleList {
    fn from(names: Vec<S>) -> Self {
        Self::Multiple(names.into_iter().map(Into::into).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ModuleList {
    fn from(names: [&str; N]) -> Self {
        Self::Multiple(names.iter().map(|s| s.to_string()).collect())
    }
}

/// Network attachment as written in `stacks.yaml` (templated).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDecl {
    #[serde(default)]
    pub vpc: String,

    #[serde(default)]
    pub security_groups: Vec<String>,
}

/// A serverless function on a function front.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDecl {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub env: IndexMap<String, String>,

    /// Seconds
    #[serde(default)]
    pub timeout: Option<u32>,

    /// Megabytes
    #[serde(default)]
    pub memory: Option<u32>,

    #[serde(default)]
    pub node_modules: ModuleList,

    #[serde(default)]
    pub external_modules: ModuleList,

    #[serde(default)]
    pub grants: Vec<Grant>,

    #[serde(default)]
    pub policies: Vec<PolicyStatement>,

    #[serde(default)]
    pub network: Option<NetworkDecl>,

    /// Request-router paths bound to this function
    #[serde(default)]
    pub routes: Vec<String>,
}

/// A container service on a container front.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDecl {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub env: IndexMap<String, String>,

    /// CPU units
    #[serde(default)]
    pub cpu: Option<u32>,

    /// MiB
    #[serde(default)]
    pub memory: Option<u32>,

    #[serde(default)]
    pub grants: Vec<Grant>,

    #[serde(default)]
    pub policies: Vec<PolicyStatement>,

    #[serde(default)]
    pub network: Option<NetworkDecl>,

    /// Env var -> registry parameter, read by the container platform at
    /// task start (never captured at plan time)
    #[serde(default)]
    pub parameters: IndexMap<String, ParamName>,

    /// Env var -> secret-store name (templated)
    #[serde(default)]
    pub secrets: IndexMap<String, String>,

    #[serde(default)]
    pub image_tag: Option<String>,

    #[serde(default)]
    pub container_port: Option<u16>,

    #[serde(default)]
    pub desired_count: Option<u32>,

    #[serde(default)]
    pub max_capacity: Option<u32>,

    #[serde(default)]
    pub health_check_path: Option<String>,
}

// ============================================================================
// Permissions
// ============================================================================

/// Named convenience grants; see `builder::GRANT_TABLE` for the exact
/// action sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    EventBridge,
    KmsSign,
    KmsDecrypt,
    SecretsManager,
    SendEmail,
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventBridge => write!(f, "event_bridge"),
            Self::KmsSign => write!(f, "kms_sign"),
            Self::KmsDecrypt => write!(f, "kms_decrypt"),
            Self::SecretsManager => write!(f, "secrets_manager"),
            Self::SendEmail => write!(f, "send_email"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// One IAM statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    #[serde(default)]
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str], resources: &[&str]) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.iter().map(|s| s.to_string()).collect(),
            resources: resources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// Resource descriptor
// ============================================================================

/// Fully specified configuration of one compute unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub description: String,
    pub runtime: String,
    pub architecture: Architecture,
    pub handler: String,
    pub bundling: Bundling,
    pub timeout_seconds: u32,
    pub memory_mb: u32,
    pub log_retention_days: u32,
    pub tracing: Tracing,
    pub policy: Vec<PolicyStatement>,
    pub environment: IndexMap<String, String>,
    pub network: Option<NetworkAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundling {
    /// Bundler target runtime
    pub target: String,

    /// Modules installed alongside the bundle
    pub node_modules: Vec<String>,

    /// Modules excluded from the bundle
    pub external_modules: Vec<String>,

    /// File extension -> loader
    pub loader: IndexMap<String, Loader>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    File,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    Arm64,
    X86_64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tracing {
    Disabled,
    Active,
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    pub vpc: String,
    pub security_groups: Vec<String>,
}

// ============================================================================
// Policy
// ============================================================================

/// Composition policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub ordering: OrderingPolicy,

    /// Append provenance events on every pass
    #[serde(default = "default_true")]
    pub tripwire: bool,

    /// Persist what each unit captured at plan time
    #[serde(default = "default_true")]
    pub capture_lock: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            ordering: OrderingPolicy::default(),
            tripwire: true,
            capture_lock: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// How the composition root picks the apply order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Hand-authored order, trusted as-is
    #[default]
    Declared,
    /// Hand-authored order, checked against publish/resolve edges first
    Verified,
    /// Order derived from publish/resolve edges
    Topological,
}

// ============================================================================
// Capture lock
// ============================================================================

/// What one unit captured during its last composition pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureLock {
    pub schema: String,
    pub environment: String,
    pub unit: String,
    pub generated_at: String,
    pub generator: String,
    pub blake3_version: String,

    /// Resolved parameters, as baked into the unit's plan
    pub parameters: IndexMap<ParamName, CapturedParameter>,

    /// Compute unit name -> descriptor hash
    #[serde(default)]
    pub descriptors: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedParameter {
    pub value: String,
    pub hash: String,
    pub published_at: String,
    pub resolved_at: String,
}

impl From<&ResolvedParameter> for CapturedParameter {
    fn from(r: &ResolvedParameter) -> Self {
        Self {
            value: r.value.clone(),
            hash: r.hash.clone(),
            published_at: r.published_at.clone(),
            resolved_at: r.resolved_at.clone(),
        }
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Effect of a publish against the current registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::NoOp => write!(f, "NO-OP"),
        }
    }
}

/// Where a resolve will be satisfied from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveSource {
    /// Already in the registry from a prior run
    Registry,
    /// Published earlier in this pass
    ThisPass { producer: String },
    /// Nowhere — the pass will fail here
    Missing,
}

#[derive(Debug, Clone)]
pub struct PlannedPublish {
    pub name: ParamName,
    pub action: PlanAction,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct PlannedResolve {
    pub name: ParamName,
    pub source: ResolveSource,
}

#[derive(Debug, Clone)]
pub struct PlannedUnit {
    pub unit: String,
    pub kind: UnitKind,
    pub resolves: Vec<PlannedResolve>,
    pub publishes: Vec<PlannedPublish>,
    pub compute_units: usize,
}

/// Full composition plan.
#[derive(Debug, Clone)]
pub struct CompositionPlan {
    pub name: String,
    pub environment: String,
    pub order: Vec<String>,
    pub units: Vec<PlannedUnit>,
    pub to_create: u32,
    pub to_update: u32,
    pub unchanged: u32,
    pub unresolved: u32,
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    CompositionStarted {
        environment: String,
        run_id: String,
        stackreg_version: String,
    },
    UnitStarted {
        unit: String,
        kind: UnitKind,
    },
    ParameterResolved {
        unit: String,
        name: ParamName,
        value: String,
        hash: String,
        published_at: String,
    },
    ParameterPublished {
        unit: String,
        name: ParamName,
        hash: String,
        outcome: String,
    },
    DescriptorBuilt {
        unit: String,
        compute_unit: String,
        hash: String,
    },
    UnitCompleted {
        unit: String,
        resolved: u32,
        published: u32,
        duration_seconds: f64,
    },
    UnitFailed {
        unit: String,
        /// Last phase the unit reached before failing
        phase: UnitPhase,
        error: String,
    },
    CompositionCompleted {
        environment: String,
        run_id: String,
        units_completed: u32,
        units_failed: u32,
        total_seconds: f64,
    },
    StaleDetected {
        unit: String,
        name: ParamName,
        captured_hash: String,
        current_hash: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Template helper
// ============================================================================

/// Convert a serde_yaml_ng::Value to a string for template resolution.
pub fn yaml_value_to_string(val: &serde_yaml_ng::Value) -> String {
    match val {
        serde_yaml_ng::Value::String(s) => s.clone(),
        serde_yaml_ng::Value::Number(n) => n.to_string(),
        serde_yaml_ng::Value::Bool(b) => b.to_string(),
        serde_yaml_ng::Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse() {
        let yaml = r#"
version: "1.0"
name: chats
environment: staging
params:
  rds_secret_name: mainRdsSecret
units:
  vpc:
    kind: network
    publishes:
      db-security-group-id: sg-0rds
  db:
    kind: database
    resolves: [db-security-group-id]
    publishes:
      db-proxy-endpoint: db.internal:5432
policy:
  ordering: verified
"#;
        let config: StackConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.environment, "staging");
        assert_eq!(config.units.len(), 2);
        assert_eq!(config.units["vpc"].kind, UnitKind::Network);
        assert_eq!(
            config.units["vpc"].publishes[&ParamName::DbSecurityGroupId],
            "sg-0rds"
        );
        assert_eq!(config.units["db"].resolves, vec![ParamName::DbSecurityGroupId]);
        assert_eq!(config.policy.ordering, OrderingPolicy::Verified);
    }

    #[test]
    fn test_unit_order_is_declaration_order() {
        let yaml = r#"
version: "1.0"
name: t
units:
  zeta: { kind: network }
  alpha: { kind: identity }
  mid: { kind: database }
"#;
        let config: StackConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let keys: Vec<_> = config.units.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(config.environment, "dev");
    }

    #[test]
    fn test_param_name_slug_and_path() {
        assert_eq!(ParamName::DbProxyEndpoint.slug(), "db-proxy-endpoint");
        assert_eq!(ParamName::DbProxyEndpoint.path(), "/rds/proxy/endpoint");
        assert_eq!(ParamName::from_slug("user-pool-id"), Some(ParamName::UserPoolId));
        assert_eq!(ParamName::from_path("/sg/ecs"), Some(ParamName::ContainerSecurityGroupId));
        assert_eq!(ParamName::from_slug("nope"), None);
    }

    #[test]
    fn test_param_name_serde_matches_slug() {
        for name in ParamName::ALL {
            let yaml = serde_yaml_ng::to_string(&name).unwrap();
            assert_eq!(yaml.trim(), name.slug());
        }
    }

    #[test]
    fn test_param_paths_unique() {
        let mut paths: Vec<_> = ParamName::ALL.iter().map(|n| n.path()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), ParamName::ALL.len());
    }

    #[test]
    fn test_module_list_forms() {
        let single: ModuleList = serde_yaml_ng::from_str("pg").unwrap();
        assert_eq!(single.to_vec(), vec!["pg"]);
        let many: ModuleList = serde_yaml_ng::from_str("[pg, pg-native]").unwrap();
        assert_eq!(many.to_vec(), vec!["pg", "pg-native"]);
        assert_eq!(ModuleList::from(["a", "b"]).to_vec(), vec!["a", "b"]);
        assert!(ModuleList::default().to_vec().is_empty());
    }

    #[test]
    fn test_consumes_includes_runtime_parameters() {
        let yaml = r#"
kind: container_front
resolves: [certificate-arn]
services:
  chat:
    parameters:
      AWS_USER_POOL_ID: user-pool-id
      CERT: certificate-arn
"#;
        let unit: UnitDecl = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(
            unit.consumes(),
            vec![ParamName::CertificateArn, ParamName::UserPoolId]
        );
    }

    #[test]
    fn test_policy_defaults() {
        let p = Policy::default();
        assert_eq!(p.ordering, OrderingPolicy::Declared);
        assert!(p.tripwire);
        assert!(p.capture_lock);
    }

    #[test]
    fn test_display_impls() {
        assert_eq!(UnitKind::FunctionFront.to_string(), "function_front");
        assert_eq!(UnitPhase::ParametersPublished.to_string(), "PARAMETERS-PUBLISHED");
        assert_eq!(PlanAction::NoOp.to_string(), "NO-OP");
        assert_eq!(Grant::KmsDecrypt.to_string(), "kms_decrypt");
        assert_eq!(
            PublishOutcome::Overwritten { previous_hash: "x".into() }.to_string(),
            "overwritten"
        );
    }

    #[test]
    fn test_provenance_event_serde() {
        let event = ProvenanceEvent::ParameterPublished {
            unit: "vpc".to_string(),
            name: ParamName::DbSecurityGroupId,
            hash: "blake3:abc".to_string(),
            outcome: "created".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"parameter_published\""));
        assert!(json.contains("\"name\":\"db-security-group-id\""));
    }

    #[test]
    fn test_capture_lock_roundtrip() {
        let lock = CaptureLock {
            schema: "1.0".to_string(),
            environment: "dev".to_string(),
            unit: "api".to_string(),
            generated_at: "2026-10-16T12:00:00Z".to_string(),
            generator: "stackreg 0.1.0".to_string(),
            blake3_version: "1.8".to_string(),
            parameters: IndexMap::from([(
                ParamName::DbProxyEndpoint,
                CapturedParameter {
                    value: "db.internal:5432".to_string(),
                    hash: "blake3:abc".to_string(),
                    published_at: "2026-10-16T11:00:00Z".to_string(),
                    resolved_at: "2026-10-16T12:00:00Z".to_string(),
                },
            )]),
            descriptors: IndexMap::new(),
        };
        let yaml = serde_yaml_ng::to_string(&lock).unwrap();
        let back: CaptureLock = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(
            back.parameters[&ParamName::DbProxyEndpoint].value,
            "db.internal:5432"
        );
    }

    #[test]
    fn test_yaml_value_to_string() {
        assert_eq!(
            yaml_value_to_string(&serde_yaml_ng::Value::String("hello".into())),
            "hello"
        );
        assert_eq!(yaml_value_to_string(&serde_yaml_ng::Value::Bool(true)), "true");
        assert_eq!(yaml_value_to_string(&serde_yaml_ng::Value::Null), "");
    }
}
