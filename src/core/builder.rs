//! Resource builder — fluent accumulation of one compute unit's
//! configuration into a `ResourceDescriptor`.
//!
//! Every setter takes `&mut self` and returns the same builder, so calls
//! chain on one instance. Setters never fail; whether the result is usable
//! is decided downstream by `ResourceDescriptor::problems`. `build` clones the
//! accumulated state, so one builder can emit several independent
//! descriptors and keeps accepting calls afterwards. Two builders never share
//! state.

use super::types::*;
use indexmap::IndexMap;

pub const DEFAULT_RUNTIME: &str = "nodejs20.x";
pub const DEFAULT_BUNDLING_TARGET: &str = "node20";
pub const DEFAULT_HANDLER: &str = "handler";
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 30;
pub const DEFAULT_MEMORY_MB: u32 = 256;
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 7;

/// A convenience grant: fixed action set on a fixed resource pattern.
#[derive(Debug, Clone, Copy)]
pub struct GrantSpec {
    pub grant: Grant,
    pub actions: &'static [&'static str],
    pub resources: &'static [&'static str],
}

/// Least-privilege action sets. Each entry is the complete list for its
/// grant; nothing is implied beyond what is written here.
pub static GRANT_TABLE: [GrantSpec; 5] = [
    GrantSpec {
        grant: Grant::EventBridge,
        actions: &["events:PutEvents"],
        resources: &["*"],
    },
    GrantSpec {
        grant: Grant::KmsSign,
        actions: &["kms:Sign"],
        resources: &["*"],
    },
    GrantSpec {
        grant: Grant::KmsDecrypt,
        actions: &["kms:Decrypt"],
        resources: &["*"],
    },
    GrantSpec {
        grant: Grant::SecretsManager,
        actions: &["secretsmanager:GetSecretValue"],
        resources: &["*"],
    },
    GrantSpec {
        grant: Grant::SendEmail,
        actions: &["ses:SendEmail", "ses:SendTemplatedEmail"],
        resources: &["*"],
    },
];

impl Grant {
    pub fn spec(&self) -> &'static GrantSpec {
        let idx = match self {
            Self::EventBridge => 0,
            Self::KmsSign => 1,
            Self::KmsDecrypt => 2,
            Self::SecretsManager => 3,
            Self::SendEmail => 4,
        };
        &GRANT_TABLE[idx]
    }

    pub fn statement(&self) -> PolicyStatement {
        let spec = self.spec();
        PolicyStatement::allow(spec.actions, spec.resources)
    }
}

/// Builder for one compute unit.
#[derive(Debug, Clone)]
pub struct ResourceBuilder {
    name: String,
    description: String,
    environment: IndexMap<String, String>,
    timeout_seconds: u32,
    memory_mb: u32,
    node_modules: Vec<String>,
    external_modules: Vec<String>,
    policy: Vec<PolicyStatement>,
    network: Option<NetworkAttachment>,
}

impl ResourceBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            environment: IndexMap::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            memory_mb: DEFAULT_MEMORY_MB,
            node_modules: Vec::new(),
            external_modules: Vec::new(),
            policy: Vec::new(),
            network: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the whole environment mapping. Earlier calls are discarded.
    pub fn set_env<K, V, I>(&mut self, env: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment = env
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn set_timeout(&mut self, seconds: u32) -> &mut Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn set_memory(&mut self, megabytes: u32) -> &mut Self {
        self.memory_mb = megabytes;
        self
    }

    /// Append modules to install next to the bundle. Duplicates are kept.
    pub fn add_dependency_modules(&mut self, modules: impl Into<ModuleList>) -> &mut Self {
        self.node_modules.extend(modules.into().to_vec());
        self
    }

    /// Append modules to leave out of the bundle. Duplicates are kept.
    pub fn add_excluded_modules(&mut self, modules: impl Into<ModuleList>) -> &mut Self {
        self.external_modules.extend(modules.into().to_vec());
        self
    }

    /// Append one statement. No dedup: N calls yield N statements in order.
    pub fn add_policy(&mut self, statement: PolicyStatement) -> &mut Self {
        self.policy.push(statement);
        self
    }

    pub fn allow(&mut self, grant: Grant) -> &mut Self {
        self.add_policy(grant.statement())
    }

    pub fn allow_event_bridge(&mut self) -> &mut Self {
        self.allow(Grant::EventBridge)
    }

    pub fn allow_kms_sign(&mut self) -> &mut Self {
        self.allow(Grant::KmsSign)
    }

    pub fn allow_kms_decrypt(&mut self) -> &mut Self {
        self.allow(Grant::KmsDecrypt)
    }

    pub fn allow_secrets_manager(&mut self) -> &mut Self {
        self.allow(Grant::SecretsManager)
    }

    pub fn allow_send_email(&mut self) -> &mut Self {
        self.allow(Grant::SendEmail)
    }

    /// Attach to one network. A second call replaces the first entirely.
    pub fn connect_network<S: Into<String>>(
        &mut self,
        vpc: &str,
        security_groups: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.network = Some(NetworkAttachment {
            vpc: vpc.to_string(),
            security_groups: security_groups.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn set_description(&mut self, text: &str) -> &mut Self {
        self.description = text.to_string();
        self
    }

    /// Snapshot the accumulated configuration merged with component defaults.
    pub fn build(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            runtime: DEFAULT_RUNTIME.to_string(),
            architecture: Architecture::Arm64,
            handler: DEFAULT_HANDLER.to_string(),
            bundling: Bundling {
                target: DEFAULT_BUNDLING_TARGET.to_string(),
                node_modules: self.node_modules.clone(),
                external_modules: self.external_modules.clone(),
                loader: default_loaders(),
            },
            timeout_seconds: self.timeout_seconds,
            memory_mb: self.memory_mb,
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
            tracing: Tracing::Disabled,
            policy: self.policy.clone(),
            environment: self.environment.clone(),
            network: self.network.clone(),
        }
    }
}

fn default_loaders() -> IndexMap<String, Loader> {
    IndexMap::from([
        (".pem".to_string(), Loader::File),
        (".html".to_string(), Loader::Text),
    ])
}

impl ResourceDescriptor {
    /// Conditions the provisioning engine would reject. Empty = usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.is_empty() {
            problems.push("name must not be empty".to_string());
        }
        if self.timeout_seconds == 0 {
            problems.push("timeout must be a positive number of seconds".to_string());
        }
        if self.memory_mb == 0 {
            problems.push("memory must be a positive number of megabytes".to_string());
        }
        if let Some(ref network) = self.network {
            if network.vpc.trim().is_empty() {
                problems.push("network attachment has no VPC reference".to_string());
            }
            if network.security_groups.is_empty() {
                problems.push("network attachment has no security groups".to_string());
            }
            if network.security_groups.iter().any(|g| g.trim().is_empty()) {
                problems.push("network attachment has an empty security group id".to_string());
            }
        }
        for (i, stmt) in self.policy.iter().enumerate() {
            if stmt.actions.is_empty() {
                problems.push(format!("policy statement {} has no actions", i));
            }
            if stmt.resources.is_empty() {
                problems.push(format!("policy statement {} has no resources", i));
            }
        }

        problems
    }
}
