//! Serverless function front.

use super::{pascal_case, seed_builder, Route};
use crate::core::builder::ResourceBuilder;
use crate::core::types::{FunctionDecl, ResourceDescriptor};
use serde::{Deserialize, Serialize};

/// Method every route is bound with.
pub const ROUTE_METHOD: &str = "ANY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArtifact {
    /// Engine-side construct id: the function name in PascalCase plus
    /// `Fn`, so `api-chats` becomes `ApiChatsFn` rather than `api-chatsFn`
    pub logical_id: String,
    pub function_name: String,

    /// Source entry point, `functions/<name>/index.ts`
    pub entry: String,

    pub descriptor: ResourceDescriptor,
    pub routes: Vec<Route>,
}

/// Seed a builder from an already-templated function declaration.
pub fn builder(name: &str, decl: &FunctionDecl) -> ResourceBuilder {
    let mut b = ResourceBuilder::new(name);
    seed_builder(
        &mut b,
        decl.description.as_deref(),
        &decl.env,
        &decl.grants,
        &decl.policies,
        decl.network.as_ref(),
    );
    if let Some(seconds) = decl.timeout {
        b.set_timeout(seconds);
    }
    if let Some(mb) = decl.memory {
        b.set_memory(mb);
    }
    b.add_dependency_modules(decl.node_modules.clone())
        .add_excluded_modules(decl.external_modules.clone());
    b
}

/// Wrap a descriptor as a deployable function with its routes.
pub fn attach(descriptor: ResourceDescriptor, decl: &FunctionDecl) -> FunctionArtifact {
    let name = descriptor.name.clone();
    FunctionArtifact {
        logical_id: format!("{}Fn", pascal_case(&name)),
        entry: format!("functions/{}/index.ts", name),
        function_name: name,
        descriptor,
        routes: decl
            .routes
            .iter()
            .map(|path| Route {
                path: path.clone(),
                method: ROUTE_METHOD.to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Grant, NetworkDecl};
    use indexmap::IndexMap;

    fn chats_decl() -> FunctionDecl {
        FunctionDecl {
            description: Some("Chats CRUD operations".to_string()),
            env: IndexMap::from([
                ("RDS_SECRET_NAME".to_string(), "mainRdsSecret".to_string()),
                ("RDS_PROXY_HOST".to_string(), "proxy.rds".to_string()),
            ]),
            grants: vec![Grant::SecretsManager],
            network: Some(NetworkDecl {
                vpc: "main".to_string(),
                security_groups: vec!["sg-0lambda".to_string()],
            }),
            routes: vec!["/chats".to_string(), "/chats/{id}".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_builder_seeds_descriptor() {
        let descriptor = builder("api-chats", &chats_decl()).build();
        assert_eq!(descriptor.description, "Chats CRUD operations");
        assert_eq!(descriptor.environment["RDS_PROXY_HOST"], "proxy.rds");
        assert_eq!(descriptor.policy, vec![Grant::SecretsManager.statement()]);
        let network = descriptor.network.unwrap();
        assert_eq!(network.vpc, "main");
        assert_eq!(network.security_groups, vec!["sg-0lambda"]);
        assert_eq!(descriptor.timeout_seconds, 30);
    }

    #[test]
    fn test_builder_overrides_and_modules() {
        let decl = FunctionDecl {
            timeout: Some(60),
            memory: Some(1024),
            node_modules: "pg".into(),
            external_modules: vec!["pg-native", "aws-sdk"].into(),
            ..Default::default()
        };
        let descriptor = builder("worker", &decl).build();
        assert_eq!(descriptor.timeout_seconds, 60);
        assert_eq!(descriptor.memory_mb, 1024);
        assert_eq!(descriptor.bundling.node_modules, vec!["pg"]);
        assert_eq!(descriptor.bundling.external_modules, vec!["pg-native", "aws-sdk"]);
    }

    #[test]
    fn test_attach() {
        let decl = chats_decl();
        let artifact = attach(builder("api-chats", &decl).build(), &decl);
        assert_eq!(artifact.logical_id, "ApiChatsFn");
        assert_eq!(artifact.function_name, "api-chats");
        assert_eq!(artifact.entry, "functions/api-chats/index.ts");
        assert_eq!(artifact.routes.len(), 2);
        assert!(artifact.routes.iter().all(|r| r.method == "ANY"));
        assert_eq!(artifact.routes[1].path, "/chats/{id}");
    }
}
