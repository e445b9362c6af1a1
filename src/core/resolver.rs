//! Template resolution and unit ordering.
//!
//! Resolves `{{params.key}}` (static inputs) and `{{param.<slug>}}` (registry
//! values captured by the unit) templates. Derives producer → consumer edges
//! from publish/resolve sets and computes an apply order with Kahn's
//! algorithm, breaking ties by declaration order.

use super::error::CompositionError;
use super::types::*;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};

/// Resolve all template variables in a string.
pub fn resolve_template(
    template: &str,
    params: &HashMap<String, serde_yaml_ng::Value>,
    resolved: &IndexMap<ParamName, String>,
) -> Result<String, String> {
    let mut result = template.to_string();
    let mut start = 0;

    while let Some(open) = result[start..].find("{{") {
        let open = start + open;
        let close = result[open..]
            .find("}}")
            .ok_or_else(|| format!("unclosed template at position {}", open))?;
        let close = open + close + 2;
        let key = result[open + 2..close - 2].trim();

        let value = if let Some(param_key) = key.strip_prefix("params.") {
            params
                .get(param_key)
                .map(yaml_value_to_string)
                .ok_or_else(|| format!("unknown param: {}", param_key))?
        } else if let Some(slug) = key.strip_prefix("param.") {
            let name = ParamName::from_slug(slug)
                .ok_or_else(|| format!("unknown registry parameter: {}", slug))?;
            resolved
                .get(&name)
                .cloned()
                .ok_or_else(|| format!("registry parameter '{}' is not resolved by this unit", slug))?
        } else {
            return Err(format!("unknown template variable: {}", key));
        };

        result.replace_range(open..close, &value);
        start = open + value.len();
    }

    Ok(result)
}

/// Every template key referenced by a string, without resolving anything.
pub fn template_refs(template: &str) -> Result<Vec<String>, String> {
    let mut refs = Vec::new();
    let mut rest = template;
    let mut offset = 0;
    while let Some(open) = rest.find("{{") {
        let close = rest[open..]
            .find("}}")
            .ok_or_else(|| format!("unclosed template at position {}", offset + open))?;
        refs.push(rest[open + 2..open + close].trim().to_string());
        offset += open + close + 2;
        rest = &rest[open + close + 2..];
    }
    Ok(refs)
}

/// Registry parameters referenced as `{{param.<slug>}}`. Unknown slugs are
/// returned as errors so validation can name them.
pub fn registry_refs(template: &str) -> Result<Vec<ParamName>, String> {
    let mut names = Vec::new();
    for key in template_refs(template)? {
        if let Some(slug) = key.strip_prefix("param.") {
            let name = ParamName::from_slug(slug)
                .ok_or_else(|| format!("unknown registry parameter: {}", slug))?;
            names.push(name);
        }
    }
    Ok(names)
}

/// Every templatable string a unit carries, labelled for error messages.
pub fn unit_template_fields(unit: &UnitDecl) -> Vec<(String, &str)> {
    let mut fields: Vec<(String, &str)> = Vec::new();
    for (name, value) in &unit.publishes {
        fields.push((format!("publishes.{}", name), value.as_str()));
    }
    for (fname, f) in &unit.functions {
        for (k, v) in &f.env {
            fields.push((format!("functions.{}.env.{}", fname, k), v.as_str()));
        }
        if let Some(ref network) = f.network {
            fields.push((format!("functions.{}.network.vpc", fname), network.vpc.as_str()));
            for sg in &network.security_groups {
                fields.push((format!("functions.{}.network.security_groups", fname), sg.as_str()));
            }
        }
    }
    for (sname, s) in &unit.services {
        for (k, v) in &s.env {
            fields.push((format!("services.{}.env.{}", sname, k), v.as_str()));
        }
        for (k, v) in &s.secrets {
            fields.push((format!("services.{}.secrets.{}", sname, k), v.as_str()));
        }
        if let Some(ref tag) = s.image_tag {
            fields.push((format!("services.{}.image_tag", sname), tag.as_str()));
        }
        if let Some(ref network) = s.network {
            fields.push((format!("services.{}.network.vpc", sname), network.vpc.as_str()));
            for sg in &network.security_groups {
                fields.push((format!("services.{}.network.security_groups", sname), sg.as_str()));
            }
        }
    }
    fields
}

fn resolve_network(
    network: &Option<NetworkDecl>,
    params: &HashMap<String, serde_yaml_ng::Value>,
    resolved: &IndexMap<ParamName, String>,
) -> Result<Option<NetworkDecl>, String> {
    match network {
        None => Ok(None),
        Some(n) => Ok(Some(NetworkDecl {
            vpc: resolve_template(&n.vpc, params, resolved)?,
            security_groups: n
                .security_groups
                .iter()
                .map(|sg| resolve_template(sg, params, resolved))
                .collect::<Result<_, _>>()?,
        })),
    }
}

fn resolve_map(
    map: &IndexMap<String, String>,
    params: &HashMap<String, serde_yaml_ng::Value>,
    resolved: &IndexMap<ParamName, String>,
) -> Result<IndexMap<String, String>, String> {
    map.iter()
        .map(|(k, v)| Ok::<_, String>((k.clone(), resolve_template(v, params, resolved)?)))
        .collect()
}

/// Resolve all templates in a function declaration.
pub fn resolve_function_templates(
    function: &FunctionDecl,
    params: &HashMap<String, serde_yaml_ng::Value>,
    resolved: &IndexMap<ParamName, String>,
) -> Result<FunctionDecl, String> {
    let mut out = function.clone();
    out.env = resolve_map(&function.env, params, resolved)?;
    out.network = resolve_network(&function.network, params, resolved)?;
    Ok(out)
}

/// Resolve all templates in a container service declaration. Runtime
/// `parameters` are left alone; the container platform reads them.
pub fn resolve_service_templates(
    service: &ServiceDecl,
    params: &HashMap<String, serde_yaml_ng::Value>,
    resolved: &IndexMap<ParamName, String>,
) -> Result<ServiceDecl, String> {
    let mut out = service.clone();
    out.env = resolve_map(&service.env, params, resolved)?;
    out.secrets = resolve_map(&service.secrets, params, resolved)?;
    out.network = resolve_network(&service.network, params, resolved)?;
    if let Some(ref tag) = service.image_tag {
        out.image_tag = Some(resolve_template(tag, params, resolved)?);
    }
    Ok(out)
}

/// Render the values a unit publishes.
pub fn resolve_publish_values(
    unit: &UnitDecl,
    params: &HashMap<String, serde_yaml_ng::Value>,
    resolved: &IndexMap<ParamName, String>,
) -> Result<IndexMap<ParamName, String>, String> {
    unit.publishes
        .iter()
        .map(|(name, template)| {
            Ok::<_, String>((*name, resolve_template(template, params, resolved)?))
        })
        .collect()
}

// ============================================================================
// Ordering
// ============================================================================

/// Producer → consumer edge carried by one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub producer: String,
    pub consumer: String,
    pub name: ParamName,
}

/// Unit that publishes each name. First writer wins if the config has
/// duplicates; validation reports those separately.
pub fn producers(config: &StackConfig) -> HashMap<ParamName, String> {
    let mut map = HashMap::new();
    for (unit_name, unit) in &config.units {
        for name in unit.publishes.keys() {
            map.entry(*name).or_insert_with(|| unit_name.clone());
        }
    }
    map
}

/// Edges from publish/resolve sets. A consumed name with no producer in this
/// config contributes no edge; it must already be in the registry.
pub fn dependency_edges(config: &StackConfig) -> Vec<Edge> {
    let producers = producers(config);
    let mut edges = Vec::new();
    for (unit_name, unit) in &config.units {
        for name in unit.consumes() {
            if let Some(producer) = producers.get(&name) {
                if producer != unit_name {
                    edges.push(Edge {
                        producer: producer.clone(),
                        consumer: unit_name.clone(),
                        name,
                    });
                }
            }
        }
    }
    edges
}

/// Every consumer declared before its producer.
pub fn check_declared_order(config: &StackConfig) -> Vec<CompositionError> {
    dependency_edges(config)
        .into_iter()
        .filter(|e| {
            let consumer = config.units.get_index_of(&e.consumer);
            let producer = config.units.get_index_of(&e.producer);
            consumer < producer
        })
        .map(|e| CompositionError::OrderingViolation {
            consumer: e.consumer,
            producer: e.producer,
            name: e.name,
        })
        .collect()
}

/// Build a topological apply order from publish/resolve edges.
/// Uses Kahn's algorithm with declaration-order tie-breaking.
pub fn build_execution_order(config: &StackConfig) -> Result<Vec<String>, CompositionError> {
    let count = config.units.len();
    let mut in_degree = vec![0usize; count];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); count];

    for edge in dependency_edges(config) {
        let (Some(from), Some(to)) = (
            config.units.get_index_of(&edge.producer),
            config.units.get_index_of(&edge.consumer),
        ) else {
            continue;
        };
        if !adjacency[from].contains(&to) {
            adjacency[from].push(to);
            in_degree[to] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(current) = ready.pop_first() {
        order.push(current);
        for &next in &adjacency[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() != count {
        let members = (0..count)
            .filter(|i| !order.contains(i))
            .filter_map(|i| config.units.get_index(i).map(|(k, _)| k.clone()))
            .collect();
        return Err(CompositionError::Cycle(members));
    }

    Ok(order
        .into_iter()
        .filter_map(|i| config.units.get_index(i).map(|(k, _)| k.clone()))
        .collect())
}

/// Apply order under the configured ordering policy.
///
/// Under `verified` this fails with the first violation in declaration
/// order only; `check_declared_order` lists all of them.
pub fn unit_order(config: &StackConfig) -> Result<Vec<String>, CompositionError> {
    match config.policy.ordering {
        OrderingPolicy::Declared => Ok(config.units.keys().cloned().collect()),
        OrderingPolicy::Verified => match check_declared_order(config).into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(config.units.keys().cloned().collect()),
        },
        OrderingPolicy::Topological => build_execution_order(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, serde_yaml_ng::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_yaml_ng::Value::String(v.to_string())))
            .collect()
    }

    fn parse(yaml: &str) -> StackConfig {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn test_resolve_params() {
        let result =
            resolve_template("hello {{params.name}}", &params(&[("name", "world")]), &IndexMap::new())
                .unwrap();
        assert_eq!(result, "hello world");
    }

    #[test]
    fn test_resolve_registry_param() {
        let resolved = IndexMap::from([(ParamName::DbProxyEndpoint, "db.internal".to_string())]);
        let result =
            resolve_template("{{ param.db-proxy-endpoint }}:5432", &HashMap::new(), &resolved)
                .unwrap();
        assert_eq!(result, "db.internal:5432");
    }

    #[test]
    fn test_resolve_unresolved_registry_param() {
        let err = resolve_template("{{param.client-id}}", &HashMap::new(), &IndexMap::new())
            .unwrap_err();
        assert!(err.contains("not resolved by this unit"));
    }

    #[test]
    fn test_resolve_unknown_forms() {
        let none = IndexMap::new();
        let empty = HashMap::new();
        assert!(resolve_template("{{params.missing}}", &empty, &none)
            .unwrap_err()
            .contains("unknown param"));
        assert!(resolve_template("{{param.nope}}", &empty, &none)
            .unwrap_err()
            .contains("unknown registry parameter"));
        assert!(resolve_template("{{machine.a.addr}}", &empty, &none)
            .unwrap_err()
            .contains("unknown template variable"));
        assert!(resolve_template("{{params.a", &empty, &none)
            .unwrap_err()
            .contains("unclosed"));
    }

    #[test]
    fn test_resolve_multiple() {
        let result = resolve_template(
            "{{params.a}}-{{params.b}}",
            &params(&[("a", "X"), ("b", "Y")]),
            &IndexMap::new(),
        )
        .unwrap();
        assert_eq!(result, "X-Y");
    }

    #[test]
    fn test_value_containing_braces_not_reexpanded() {
        let result =
            resolve_template("{{params.a}}!", &params(&[("a", "{{params.a}}")]), &IndexMap::new())
                .unwrap();
        assert_eq!(result, "{{params.a}}!");
    }

    #[test]
    fn test_template_and_registry_refs() {
        let refs = template_refs("x {{params.a}} y {{ param.client-id }}").unwrap();
        assert_eq!(refs, vec!["params.a", "param.client-id"]);
        assert_eq!(
            registry_refs("{{param.client-id}}/{{param.user-pool-id}}").unwrap(),
            vec![ParamName::ClientId, ParamName::UserPoolId]
        );
        assert!(registry_refs("{{param.bogus}}").is_err());
    }

    #[test]
    fn test_resolve_function_templates() {
        let function = FunctionDecl {
            env: IndexMap::from([
                ("DB_HOST".to_string(), "{{param.db-proxy-endpoint}}".to_string()),
                ("SECRET".to_string(), "{{params.secret}}".to_string()),
            ]),
            network: Some(NetworkDecl {
                vpc: "main".to_string(),
                security_groups: vec!["{{param.function-security-group-id}}".to_string()],
            }),
            ..Default::default()
        };
        let resolved = IndexMap::from([
            (ParamName::DbProxyEndpoint, "proxy.rds".to_string()),
            (ParamName::FunctionSecurityGroupId, "sg-0l".to_string()),
        ]);
        let out =
            resolve_function_templates(&function, &params(&[("secret", "mainRds")]), &resolved)
                .unwrap();
        assert_eq!(out.env["DB_HOST"], "proxy.rds");
        assert_eq!(out.env["SECRET"], "mainRds");
        assert_eq!(out.network.unwrap().security_groups, vec!["sg-0l"]);
    }

    #[test]
    fn test_resolve_service_keeps_runtime_parameters() {
        let service = ServiceDecl {
            secrets: IndexMap::from([("RDS".to_string(), "{{params.secret}}".to_string())]),
            parameters: IndexMap::from([("POOL".to_string(), ParamName::UserPoolId)]),
            image_tag: Some("{{params.tag}}".to_string()),
            ..Default::default()
        };
        let out = resolve_service_templates(
            &service,
            &params(&[("secret", "mainRds"), ("tag", "v2")]),
            &IndexMap::new(),
        )
        .unwrap();
        assert_eq!(out.secrets["RDS"], "mainRds");
        assert_eq!(out.image_tag.as_deref(), Some("v2"));
        assert_eq!(out.parameters["POOL"], ParamName::UserPoolId);
    }

    const CHAIN: &str = r#"
version: "1.0"
name: t
units:
  vpc:
    kind: network
    publishes: { db-security-group-id: sg-r }
  cognito:
    kind: identity
    publishes: { user-pool-id: pool }
  db:
    kind: database
    resolves: [db-security-group-id]
    publishes: { db-proxy-endpoint: proxy }
  api:
    kind: function_front
    resolves: [db-proxy-endpoint, user-pool-id]
"#;

    #[test]
    fn test_dependency_edges() {
        let edges = dependency_edges(&parse(CHAIN));
        assert_eq!(edges.len(), 3);
        assert_eq!(
            edges[0],
            Edge {
                producer: "vpc".into(),
                consumer: "db".into(),
                name: ParamName::DbSecurityGroupId
            }
        );
    }

    #[test]
    fn test_declared_order_clean() {
        assert!(check_declared_order(&parse(CHAIN)).is_empty());
    }

    #[test]
    fn test_declared_order_violation() {
        let yaml = r#"
version: "1.0"
name: t
units:
  api:
    kind: function_front
    resolves: [user-pool-id]
  cognito:
    kind: identity
    publishes: { user-pool-id: pool }
"#;
        let violations = check_declared_order(&parse(yaml));
        assert_eq!(
            violations,
            vec![CompositionError::OrderingViolation {
                consumer: "api".into(),
                producer: "cognito".into(),
                name: ParamName::UserPoolId,
            }]
        );
    }

    #[test]
    fn test_topo_linear() {
        let order = build_execution_order(&parse(CHAIN)).unwrap();
        assert_eq!(order, vec!["vpc", "cognito", "db", "api"]);
    }

    #[test]
    fn test_topo_reorders_reversed_declaration() {
        let yaml = r#"
version: "1.0"
name: t
units:
  api:
    kind: function_front
    resolves: [db-proxy-endpoint]
  db:
    kind: database
    resolves: [db-security-group-id]
    publishes: { db-proxy-endpoint: proxy }
  vpc:
    kind: network
    publishes: { db-security-group-id: sg-r }
"#;
        let order = build_execution_order(&parse(yaml)).unwrap();
        assert_eq!(order, vec!["vpc", "db", "api"]);
    }

    #[test]
    fn test_topo_ties_follow_declaration() {
        let yaml = r#"
version: "1.0"
name: t
units:
  zeta: { kind: network }
  alpha: { kind: identity }
"#;
        let order = build_execution_order(&parse(yaml)).unwrap();
        assert_eq!(order, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_topo_cycle() {
        let yaml = r#"
version: "1.0"
name: t
units:
  a:
    kind: identity
    resolves: [client-id]
    publishes: { user-pool-id: pool }
  b:
    kind: identity
    resolves: [user-pool-id]
    publishes: { client-id: client }
  c: { kind: network }
"#;
        let err = build_execution_order(&parse(yaml)).unwrap_err();
        assert_eq!(err, CompositionError::Cycle(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_unit_order_policies() {
        let reversed = r#"
version: "1.0"
name: t
units:
  api:
    kind: function_front
    resolves: [user-pool-id]
  cognito:
    kind: identity
    publishes: { user-pool-id: pool }
policy:
  ordering: POLICY
"#;
        let declared = parse(&reversed.replace("POLICY", "declared"));
        assert_eq!(unit_order(&declared).unwrap(), vec!["api", "cognito"]);

        let verified = parse(&reversed.replace("POLICY", "verified"));
        assert!(matches!(
            unit_order(&verified),
            Err(CompositionError::OrderingViolation { .. })
        ));

        let topological = parse(&reversed.replace("POLICY", "topological"));
        assert_eq!(unit_order(&topological).unwrap(), vec!["cognito", "api"]);
    }

    #[test]
    fn test_runtime_parameters_create_edges() {
        let yaml = r#"
version: "1.0"
name: t
units:
  ecs:
    kind: container_front
    services:
      chat:
        parameters: { POOL: user-pool-id }
  cognito:
    kind: identity
    publishes: { user-pool-id: pool }
"#;
        let order = build_execution_order(&parse(yaml)).unwrap();
        assert_eq!(order, vec!["cognito", "ecs"]);
    }

    #[test]
    fn test_verified_order_fails_with_first_violation() {
        let config = parse(
            r#"
version: "1.0"
name: t
units:
  api:
    kind: function_front
    resolves: [client-id]
  db:
    kind: database
    resolves: [db-security-group-id]
  cognito:
    kind: identity
    publishes: { client-id: c1 }
  vpc:
    kind: network
    publishes: { db-security-group-id: sg-1 }
policy:
  ordering: verified
"#,
        );
        assert_eq!(check_declared_order(&config).len(), 2);
        assert_eq!(
            unit_order(&config).unwrap_err(),
            CompositionError::OrderingViolation {
                consumer: "api".to_string(),
                producer: "cognito".to_string(),
                name: ParamName::ClientId,
            }
        );
    }
}
