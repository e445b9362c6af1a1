//! Benchmarks for stackreg core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use stackreg::core::builder::ResourceBuilder;
use stackreg::core::types::ParamName;
use stackreg::core::{parser, resolver};
use stackreg::registry::{MemoryRegistry, ParameterRegistry};
use std::collections::HashMap;

fn bench_blake3_string(c: &mut Criterion) {
    let mut group = c.benchmark_group("blake3_string");
    for size in [64, 256, 1024, 4096] {
        let input: String = "x".repeat(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| {
                let hash = blake3::hash(black_box(input.as_bytes()));
                black_box(hash);
            });
        });
    }
    group.finish();
}

const STACKS: &str = r#"
version: "1.0"
name: bench-stacks
params:
  vpc_name: main
units:
  vpc:
    kind: network
    publishes:
      db-security-group-id: sg-0rds
      function-security-group-id: sg-0lambda
      container-security-group-id: sg-0ecs
  cognito:
    kind: identity
    publishes:
      user-pool-id: eu-west-1_pool
      client-id: client-abc
  db:
    kind: database
    resolves: [db-security-group-id]
    publishes:
      db-proxy-endpoint: proxy.rds.internal
  api:
    kind: function_front
    resolves: [function-security-group-id, db-proxy-endpoint, user-pool-id]
    functions:
      api-chats:
        description: "Chats CRUD"
        env:
          RDS_PROXY_HOST: "{{param.db-proxy-endpoint}}"
          USER_POOL_ID: "{{param.user-pool-id}}"
        grants: [secrets_manager]
        network:
          vpc: "{{params.vpc_name}}"
          security_groups: ["{{param.function-security-group-id}}"]
        routes: ["/chats", "/chats/{id}"]
  ecs:
    kind: container_front
    resolves: [container-security-group-id]
    services:
      chat:
        parameters:
          AWS_USER_POOL_ID: user-pool-id
          RDS_PROXY_HOST: db-proxy-endpoint
        network:
          vpc: "{{params.vpc_name}}"
          security_groups: ["{{param.container-security-group-id}}"]
"#;

fn bench_yaml_parse(c: &mut Criterion) {
    c.bench_function("yaml_parse_config", |b| {
        b.iter(|| {
            let config = parser::parse_config(black_box(STACKS)).unwrap();
            black_box(config);
        });
    });

    let config = parser::parse_config(STACKS).unwrap();
    c.bench_function("validate_config", |b| {
        b.iter(|| black_box(parser::validate_config(black_box(&config))));
    });
}

fn bench_template_resolve(c: &mut Criterion) {
    let mut params = HashMap::new();
    params.insert(
        "vpc_name".to_string(),
        serde_yaml_ng::Value::String("main".to_string()),
    );
    let mut resolved = IndexMap::new();
    resolved.insert(ParamName::DbProxyEndpoint, "proxy.rds.internal".to_string());
    resolved.insert(ParamName::UserPoolId, "eu-west-1_pool".to_string());
    let template = "host={{param.db-proxy-endpoint}} pool={{param.user-pool-id}} vpc={{params.vpc_name}}";

    c.bench_function("resolve_template", |b| {
        b.iter(|| {
            black_box(resolver::resolve_template(black_box(template), &params, &resolved).unwrap())
        });
    });
}

fn bench_builder(c: &mut Criterion) {
    c.bench_function("builder_build", |b| {
        b.iter(|| {
            let mut builder = ResourceBuilder::new(black_box("api-chats"));
            builder
                .set_description("Chats CRUD")
                .set_env([("RDS_PROXY_HOST", "proxy.rds.internal")])
                .set_timeout(60)
                .allow_secrets_manager()
                .allow_kms_decrypt()
                .connect_network("main", ["sg-0lambda"]);
            black_box(builder.build())
        });
    });
}

fn bench_topo_sort(c: &mut Criterion) {
    // Linear chain of N units, declared in reverse so every edge must be reordered
    let mut group = c.benchmark_group("topo_sort");
    for n in [10, 50, 100] {
        let mut yaml = String::from(
            "version: \"1.0\"\nname: chain\npolicy:\n  ordering: topological\nunits:\n",
        );
        for i in (0..n).rev() {
            yaml.push_str(&format!("  unit-{i:04}:\n    kind: network\n"));
            if i == 0 {
                yaml.push_str("    publishes:\n      db-security-group-id: sg-1\n");
            } else {
                yaml.push_str("    resolves: [db-security-group-id]\n");
            }
        }
        let config = parser::parse_config(&yaml).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &config, |b, config| {
            b.iter(|| black_box(resolver::build_execution_order(black_box(config)).unwrap()));
        });
    }
    group.finish();
}

fn bench_registry_publish(c: &mut Criterion) {
    c.bench_function("memory_registry_publish", |b| {
        let mut registry = MemoryRegistry::new("bench");
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let value = format!("proxy-{}.rds.internal", i % 4);
            black_box(
                registry
                    .publish(ParamName::DbProxyEndpoint, &value, "db")
                    .unwrap(),
            );
        });
    });
}

criterion_group!(
    benches,
    bench_blake3_string,
    bench_yaml_parse,
    bench_template_resolve,
    bench_builder,
    bench_topo_sort,
    bench_registry_publish
);
criterion_main!(benches);
