//! CLI subcommands: init, validate, order, plan, compose, synth, params,
//! stale, status, completion.

use crate::core::compose::{self, ComposeConfig, CompositionResult};
use crate::core::{parser, planner, resolver, state, synth, types};
use crate::registry::{FileRegistry, ParameterRegistry};
use crate::tripwire::{eventlog, stale};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "stackreg",
    version,
    about = "Cross-stack parameter registry and composition root for multi-stack deployments"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new stackreg project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate stacks.yaml without touching the registry
    Validate {
        /// Path to stacks.yaml
        #[arg(short, long, default_value = "stacks.yaml")]
        file: PathBuf,
    },

    /// Show the apply order and any publish/resolve edge it violates
    Order {
        /// Path to stacks.yaml
        #[arg(short, long, default_value = "stacks.yaml")]
        file: PathBuf,
    },

    /// Show what a pass would publish and where each resolve comes from
    Plan {
        /// Path to stacks.yaml
        #[arg(short, long, default_value = "stacks.yaml")]
        file: PathBuf,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Override the config's environment
        #[arg(short, long)]
        env: Option<String>,
    },

    /// Run a composition pass: resolve, build, publish
    Compose {
        /// Path to stacks.yaml
        #[arg(short, long, default_value = "stacks.yaml")]
        file: PathBuf,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Manifest output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,

        /// Override the config's environment
        #[arg(short, long)]
        env: Option<String>,

        /// Compose a single unit
        #[arg(short, long)]
        unit: Option<String>,

        /// Run the pass against a scratch overlay; nothing is written
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the engine manifest without publishing anything
    Synth {
        /// Path to stacks.yaml
        #[arg(short, long, default_value = "stacks.yaml")]
        file: PathBuf,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Manifest output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,

        /// Override the config's environment
        #[arg(short, long)]
        env: Option<String>,
    },

    /// List parameters currently in the registry
    Params {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Environment
        #[arg(short, long, default_value = "dev")]
        env: String,
    },

    /// Find consumers deployed with values their producers have replaced
    Stale {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Environment
        #[arg(short, long, default_value = "dev")]
        env: String,

        /// Log findings and exit non-zero on any (for CI/cron)
        #[arg(long)]
        tripwire: bool,
    },

    /// Show per-unit state from capture locks and the event log
    Status {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Environment
        #[arg(short, long, default_value = "dev")]
        env: String,
    },

    /// Print a shell completion script
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Order { file } => cmd_order(&file),
        Commands::Plan {
            file,
            state_dir,
            env,
        } => cmd_plan(&file, &state_dir, env.as_deref()),
        Commands::Compose {
            file,
            state_dir,
            out,
            env,
            unit,
            dry_run,
        } => cmd_compose(
            &file,
            &state_dir,
            &out,
            env.as_deref(),
            unit.as_deref(),
            dry_run,
        ),
        Commands::Synth {
            file,
            state_dir,
            out,
            env,
        } => cmd_synth(&file, &state_dir, &out, env.as_deref()),
        Commands::Params { state_dir, env } => cmd_params(&state_dir, &env),
        Commands::Stale {
            state_dir,
            env,
            tripwire,
        } => cmd_stale(&state_dir, &env, tripwire),
        Commands::Status { state_dir, env } => cmd_status(&state_dir, &env),
        Commands::Completion { shell } => {
            cmd_completion(shell);
            Ok(())
        }
    }
}

const INIT_TEMPLATE: &str = r#"version: "1.0"
name: my-deployment
description: "Managed by stackreg"
environment: dev

params:
  vpc_name: main

units:
  vpc:
    kind: network
    publishes:
      db-security-group-id: sg-rds
      function-security-group-id: sg-lambda

  db:
    kind: database
    resolves: [db-security-group-id]
    publishes:
      db-proxy-endpoint: "proxy.{{params.vpc_name}}.internal"

  api:
    kind: function_front
    resolves: [function-security-group-id, db-proxy-endpoint]
    functions:
      api-hello:
        description: "Hello endpoint"
        env:
          RDS_PROXY_HOST: "{{param.db-proxy-endpoint}}"
        network:
          vpc: "{{params.vpc_name}}"
          security_groups: ["{{param.function-security-group-id}}"]
        routes: ["/hello"]

policy:
  ordering: verified
  tripwire: true
  capture_lock: true
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("stacks.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir).map_err(|e| format!("cannot create state dir: {}", e))?;

    std::fs::write(&config_path, INIT_TEMPLATE)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized stackreg project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let mut errors: Vec<String> = parser::validate_config(&config)
        .into_iter()
        .map(|e| e.to_string())
        .collect();

    // Ordering problems are only errors when the policy says the order is checked.
    match config.policy.ordering {
        types::OrderingPolicy::Declared => {
            for v in resolver::check_declared_order(&config) {
                eprintln!("  WARNING: {}", v);
            }
        }
        types::OrderingPolicy::Verified => {
            errors.extend(
                resolver::check_declared_order(&config)
                    .into_iter()
                    .map(|v| v.to_string()),
            );
        }
        types::OrderingPolicy::Topological => {
            if let Err(e) = resolver::build_execution_order(&config) {
                errors.push(e.to_string());
            }
        }
    }

    if errors.is_empty() {
        let published: usize = config.units.values().map(|u| u.publishes.len()).sum();
        println!(
            "OK: {} ({} units, {} parameters published)",
            config.name,
            config.units.len(),
            published
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

fn cmd_order(file: &Path) -> Result<(), String> {
    let config = parse_and_validate(file, None)?;
    let order = resolver::unit_order(&config).map_err(|e| e.to_string())?;

    println!(
        "Order: {} ({} units, {} ordering)",
        config.name,
        order.len(),
        ordering_label(config.policy.ordering)
    );
    for (i, name) in order.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }

    let edges = resolver::dependency_edges(&config);
    if !edges.is_empty() {
        println!();
        println!("Edges:");
        for edge in &edges {
            println!("  {} → {} ({})", edge.producer, edge.consumer, edge.name);
        }
    }

    let violations = resolver::check_declared_order(&config);
    if !violations.is_empty() {
        println!();
        for v in &violations {
            println!("  VIOLATION: {}", v);
        }
        if config.policy.ordering == types::OrderingPolicy::Declared {
            println!(
                "Declared order is trusted as-is; set policy.ordering to 'verified' or 'topological'."
            );
        }
    }
    Ok(())
}

fn ordering_label(policy: types::OrderingPolicy) -> &'static str {
    match policy {
        types::OrderingPolicy::Declared => "declared",
        types::OrderingPolicy::Verified => "verified",
        types::OrderingPolicy::Topological => "topological",
    }
}

fn cmd_plan(file: &Path, state_dir: &Path, env: Option<&str>) -> Result<(), String> {
    let config = parse_and_validate(file, env)?;
    let order = resolver::unit_order(&config).map_err(|e| e.to_string())?;

    let registry = FileRegistry::open(state_dir, &config.environment);
    let snapshot = registry.snapshot().map_err(|e| e.to_string())?;
    let plan = planner::plan(&config, &order, &snapshot);

    print_plan(&plan);
    Ok(())
}

/// Parse and validate a stacks.yaml, applying an environment override.
fn parse_and_validate(file: &Path, env: Option<&str>) -> Result<types::StackConfig, String> {
    let mut config = parser::parse_config_file(file)?;
    if let Some(env) = env {
        config.environment = env.to_string();
    }
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

/// Display a plan to stdout.
fn print_plan(plan: &types::CompositionPlan) {
    println!(
        "Planning: {} [{}] ({} units)",
        plan.name,
        plan.environment,
        plan.units.len()
    );
    println!();

    for unit in &plan.units {
        println!(
            "{} ({}, {} compute units):",
            unit.unit, unit.kind, unit.compute_units
        );
        for r in &unit.resolves {
            let source = match &r.source {
                types::ResolveSource::Registry => "registry".to_string(),
                types::ResolveSource::ThisPass { producer } => format!("this pass, '{}'", producer),
                types::ResolveSource::Missing => "MISSING".to_string(),
            };
            println!("  < {} ({})", r.name, source);
        }
        for p in &unit.publishes {
            let symbol = match p.action {
                types::PlanAction::Create => "+",
                types::PlanAction::Update => "~",
                types::PlanAction::NoOp => " ",
            };
            println!("  {} {}", symbol, p.description);
        }
    }

    println!();
    println!(
        "Plan: {} to publish, {} to overwrite, {} unchanged, {} unresolved.",
        plan.to_create, plan.to_update, plan.unchanged, plan.unresolved
    );
}

fn cmd_compose(
    file: &Path,
    state_dir: &Path,
    out: &Path,
    env: Option<&str>,
    unit_filter: Option<&str>,
    dry_run: bool,
) -> Result<(), String> {
    let config = parse_and_validate(file, env)?;
    let mut registry = FileRegistry::open(state_dir, &config.environment);

    let cfg = ComposeConfig {
        config: &config,
        state_dir,
        dry_run,
        unit_filter,
    };
    let result = compose::compose(&cfg, &mut registry).map_err(|e| e.to_string())?;
    print_result(&result);

    if dry_run {
        println!("Dry run — nothing published.");
        return Ok(());
    }

    // A partial pass would produce a partial graph; only a full pass is synthesized.
    if unit_filter.is_none() {
        let manifest = synth::render_manifest(&config, &result).map_err(|e| e.to_string())?;
        let path = synth::write_manifest(out, &manifest)?;
        println!("  Manifest: {}", path.display());
    }

    println!(
        "Compose complete: {} units, {} parameters published, {} compute units ({:.1}s).",
        result.units.len(),
        result.published_count(),
        result.artifact_count(),
        result.total_duration.as_secs_f64()
    );
    Ok(())
}

fn print_result(result: &CompositionResult) {
    for unit in &result.units {
        println!(
            "{}: {} resolved, {} published, {} compute units [{}] ({:.2}s)",
            unit.unit,
            unit.resolved.len(),
            unit.published.len(),
            unit.artifacts.len(),
            unit.phase,
            unit.duration.as_secs_f64()
        );
        for (name, outcome) in &unit.published {
            println!("    {} → {}: {}", name, name.path(), outcome);
        }
    }
    println!();
}

fn cmd_synth(file: &Path, state_dir: &Path, out: &Path, env: Option<&str>) -> Result<(), String> {
    let config = parse_and_validate(file, env)?;
    let mut registry = FileRegistry::open(state_dir, &config.environment);

    let cfg = ComposeConfig {
        config: &config,
        state_dir,
        dry_run: true,
        unit_filter: None,
    };
    let result = compose::compose(&cfg, &mut registry).map_err(|e| e.to_string())?;
    let manifest = synth::render_manifest(&config, &result).map_err(|e| e.to_string())?;
    let path = synth::write_manifest(out, &manifest)?;

    println!(
        "Synthesized: {} [{}] ({} units, {} compute units)",
        manifest.name,
        manifest.environment,
        manifest.units.len(),
        result.artifact_count()
    );
    println!("  Fingerprint: {}", manifest.fingerprint);
    println!("  Manifest: {}", path.display());
    Ok(())
}

/// Reject environments that would escape the state directory.
fn check_env(env: &str) -> Result<(), String> {
    if parser::is_valid_name(env) {
        Ok(())
    } else {
        Err(format!("invalid environment '{}'", env))
    }
}

fn cmd_params(state_dir: &Path, env: &str) -> Result<(), String> {
    check_env(env)?;
    let registry = FileRegistry::open(state_dir, env);
    let snapshot = registry.snapshot().map_err(|e| e.to_string())?;

    if snapshot.is_empty() {
        println!("No parameters in '{}'. Run `stackreg compose` first.", env);
        return Ok(());
    }

    println!("Registry: {} ({} parameters)", env, snapshot.len());
    for (name, stored) in &snapshot {
        println!("  {} ({})", name.path(), name);
        println!("    Value:     {}", stored.value);
        println!("    Hash:      {}", stored.hash);
        println!(
            "    Published: {} by '{}'",
            stored.published_at, stored.published_by
        );
    }
    Ok(())
}

fn cmd_stale(state_dir: &Path, env: &str, tripwire_mode: bool) -> Result<(), String> {
    check_env(env)?;
    let registry = FileRegistry::open(state_dir, env);
    let findings = stale::detect_all(state_dir, &registry, tripwire_mode)?;

    if findings.is_empty() {
        println!("No stale captures.");
        return Ok(());
    }

    for f in &findings {
        println!("  STALE: {} {} ({})", f.unit, f.name, f.detail);
        println!("    Captured: {}", f.captured_hash);
        println!("    Current:  {}", f.current_hash);
    }
    println!();
    println!("Stale captures: {} (recompose the listed units)", findings.len());

    if tripwire_mode {
        return Err(format!("{} stale finding(s)", findings.len()));
    }
    Ok(())
}

fn cmd_status(state_dir: &Path, env: &str) -> Result<(), String> {
    check_env(env)?;
    let locks = state::list_capture_locks(state_dir, env)?;
    let events = eventlog::read_events(state_dir, env)?;
    let phases = eventlog::unit_phases(&events);

    if locks.is_empty() && phases.is_empty() {
        println!("No state found. Run `stackreg compose` first.");
        return Ok(());
    }

    println!("Environment: {}", env);
    for (unit, (phase, ts)) in &phases {
        println!("  {}: {} ({})", unit, phase, ts);
    }

    for lock in &locks {
        println!();
        println!("Unit: {}", lock.unit);
        println!("  Generated: {}", lock.generated_at);
        println!("  Generator: {}", lock.generator);
        println!("  Captured: {}", lock.parameters.len());
        for (name, captured) in &lock.parameters {
            println!("    {}: {} [{}]", name, captured.value, captured.hash);
        }
        for (compute_unit, hash) in &lock.descriptors {
            println!("    descriptor {}: {}", compute_unit, hash);
        }
    }
    Ok(())
}

fn cmd_completion(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "stackreg", &mut std::io::stdout());
}
