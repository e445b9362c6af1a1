//! Composition root — one apply pass over the unit graph.
//!
//! For each unit in order: resolve → render templates → build descriptors →
//! attach to fronts → publish → capture lock. The first failure aborts the
//! pass. Nothing is rolled back: values published by earlier units stay.

use super::error::CompositionError;
use super::resolver;
use super::state;
use super::types::*;
use crate::fronts::{container, function, Artifact};
use crate::registry::{OverlayRegistry, ParameterRegistry};
use crate::tripwire::{eventlog, hasher};
use indexmap::IndexMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// Configuration for a composition pass.
pub struct ComposeConfig<'a> {
    pub config: &'a StackConfig,
    pub state_dir: &'a Path,

    /// Publish into an overlay; write no events and no capture locks
    pub dry_run: bool,

    /// Only apply this unit (ordering is still computed over the whole graph)
    pub unit_filter: Option<&'a str>,
}

/// What happened to one unit.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub unit: String,
    pub kind: UnitKind,
    pub phase: UnitPhase,
    pub resolved: Vec<ResolvedParameter>,
    pub published: Vec<(ParamName, PublishOutcome)>,
    pub artifacts: Vec<Artifact>,
    pub duration: Duration,
}

/// Outcome of a successful pass.
#[derive(Debug, Clone)]
pub struct CompositionResult {
    pub run_id: String,
    pub environment: String,
    pub order: Vec<String>,
    pub units: Vec<UnitReport>,
    pub dry_run: bool,
    pub total_duration: Duration,
}

impl CompositionResult {
    pub fn published_count(&self) -> usize {
        self.units.iter().map(|u| u.published.len()).sum()
    }

    pub fn artifact_count(&self) -> usize {
        self.units.iter().map(|u| u.artifacts.len()).sum()
    }
}

/// Shared context for one pass.
struct PassCtx<'a> {
    cfg: &'a ComposeConfig<'a>,
    environment: &'a str,
    tripwire: bool,
    capture: bool,
}

impl PassCtx<'_> {
    fn log(&self, event: ProvenanceEvent) {
        if self.tripwire {
            let _ = eventlog::append_event(self.cfg.state_dir, self.environment, event);
        }
    }
}

/// Run one composition pass against `registry`.
pub fn compose(
    cfg: &ComposeConfig,
    registry: &mut dyn ParameterRegistry,
) -> Result<CompositionResult, CompositionError> {
    if registry.environment() != cfg.config.environment {
        return Err(CompositionError::Config(format!(
            "registry is scoped to environment '{}' but the config targets '{}'",
            registry.environment(),
            cfg.config.environment
        )));
    }
    if let Some(filter) = cfg.unit_filter {
        if !cfg.config.units.contains_key(filter) {
            return Err(CompositionError::Config(format!("unknown unit '{}'", filter)));
        }
    }

    let order = resolver::unit_order(cfg.config)?;

    if cfg.dry_run {
        let mut overlay = OverlayRegistry::new(&*registry);
        run_pass(cfg, &order, &mut overlay)
    } else {
        run_pass(cfg, &order, registry)
    }
}

fn run_pass(
    cfg: &ComposeConfig,
    order: &[String],
    registry: &mut dyn ParameterRegistry,
) -> Result<CompositionResult, CompositionError> {
    let start = Instant::now();
    let run_id = eventlog::generate_run_id();
    let environment = cfg.config.environment.as_str();
    let ctx = PassCtx {
        cfg,
        environment,
        tripwire: !cfg.dry_run && cfg.config.policy.tripwire,
        capture: !cfg.dry_run && cfg.config.policy.capture_lock,
    };

    ctx.log(ProvenanceEvent::CompositionStarted {
        environment: environment.to_string(),
        run_id: run_id.clone(),
        stackreg_version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let mut reports = Vec::new();
    for unit_name in order {
        if let Some(filter) = cfg.unit_filter {
            if unit_name != filter {
                continue;
            }
        }
        let unit = match cfg.config.units.get(unit_name) {
            Some(u) => u,
            None => continue,
        };

        let mut phase = UnitPhase::Declared;
        match compose_unit(&ctx, unit_name, unit, registry, &mut phase) {
            Ok(report) => reports.push(report),
            Err(e) => {
                ctx.log(ProvenanceEvent::UnitFailed {
                    unit: unit_name.clone(),
                    phase,
                    error: e.to_string(),
                });
                ctx.log(ProvenanceEvent::CompositionCompleted {
                    environment: environment.to_string(),
                    run_id,
                    units_completed: reports.len() as u32,
                    units_failed: 1,
                    total_seconds: start.elapsed().as_secs_f64(),
                });
                return Err(e);
            }
        }
    }

    ctx.log(ProvenanceEvent::CompositionCompleted {
        environment: environment.to_string(),
        run_id: run_id.clone(),
        units_completed: reports.len() as u32,
        units_failed: 0,
        total_seconds: start.elapsed().as_secs_f64(),
    });

    Ok(CompositionResult {
        run_id,
        environment: environment.to_string(),
        order: order.to_vec(),
        units: reports,
        dry_run: cfg.dry_run,
        total_duration: start.elapsed(),
    })
}

fn compose_unit(
    ctx: &PassCtx,
    unit_name: &str,
    unit: &UnitDecl,
    registry: &mut dyn ParameterRegistry,
    phase: &mut UnitPhase,
) -> Result<UnitReport, CompositionError> {
    let unit_start = Instant::now();
    ctx.log(ProvenanceEvent::UnitStarted {
        unit: unit_name.to_string(),
        kind: unit.kind,
    });

    // Plan-time capture
    let mut resolved = Vec::new();
    let mut captured: IndexMap<ParamName, String> = IndexMap::new();
    for name in &unit.resolves {
        let r = registry.resolve(*name)?;
        ctx.log(ProvenanceEvent::ParameterResolved {
            unit: unit_name.to_string(),
            name: *name,
            value: r.value.clone(),
            hash: r.hash.clone(),
            published_at: r.published_at.clone(),
        });
        captured.insert(*name, r.value.clone());
        resolved.push(r);
    }

    // Runtime references must exist before a task can start, but their values
    // are read by the platform, not captured.
    for name in unit.consumes() {
        if !captured.contains_key(&name) {
            registry.resolve(name)?;
        }
    }

    let template_err = |message: String| CompositionError::Template {
        unit: unit_name.to_string(),
        message,
    };

    let params = &ctx.cfg.config.params;
    let mut artifacts = Vec::new();
    for (fname, decl) in &unit.functions {
        let decl = resolver::resolve_function_templates(decl, params, &captured)
            .map_err(|e| template_err(format!("function '{}': {}", fname, e)))?;
        let descriptor = function::builder(fname, &decl).build();
        log_descriptor(ctx, unit_name, &descriptor)?;
        artifacts.push(Artifact::Function(function::attach(descriptor, &decl)));
    }
    for (sname, decl) in &unit.services {
        let decl = resolver::resolve_service_templates(decl, params, &captured)
            .map_err(|e| template_err(format!("service '{}': {}", sname, e)))?;
        let descriptor = container::builder(sname, &decl).build();
        log_descriptor(ctx, unit_name, &descriptor)?;
        artifacts.push(Artifact::Service(container::attach(descriptor, &decl)));
    }
    *phase = UnitPhase::ResourcesConstructed;

    let values = resolver::resolve_publish_values(unit, params, &captured).map_err(template_err)?;
    let mut published = Vec::new();
    for (name, value) in &values {
        let outcome = registry.publish(*name, value, unit_name)?;
        ctx.log(ProvenanceEvent::ParameterPublished {
            unit: unit_name.to_string(),
            name: *name,
            hash: hasher::hash_string(value),
            outcome: outcome.to_string(),
        });
        published.push((*name, outcome));
    }
    *phase = UnitPhase::ParametersPublished;

    if ctx.capture {
        let mut lock = state::new_capture_lock(ctx.environment, unit_name, &resolved);
        for artifact in &artifacts {
            let hash = hasher::hash_json(artifact.descriptor()).map_err(CompositionError::State)?;
            lock.descriptors.insert(artifact.name().to_string(), hash);
        }
        state::save_capture_lock(ctx.cfg.state_dir, &lock).map_err(CompositionError::State)?;
    }

    let duration = unit_start.elapsed();
    ctx.log(ProvenanceEvent::UnitCompleted {
        unit: unit_name.to_string(),
        resolved: resolved.len() as u32,
        published: published.len() as u32,
        duration_seconds: duration.as_secs_f64(),
    });
    *phase = UnitPhase::Complete;

    Ok(UnitReport {
        unit: unit_name.to_string(),
        kind: unit.kind,
        phase: *phase,
        resolved,
        published,
        artifacts,
        duration,
    })
}

fn log_descriptor(
    ctx: &PassCtx,
    unit_name: &str,
    descriptor: &ResourceDescriptor,
) -> Result<(), CompositionError> {
    if ctx.tripwire {
        let hash = hasher::hash_json(descriptor).map_err(CompositionError::State)?;
        ctx.log(ProvenanceEvent::DescriptorBuilt {
            unit: unit_name.to_string(),
            compute_unit: descriptor.name.clone(),
            hash,
        });
    }
    Ok(())
}
