//! Plan generation — diff the values a pass would publish against the
//! current registry, and trace where each resolve will be satisfied.

use super::resolver;
use super::types::*;
use crate::tripwire::hasher;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Generate a composition plan by simulating a pass over `order` against a
/// registry snapshot. Nothing is published.
pub fn plan(
    config: &StackConfig,
    order: &[String],
    snapshot: &IndexMap<ParamName, StoredParameter>,
) -> CompositionPlan {
    let mut units = Vec::new();
    let mut to_create = 0u32;
    let mut to_update = 0u32;
    let mut unchanged = 0u32;
    let mut unresolved = 0u32;

    // Values visible to later units: registry first, overlaid by this pass.
    let mut known: IndexMap<ParamName, String> = snapshot
        .iter()
        .map(|(name, stored)| (*name, stored.value.clone()))
        .collect();
    let mut this_pass: HashMap<ParamName, String> = HashMap::new();

    for unit_name in order {
        let unit = match config.units.get(unit_name) {
            Some(u) => u,
            None => continue,
        };

        let mut resolves = Vec::new();
        let mut captured = IndexMap::new();
        for name in unit.consumes() {
            let source = if let Some(producer) = this_pass.get(&name) {
                ResolveSource::ThisPass {
                    producer: producer.clone(),
                }
            } else if snapshot.contains_key(&name) {
                ResolveSource::Registry
            } else {
                unresolved += 1;
                ResolveSource::Missing
            };
            if let Some(value) = known.get(&name) {
                captured.insert(name, value.clone());
            }
            resolves.push(PlannedResolve { name, source });
        }

        let mut publishes = Vec::new();
        for (name, template) in &unit.publishes {
            let rendered = resolver::resolve_template(template, &config.params, &captured);
            let action = determine_action(*name, rendered.as_deref().ok(), snapshot);
            let description = describe_action(unit_name, *name, &action, rendered.is_err());

            match action {
                PlanAction::Create => to_create += 1,
                PlanAction::Update => to_update += 1,
                PlanAction::NoOp => unchanged += 1,
            }

            if let Ok(value) = rendered {
                known.insert(*name, value);
            }
            this_pass.insert(*name, unit_name.clone());
            publishes.push(PlannedPublish {
                name: *name,
                action,
                description,
            });
        }

        units.push(PlannedUnit {
            unit: unit_name.clone(),
            kind: unit.kind,
            resolves,
            publishes,
            compute_units: unit.functions.len() + unit.services.len(),
        });
    }

    CompositionPlan {
        name: config.name.clone(),
        environment: config.environment.clone(),
        order: order.to_vec(),
        units,
        to_create,
        to_update,
        unchanged,
        unresolved,
    }
}

/// Determine what a publish will do. A value that cannot be rendered yet
/// (its inputs are missing) is assumed to change.
fn determine_action(
    name: ParamName,
    value: Option<&str>,
    snapshot: &IndexMap<ParamName, StoredParameter>,
) -> PlanAction {
    match (snapshot.get(&name), value) {
        (None, _) => PlanAction::Create,
        (Some(stored), Some(v)) if stored.hash == hasher::hash_string(v) => PlanAction::NoOp,
        (Some(_), _) => PlanAction::Update,
    }
}

/// Generate a human-readable description of a planned publish.
fn describe_action(unit: &str, name: ParamName, action: &PlanAction, pending: bool) -> String {
    let suffix = if pending { " (value pending inputs)" } else { "" };
    match action {
        PlanAction::Create => format!("{}: publish {} → {}{}", unit, name, name.path(), suffix),
        PlanAction::Update => format!("{}: overwrite {} → {}{}", unit, name, name.path(), suffix),
        PlanAction::NoOp => format!("{}: {} unchanged", unit, name),
    }
}
