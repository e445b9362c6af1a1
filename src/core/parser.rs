//! YAML parsing and validation.
//!
//! Parses stacks.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Each parameter has exactly one writer, which never resolves it
//! - `{{param.X}}` templates only name parameters the unit resolves
//! - Functions only on function fronts, services only on container fronts
//! - Environment keys are valid identifiers, routes are absolute

use super::resolver;
use super::types::*;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn env_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| panic!("env key regex: {e}"))
    })
}

/// Environment and unit names become state directory names.
fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap_or_else(|e| panic!("name regex: {e}"))
    })
}

/// Whether `name` is usable as an environment or unit name: one path
/// segment, no dots or separators.
pub fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// Parse a stacks.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<StackConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a stacks.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<StackConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &StackConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        push(format!("version must be \"1.0\", got \"{}\"", config.version));
    }
    if config.name.is_empty() {
        push("name must not be empty".to_string());
    }
    if !is_valid_name(&config.environment) {
        push(format!("invalid environment '{}'", config.environment));
    }
    if config.units.is_empty() {
        push("no units declared".to_string());
    }

    // Single writer per parameter
    let mut writers: HashMap<ParamName, &str> = HashMap::new();
    for (unit_name, unit) in &config.units {
        for name in unit.publishes.keys() {
            if let Some(first) = writers.insert(*name, unit_name) {
                push(format!(
                    "parameter '{}' is published by both '{}' and '{}'",
                    name, first, unit_name
                ));
            }
        }
    }

    for (unit_name, unit) in &config.units {
        if !is_valid_name(unit_name) {
            push(format!("invalid unit name '{}'", unit_name));
        }

        for name in unit.consumes() {
            if unit.publishes.contains_key(&name) {
                push(format!(
                    "unit '{}' both publishes and consumes '{}'",
                    unit_name, name
                ));
            }
        }

        let mut seen = Vec::new();
        for name in &unit.resolves {
            if seen.contains(name) {
                push(format!("unit '{}' resolves '{}' twice", unit_name, name));
            }
            seen.push(*name);
        }

        match unit.kind {
            UnitKind::FunctionFront => {
                if !unit.services.is_empty() {
                    push(format!(
                        "unit '{}' (function_front) cannot declare services",
                        unit_name
                    ));
                }
            }
            UnitKind::ContainerFront => {
                if !unit.functions.is_empty() {
                    push(format!(
                        "unit '{}' (container_front) cannot declare functions",
                        unit_name
                    ));
                }
            }
            kind => {
                if !unit.functions.is_empty() || !unit.services.is_empty() {
                    push(format!(
                        "unit '{}' ({}) cannot declare compute units",
                        unit_name, kind
                    ));
                }
            }
        }

        for (fname, function) in &unit.functions {
            for key in function.env.keys() {
                if !env_key_pattern().is_match(key) {
                    push(format!(
                        "unit '{}' function '{}' has invalid env key '{}'",
                        unit_name, fname, key
                    ));
                }
            }
            for route in &function.routes {
                if !route.starts_with('/') {
                    push(format!(
                        "unit '{}' function '{}' route '{}' must start with '/'",
                        unit_name, fname, route
                    ));
                }
            }
            if function.timeout == Some(0) || function.memory == Some(0) {
                push(format!(
                    "unit '{}' function '{}' has zero timeout or memory",
                    unit_name, fname
                ));
            }
        }

        for (sname, service) in &unit.services {
            for key in service
                .env
                .keys()
                .chain(service.secrets.keys())
                .chain(service.parameters.keys())
            {
                if !env_key_pattern().is_match(key) {
                    push(format!(
                        "unit '{}' service '{}' has invalid env key '{}'",
                        unit_name, sname, key
                    ));
                }
            }
            if let Some(ref path) = service.health_check_path {
                if !path.starts_with('/') {
                    push(format!(
                        "unit '{}' service '{}' health check path must start with '/'",
                        unit_name, sname
                    ));
                }
            }
        }

        for (field, template) in resolver::unit_template_fields(unit) {
            match resolver::template_refs(template) {
                Err(e) => push(format!("unit '{}' {}: {}", unit_name, field, e)),
                Ok(refs) => {
                    for key in refs {
                        check_template_ref(config, unit_name, unit, &field, &key, &mut push);
                    }
                }
            }
        }
    }

    errors
}

fn check_template_ref(
    config: &StackConfig,
    unit_name: &str,
    unit: &UnitDecl,
    field: &str,
    key: &str,
    push: &mut impl FnMut(String),
) {
    if let Some(param_key) = key.strip_prefix("params.") {
        if !config.params.contains_key(param_key) {
            push(format!(
                "unit '{}' {}: unknown param '{}'",
                unit_name, field, param_key
            ));
        }
    } else if let Some(slug) = key.strip_prefix("param.") {
        match ParamName::from_slug(slug) {
            None => push(format!(
                "unit '{}' {}: unknown registry parameter '{}'",
                unit_name, field, slug
            )),
            Some(name) if !unit.resolves.contains(&name) => push(format!(
                "unit '{}' {}: '{}' is templated but not in resolves",
                unit_name, field, slug
            )),
            Some(_) => {}
        }
    } else {
        push(format!(
            "unit '{}' {}: unknown template variable '{}'",
            unit_name, field, key
        ));
    }
}
