//! Append-only JSONL provenance log, one per environment.

use crate::core::types::{ProvenanceEvent, TimestampedEvent, UnitPhase};
use indexmap::IndexMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current UTC time as ISO 8601 (`YYYY-MM-DDTHH:MM:SSZ`).
pub fn now_iso8601() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_iso8601(secs)
}

/// Format seconds since the Unix epoch as ISO 8601 UTC.
pub fn format_iso8601(epoch_secs: u64) -> String {
    let days = (epoch_secs / 86_400) as i64;
    let rem = epoch_secs % 86_400;
    let (y, m, d) = civil_from_days(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        y,
        m,
        d,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

/// Generate a run ID.
pub fn generate_run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("r-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Derive the event log path for an environment.
pub fn event_log_path(state_dir: &Path, environment: &str) -> PathBuf {
    state_dir.join(environment).join("events.jsonl")
}

/// Append an event to the environment's event log.
pub fn append_event(
    state_dir: &Path,
    environment: &str,
    event: ProvenanceEvent,
) -> Result<(), String> {
    let path = event_log_path(state_dir, environment);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("cannot create state dir: {}", e))?;
    }

    let te = TimestampedEvent {
        ts: now_iso8601(),
        event,
    };
    let json = serde_json::to_string(&te).map_err(|e| format!("JSON serialize error: {}", e))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("cannot open event log {}: {}", path.display(), e))?;

    writeln!(file, "{}", json).map_err(|e| format!("write error: {}", e))?;

    Ok(())
}

/// Read every event back, oldest first. Missing log = no events.
pub fn read_events(state_dir: &Path, environment: &str) -> Result<Vec<TimestampedEvent>, String> {
    let path = event_log_path(state_dir, environment);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| format!("{} line {}: {}", path.display(), i + 1, e))
        })
        .collect()
}

/// Last known phase of every unit, replayed from the log. Units appear in
/// the order they were first seen.
pub fn unit_phases(events: &[TimestampedEvent]) -> IndexMap<String, (UnitPhase, String)> {
    let mut phases: IndexMap<String, (UnitPhase, String)> = IndexMap::new();
    for te in events {
        let (unit, phase) = match &te.event {
            ProvenanceEvent::UnitStarted { unit, .. } => (unit, UnitPhase::Declared),
            ProvenanceEvent::DescriptorBuilt { unit, .. } => (unit, UnitPhase::ResourcesConstructed),
            ProvenanceEvent::ParameterPublished { unit, .. } => {
                (unit, UnitPhase::ParametersPublished)
            }
            ProvenanceEvent::UnitCompleted { unit, .. } => (unit, UnitPhase::Complete),
            ProvenanceEvent::UnitFailed { unit, .. } => (unit, UnitPhase::Failed),
            _ => continue,
        };
        phases.insert(unit.clone(), (phase, te.ts.clone()));
    }
    phases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ParamName, UnitKind};

    #[test]
    fn test_now_iso8601_shape() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"));
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 20);
    }

    #[test]
    fn test_format_known_instants() {
        assert_eq!(format_iso8601(0), "1970-01-01T00:00:00Z");
        // leap day
        assert_eq!(format_iso8601(951_782_400), "2000-02-29T00:00:00Z");
        // century non-leap boundary
        assert_eq!(format_iso8601(4_107_542_400), "2100-03-01T00:00:00Z");
        assert_eq!(format_iso8601(1_792_108_800 + 3_661), "2026-10-16T01:01:01Z");
    }

    #[test]
    fn test_generate_run_id() {
        let id = generate_run_id();
        assert!(id.starts_with("r-"));
        assert_eq!(id.len(), 14);
    }

    #[test]
    fn test_event_log_path() {
        let p = event_log_path(Path::new("/state"), "dev");
        assert_eq!(p, PathBuf::from("/state/dev/events.jsonl"));
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        append_event(
            dir.path(),
            "dev",
            ProvenanceEvent::UnitStarted {
                unit: "vpc".to_string(),
                kind: UnitKind::Network,
            },
        )
        .unwrap();
        append_event(
            dir.path(),
            "dev",
            ProvenanceEvent::ParameterPublished {
                unit: "vpc".to_string(),
                name: ParamName::DbSecurityGroupId,
                hash: "blake3:xxx".to_string(),
                outcome: "created".to_string(),
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(dir.path().join("dev/events.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("unit_started"));

        let events = read_events(dir.path(), "dev").unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1].event,
            ProvenanceEvent::ParameterPublished { ref unit, .. } if unit == "vpc"
        ));
    }

    #[test]
    fn test_environments_are_separate_logs() {
        let dir = tempfile::tempdir().unwrap();
        let event = ProvenanceEvent::UnitFailed {
            unit: "db".to_string(),
            phase: UnitPhase::Declared,
            error: "boom".to_string(),
        };
        append_event(dir.path(), "dev", event.clone()).unwrap();
        append_event(dir.path(), "prod", event).unwrap();
        assert_eq!(read_events(dir.path(), "dev").unwrap().len(), 1);
        assert_eq!(read_events(dir.path(), "prod").unwrap().len(), 1);
        assert!(read_events(dir.path(), "qa").unwrap().is_empty());
    }

    #[test]
    fn test_unit_phases_replay() {
        let at = |ts: &str, event| TimestampedEvent {
            ts: ts.to_string(),
            event,
        };
        let events = vec![
            at(
                "t1",
                ProvenanceEvent::UnitStarted {
                    unit: "vpc".to_string(),
                    kind: UnitKind::Network,
                },
            ),
            at(
                "t2",
                ProvenanceEvent::UnitCompleted {
                    unit: "vpc".to_string(),
                    resolved: 0,
                    published: 1,
                    duration_seconds: 0.1,
                },
            ),
            at(
                "t3",
                ProvenanceEvent::UnitStarted {
                    unit: "api".to_string(),
                    kind: UnitKind::FunctionFront,
                },
            ),
            at(
                "t4",
                ProvenanceEvent::UnitFailed {
                    unit: "api".to_string(),
                    phase: UnitPhase::Declared,
                    error: "unresolved".to_string(),
                },
            ),
        ];
        let phases = unit_phases(&events);
        let keys: Vec<_> = phases.keys().cloned().collect();
        assert_eq!(keys, vec!["vpc", "api"]);
        assert_eq!(phases["vpc"], (UnitPhase::Complete, "t2".to_string()));
        assert_eq!(phases["api"].0, UnitPhase::Failed);
    }
}
