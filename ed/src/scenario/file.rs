//! Scenario text format: `<millis> <origin> <UP|DOWN> <target> <NONE|DOOR_STUCK|ELEVATOR_STUCK>`

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::config::BuildingConfig;
use crate::domain::{Direction, FaultKind, Floor, FloorRequest};

use super::ScenarioEntry;
use super::error::ScenarioError;

const COLUMNS: usize = 5;

/// Parse scenario text, returning entries sorted by offset
pub fn parse(content: &str, building: &BuildingConfig) -> Result<Vec<ScenarioEntry>, ScenarioError> {
    let mut entries = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != COLUMNS {
            return Err(corrupted(line, format!("expected {} columns, found {}", COLUMNS, fields.len())));
        }

        let offset_ms: u64 = fields[0]
            .parse()
            .map_err(|_| corrupted(line, format!("bad time offset '{}'", fields[0])))?;
        let origin = parse_floor(fields[1], line, building)?;
        let direction: Direction = fields[2].parse().map_err(|e| corrupted(line, e))?;
        let target = parse_floor(fields[3], line, building)?;
        let fault = parse_fault(fields[4]).ok_or_else(|| corrupted(line, format!("unknown fault '{}'", fields[4])))?;

        match Direction::between(origin, target) {
            None => return Err(corrupted(line, format!("origin and target are both floor {}", origin))),
            Some(implied) if implied != direction => {
                return Err(corrupted(
                    line,
                    format!("direction {} does not lead from {} to {}", direction, origin, target),
                ));
            }
            Some(_) => {}
        }

        let mut request = FloorRequest::new(origin, target, direction);
        if let Some(kind) = fault {
            request = request.with_fault(kind);
        }
        entries.push(ScenarioEntry { offset_ms, request });
    }

    entries.sort_by_key(|e| e.offset_ms);
    debug!(count = entries.len(), "parse: done");
    Ok(entries)
}

/// Read and parse a scenario file
pub fn load(path: &Path, building: &BuildingConfig) -> Result<Vec<ScenarioEntry>, ScenarioError> {
    let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = parse(&content, building)?;
    info!(
        path = %path.display(),
        requests = entries.len(),
        duration_ms = entries.last().map(|e| e.offset_ms).unwrap_or(0),
        "Loaded scenario file"
    );
    Ok(entries)
}

/// Render entries in the scenario text format
pub fn format(entries: &[ScenarioEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let fault = entry.request.fault.map(|f| f.kind.as_str()).unwrap_or("NONE");
        let _ = writeln!(
            out,
            "{} {} {} {} {}",
            entry.offset_ms, entry.request.origin_floor, entry.request.direction, entry.request.target_floor, fault
        );
    }
    out
}

/// Write entries to `path`, replacing any existing file
pub fn write(path: &Path, entries: &[ScenarioEntry]) -> Result<(), ScenarioError> {
    fs::write(path, format(entries)).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), requests = entries.len(), "Wrote scenario file");
    Ok(())
}

fn parse_floor(field: &str, line: usize, building: &BuildingConfig) -> Result<Floor, ScenarioError> {
    let floor: Floor = field
        .parse()
        .map_err(|_| corrupted(line, format!("bad floor '{}'", field)))?;
    if !building.contains_floor(floor) {
        return Err(ScenarioError::FloorOutOfRange { line, floor });
    }
    Ok(floor)
}

/// `Some(None)` for NONE, `None` for an unknown word
fn parse_fault(field: &str) -> Option<Option<FaultKind>> {
    match field {
        "NONE" => Some(None),
        "DOOR_STUCK" => Some(Some(FaultKind::DoorStuck)),
        "ELEVATOR_STUCK" => Some(Some(FaultKind::ElevatorStuck)),
        _ => None,
    }
}

fn corrupted(line: usize, reason: impl Into<String>) -> ScenarioError {
    ScenarioError::Corrupted {
        line,
        reason: reason.into(),
    }
}
