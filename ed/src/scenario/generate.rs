//! Random scenario generation

use rand::Rng;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{Direction, FaultKind, Floor, FloorRequest};

use super::ScenarioEntry;
use super::error::ScenarioError;

/// Fewest entries the requirement positions fit into
pub const REQUIRED_PEOPLE: usize = 10;

/// Generate a random scenario and stamp the fixed requirement entries onto it
///
/// If the requirements cannot be enforced (too few people or floors) the random scenario
/// is returned as is.
pub fn generate<R: Rng + ?Sized>(config: &Config, rng: &mut R) -> Vec<ScenarioEntry> {
    let floors = config.building.floors;
    let limits = &config.scenario;
    let people = rng.random_range(limits.min_people..=limits.max_people.max(limits.min_people));

    let mut entries: Vec<ScenarioEntry> = (0..people)
        .map(|_| {
            let offset_ms = rng.random_range(0..=limits.max_duration_ms);
            let origin = rng.random_range(1..=floors.max(1));
            let target = random_target(rng, origin, floors);
            let direction = Direction::between(origin, target).unwrap_or(Direction::Up);
            ScenarioEntry {
                offset_ms,
                request: FloorRequest::new(origin, target, direction),
            }
        })
        .collect();
    entries.sort_by_key(|e| e.offset_ms);

    info!(people, duration_ms = limits.max_duration_ms, "Generating scenario");
    match enforce_requirements(&entries, floors) {
        Ok(enforced) => enforced,
        Err(e) => {
            warn!(error = %e, "Scenario generated without requirements");
            entries
        }
    }
}

/// Overwrite fixed positions of a time-sorted scenario
///
/// Positions 0 and 1 ride from the bottom to the top, 5 and 6 ride back down, 4 carries a
/// stuck door and 9 a stuck car. Offsets are kept.
pub fn enforce_requirements(entries: &[ScenarioEntry], floors: Floor) -> Result<Vec<ScenarioEntry>, ScenarioError> {
    if entries.len() < REQUIRED_PEOPLE {
        return Err(ScenarioError::Requirements(format!(
            "there must be at least {} people but there are only {}",
            REQUIRED_PEOPLE,
            entries.len()
        )));
    }
    if floors < 3 {
        return Err(ScenarioError::Requirements(format!(
            "at least 3 floors are needed, the building has {}",
            floors
        )));
    }

    let mut out = entries.to_vec();
    out[0].request = FloorRequest::new(1, floors, Direction::Up);
    out[1].request = FloorRequest::new(2, floors, Direction::Up);
    out[5].request = FloorRequest::new(floors, 1, Direction::Down);
    out[6].request = FloorRequest::new(floors, 2, Direction::Down);
    out[4].request = out[4].request.clone().with_fault(FaultKind::DoorStuck);
    out[9].request = out[9].request.clone().with_fault(FaultKind::ElevatorStuck);
    Ok(out)
}

fn random_target<R: Rng + ?Sized>(rng: &mut R, origin: Floor, floors: Floor) -> Floor {
    if floors < 2 {
        return origin;
    }
    loop {
        let target = rng.random_range(1..=floors);
        if target != origin {
            return target;
        }
    }
}
