//! Peer names and topic strings used on the dispatcher

use crate::domain::{CarId, Floor};

/// Coordinator peer
pub const SCHEDULER: &str = "scheduler";
/// Floor stations (one peer for all floors)
pub const FLOORS: &str = "floors";
/// Car peers (one peer for all cars)
pub const ELEVATORS: &str = "elevators";
/// Snapshot observers
pub const MONITOR: &str = "monitor";

// Coordinator inbound
pub const FLOOR_REQUEST: &str = "FLOOR_REQUEST";
pub const ELEVATOR_SIGNAL: &str = "ELEVATOR_SIGNAL";
pub const SCENARIO_STARTED: &str = "SCENARIO_STARTED";
pub const SCENARIO_COMPLETE: &str = "SCENARIO_COMPLETE";

// Coordinator outbound
pub const SCENARIO_START: &str = "SCENARIO_START";
pub const SCENARIO_END: &str = "SCENARIO_END";
pub const SCHEDULER_UPDATE: &str = "SCHEDULER_UPDATE";

/// Lamp commands for one floor
pub fn floor_signal(floor: Floor) -> String {
    format!("FLOOR_SIGNAL_{}", floor)
}

/// State commands for one car
pub fn elevator_signal(car_id: CarId) -> String {
    format!("ELEVATOR_SIGNAL_{}", car_id)
}

/// Parse the car id out of an `ELEVATOR_SIGNAL_<id>` topic
pub fn parse_elevator_signal(topic: &str) -> Option<CarId> {
    topic.strip_prefix("ELEVATOR_SIGNAL_")?.parse().ok()
}

/// Parse the floor out of a `FLOOR_SIGNAL_<n>` topic
pub fn parse_floor_signal(topic: &str) -> Option<Floor> {
    topic.strip_prefix("FLOOR_SIGNAL_")?.parse().ok()
}
