//! Message payloads exchanged between the coordinator and its peers

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::state::{Direction, ElevatorState, FaultKind};
use super::{CarId, Floor};

/// Fault descriptor carried by a passenger request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFault {
    pub kind: FaultKind,
    #[serde(default)]
    pub handled: bool,
}

impl RequestFault {
    pub fn new(kind: FaultKind) -> Self {
        Self { kind, handled: false }
    }
}

/// A new passenger, reported by a floor station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorRequest {
    pub origin_floor: Floor,
    pub target_floor: Floor,
    pub direction: Direction,
    #[serde(default)]
    pub fault: Option<RequestFault>,
}

impl FloorRequest {
    pub fn new(origin_floor: Floor, target_floor: Floor, direction: Direction) -> Self {
        Self {
            origin_floor,
            target_floor,
            direction,
            fault: None,
        }
    }

    pub fn with_fault(mut self, kind: FaultKind) -> Self {
        self.fault = Some(RequestFault::new(kind));
        self
    }
}

/// Car state report (car → coordinator) or command (coordinator → car)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevatorSignal {
    pub state: ElevatorState,
    pub car_id: CarId,
    pub floor: Floor,
    #[serde(default)]
    pub new_car_buttons: Vec<Floor>,
    #[serde(default)]
    pub lit_car_buttons: BTreeSet<Floor>,
    #[serde(default)]
    pub fault: Option<FaultKind>,
}

impl ElevatorSignal {
    pub fn new(state: ElevatorState, car_id: CarId, floor: Floor) -> Self {
        Self {
            state,
            car_id,
            floor,
            new_car_buttons: Vec::new(),
            lit_car_buttons: BTreeSet::new(),
            fault: None,
        }
    }
}

/// Lamp and status commands sent to a floor station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FloorSignalKind {
    BtnLampOn,
    BtnLampOff,
    DirLampOn,
    DirLampOff,
    SigOffline,
    SigOnline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorSignal {
    pub kind: FloorSignalKind,
    pub floor: Floor,
    pub direction: Direction,
}

impl FloorSignal {
    pub fn new(kind: FloorSignalKind, floor: Floor, direction: Direction) -> Self {
        Self { kind, floor, direction }
    }
}
