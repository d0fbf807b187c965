//! Last confirmed state of a car plus its scheduling metadata

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::signal::ElevatorSignal;
use super::state::{ElevatorState, FaultKind};
use super::{CarId, Floor};

/// A car's most recent state as commanded by the coordinator
///
/// `state` is the last state sent to the car, `destinations` the stops it still owes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarRecord {
    pub id: CarId,
    pub state: ElevatorState,
    pub floor: Floor,
    pub destinations: BTreeSet<Floor>,
    pub lit_buttons: BTreeSet<Floor>,
    pub new_buttons: Vec<Floor>,
    pub fault: Option<FaultKind>,
}

impl CarRecord {
    /// Record a signal that was just sent to the car
    pub fn from_signal(signal: &ElevatorSignal, destinations: BTreeSet<Floor>) -> Self {
        Self {
            id: signal.car_id,
            state: signal.state,
            floor: signal.floor,
            destinations,
            lit_buttons: signal.lit_car_buttons.clone(),
            new_buttons: signal.new_car_buttons.clone(),
            fault: signal.fault,
        }
    }

    /// Rebuild the signal this record was created from, with `state` substituted
    pub fn to_signal(&self, state: ElevatorState) -> ElevatorSignal {
        ElevatorSignal {
            state,
            car_id: self.id,
            floor: self.floor,
            new_car_buttons: self.new_buttons.clone(),
            lit_car_buttons: self.lit_buttons.clone(),
            fault: self.fault,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.state == ElevatorState::Dead
    }
}
