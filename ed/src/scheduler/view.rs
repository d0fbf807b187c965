//! View projection: an immutable copy of the Master Sheet for observers

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::config::TimingConfig;
use crate::domain::{CarId, CarRecord, Request};

use super::algorithm::{sum_trip_times, trip_times};
use super::sheet::{LampMap, MasterSheet};

/// Snapshot broadcast on SCHEDULER_UPDATE
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub awaiting: Vec<Request>,
    pub active_by_car_id: BTreeMap<CarId, Vec<Request>>,
    pub complete: Vec<Request>,
    pub cars_by_id: BTreeMap<CarId, CarRecord>,
    pub call_lamps_by_floor: LampMap,
    pub direction_lamps_by_floor: LampMap,
    /// Estimated outstanding work per car, in timing units
    #[serde(default)]
    pub workload_by_car_id: BTreeMap<CarId, u64>,
}

/// Copy the sheet into a snapshot
pub fn project(sheet: &MasterSheet, timing: &TimingConfig) -> ViewSnapshot {
    ViewSnapshot {
        awaiting: sheet.awaiting.clone(),
        active_by_car_id: sheet.active.clone(),
        complete: sheet.complete.clone(),
        cars_by_id: sheet.cars.clone(),
        call_lamps_by_floor: sheet.call_lamps.clone(),
        direction_lamps_by_floor: sheet.direction_lamps.clone(),
        workload_by_car_id: sum_trip_times(&trip_times(&sheet.active, &sheet.cars, timing)),
    }
}

impl ViewSnapshot {
    pub fn active_count(&self) -> usize {
        self.active_by_car_id.values().map(Vec::len).sum()
    }

    /// One line for logs: request counts then `id:STATE@floor` per car
    pub fn summary(&self) -> String {
        let mut line = format!(
            "awaiting={} active={} complete={}",
            self.awaiting.len(),
            self.active_count(),
            self.complete.len()
        );
        for car in self.cars_by_id.values() {
            let _ = write!(line, " {}:{}@{}", car.id, car.state, car.floor);
        }
        line
    }
}
