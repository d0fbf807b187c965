//! Master Sheet: the coordinator's record of requests, cars and floor lamps

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info};

use crate::domain::{CarId, CarRecord, Direction, ElevatorState, Floor, Request, RequestId};

/// Lamp state per floor and direction
pub type LampMap = BTreeMap<Floor, BTreeMap<Direction, bool>>;

/// Authoritative record of in-flight work
///
/// Every request lives in exactly one of `awaiting`, one list in `active`, or `complete`.
/// `cars` and `active` always have the same key set.
#[derive(Debug, Clone, Default)]
pub struct MasterSheet {
    pub awaiting: Vec<Request>,
    pub active: BTreeMap<CarId, Vec<Request>>,
    pub complete: Vec<Request>,
    pub cars: BTreeMap<CarId, CarRecord>,
    pub call_lamps: LampMap,
    pub direction_lamps: LampMap,
    last_request_id: RequestId,
    stranded: u64,
}

fn unlit_lamps(floors: Floor) -> LampMap {
    (1..=floors)
        .map(|floor| (floor, Direction::ALL.into_iter().map(|d| (d, false)).collect()))
        .collect()
}

impl MasterSheet {
    /// Create an empty sheet with every lamp of a `floors`-storey building off
    pub fn new(floors: Floor) -> Self {
        debug!(%floors, "MasterSheet::new: called");
        Self {
            call_lamps: unlit_lamps(floors),
            direction_lamps: unlit_lamps(floors),
            ..Default::default()
        }
    }

    /// Hand out the next sequential request id
    pub fn next_request_id(&mut self) -> RequestId {
        self.last_request_id += 1;
        self.last_request_id
    }

    /// Number of requests created so far
    pub fn requests_received(&self) -> u64 {
        self.last_request_id
    }

    /// Picked-up requests archived because their car died
    pub fn stranded(&self) -> u64 {
        self.stranded
    }

    pub fn is_registered(&self, car_id: CarId) -> bool {
        self.cars.contains_key(&car_id)
    }

    pub fn car(&self, car_id: CarId) -> Option<&CarRecord> {
        self.cars.get(&car_id)
    }

    /// Active requests of a car, empty for unknown cars
    pub fn active_for(&self, car_id: CarId) -> &[Request] {
        self.active.get(&car_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Add a car record together with its (empty) active list
    pub fn register_car(&mut self, record: CarRecord) {
        info!(car_id = record.id, floor = record.floor, "Car registered");
        self.active.entry(record.id).or_default();
        self.cars.insert(record.id, record);
    }

    /// Put a request on a car's active list and add its pending stop to the car's destinations
    pub fn assign(&mut self, mut request: Request, car_id: CarId) {
        debug!(request_id = request.id, %car_id, "MasterSheet::assign: called");
        request.car_id = Some(car_id);
        if let (Some(car), Some(stop)) = (self.cars.get_mut(&car_id), request.pending_stop()) {
            car.destinations.insert(stop);
        }
        self.active.entry(car_id).or_default().push(request);
    }

    /// Queue a request that no car can take yet
    pub fn push_awaiting(&mut self, mut request: Request) {
        debug!(request_id = request.id, "MasterSheet::push_awaiting: called");
        request.car_id = None;
        self.awaiting.push(request);
    }

    /// Remove every awaiting request, oldest first
    pub fn take_awaiting(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.awaiting)
    }

    /// Archive a delivered request
    pub fn archive(&mut self, mut request: Request) {
        info!(request_id = request.id, car_id = ?request.car_id, floor = request.target, "Passenger delivered");
        request.completed = true;
        self.complete.push(request);
    }

    /// Drop every active request of a dead car
    ///
    /// Boarded passengers cannot be rescued and are archived. The rest return to awaiting
    /// with no car. Returns `(archived, returned)`.
    pub fn retire_car(&mut self, car_id: CarId) -> (usize, usize) {
        let requests = self.active.get_mut(&car_id).map(std::mem::take).unwrap_or_default();
        let (mut archived, mut returned) = (0, 0);

        for mut request in requests {
            if request.picked_up {
                request.completed = true;
                self.stranded += 1;
                self.complete.push(request);
                archived += 1;
            } else {
                self.push_awaiting(request);
                returned += 1;
            }
        }

        // A retired car stays on the sheet, frozen DEAD and never eligible again
        if let Some(car) = self.cars.get_mut(&car_id) {
            car.state = ElevatorState::Dead;
            car.fault = None;
            car.destinations.clear();
        }
        (archived, returned)
    }

    pub fn set_call_lamp(&mut self, floor: Floor, direction: Direction, lit: bool) {
        self.call_lamps.entry(floor).or_default().insert(direction, lit);
    }

    pub fn set_direction_lamp(&mut self, floor: Floor, direction: Direction, lit: bool) {
        self.direction_lamps.entry(floor).or_default().insert(direction, lit);
    }

    pub fn call_lamp(&self, floor: Floor, direction: Direction) -> bool {
        lamp(&self.call_lamps, floor, direction)
    }

    pub fn direction_lamp(&self, floor: Floor, direction: Direction) -> bool {
        lamp(&self.direction_lamps, floor, direction)
    }

    /// Floors the active requests of `car_id` still need visited
    pub fn pending_stops(&self, car_id: CarId) -> BTreeSet<Floor> {
        self.active_for(car_id).iter().filter_map(Request::pending_stop).collect()
    }

    /// Reset a car's destination set to the pending stops of its active requests
    ///
    /// Returns true if the set changed.
    pub fn reconcile_destinations(&mut self, car_id: CarId) -> bool {
        let stops = self.pending_stops(car_id);
        match self.cars.get_mut(&car_id) {
            Some(car) if car.destinations != stops => {
                debug!(%car_id, before = ?car.destinations, after = ?stops, "Destinations reconciled");
                car.destinations = stops;
                true
            }
            _ => false,
        }
    }

    /// No request is waiting for or assigned to a car
    pub fn is_drained(&self) -> bool {
        self.awaiting.is_empty() && self.active.values().all(Vec::is_empty)
    }

    /// Every car in the building registered and then died
    pub fn all_cars_dead(&self, elevators: CarId) -> bool {
        self.cars.len() == elevators as usize && self.cars.values().all(CarRecord::is_dead)
    }

    /// Check that every request sits in exactly one place
    pub fn check_partition(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        let lists = std::iter::once(("awaiting".to_string(), &self.awaiting))
            .chain(self.active.iter().map(|(id, list)| (format!("car {}", id), list)))
            .chain(std::iter::once(("complete".to_string(), &self.complete)));

        for (name, list) in lists {
            for request in list {
                if !seen.insert(request.id) {
                    return Err(format!("request {} appears twice (again in {})", request.id, name));
                }
            }
        }

        for (car_id, list) in &self.active {
            if let Some(request) = list.iter().find(|r| r.car_id != Some(*car_id)) {
                return Err(format!("request {} on car {} names car {:?}", request.id, car_id, request.car_id));
            }
        }

        if self.active.len() != self.cars.len() {
            return Err(format!(
                "{} active lists for {} car records",
                self.active.len(),
                self.cars.len()
            ));
        }
        Ok(())
    }

    /// Check that every destination of a car is owed to one of its active requests
    pub fn check_destinations(&self) -> Result<(), String> {
        for (car_id, car) in &self.cars {
            let owed: BTreeSet<Floor> = self
                .active_for(*car_id)
                .iter()
                .filter(|r| !r.completed)
                .flat_map(|r| [r.origin, r.target])
                .collect();
            if let Some(floor) = car.destinations.iter().find(|f| !owed.contains(f)) {
                return Err(format!("car {} has destination {} with no active request", car_id, floor));
            }
        }
        Ok(())
    }
}

fn lamp(map: &LampMap, floor: Floor, direction: Direction) -> bool {
    map.get(&floor).and_then(|d| d.get(&direction)).copied().unwrap_or(false)
}
