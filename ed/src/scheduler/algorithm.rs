//! Assignment algorithm
//!
//! Picks the car that should serve a request. A car is eligible if it has no work, or if it is
//! heading toward its pending stops in the request's direction and the request's origin lies on
//! the way. Among eligible cars the shortest estimated time to pickup wins, lowest id on ties.
//!
//! Times are in the abstract units of [`TimingConfig`], not wall-clock time.

use std::collections::BTreeMap;

use tracing::{debug, error};

use crate::config::TimingConfig;
use crate::domain::{CarId, CarRecord, Direction, ElevatorState, Floor, Request};

/// Time to travel between two floors, starting and ending at rest
pub fn travel_time(from: Floor, to: Floor, timing: &TimingConfig) -> u64 {
    match from.abs_diff(to) {
        0 => 0,
        1 => timing.stop,
        floors => timing.moving + timing.stop + u64::from(floors - 2) * timing.moving_max,
    }
}

/// Time to open and close the doors once
pub fn door_cycle_time(timing: &TimingConfig) -> u64 {
    2 * timing.doors
}

/// States in which a car must not receive new work
pub fn is_ineligible_state(state: ElevatorState) -> bool {
    state.is_fault_handling()
}

/// Order a car's active requests by the sequence in which it will reach their pending stops
///
/// Ascending when the car moves (or is about to move) up, descending when down. Stops behind
/// the car go to the end, nearest first. With no direction to go by the list is returned as is.
pub fn sort_active_requests(car: &CarRecord, requests: &[Request]) -> Vec<Request> {
    let direction = match car.state {
        ElevatorState::MovingUp => Some(Direction::Up),
        ElevatorState::MovingDown => Some(Direction::Down),
        _ => requests
            .iter()
            .find(|r| !r.picked_up && !r.completed)
            .map(|r| r.direction),
    };

    let Some(direction) = direction else {
        return requests.to_vec();
    };

    let mut sorted = requests.to_vec();
    match direction {
        Direction::Up => sorted.sort_by_key(Request::pending_stop),
        Direction::Down => sorted.sort_by(|a, b| b.pending_stop().cmp(&a.pending_stop())),
    }

    let ahead = sorted.iter().position(|r| match (r.pending_stop(), direction) {
        (Some(stop), Direction::Up) => car.floor < stop,
        (Some(stop), Direction::Down) => car.floor > stop,
        (None, _) => false,
    });

    if let Some(split) = ahead {
        let mut behind: Vec<Request> = sorted.drain(..split).collect();
        behind.reverse();
        sorted.extend(behind);
    }
    sorted
}

/// The car is not moving up but its next stop lies above it (or at its floor, before pickup)
pub fn should_be_moving_up(car: &CarRecord, sorted: &[Request]) -> bool {
    if car.state == ElevatorState::MovingUp {
        return false;
    }
    match sorted.first() {
        Some(next) if !next.picked_up => next.origin >= car.floor,
        Some(next) => next.target > car.floor,
        None => false,
    }
}

/// The car is not moving down but its next stop lies below it (or at its floor, before pickup)
pub fn should_be_moving_down(car: &CarRecord, sorted: &[Request]) -> bool {
    if car.state == ElevatorState::MovingDown {
        return false;
    }
    match sorted.first() {
        Some(next) if !next.picked_up => next.origin <= car.floor,
        Some(next) => next.target < car.floor,
        None => false,
    }
}

/// Whether `car` may take `request` on top of its `active` work
pub fn is_eligible(request: &Request, car: &CarRecord, active: &[Request]) -> bool {
    if is_ineligible_state(car.state) {
        return false;
    }
    if active.is_empty() {
        return true;
    }
    if car.state == ElevatorState::Start {
        return false;
    }

    let sorted = sort_active_requests(car, active);
    let same_direction = active.iter().all(|r| r.direction == request.direction);
    let origin = request.origin;
    let stops = active.iter().filter_map(Request::pending_stop);

    let on_the_way = if car.state == ElevatorState::MovingUp || should_be_moving_up(car, &sorted) {
        let inferred = car.state != ElevatorState::MovingUp;
        stops
            .max()
            .is_some_and(|highest| origin <= highest && (car.floor < origin || (inferred && car.floor == origin)))
    } else if car.state == ElevatorState::MovingDown || should_be_moving_down(car, &sorted) {
        let inferred = car.state != ElevatorState::MovingDown;
        stops
            .min()
            .is_some_and(|lowest| origin >= lowest && (car.floor > origin || (inferred && car.floor == origin)))
    } else {
        false
    };

    on_the_way && same_direction
}

/// Estimated time for `car` to reach the origin of `request`
///
/// A busy car first serves every pending stop that is closer to it than the origin, paying a
/// door cycle at each.
pub fn estimate_pickup_time(request: &Request, car: &CarRecord, active: &[Request], timing: &TimingConfig) -> u64 {
    if active.is_empty() {
        return travel_time(car.floor, request.origin, timing);
    }

    let reach = car.floor.abs_diff(request.origin);
    let mut time = 0;
    let mut previous = car.floor;

    for stop in sort_active_requests(car, active).iter().filter_map(Request::pending_stop) {
        if car.floor.abs_diff(stop) >= reach {
            break;
        }
        time += travel_time(previous, stop, timing) + door_cycle_time(timing);
        previous = stop;
    }

    time + travel_time(previous, request.origin, timing)
}

/// Choose the car that should serve `request`, if any
pub fn select_car(
    request: &Request,
    active: &BTreeMap<CarId, Vec<Request>>,
    cars: &BTreeMap<CarId, CarRecord>,
    timing: &TimingConfig,
) -> Option<CarId> {
    debug!(request_id = request.id, "select_car: called");
    if active.len() != cars.len() {
        error!(
            active = active.len(),
            cars = cars.len(),
            "select_car: active request lists and car records disagree, no car selected"
        );
        return None;
    }

    let mut best: Option<(u64, CarId)> = None;
    for (car_id, car) in cars {
        let work = active.get(car_id).map(Vec::as_slice).unwrap_or_default();
        if !is_eligible(request, car, work) {
            continue;
        }
        let time = estimate_pickup_time(request, car, work, timing);
        debug!(request_id = request.id, %car_id, time, "select_car: eligible");
        if best.is_none_or(|(best_time, _)| time < best_time) {
            best = Some((time, *car_id));
        }
    }

    best.map(|(_, car_id)| car_id)
}

/// Per car, the time each active request still needs, in pending-stop order
pub fn trip_times(
    active: &BTreeMap<CarId, Vec<Request>>,
    cars: &BTreeMap<CarId, CarRecord>,
    timing: &TimingConfig,
) -> BTreeMap<CarId, Vec<u64>> {
    if active.len() != cars.len() {
        error!(
            active = active.len(),
            cars = cars.len(),
            "trip_times: active request lists and car records disagree"
        );
        return BTreeMap::new();
    }

    cars.iter()
        .map(|(car_id, car)| {
            let work = active.get(car_id).map(Vec::as_slice).unwrap_or_default();
            let mut location = car.floor;
            let times = sort_active_requests(car, work)
                .iter()
                .map(|request| {
                    let mut time = 0;
                    if !request.picked_up {
                        time += travel_time(location, request.origin, timing) + door_cycle_time(timing);
                        location = request.origin;
                    }
                    if !request.completed {
                        time += travel_time(location, request.target, timing) + door_cycle_time(timing);
                        location = request.target;
                    }
                    time
                })
                .collect();
            (*car_id, times)
        })
        .collect()
}

/// Total outstanding time per car
pub fn sum_trip_times(trip_times: &BTreeMap<CarId, Vec<u64>>) -> BTreeMap<CarId, u64> {
    trip_times.iter().map(|(id, times)| (*id, times.iter().sum())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ElevatorSignal, FloorRequest};
    use std::collections::BTreeSet;

    fn timing() -> TimingConfig {
        TimingConfig::default()
    }

    fn car(id: CarId, state: ElevatorState, floor: Floor) -> CarRecord {
        CarRecord::from_signal(&ElevatorSignal::new(state, id, floor), BTreeSet::new())
    }

    fn request(id: u64, origin: Floor, target: Floor) -> Request {
        let direction = Direction::between(origin, target).unwrap();
        let mut r = Request::new(id, &FloorRequest::new(origin, target, direction));
        r.car_id = Some(1);
        r
    }

    fn picked(mut r: Request) -> Request {
        r.picked_up = true;
        r
    }

    fn stops(requests: &[Request]) -> Vec<Floor> {
        requests.iter().filter_map(Request::pending_stop).collect()
    }

    #[test]
    fn test_travel_time_model() {
        let t = timing();
        assert_eq!(travel_time(4, 4, &t), 0);
        assert_eq!(travel_time(4, 5, &t), t.stop);
        assert_eq!(travel_time(5, 3, &t), t.moving + t.stop);
        assert_eq!(travel_time(1, 6, &t), t.moving + t.stop + 3 * t.moving_max);
        assert_eq!(door_cycle_time(&t), 6);
    }

    #[test]
    fn test_sort_moving_up_rotates_behind_stops() {
        let c = car(1, ElevatorState::MovingUp, 5);
        let active = vec![
            picked(request(1, 1, 9)),
            request(2, 3, 7),
            request(3, 6, 10),
            picked(request(4, 1, 2)),
        ];
        let sorted = sort_active_requests(&c, &active);
        assert_eq!(stops(&sorted), vec![6, 9, 3, 2]);
    }

    #[test]
    fn test_sort_moving_down() {
        let c = car(1, ElevatorState::MovingDown, 8);
        let active = vec![request(1, 3, 1), request(2, 10, 2), request(3, 6, 4)];
        let sorted = sort_active_requests(&c, &active);
        assert_eq!(stops(&sorted), vec![6, 3, 10]);
    }

    #[test]
    fn test_sort_without_direction_keeps_order() {
        let c = car(1, ElevatorState::Idle, 5);
        let active = vec![picked(request(1, 1, 9)), picked(request(2, 8, 2))];
        let sorted = sort_active_requests(&c, &active);
        assert_eq!(stops(&sorted), vec![9, 2]);
    }

    #[test]
    fn test_sort_uses_first_unpicked_direction() {
        let c = car(1, ElevatorState::Idle, 5);
        let active = vec![picked(request(1, 9, 2)), request(2, 7, 12), request(3, 3, 4)];
        let sorted = sort_active_requests(&c, &active);
        assert_eq!(stops(&sorted), vec![7, 3, 2]);
    }

    #[test]
    fn test_should_be_moving() {
        let c = car(1, ElevatorState::Idle, 5);
        let up = vec![request(1, 5, 9)];
        assert!(should_be_moving_up(&c, &up));
        assert!(should_be_moving_down(&c, &up));

        let boarded = vec![picked(request(1, 5, 2))];
        assert!(!should_be_moving_up(&c, &boarded));
        assert!(should_be_moving_down(&c, &boarded));

        let moving = car(1, ElevatorState::MovingUp, 5);
        assert!(!should_be_moving_up(&moving, &up));
        assert!(!should_be_moving_up(&c, &[]));
    }

    #[test]
    fn test_empty_car_always_eligible() {
        let c = car(1, ElevatorState::Idle, 5);
        assert!(is_eligible(&request(1, 2, 9), &c, &[]));
    }

    #[test]
    fn test_fault_handling_car_never_eligible() {
        for state in [
            ElevatorState::Dead,
            ElevatorState::Reboot,
            ElevatorState::ErrorDoorStuck,
            ElevatorState::ErrorElevatorStuck,
        ] {
            let c = car(1, state, 5);
            assert!(!is_eligible(&request(1, 2, 9), &c, &[]));
        }
    }

    #[test]
    fn test_on_the_way_same_direction_eligible() {
        let c = car(1, ElevatorState::MovingUp, 3);
        let active = vec![request(1, 13, 18)];
        assert!(is_eligible(&request(2, 5, 9), &c, &active));
        // Behind the car
        assert!(!is_eligible(&request(3, 2, 9), &c, &active));
        // Beyond the farthest stop
        assert!(!is_eligible(&request(4, 15, 20), &c, &active));
        // Opposite direction
        assert!(!is_eligible(&request(5, 8, 4), &c, &active));
    }

    #[test]
    fn test_origin_at_car_floor_only_when_inferred() {
        let idle = car(1, ElevatorState::Idle, 3);
        let moving = car(1, ElevatorState::MovingUp, 3);
        let active = vec![request(1, 13, 18)];
        assert!(is_eligible(&request(2, 3, 9), &idle, &active));
        assert!(!is_eligible(&request(2, 3, 9), &moving, &active));
    }

    #[test]
    fn test_pickup_time_empty_car() {
        let t = timing();
        let c = car(1, ElevatorState::Idle, 5);
        let r = request(1, 1, 6);
        assert_eq!(estimate_pickup_time(&r, &c, &[], &t), t.moving + t.stop + 2 * t.moving_max);
    }

    #[test]
    fn test_pickup_time_busy_car_stops_on_the_way() {
        let t = timing();
        let c = car(1, ElevatorState::MovingUp, 3);
        let active = vec![request(1, 4, 13), request(2, 12, 15)];
        let r = request(3, 6, 9);
        let expected = travel_time(3, 4, &t) + door_cycle_time(&t) + travel_time(4, 6, &t);
        assert_eq!(estimate_pickup_time(&r, &c, &active, &t), expected);
    }

    #[test]
    fn test_select_car_prefers_fastest_then_lowest_id() {
        let t = timing();
        let mut cars = BTreeMap::new();
        let mut active = BTreeMap::new();
        for (id, floor) in [(1, 10), (2, 2), (3, 6)] {
            cars.insert(id, car(id, ElevatorState::Idle, floor));
            active.insert(id, Vec::new());
        }
        // Car 2 and car 3 are both two floors from floor 4
        assert_eq!(select_car(&request(1, 4, 9), &active, &cars, &t), Some(2));
        // Only car 3 is one floor away from floor 7
        assert_eq!(select_car(&request(2, 7, 9), &active, &cars, &t), Some(3));
    }

    #[test]
    fn test_select_car_rejects_inconsistent_maps() {
        let mut cars = BTreeMap::new();
        cars.insert(1, car(1, ElevatorState::Idle, 1));
        let active = BTreeMap::new();
        assert_eq!(select_car(&request(1, 4, 9), &active, &cars, &timing()), None);
    }

    #[test]
    fn test_select_car_none_when_all_ineligible() {
        let mut cars = BTreeMap::new();
        let mut active = BTreeMap::new();
        cars.insert(1, car(1, ElevatorState::Dead, 1));
        active.insert(1, Vec::new());
        assert_eq!(select_car(&request(1, 4, 9), &active, &cars, &timing()), None);
    }

    #[test]
    fn test_trip_times() {
        let t = timing();
        let mut cars = BTreeMap::new();
        let mut active = BTreeMap::new();
        cars.insert(1, car(1, ElevatorState::Idle, 1));
        active.insert(1, vec![request(1, 2, 5)]);
        cars.insert(2, car(2, ElevatorState::Idle, 7));
        active.insert(2, Vec::new());

        let times = trip_times(&active, &cars, &t);
        let expected = travel_time(1, 2, &t) + travel_time(2, 5, &t) + 2 * door_cycle_time(&t);
        assert_eq!(times[&1], vec![expected]);
        assert!(times[&2].is_empty());

        let sums = sum_trip_times(&times);
        assert_eq!(sums[&1], expected);
        assert_eq!(sums[&2], 0);
    }
}
