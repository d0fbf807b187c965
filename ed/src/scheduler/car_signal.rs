//! Per-report transition table
//!
//! A car reports the state it just finished. This decides the state it should perform next,
//! moving requests through pickup and delivery and keeping lamps and destinations current.

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use crate::domain::{
    CarId, CarRecord, Direction, ElevatorSignal, ElevatorState, FaultKind, Floor, FloorSignalKind,
};

use super::algorithm::sort_active_requests;
use super::state::SchedulerContext;

/// The parts of a report that carry over into the next command
struct Working {
    car_id: CarId,
    floor: Floor,
    new_buttons: Vec<Floor>,
    lit_buttons: BTreeSet<Floor>,
}

/// A report that cannot answer the last command sent to the car
fn is_stale(record: &CarRecord, signal: &ElevatorSignal) -> bool {
    use ElevatorState::*;
    matches!(signal.state, Idle | MovingUp | MovingDown | Stop | OpenDoors | CloseDoors)
        && record.state != Reboot
        && signal.state != record.state
}

impl SchedulerContext {
    pub(super) fn prepare_elevator_signal(&mut self, signal: ElevatorSignal) {
        debug!(car_id = signal.car_id, state = %signal.state, floor = signal.floor, "prepare_elevator_signal: called");

        let Some(record) = self.sheet.car(signal.car_id).cloned() else {
            self.register_car(signal);
            return;
        };

        if record.is_dead() && signal.state != ElevatorState::Dead {
            warn!(car_id = signal.car_id, state = %signal.state, "Report from dead car ignored");
            return;
        }
        if is_stale(&record, &signal) {
            debug!(car_id = signal.car_id, reported = %signal.state, commanded = %record.state, "Stale report ignored");
            return;
        }

        let mut work = Working {
            car_id: signal.car_id,
            floor: signal.floor,
            new_buttons: signal.new_car_buttons.clone(),
            lit_buttons: signal.lit_car_buttons.clone(),
        };

        let next = match signal.state {
            ElevatorState::Start => {
                warn!(car_id = work.car_id, "Known car reported START again, commanding IDLE");
                Some(ElevatorState::Idle)
            }
            ElevatorState::Idle => self.on_idle(&work, &record),
            ElevatorState::MovingUp => self.on_moving(&work, Direction::Up),
            ElevatorState::MovingDown => self.on_moving(&work, Direction::Down),
            ElevatorState::Stop => self.on_stop(&mut work),
            ElevatorState::OpenDoors => self.on_open_doors(&mut work),
            ElevatorState::CloseDoors => self.on_close_doors(&mut work, &signal.new_car_buttons),
            ElevatorState::ErrorDoorStuck => self.on_fault(&work, &record, FaultKind::DoorStuck),
            ElevatorState::ErrorElevatorStuck => self.on_fault(&work, &record, FaultKind::ElevatorStuck),
            ElevatorState::Reboot => {
                info!(car_id = work.car_id, "Car rebooted, waiting for it to resume");
                None
            }
            ElevatorState::Dead => {
                self.on_dead(&work);
                None
            }
        };

        if let Some(next) = next {
            self.command(work, next);
        }
    }

    fn register_car(&mut self, signal: ElevatorSignal) {
        if !self.building.contains_car(signal.car_id) || signal.state != ElevatorState::Start {
            warn!(car_id = signal.car_id, state = %signal.state, "Signal from unknown car ignored");
            return;
        }

        let ack = ElevatorSignal {
            state: ElevatorState::Idle,
            fault: None,
            ..signal
        };
        self.sheet.register_car(CarRecord::from_signal(&ack, BTreeSet::new()));
        self.car_outbox.push(ack);
    }

    /// Attach a pending fault if one fits `next`, queue the command and record it
    fn command(&mut self, work: Working, next: ElevatorState) {
        let car_id = work.car_id;
        let fault = self.sheet.active.get_mut(&car_id).and_then(|requests| {
            requests.iter_mut().filter(|r| r.picked_up).find_map(|r| {
                let kind = r.unhandled_fault().filter(|kind| kind.compatible_with(next))?;
                r.mark_fault_handled(kind);
                info!(%car_id, request_id = r.id, fault = %kind, state = %next, "Injecting fault");
                Some(kind)
            })
        });

        let outgoing = ElevatorSignal {
            state: next,
            car_id,
            floor: work.floor,
            new_car_buttons: work.new_buttons,
            lit_car_buttons: work.lit_buttons,
            fault,
        };
        let destinations = self.destinations(car_id);
        debug!(%car_id, state = %next, floor = outgoing.floor, "Commanding car");
        self.sheet.cars.insert(car_id, CarRecord::from_signal(&outgoing, destinations));
        self.car_outbox.push(outgoing);
    }

    fn destinations(&self, car_id: CarId) -> BTreeSet<Floor> {
        self.sheet.car(car_id).map(|c| c.destinations.clone()).unwrap_or_default()
    }

    fn remove_destination(&mut self, car_id: CarId, floor: Floor) {
        if let Some(car) = self.sheet.cars.get_mut(&car_id) {
            car.destinations.remove(&floor);
        }
    }

    fn on_idle(&mut self, work: &Working, record: &CarRecord) -> Option<ElevatorState> {
        let car_id = work.car_id;

        if self.sheet.active_for(car_id).is_empty() {
            // Nothing owed: drop stops left over from reports at unexpected floors
            self.sheet.reconcile_destinations(car_id);
            if !self.sheet.awaiting.is_empty() {
                self.assign_awaiting(Some(car_id));
            }
        }

        if self.sheet.active_for(car_id).is_empty() {
            debug!(%car_id, "Idle car has no work");
            return None;
        }
        if self.destinations(car_id).is_empty() {
            self.sheet.reconcile_destinations(car_id);
        }

        let position = CarRecord {
            floor: work.floor,
            ..record.clone()
        };
        let head = sort_active_requests(&position, self.sheet.active_for(car_id))
            .into_iter()
            .next()?;
        let desired = head.pending_stop()?;

        if desired == work.floor || self.destinations(car_id).contains(&work.floor) {
            if !head.picked_up && head.origin == work.floor {
                self.floor_signal(FloorSignalKind::BtnLampOff, head.origin, head.direction);
                self.floor_signal(FloorSignalKind::DirLampOn, head.origin, head.direction);
            }
            self.remove_destination(car_id, work.floor);
            return Some(ElevatorState::OpenDoors);
        }

        if desired > work.floor {
            Some(ElevatorState::MovingUp)
        } else {
            Some(ElevatorState::MovingDown)
        }
    }

    fn on_moving(&mut self, work: &Working, travel: Direction) -> Option<ElevatorState> {
        let car_id = work.car_id;
        let floor = work.floor;
        self.sheet.reconcile_destinations(car_id);

        let active = self.sheet.active_for(car_id);
        let Some(heading) = active
            .iter()
            .find(|r| r.picked_up)
            .or(active.first())
            .map(|r| r.direction)
        else {
            warn!(%car_id, %floor, "Moving car has no active requests, stopping");
            return Some(ElevatorState::Stop);
        };

        let destinations = self.destinations(car_id);
        let ahead = destinations.iter().copied().filter(|f| match travel {
            Direction::Up => *f > floor,
            Direction::Down => *f < floor,
        });
        // Same heading: next stop ahead. Opposite heading: the turnaround floor.
        let target = match (travel, heading == travel) {
            (Direction::Up, true) | (Direction::Down, false) => ahead.min(),
            (Direction::Up, false) | (Direction::Down, true) => ahead.max(),
        };

        let (next_floor, at_boundary) = match travel {
            Direction::Up => (floor + 1, floor + 1 >= self.building.floors),
            Direction::Down => (floor.saturating_sub(1), floor <= 2),
        };

        if at_boundary || target.is_none() || target == Some(next_floor) {
            Some(ElevatorState::Stop)
        } else {
            match travel {
                Direction::Up => Some(ElevatorState::MovingUp),
                Direction::Down => Some(ElevatorState::MovingDown),
            }
        }
    }

    fn on_stop(&mut self, work: &mut Working) -> Option<ElevatorState> {
        let car_id = work.car_id;
        let floor = work.floor;
        let active = self.sheet.active_for(car_id);
        if active.is_empty() {
            warn!(%car_id, %floor, "Car stopped with no active requests");
        }

        if let Some(direction) = active.iter().rev().find(|r| r.origin == floor).map(|r| r.direction) {
            self.floor_signal(FloorSignalKind::BtnLampOff, floor, direction);
            self.floor_signal(FloorSignalKind::DirLampOn, floor, direction);
        }
        work.lit_buttons.remove(&floor);
        self.remove_destination(car_id, floor);
        Some(ElevatorState::OpenDoors)
    }

    fn on_open_doors(&mut self, work: &mut Working) -> Option<ElevatorState> {
        let active = self.sheet.active_for(work.car_id);
        if active.is_empty() {
            warn!(car_id = work.car_id, floor = work.floor, "Doors opened with no active requests");
        }
        let boarding: Vec<Floor> = active
            .iter()
            .rev()
            .filter(|r| r.origin == work.floor && !r.picked_up)
            .map(|r| r.target)
            .collect();
        work.new_buttons.extend(boarding);
        Some(ElevatorState::CloseDoors)
    }

    fn on_close_doors(&mut self, work: &mut Working, pressed: &[Floor]) -> Option<ElevatorState> {
        let car_id = work.car_id;
        let floor = work.floor;

        if self.sheet.active_for(car_id).is_empty() {
            warn!(%car_id, %floor, "Doors closed with no active requests");
            work.new_buttons.clear();
            return Some(ElevatorState::Idle);
        }

        if let Some(direction) = self
            .sheet
            .active_for(car_id)
            .iter()
            .rev()
            .find(|r| r.origin == floor)
            .map(|r| r.direction)
        {
            self.floor_signal(FloorSignalKind::BtnLampOff, floor, direction);
            self.floor_signal(FloorSignalKind::DirLampOff, floor, direction);
        }

        let mut delivered = Vec::new();
        if let Some(requests) = self.sheet.active.get_mut(&car_id) {
            for i in (0..requests.len()).rev() {
                let request = &mut requests[i];
                if request.origin == floor && (pressed.contains(&request.target) || !request.picked_up) {
                    if !request.picked_up {
                        info!(%car_id, request_id = request.id, %floor, "Passenger picked up");
                    }
                    request.picked_up = true;
                }
                if request.target == floor && request.picked_up {
                    delivered.push(requests.remove(i));
                }
            }
        }

        for request in delivered.into_iter().rev() {
            self.remove_destination(car_id, request.target);
            self.sheet.archive(request);
        }

        work.lit_buttons.extend(pressed.iter().copied());
        if let Some(car) = self.sheet.cars.get_mut(&car_id) {
            car.destinations.extend(pressed.iter().copied());
        }
        work.new_buttons.clear();
        Some(ElevatorState::Idle)
    }

    fn on_fault(&mut self, work: &Working, record: &CarRecord, kind: FaultKind) -> Option<ElevatorState> {
        let car_id = work.car_id;
        let mut marked = 0;
        if let Some(requests) = self.sheet.active.get_mut(&car_id) {
            for request in requests.iter_mut().filter(|r| r.picked_up) {
                if request.mark_fault_handled(kind) {
                    marked += 1;
                }
            }
        }

        if marked == 0 && record.fault != Some(kind) {
            // Already rebooting or retired, or the fault cannot happen in the commanded state
            let repeated = matches!(record.state, ElevatorState::Reboot | ElevatorState::Dead);
            if repeated || !kind.compatible_with(record.state) {
                warn!(%car_id, fault = %kind, commanded = %record.state, "Fault report ignored");
                return None;
            }
            warn!(%car_id, fault = %kind, commanded = %record.state, "Car reported a fault nobody injected");
        }

        match kind {
            FaultKind::DoorStuck => {
                warn!(%car_id, floor = work.floor, "Car doors stuck, rebooting");
                Some(ElevatorState::Reboot)
            }
            FaultKind::ElevatorStuck => {
                error!(%car_id, floor = work.floor, "Car stuck, shutting it down");
                Some(ElevatorState::Dead)
            }
        }
    }

    fn on_dead(&mut self, work: &Working) {
        let (archived, returned) = self.sheet.retire_car(work.car_id);
        warn!(
            car_id = work.car_id,
            floor = work.floor,
            archived,
            returned,
            "Car shut down, unserved requests returned for reassignment"
        );
    }
}
