//! Coordinator state machine
//!
//! One [`transition`] call is one unit of work. The function owns no I/O: outbound messages
//! come back in the [`Step`] and the runner performs them.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{BuildingConfig, Config, TimingConfig};
use crate::dispatch::topics;
use crate::domain::{
    CarId, Direction, ElevatorSignal, ElevatorState, Floor, FloorRequest, FloorSignal, FloorSignalKind, Request,
};

use super::algorithm::select_car;
use super::inbox::Inbox;
use super::sheet::MasterSheet;
use super::view::{ViewSnapshot, project};

/// Where the coordinator is in its loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    Listening,
    ProcessMessage,
    PrepareFloorMessage(FloorRequest),
    PrepareElevatorStateMessage(ElevatorSignal),
    SendMessage,
    UpdateView,
}

impl SchedulerState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Listening => "LISTENING",
            Self::ProcessMessage => "PROCESS_MESSAGE",
            Self::PrepareFloorMessage(_) => "PREPARE_FLOOR_MESSAGE",
            Self::PrepareElevatorStateMessage(_) => "PREPARE_ELEVATOR_STATE_MESSAGE",
            Self::SendMessage => "SEND_MESSAGE",
            Self::UpdateView => "UPDATE_VIEW",
        }
    }
}

/// A message the runner must hand to the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Lamp command for one floor
    Floor(FloorSignal),
    /// State command for one car
    Car(ElevatorSignal),
    /// Empty-payload control signal to a peer
    Control {
        destination: &'static str,
        topic: &'static str,
    },
    /// Snapshot for observers
    View(Box<ViewSnapshot>),
}

/// Result of one transition
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next: SchedulerState,
    pub outbound: Vec<Outbound>,
}

impl Step {
    fn to(next: SchedulerState) -> Self {
        Self {
            next,
            outbound: Vec::new(),
        }
    }
}

/// Everything the state machine reads and mutates
///
/// Owned by the coordinator loop. Only the [`Inbox`] is shared with delivery tasks.
pub struct SchedulerContext {
    pub sheet: MasterSheet,
    pub(super) building: BuildingConfig,
    pub(super) timing: TimingConfig,
    pub(super) inbox: Arc<Inbox>,
    start_resend: Duration,
    start_sent_at: Option<Instant>,
    started: bool,
    shutdown: bool,
    pub(super) floor_outbox: Vec<FloorSignal>,
    pub(super) car_outbox: Vec<ElevatorSignal>,
}

impl SchedulerContext {
    pub fn new(config: &Config, inbox: Arc<Inbox>) -> Self {
        debug!(floors = config.building.floors, elevators = config.building.elevators, "SchedulerContext::new: called");
        Self {
            sheet: MasterSheet::new(config.building.floors),
            building: config.building.clone(),
            timing: config.timing.clone(),
            inbox,
            start_resend: config.scheduler.start_resend(),
            start_sent_at: None,
            started: false,
            shutdown: false,
            floor_outbox: Vec::new(),
            car_outbox: Vec::new(),
        }
    }

    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Set once the drain conditions are met
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// The floors acknowledged the start handshake
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// When the start handshake must be resent, if it is still pending
    pub fn handshake_deadline(&self) -> Option<Instant> {
        if self.started || self.sheet.cars.is_empty() {
            return None;
        }
        self.start_sent_at.map(|sent| sent + self.start_resend)
    }

    /// Run transitions from Listening until the loop is back in Listening with nothing queued
    ///
    /// Returns every outbound message produced on the way.
    pub fn settle(&mut self, now: Instant) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        let mut state = SchedulerState::Listening;
        loop {
            let was_listening = state == SchedulerState::Listening;
            let step = transition(state, self, now);
            outbound.extend(step.outbound);
            if was_listening && step.next == SchedulerState::Listening {
                return outbound;
            }
            state = step.next;
        }
    }

    fn listen(&mut self, now: Instant) -> Step {
        let mut outbound = Vec::new();

        if !self.started && self.inbox.scenario_started() {
            info!("Floors acknowledged scenario start");
            self.started = true;
        }

        if !self.sheet.awaiting.is_empty() {
            for car in self.sheet.cars.values() {
                if car.state == ElevatorState::Idle && self.sheet.active_for(car.id).is_empty() {
                    self.inbox.push_idle_wake(car.to_signal(ElevatorState::Idle));
                }
            }
        }

        if !self.started && !self.sheet.cars.is_empty() && self.start_sent_at.is_none_or(|sent| now >= sent + self.start_resend)
        {
            debug!("Sending scenario start to floors");
            outbound.push(Outbound::Control {
                destination: topics::FLOORS,
                topic: topics::SCENARIO_START,
            });
            self.start_sent_at = Some(now);
        }

        if self.inbox.has_work() {
            return Step {
                next: SchedulerState::ProcessMessage,
                outbound,
            };
        }

        if !self.shutdown && self.drain_complete() {
            self.shutdown = true;
            for destination in [topics::FLOORS, topics::ELEVATORS] {
                outbound.push(Outbound::Control {
                    destination,
                    topic: topics::SCENARIO_END,
                });
            }
        }

        Step {
            next: SchedulerState::Listening,
            outbound,
        }
    }

    fn drain_complete(&self) -> bool {
        if !self.inbox.producer_finished() {
            return false;
        }
        if self.sheet.is_drained() && self.sheet.complete.len() as u64 == self.sheet.requests_received() {
            info!(completed = self.sheet.complete.len(), "All requests complete, shutting down");
            return true;
        }
        if self.sheet.all_cars_dead(self.building.elevators) {
            error!(
                awaiting = self.sheet.awaiting.len(),
                "Every car is dead, shutting down with requests outstanding"
            );
            return true;
        }
        false
    }

    fn process_message(&mut self) -> Step {
        if let Some(request) = self.inbox.pop_floor_request() {
            return Step::to(SchedulerState::PrepareFloorMessage(request));
        }
        if let Some(signal) = self.inbox.pop_elevator_signal() {
            return Step::to(SchedulerState::PrepareElevatorStateMessage(signal));
        }
        Step::to(SchedulerState::Listening)
    }

    pub(super) fn prepare_floor_request(&mut self, floor_request: FloorRequest) {
        let FloorRequest {
            origin_floor: origin,
            target_floor: target,
            direction,
            ..
        } = floor_request;

        if !self.building.contains_floor(origin) || !self.building.contains_floor(target) {
            warn!(%origin, %target, "Floor request outside the building dropped");
            return;
        }
        if Direction::between(origin, target) != Some(direction) {
            warn!(%origin, %target, %direction, "Floor request with inconsistent direction dropped");
            return;
        }

        let request = Request::new(self.sheet.next_request_id(), &floor_request);
        info!(request_id = request.id, %origin, %target, %direction, fault = ?request.fault_kind(), "New passenger request");

        let chosen = select_car(&request, &self.sheet.active, &self.sheet.cars, &self.timing);
        match chosen {
            Some(car_id) => {
                info!(request_id = request.id, %car_id, "Request assigned");
                self.assign_and_notify(request, car_id, None);
            }
            None => {
                info!(request_id = request.id, "No suitable car, request awaits assignment");
                self.sheet.push_awaiting(request);
            }
        }

        self.floor_signal(FloorSignalKind::BtnLampOn, origin, direction);
        if chosen.and_then(|id| self.sheet.car(id)).is_some_and(|car| car.floor == origin) {
            self.floor_signal(FloorSignalKind::DirLampOn, origin, direction);
        }
    }

    /// Give `request` to `car_id` and, if that car is sitting idle, queue a wake for it
    ///
    /// `processing` is the car whose report is being handled right now. It is never woken.
    pub(super) fn assign_and_notify(&mut self, request: Request, car_id: CarId, processing: Option<CarId>) {
        self.sheet.assign(request, car_id);
        if processing == Some(car_id) {
            return;
        }
        if let Some(car) = self.sheet.car(car_id)
            && car.state == ElevatorState::Idle
        {
            self.inbox.push_idle_wake(car.to_signal(ElevatorState::Idle));
        }
    }

    /// Try every awaiting request against the cars, oldest first
    pub(super) fn assign_awaiting(&mut self, processing: Option<CarId>) {
        for request in self.sheet.take_awaiting() {
            match select_car(&request, &self.sheet.active, &self.sheet.cars, &self.timing) {
                Some(car_id) => {
                    info!(request_id = request.id, %car_id, "Awaiting request assigned");
                    self.assign_and_notify(request, car_id, processing);
                }
                None => self.sheet.awaiting.push(request),
            }
        }
    }

    /// Queue a lamp command and mirror it on the sheet
    pub(super) fn floor_signal(&mut self, kind: FloorSignalKind, floor: Floor, direction: Direction) {
        match kind {
            FloorSignalKind::BtnLampOn => self.sheet.set_call_lamp(floor, direction, true),
            FloorSignalKind::BtnLampOff => self.sheet.set_call_lamp(floor, direction, false),
            FloorSignalKind::DirLampOn => self.sheet.set_direction_lamp(floor, direction, true),
            FloorSignalKind::DirLampOff => self.sheet.set_direction_lamp(floor, direction, false),
            FloorSignalKind::SigOffline | FloorSignalKind::SigOnline => {}
        }
        self.floor_outbox.push(FloorSignal::new(kind, floor, direction));
    }

    fn drain_outbox(&mut self) -> Vec<Outbound> {
        self.floor_outbox
            .drain(..)
            .map(Outbound::Floor)
            .chain(self.car_outbox.drain(..).map(Outbound::Car))
            .collect()
    }
}

/// Perform one unit of work from `state`
pub fn transition(state: SchedulerState, ctx: &mut SchedulerContext, now: Instant) -> Step {
    match state {
        SchedulerState::Listening => ctx.listen(now),
        SchedulerState::ProcessMessage => ctx.process_message(),
        SchedulerState::PrepareFloorMessage(request) => {
            ctx.prepare_floor_request(request);
            Step::to(SchedulerState::SendMessage)
        }
        SchedulerState::PrepareElevatorStateMessage(signal) => {
            ctx.prepare_elevator_signal(signal);
            Step::to(SchedulerState::SendMessage)
        }
        SchedulerState::SendMessage => Step {
            next: SchedulerState::UpdateView,
            outbound: ctx.drain_outbox(),
        },
        SchedulerState::UpdateView => Step {
            next: SchedulerState::Listening,
            outbound: vec![Outbound::View(Box::new(project(&ctx.sheet, &ctx.timing)))],
        },
    }
}
