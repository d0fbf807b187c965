//! Simulated elevator cars
//!
//! One task per car. A car executes each command it is given and reports exactly one
//! finished state back to the coordinator.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TimingConfig;
use crate::dispatch::{DispatchConsumer, DispatcherHandle, topics};
use crate::domain::{CarId, Direction, ElevatorSignal, ElevatorState, Floor};

/// Input for one car task
#[derive(Debug, Clone)]
pub enum CarInput {
    Command(ElevatorSignal),
    End,
}

/// Routes `ELEVATOR_SIGNAL_<id>` deliveries to the matching car task
pub struct CarRouter {
    cars: HashMap<CarId, mpsc::UnboundedSender<CarInput>>,
}

impl CarRouter {
    pub fn new(cars: HashMap<CarId, mpsc::UnboundedSender<CarInput>>) -> Self {
        Self { cars }
    }
}

impl DispatchConsumer for CarRouter {
    fn receive_dispatch(&self, topic: &str, data: &str) {
        if topic == topics::SCENARIO_END {
            for tx in self.cars.values() {
                let _ = tx.send(CarInput::End);
            }
            return;
        }

        let Some(car_id) = topics::parse_elevator_signal(topic) else {
            warn!(%topic, "Unexpected topic for elevators");
            return;
        };
        let Some(tx) = self.cars.get(&car_id) else {
            warn!(%car_id, "Command for unknown car dropped");
            return;
        };
        match serde_json::from_str::<ElevatorSignal>(data) {
            Ok(signal) => {
                let _ = tx.send(CarInput::Command(signal));
            }
            Err(e) => warn!(%car_id, error = %e, "Malformed car command dropped"),
        }
    }
}

/// What a car looked like when its task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarReport {
    pub car_id: CarId,
    pub floor: Floor,
    pub dead: bool,
    pub commands: usize,
}

/// Simulated car
pub struct CarSim {
    car_id: CarId,
    floor: Floor,
    floors: Floor,
    moving: Option<Direction>,
    lit: BTreeSet<Floor>,
    dead: bool,
    /// Command interrupted by a fault, replayed after a reboot
    interrupted: Option<ElevatorSignal>,
    commands: usize,
    timing: TimingConfig,
    handle: DispatcherHandle,
}

impl CarSim {
    pub fn new(car_id: CarId, floors: Floor, timing: TimingConfig, handle: DispatcherHandle) -> Self {
        Self {
            car_id,
            floor: 1,
            floors,
            moving: None,
            lit: BTreeSet::new(),
            dead: false,
            interrupted: None,
            commands: 0,
            timing,
            handle,
        }
    }

    /// Spawn the car loop: report START, then answer commands until SCENARIO_END
    pub fn spawn(mut self, mut rx: mpsc::UnboundedReceiver<CarInput>) -> JoinHandle<CarReport> {
        tokio::spawn(async move {
            tokio::time::sleep(self.timing.scaled(self.timing.start)).await;
            self.report(self.signal(ElevatorState::Start)).await;

            while let Some(input) = rx.recv().await {
                match input {
                    CarInput::End => break,
                    CarInput::Command(_) if self.dead => {
                        debug!(car_id = self.car_id, "Dead car ignores command");
                    }
                    CarInput::Command(command) => {
                        self.commands += 1;
                        for report in self.execute(command).await {
                            self.report(report).await;
                        }
                    }
                }
            }

            info!(car_id = self.car_id, floor = self.floor, dead = self.dead, "Car stopped");
            CarReport {
                car_id: self.car_id,
                floor: self.floor,
                dead: self.dead,
                commands: self.commands,
            }
        })
    }

    /// Perform one command and return the reports it produces
    ///
    /// Every command yields one report. A reboot yields two: REBOOT, then the replayed command.
    pub async fn execute(&mut self, command: ElevatorSignal) -> Vec<ElevatorSignal> {
        debug!(car_id = self.car_id, state = %command.state, floor = self.floor, "CarSim::execute: called");

        if let Some(kind) = command.fault {
            self.sleep(self.duration_of(command.state)).await;
            warn!(car_id = self.car_id, fault = %kind, state = %command.state, "Car fault");
            let mut report = self.echo(&command, kind.error_state());
            report.fault = Some(kind);
            self.interrupted = Some(ElevatorSignal { fault: None, ..command });
            return vec![report];
        }

        match command.state {
            ElevatorState::Reboot => {
                self.sleep(self.timing.reboot).await;
                let mut reports = vec![self.echo(&command, ElevatorState::Reboot)];
                if let Some(replay) = self.interrupted.take() {
                    info!(car_id = self.car_id, state = %replay.state, "Car rebooted, resuming");
                    reports.push(self.perform(&replay).await);
                }
                reports
            }
            ElevatorState::Dead => {
                self.sleep(self.timing.dead).await;
                self.dead = true;
                self.moving = None;
                vec![self.echo(&command, ElevatorState::Dead)]
            }
            _ => vec![self.perform(&command).await],
        }
    }

    async fn perform(&mut self, command: &ElevatorSignal) -> ElevatorSignal {
        match command.state {
            ElevatorState::MovingUp => self.travel(command, Direction::Up).await,
            ElevatorState::MovingDown => self.travel(command, Direction::Down).await,
            ElevatorState::Stop => {
                if let Some(direction) = self.moving.take() {
                    self.floor = self.step(direction);
                }
                self.sleep(self.timing.stop).await;
                self.lit.remove(&self.floor);
                self.echo(command, ElevatorState::Stop)
            }
            ElevatorState::OpenDoors => {
                self.sleep(self.timing.doors).await;
                self.echo(command, ElevatorState::OpenDoors)
            }
            ElevatorState::CloseDoors => {
                self.sleep(self.timing.doors).await;
                let pressed: Vec<Floor> = command
                    .new_car_buttons
                    .iter()
                    .copied()
                    .filter(|f| !self.lit.contains(f))
                    .collect();
                self.lit.extend(pressed.iter().copied());
                let mut report = self.echo(command, ElevatorState::CloseDoors);
                report.new_car_buttons = pressed;
                report
            }
            ElevatorState::Idle => {
                self.sleep(self.timing.idle).await;
                self.echo(command, ElevatorState::Idle)
            }
            other => {
                warn!(car_id = self.car_id, state = %other, "Car cannot perform state, echoing");
                self.echo(command, other)
            }
        }
    }

    /// Depart from standstill, or cruise one floor if already moving that way
    async fn travel(&mut self, command: &ElevatorSignal, direction: Direction) -> ElevatorSignal {
        let state = command.state;
        if self.moving == Some(direction) {
            self.sleep(self.timing.moving_max).await;
            self.floor = self.step(direction);
        } else {
            self.sleep(self.timing.moving).await;
            self.moving = Some(direction);
        }
        self.echo(command, state)
    }

    fn step(&self, direction: Direction) -> Floor {
        match direction {
            Direction::Up => (self.floor + 1).min(self.floors),
            Direction::Down => self.floor.saturating_sub(1).max(1),
        }
    }

    fn duration_of(&self, state: ElevatorState) -> u64 {
        match state {
            ElevatorState::MovingUp | ElevatorState::MovingDown => self.timing.moving_max,
            ElevatorState::Stop => self.timing.stop,
            ElevatorState::OpenDoors | ElevatorState::CloseDoors => self.timing.doors,
            _ => 0,
        }
    }

    async fn sleep(&self, units: u64) {
        let duration = self.timing.scaled(units);
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn signal(&self, state: ElevatorState) -> ElevatorSignal {
        ElevatorSignal {
            lit_car_buttons: self.lit.clone(),
            ..ElevatorSignal::new(state, self.car_id, self.floor)
        }
    }

    /// Report `state` at the current floor, carrying the command's pending buttons
    fn echo(&self, command: &ElevatorSignal, state: ElevatorState) -> ElevatorSignal {
        ElevatorSignal {
            new_car_buttons: command.new_car_buttons.clone(),
            ..self.signal(state)
        }
    }

    async fn report(&self, signal: ElevatorSignal) {
        debug!(car_id = self.car_id, state = %signal.state, floor = signal.floor, "Car report");
        if let Err(e) = self.handle.publish(topics::ELEVATOR_SIGNAL, &signal).await {
            warn!(car_id = self.car_id, error = %e, "Car report failed");
        }
    }
}
