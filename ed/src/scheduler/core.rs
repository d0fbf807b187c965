//! Scheduler runner: drives the state machine and talks to the dispatcher

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::{DispatchConsumer, DispatchError, DispatcherHandle, Endpoint, topics};
use crate::domain::{CarId, ElevatorSignal, FloorRequest};

use super::inbox::Inbox;
use super::sheet::MasterSheet;
use super::state::{Outbound, SchedulerContext, SchedulerState, transition};

/// Topics the coordinator listens on
pub const INBOUND_TOPICS: [&str; 4] = [
    topics::FLOOR_REQUEST,
    topics::ELEVATOR_SIGNAL,
    topics::SCENARIO_STARTED,
    topics::SCENARIO_COMPLETE,
];

/// Totals reported when the coordinator loop exits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSummary {
    pub requests_received: u64,
    /// Requests archived as complete, stranded ones included
    pub completed: usize,
    /// Passengers that reached their target floor
    pub delivered: usize,
    /// Passengers archived inside a car that died
    pub stranded: u64,
    pub awaiting: usize,
    pub dead_cars: Vec<CarId>,
}

impl SchedulerSummary {
    pub fn from_sheet(sheet: &MasterSheet) -> Self {
        let completed = sheet.complete.len();
        Self {
            requests_received: sheet.requests_received(),
            completed,
            delivered: completed.saturating_sub(sheet.stranded() as usize),
            stranded: sheet.stranded(),
            awaiting: sheet.awaiting.len(),
            dead_cars: sheet.cars.values().filter(|c| c.is_dead()).map(|c| c.id).collect(),
        }
    }
}

impl DispatchConsumer for Inbox {
    fn receive_dispatch(&self, topic: &str, data: &str) {
        match topic {
            topics::FLOOR_REQUEST => match serde_json::from_str::<FloorRequest>(data) {
                Ok(request) => self.push_floor_request(request),
                Err(e) => warn!(%topic, error = %e, "Malformed floor request dropped"),
            },
            topics::ELEVATOR_SIGNAL => match serde_json::from_str::<ElevatorSignal>(data) {
                Ok(signal) => self.push_elevator_signal(signal),
                Err(e) => warn!(%topic, error = %e, "Malformed elevator signal dropped"),
            },
            topics::SCENARIO_STARTED => self.mark_scenario_started(),
            topics::SCENARIO_COMPLETE => {
                info!("Floors finished sending requests");
                self.mark_producer_finished();
            }
            other => warn!(topic = %other, "Unexpected topic for scheduler"),
        }
    }
}

/// The coordinator
///
/// Runs one transition at a time. Sleeps on the inbox while there is nothing to do.
pub struct Scheduler {
    ctx: SchedulerContext,
    handle: DispatcherHandle,
}

impl Scheduler {
    pub fn new(config: &Config, handle: DispatcherHandle) -> Self {
        debug!(peer = %handle.peer(), "Scheduler::new: called");
        Self {
            ctx: SchedulerContext::new(config, Arc::new(Inbox::new())),
            handle,
        }
    }

    /// Shared inbox; closing it stops the loop
    pub fn inbox(&self) -> Arc<Inbox> {
        self.ctx.inbox().clone()
    }

    /// Subscribe to every inbound topic
    pub async fn subscribe(&self) -> Result<(), DispatchError> {
        for topic in INBOUND_TOPICS {
            self.handle.subscribe(topic).await?;
        }
        Ok(())
    }

    /// Run until every request is complete or the inbox is closed
    pub async fn run(mut self, endpoint: Endpoint) -> SchedulerSummary {
        info!("Scheduler started");
        let delivery = endpoint.spawn(self.inbox());
        let mut state = SchedulerState::Listening;

        loop {
            if self.ctx.inbox().is_closed() {
                warn!("Scheduler inbox closed, stopping");
                break;
            }

            let was_listening = state == SchedulerState::Listening;
            let step = transition(state, &mut self.ctx, Instant::now());
            self.perform(step.outbound).await;

            if self.ctx.is_shutdown() {
                break;
            }

            state = step.next;
            if was_listening && state == SchedulerState::Listening {
                self.wait().await;
            }
        }

        delivery.abort();
        let summary = SchedulerSummary::from_sheet(&self.ctx.sheet);
        info!(
            received = summary.requests_received,
            delivered = summary.delivered,
            stranded = summary.stranded,
            awaiting = summary.awaiting,
            "Scheduler stopped"
        );
        summary
    }

    async fn wait(&self) {
        let inbox = self.ctx.inbox();
        match self.ctx.handshake_deadline() {
            Some(deadline) => {
                let _ = tokio::time::timeout_at(deadline, inbox.notified()).await;
            }
            None => inbox.notified().await,
        }
    }

    async fn perform(&self, outbound: Vec<Outbound>) {
        for message in outbound {
            let result = match &message {
                Outbound::Floor(signal) => {
                    self.handle
                        .send(topics::FLOORS, &topics::floor_signal(signal.floor), signal)
                        .await
                }
                Outbound::Car(signal) => {
                    self.handle
                        .send(topics::ELEVATORS, &topics::elevator_signal(signal.car_id), signal)
                        .await
                }
                Outbound::Control { destination, topic } => self.handle.send_signal(destination, topic).await,
                Outbound::View(snapshot) => self.handle.publish(topics::SCHEDULER_UPDATE, &**snapshot).await,
            };

            match result {
                Ok(()) => {}
                Err(e) if e.is_unregistered() => warn!(error = %e, "Send skipped"),
                Err(e) => error!(error = %e, "Send failed"),
            }
        }
    }
}
