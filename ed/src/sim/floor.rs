//! Simulated floor stations: replay the scenario and track the lamps

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TimingConfig;
use crate::dispatch::{DispatchConsumer, DispatcherHandle, topics};
use crate::domain::{Direction, Floor, FloorSignal, FloorSignalKind};
use crate::scenario::ScenarioEntry;
use crate::scheduler::LampMap;

/// Control events forwarded from the delivery task to the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorEvent {
    Start,
    End,
}

/// Lamp state of every floor, as last commanded
#[derive(Debug, Default)]
pub struct FloorPanel {
    lamps: Mutex<Lamps>,
}

#[derive(Debug, Default)]
struct Lamps {
    call: LampMap,
    direction: LampMap,
    online: bool,
}

impl FloorPanel {
    pub fn apply(&self, signal: &FloorSignal) {
        let mut lamps = self.lamps.lock().unwrap_or_else(PoisonError::into_inner);
        let set = |map: &mut LampMap, on: bool| {
            map.entry(signal.floor).or_default().insert(signal.direction, on);
        };
        match signal.kind {
            FloorSignalKind::BtnLampOn => set(&mut lamps.call, true),
            FloorSignalKind::BtnLampOff => set(&mut lamps.call, false),
            FloorSignalKind::DirLampOn => set(&mut lamps.direction, true),
            FloorSignalKind::DirLampOff => set(&mut lamps.direction, false),
            FloorSignalKind::SigOnline => lamps.online = true,
            FloorSignalKind::SigOffline => lamps.online = false,
        }
    }

    pub fn call_lamp(&self, floor: Floor, direction: Direction) -> bool {
        let lamps = self.lamps.lock().unwrap_or_else(PoisonError::into_inner);
        lit(&lamps.call, floor, direction)
    }

    pub fn direction_lamp(&self, floor: Floor, direction: Direction) -> bool {
        let lamps = self.lamps.lock().unwrap_or_else(PoisonError::into_inner);
        lit(&lamps.direction, floor, direction)
    }

    /// Floors whose call button is still lit
    pub fn lit_calls(&self) -> Vec<(Floor, Direction)> {
        let lamps = self.lamps.lock().unwrap_or_else(PoisonError::into_inner);
        lamps
            .call
            .iter()
            .flat_map(|(floor, dirs)| dirs.iter().filter(|(_, on)| **on).map(move |(dir, _)| (*floor, *dir)))
            .collect()
    }
}

fn lit(map: &LampMap, floor: Floor, direction: Direction) -> bool {
    map.get(&floor).and_then(|d| d.get(&direction)).copied().unwrap_or(false)
}

/// Delivery-side consumer for the `floors` peer
pub struct FloorStation {
    panel: Arc<FloorPanel>,
    events: mpsc::UnboundedSender<FloorEvent>,
}

impl FloorStation {
    pub fn new(panel: Arc<FloorPanel>, events: mpsc::UnboundedSender<FloorEvent>) -> Self {
        Self { panel, events }
    }
}

impl DispatchConsumer for FloorStation {
    fn receive_dispatch(&self, topic: &str, data: &str) {
        match topic {
            topics::SCENARIO_START => {
                let _ = self.events.send(FloorEvent::Start);
            }
            topics::SCENARIO_END => {
                let _ = self.events.send(FloorEvent::End);
            }
            _ if topics::parse_floor_signal(topic).is_some() => match serde_json::from_str::<FloorSignal>(data) {
                Ok(signal) => {
                    debug!(floor = signal.floor, kind = ?signal.kind, direction = %signal.direction, "Floor lamp");
                    self.panel.apply(&signal);
                }
                Err(e) => warn!(%topic, error = %e, "Malformed floor signal dropped"),
            },
            other => warn!(topic = %other, "Unexpected topic for floors"),
        }
    }
}

/// Totals reported when the producer ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FloorReport {
    pub sent: usize,
    pub start_acks: usize,
    pub ended: bool,
}

/// Replays scenario entries at their offsets once the coordinator asks for the start
pub struct FloorProducer {
    entries: Vec<ScenarioEntry>,
    timing: TimingConfig,
    handle: DispatcherHandle,
}

impl FloorProducer {
    pub fn new(entries: Vec<ScenarioEntry>, timing: TimingConfig, handle: DispatcherHandle) -> Self {
        Self { entries, timing, handle }
    }

    pub fn spawn(self, events: mpsc::UnboundedReceiver<FloorEvent>) -> JoinHandle<FloorReport> {
        tokio::spawn(self.run(events))
    }

    async fn run(self, mut events: mpsc::UnboundedReceiver<FloorEvent>) -> FloorReport {
        let mut report = FloorReport::default();
        let mut started_at: Option<Instant> = None;
        let mut pending = self.entries.iter().peekable();
        let mut completed = false;

        loop {
            let due = started_at.and_then(|start| pending.peek().map(|e| start + self.offset(e)));

            tokio::select! {
                event = events.recv() => match event {
                    Some(FloorEvent::Start) => {
                        report.start_acks += 1;
                        self.control(topics::SCENARIO_STARTED).await;
                        if started_at.is_none() {
                            info!(requests = self.entries.len(), "Scenario started");
                            started_at = Some(Instant::now());
                        }
                    }
                    Some(FloorEvent::End) => {
                        report.ended = true;
                        break;
                    }
                    None => break,
                },
                _ = sleep_until(due) => {
                    if let Some(entry) = pending.next() {
                        self.send(entry).await;
                        report.sent += 1;
                    }
                }
            }

            if started_at.is_some() && pending.peek().is_none() && !completed {
                info!(sent = report.sent, "Every scenario request sent");
                self.control(topics::SCENARIO_COMPLETE).await;
                completed = true;
            }
        }

        info!(sent = report.sent, "Floors stopped");
        report
    }

    fn offset(&self, entry: &ScenarioEntry) -> std::time::Duration {
        std::time::Duration::from_millis(entry.offset_ms / self.timing.speed_factor.max(1))
    }

    async fn send(&self, entry: &ScenarioEntry) {
        let request = &entry.request;
        info!(
            offset_ms = entry.offset_ms,
            origin = request.origin_floor,
            target = request.target_floor,
            direction = %request.direction,
            "Passenger arrived"
        );
        if let Err(e) = self.handle.publish(topics::FLOOR_REQUEST, request).await {
            warn!(error = %e, "Floor request failed");
        }
    }

    async fn control(&self, topic: &str) {
        if let Err(e) = self.handle.publish_signal(topic).await {
            warn!(%topic, error = %e, "Control signal failed");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
