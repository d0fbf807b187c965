//! Inbound queues shared between delivery tasks and the coordinator loop

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;

use crate::domain::{CarId, ElevatorSignal, ElevatorState, FloorRequest};

/// FIFO buffers for new floor requests and car reports, plus the inbound control flags
///
/// Producers push and return immediately. Each queue has its own lock and no method holds
/// both. Every mutation wakes the coordinator.
#[derive(Debug, Default)]
pub struct Inbox {
    floor_requests: Mutex<VecDeque<FloorRequest>>,
    elevator_signals: Mutex<VecDeque<ElevatorSignal>>,
    scenario_started: AtomicBool,
    producer_finished: AtomicBool,
    closed: AtomicBool,
    notify: Notify,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_floor_request(&self, request: FloorRequest) {
        debug!(origin = request.origin_floor, target = request.target_floor, "Inbox::push_floor_request: called");
        locked(&self.floor_requests).push_back(request);
        self.notify.notify_one();
    }

    pub fn push_elevator_signal(&self, signal: ElevatorSignal) {
        debug!(car_id = signal.car_id, state = %signal.state, "Inbox::push_elevator_signal: called");
        locked(&self.elevator_signals).push_back(signal);
        self.notify.notify_one();
    }

    /// Queue a coordinator-generated IDLE report unless one for the same car is already queued
    ///
    /// Returns true if the signal was queued.
    pub fn push_idle_wake(&self, signal: ElevatorSignal) -> bool {
        let mut queue = locked(&self.elevator_signals);
        if queue.iter().any(|s| is_idle_for(s, signal.car_id)) {
            return false;
        }
        debug!(car_id = signal.car_id, "Inbox::push_idle_wake: queued");
        queue.push_back(signal);
        drop(queue);
        self.notify.notify_one();
        true
    }

    pub fn pop_floor_request(&self) -> Option<FloorRequest> {
        locked(&self.floor_requests).pop_front()
    }

    pub fn pop_elevator_signal(&self) -> Option<ElevatorSignal> {
        locked(&self.elevator_signals).pop_front()
    }

    pub fn floor_request_count(&self) -> usize {
        locked(&self.floor_requests).len()
    }

    pub fn elevator_signal_count(&self) -> usize {
        locked(&self.elevator_signals).len()
    }

    /// Either queue holds something
    pub fn has_work(&self) -> bool {
        let floors_pending = !locked(&self.floor_requests).is_empty();
        let signals_pending = !locked(&self.elevator_signals).is_empty();
        floors_pending || signals_pending
    }

    /// The floors acknowledged SCENARIO_START
    pub fn mark_scenario_started(&self) {
        self.scenario_started.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn scenario_started(&self) -> bool {
        self.scenario_started.load(Ordering::SeqCst)
    }

    /// The floors have sent every request they will ever send
    pub fn mark_producer_finished(&self) {
        self.producer_finished.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn producer_finished(&self) -> bool {
        self.producer_finished.load(Ordering::SeqCst)
    }

    /// Ask the coordinator loop to stop
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until something is pushed, a flag changes, or the inbox closes
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

fn is_idle_for(signal: &ElevatorSignal, car_id: CarId) -> bool {
    signal.car_id == car_id && signal.state == ElevatorState::Idle
}
