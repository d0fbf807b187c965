//! In-process simulation: dispatcher, coordinator, cars, floors and monitor wired together

mod car;
mod floor;
mod monitor;

pub use car::{CarInput, CarReport, CarRouter, CarSim};
pub use floor::{FloorEvent, FloorPanel, FloorProducer, FloorReport, FloorStation};
pub use monitor::Monitor;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::{DispatchError, Dispatcher, DispatcherMetrics, topics};
use crate::domain::{Direction, Floor};
use crate::scenario::ScenarioEntry;
use crate::scheduler::{Scheduler, SchedulerSummary, ViewSnapshot};

/// Everything a finished simulation has to say
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub summary: SchedulerSummary,
    pub floors: FloorReport,
    pub cars: Vec<CarReport>,
    pub last_view: Option<ViewSnapshot>,
    pub lit_calls: Vec<(Floor, Direction)>,
    pub metrics: Option<DispatcherMetrics>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SimulationReport {
    /// Wall-clock length of the run
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Run a full scenario against simulated peers and wait for the coordinator to finish
pub async fn run_simulation(config: &Config, entries: Vec<ScenarioEntry>) -> Result<SimulationReport, DispatchError> {
    let started_at = Utc::now();
    info!(
        floors = config.building.floors,
        elevators = config.building.elevators,
        requests = entries.len(),
        speed_factor = config.timing.speed_factor,
        "Starting simulation"
    );

    let dispatcher = Dispatcher::new(config.dispatcher.clone());
    let (scheduler_handle, scheduler_endpoint) = dispatcher.register(topics::SCHEDULER).await?;
    let (floors_handle, floors_endpoint) = dispatcher.register(topics::FLOORS).await?;
    let (elevators_handle, elevators_endpoint) = dispatcher.register(topics::ELEVATORS).await?;
    let (monitor_handle, monitor_endpoint) = dispatcher.register(topics::MONITOR).await?;
    let dispatcher_task = tokio::spawn(dispatcher.run());

    let scheduler = Scheduler::new(config, scheduler_handle);
    scheduler.subscribe().await?;

    floors_handle.subscribe(topics::SCENARIO_START).await?;
    floors_handle.subscribe(topics::SCENARIO_END).await?;
    for floor in 1..=config.building.floors {
        floors_handle.subscribe(&topics::floor_signal(floor)).await?;
    }

    elevators_handle.subscribe(topics::SCENARIO_END).await?;
    for car_id in 1..=config.building.elevators {
        elevators_handle.subscribe(&topics::elevator_signal(car_id)).await?;
    }

    monitor_handle.subscribe(topics::SCHEDULER_UPDATE).await?;

    let monitor = Arc::new(Monitor::new());
    let monitor_delivery = monitor_endpoint.spawn(monitor.clone());

    let panel = Arc::new(FloorPanel::default());
    let (floor_tx, floor_rx) = mpsc::unbounded_channel();
    let floors_delivery = floors_endpoint.spawn(Arc::new(FloorStation::new(panel.clone(), floor_tx)));
    let producer = FloorProducer::new(entries, config.timing.clone(), floors_handle).spawn(floor_rx);

    let mut routes = HashMap::new();
    let mut car_tasks = Vec::new();
    for car_id in 1..=config.building.elevators {
        let (tx, rx) = mpsc::unbounded_channel();
        routes.insert(car_id, tx);
        let car = CarSim::new(car_id, config.building.floors, config.timing.clone(), elevators_handle.clone());
        car_tasks.push(car.spawn(rx));
    }
    let elevators_delivery = elevators_endpoint.spawn(Arc::new(CarRouter::new(routes)));

    let summary = scheduler.run(scheduler_endpoint).await;

    let floors = producer.await.unwrap_or_else(|e| {
        warn!(error = %e, "Floor producer task failed");
        FloorReport::default()
    });
    let mut cars = Vec::new();
    for task in car_tasks {
        match task.await {
            Ok(report) => cars.push(report),
            Err(e) => warn!(error = %e, "Car task failed"),
        }
    }

    let metrics = monitor_handle.metrics().await.ok();
    if let Err(e) = monitor_handle.shutdown().await {
        warn!(error = %e, "Dispatcher shutdown failed");
    }
    let _ = dispatcher_task.await;
    for delivery in [monitor_delivery, floors_delivery, elevators_delivery] {
        delivery.abort();
    }

    info!(
        delivered = summary.delivered,
        stranded = summary.stranded,
        dead_cars = summary.dead_cars.len(),
        "Simulation finished"
    );
    Ok(SimulationReport {
        summary,
        floors,
        cars,
        last_view: monitor.latest(),
        lit_calls: panel.lit_calls(),
        metrics,
        started_at,
        finished_at: Utc::now(),
    })
}
