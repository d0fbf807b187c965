//! elevatord - multi-elevator dispatch coordinator
//!
//! A coordinator assigns passenger requests to cars and drives each car through its
//! motion and door states. Floors, cars and observers talk to it through an in-process
//! topic dispatcher.
//!
//! # Modules
//!
//! - [`domain`] - States, signals and requests shared by every peer
//! - [`dispatch`] - Topic-routed transport between peers
//! - [`scheduler`] - Master Sheet, assignment algorithm and coordinator state machine
//! - [`scenario`] - Scenario files and generation
//! - [`sim`] - Simulated cars, floors and monitor
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod scenario;
pub mod scheduler;
pub mod sim;

// Re-export commonly used types
pub use config::{BuildingConfig, Config, ScenarioConfig, TimingConfig};
pub use dispatch::{DispatchConsumer, DispatchError, Dispatcher, DispatcherConfig, DispatcherHandle, Endpoint};
pub use domain::{
    CarId, CarRecord, Direction, ElevatorSignal, ElevatorState, FaultKind, Floor, FloorRequest, FloorSignal,
    FloorSignalKind, Request, RequestFault, RequestId,
};
pub use scenario::{ScenarioEntry, ScenarioError};
pub use scheduler::{
    Inbox, MasterSheet, Scheduler, SchedulerConfig, SchedulerContext, SchedulerState, SchedulerSummary, ViewSnapshot,
    transition,
};
pub use sim::{SimulationReport, run_simulation};
