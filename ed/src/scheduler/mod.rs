//! Coordinator: Master Sheet, assignment algorithm, inbound queues and the state machine
//!
//! Delivery tasks only touch the [`Inbox`]. Everything else is owned by the loop in
//! [`Scheduler::run`], which performs one [`transition`] at a time.

pub mod algorithm;
mod car_signal;
mod config;
mod core;
mod inbox;
mod sheet;
mod state;
mod view;

pub use config::SchedulerConfig;
pub use core::{INBOUND_TOPICS, Scheduler, SchedulerSummary};
pub use inbox::Inbox;
pub use sheet::{LampMap, MasterSheet};
pub use state::{Outbound, SchedulerContext, SchedulerState, Step, transition};
pub use view::{ViewSnapshot, project};
