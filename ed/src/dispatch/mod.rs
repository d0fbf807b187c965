//! Dispatcher: in-process transport between the coordinator and its peers
//!
//! Two primitives:
//! - **Send:** point-to-point to a named peer, fails if the peer is unknown
//! - **Publish:** broadcast to every subscriber of a topic

mod config;
mod core;
mod error;
mod handle;
mod messages;
pub mod topics;

pub use config::DispatcherConfig;
pub use core::Dispatcher;
pub use error::DispatchError;
pub use handle::{DispatchConsumer, DispatcherHandle, Endpoint};
pub use messages::{DispatchMessage, DispatchRequest, DispatcherMetrics};
