//! Message types for the Dispatcher

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::error::DispatchError;

/// A message delivered to a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchMessage {
    /// Sending peer
    pub from: String,
    pub topic: String,
    /// JSON encoded payload (`null` for control signals)
    pub data: String,
}

/// Internal requests to the Dispatcher task
#[derive(Debug)]
pub enum DispatchRequest {
    /// Register a peer and its delivery channel
    Register {
        peer: String,
        tx: mpsc::Sender<DispatchMessage>,
    },

    /// Unregister a peer
    Unregister { peer: String },

    /// Subscribe a peer to a topic
    Subscribe { peer: String, topic: String },

    /// Unsubscribe a peer from a topic
    Unsubscribe { peer: String, topic: String },

    /// Point-to-point send to a named peer
    Send {
        from: String,
        destination: String,
        topic: String,
        data: String,
        reply_tx: oneshot::Sender<Result<(), DispatchError>>,
    },

    /// Deliver to every subscriber of a topic
    Publish { from: String, topic: String, data: String },

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<DispatcherMetrics>,
    },

    /// Shutdown the dispatcher
    Shutdown,
}

/// Dispatcher metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherMetrics {
    pub registered_peers: usize,
    pub total_subscriptions: usize,
    pub requests_received: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
}
