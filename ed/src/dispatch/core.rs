//! Main Dispatcher task implementation

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::DispatcherConfig;
use super::error::DispatchError;
use super::handle::{DispatcherHandle, Endpoint};
use super::messages::{DispatchMessage, DispatchRequest, DispatcherMetrics};

/// In-process transport between the coordinator and its peers
///
/// Owns the peer registry and the topic subscriptions. Every peer talks to it through a
/// [`DispatcherHandle`] and receives through its own bounded channel.
pub struct Dispatcher {
    config: DispatcherConfig,
    tx: mpsc::Sender<DispatchRequest>,
    rx: mpsc::Receiver<DispatchRequest>,
}

impl Dispatcher {
    /// Create a new Dispatcher with the given configuration
    pub fn new(config: DispatcherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.request_buffer);
        Self { config, tx, rx }
    }

    /// Register a peer and return its handle plus the endpoint it receives on
    pub async fn register(&self, peer: &str) -> Result<(DispatcherHandle, Endpoint), DispatchError> {
        register_peer(&self.tx, self.config.channel_buffer, peer).await
    }

    /// Request shutdown of the Dispatcher
    pub async fn shutdown(&self) -> Result<(), DispatchError> {
        self.tx
            .send(DispatchRequest::Shutdown)
            .await
            .map_err(|_| DispatchError::ChannelClosed)
    }

    /// Run the Dispatcher task
    ///
    /// This consumes the Dispatcher and runs until shutdown is requested.
    pub async fn run(mut self) {
        let mut registry: HashMap<String, mpsc::Sender<DispatchMessage>> = HashMap::new();
        let mut subscriptions: HashMap<String, HashSet<String>> = HashMap::new();
        let mut metrics = DispatcherMetrics::default();

        info!("Dispatcher started");

        while let Some(req) = self.rx.recv().await {
            metrics.requests_received += 1;

            match req {
                DispatchRequest::Register { peer, tx } => {
                    debug!(peer = %peer, "Registering peer");
                    registry.insert(peer, tx);
                    metrics.registered_peers = registry.len();
                }

                DispatchRequest::Unregister { peer } => {
                    debug!(peer = %peer, "Unregistering peer");
                    registry.remove(&peer);

                    for subscribers in subscriptions.values_mut() {
                        subscribers.remove(&peer);
                    }

                    metrics.registered_peers = registry.len();
                    metrics.total_subscriptions = subscriptions.values().map(|s| s.len()).sum();
                }

                DispatchRequest::Subscribe { peer, topic } => {
                    debug!(peer = %peer, topic = %topic, "Subscribing");
                    subscriptions.entry(topic).or_default().insert(peer);
                    metrics.total_subscriptions = subscriptions.values().map(|s| s.len()).sum();
                }

                DispatchRequest::Unsubscribe { peer, topic } => {
                    debug!(peer = %peer, topic = %topic, "Unsubscribing");
                    if let Some(subscribers) = subscriptions.get_mut(&topic) {
                        subscribers.remove(&peer);
                    }
                    metrics.total_subscriptions = subscriptions.values().map(|s| s.len()).sum();
                }

                DispatchRequest::Send {
                    from,
                    destination,
                    topic,
                    data,
                    reply_tx,
                } => {
                    let Some(tx) = registry.get(&destination) else {
                        warn!(from = %from, destination = %destination, topic = %topic, "Send to unregistered peer");
                        metrics.messages_dropped += 1;
                        let _ = reply_tx.send(Err(DispatchError::UnregisteredDestination {
                            destination: destination.clone(),
                        }));
                        continue;
                    };

                    let subscribed = subscriptions
                        .get(&topic)
                        .is_some_and(|subscribers| subscribers.contains(&destination));

                    if !subscribed {
                        debug!(destination = %destination, topic = %topic, "Destination not subscribed, dropping");
                        metrics.messages_dropped += 1;
                        let _ = reply_tx.send(Ok(()));
                        continue;
                    }

                    debug!(from = %from, destination = %destination, topic = %topic, "Routing message");
                    let msg = DispatchMessage { from, topic, data };
                    if tx.send(msg).await.is_ok() {
                        metrics.messages_delivered += 1;
                        let _ = reply_tx.send(Ok(()));
                    } else {
                        metrics.messages_dropped += 1;
                        let _ = reply_tx.send(Err(DispatchError::ChannelClosed));
                    }
                }

                DispatchRequest::Publish { from, topic, data } => {
                    debug!(from = %from, topic = %topic, "Publishing");

                    if let Some(subscribers) = subscriptions.get(&topic) {
                        let msg = DispatchMessage {
                            from: from.clone(),
                            topic: topic.clone(),
                            data,
                        };

                        for peer in subscribers {
                            if let Some(tx) = registry.get(peer)
                                && tx.send(msg.clone()).await.is_ok()
                            {
                                metrics.messages_delivered += 1;
                            }
                        }
                    }
                }

                DispatchRequest::GetMetrics { reply_tx } => {
                    let _ = reply_tx.send(metrics.clone());
                }

                DispatchRequest::Shutdown => {
                    info!("Dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Dispatcher stopped");
    }
}

/// Register `peer` through a raw request sender
async fn register_peer(
    tx: &mpsc::Sender<DispatchRequest>,
    channel_buffer: usize,
    peer: &str,
) -> Result<(DispatcherHandle, Endpoint), DispatchError> {
    let (msg_tx, msg_rx) = mpsc::channel(channel_buffer);

    tx.send(DispatchRequest::Register {
        peer: peer.to_string(),
        tx: msg_tx,
    })
    .await
    .map_err(|_| DispatchError::ChannelClosed)?;

    Ok((
        DispatcherHandle::new(tx.clone(), peer.to_string()),
        Endpoint::new(peer.to_string(), msg_rx),
    ))
}
