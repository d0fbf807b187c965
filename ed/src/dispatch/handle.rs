//! DispatcherHandle - client interface for peers

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::error::DispatchError;
use super::messages::{DispatchMessage, DispatchRequest, DispatcherMetrics};

/// Receiver side of a peer's deliveries
///
/// Implementations run on the peer's delivery task and must return promptly:
/// decode, enqueue, wake, nothing more.
pub trait DispatchConsumer: Send + Sync {
    fn receive_dispatch(&self, topic: &str, data: &str);
}

/// Handle for peers to talk to the Dispatcher
///
/// Cloneable and cheap. Every operation is a message to the dispatcher task.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<DispatchRequest>,
    peer: String,
}

impl DispatcherHandle {
    pub(crate) fn new(tx: mpsc::Sender<DispatchRequest>, peer: String) -> Self {
        debug!(%peer, "DispatcherHandle::new: called");
        Self { tx, peer }
    }

    /// Name this handle sends as
    pub fn peer(&self) -> &str {
        &self.peer
    }

    async fn request(&self, req: DispatchRequest) -> Result<(), DispatchError> {
        self.tx.send(req).await.map_err(|_| DispatchError::ChannelClosed)
    }

    /// Send a payload to a named peer on a topic
    ///
    /// Fails with [`DispatchError::UnregisteredDestination`] if the peer never registered.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        topic: &str,
        payload: &T,
    ) -> Result<(), DispatchError> {
        debug!(peer = %self.peer, %destination, %topic, "DispatcherHandle::send: called");
        let data = serde_json::to_string(payload)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        self.request(DispatchRequest::Send {
            from: self.peer.clone(),
            destination: destination.to_string(),
            topic: topic.to_string(),
            data,
            reply_tx,
        })
        .await?;

        reply_rx.await.map_err(|_| DispatchError::ChannelClosed)?
    }

    /// Send a control signal with an empty payload
    pub async fn send_signal(&self, destination: &str, topic: &str) -> Result<(), DispatchError> {
        self.send(destination, topic, &()).await
    }

    /// Broadcast a payload to every subscriber of `topic`
    pub async fn publish<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) -> Result<(), DispatchError> {
        debug!(peer = %self.peer, %topic, "DispatcherHandle::publish: called");
        let data = serde_json::to_string(payload)?;
        self.request(DispatchRequest::Publish {
            from: self.peer.clone(),
            topic: topic.to_string(),
            data,
        })
        .await
    }

    /// Broadcast a control signal with an empty payload
    pub async fn publish_signal(&self, topic: &str) -> Result<(), DispatchError> {
        self.publish(topic, &()).await
    }

    pub async fn subscribe(&self, topic: &str) -> Result<(), DispatchError> {
        debug!(peer = %self.peer, %topic, "DispatcherHandle::subscribe: called");
        self.request(DispatchRequest::Subscribe {
            peer: self.peer.clone(),
            topic: topic.to_string(),
        })
        .await
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<(), DispatchError> {
        debug!(peer = %self.peer, %topic, "DispatcherHandle::unsubscribe: called");
        self.request(DispatchRequest::Unsubscribe {
            peer: self.peer.clone(),
            topic: topic.to_string(),
        })
        .await
    }

    /// Remove this peer from the registry and all subscriptions
    pub async fn unregister(&self) -> Result<(), DispatchError> {
        debug!(peer = %self.peer, "DispatcherHandle::unregister: called");
        self.request(DispatchRequest::Unregister { peer: self.peer.clone() })
            .await
    }

    /// Stop the dispatcher task
    pub async fn shutdown(&self) -> Result<(), DispatchError> {
        debug!(peer = %self.peer, "DispatcherHandle::shutdown: called");
        self.request(DispatchRequest::Shutdown).await
    }

    /// Get current dispatcher metrics
    pub async fn metrics(&self) -> Result<DispatcherMetrics, DispatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(DispatchRequest::GetMetrics { reply_tx }).await?;
        reply_rx.await.map_err(|_| DispatchError::ChannelClosed)
    }
}

/// The receiving end of a registered peer
pub struct Endpoint {
    peer: String,
    rx: mpsc::Receiver<DispatchMessage>,
}

impl Endpoint {
    pub(crate) fn new(peer: String, rx: mpsc::Receiver<DispatchMessage>) -> Self {
        Self { peer, rx }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Receive the next delivery, `None` once the dispatcher is gone
    pub async fn recv(&mut self) -> Option<DispatchMessage> {
        self.rx.recv().await
    }

    /// Receive a delivery without waiting
    pub fn try_recv(&mut self) -> Option<DispatchMessage> {
        self.rx.try_recv().ok()
    }

    /// Spawn the delivery task feeding `consumer`
    ///
    /// Messages are handed over one at a time in arrival order. The task ends when the
    /// dispatcher drops this peer's channel.
    pub fn spawn(mut self, consumer: Arc<dyn DispatchConsumer>) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(peer = %self.peer, "Endpoint delivery task started");
            while let Some(msg) = self.rx.recv().await {
                consumer.receive_dispatch(&msg.topic, &msg.data);
            }
            debug!(peer = %self.peer, "Endpoint delivery task stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<(String, String)>>);

    impl DispatchConsumer for Recorder {
        fn receive_dispatch(&self, topic: &str, data: &str) {
            self.0.lock().unwrap().push((topic.to_string(), data.to_string()));
        }
    }

    #[tokio::test]
    async fn test_handle_peer_name() {
        let (tx, _rx) = mpsc::channel(10);
        let handle = DispatcherHandle::new(tx, "elevators".to_string());
        assert_eq!(handle.peer(), "elevators");
    }

    #[tokio::test]
    async fn test_send_fails_when_dispatcher_gone() {
        let (tx, rx) = mpsc::channel(10);
        drop(rx);
        let handle = DispatcherHandle::new(tx, "scheduler".to_string());

        let err = handle.send_signal("floors", "SCENARIO_START").await.unwrap_err();
        assert!(matches!(err, DispatchError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_endpoint_spawn_preserves_order() {
        let (msg_tx, msg_rx) = mpsc::channel(10);
        let endpoint = Endpoint::new("scheduler".to_string(), msg_rx);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let task = endpoint.spawn(recorder.clone());

        for i in 0..3 {
            msg_tx
                .send(DispatchMessage {
                    from: "floors".to_string(),
                    topic: "FLOOR_REQUEST".to_string(),
                    data: i.to_string(),
                })
                .await
                .unwrap();
        }
        drop(msg_tx);
        task.await.unwrap();

        let seen = recorder.0.lock().unwrap();
        let data: Vec<_> = seen.iter().map(|(_, d)| d.as_str()).collect();
        assert_eq!(data, vec!["0", "1", "2"]);
    }
}
