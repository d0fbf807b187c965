//! Snapshot observer

use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

use crate::dispatch::{DispatchConsumer, topics};
use crate::scheduler::ViewSnapshot;

/// Keeps the latest coordinator snapshot and logs a line whenever it changes
#[derive(Debug, Default)]
pub struct Monitor {
    latest: Mutex<Option<ViewSnapshot>>,
    updates: Mutex<usize>,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<ViewSnapshot> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn updates(&self) -> usize {
        *self.updates.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DispatchConsumer for Monitor {
    fn receive_dispatch(&self, topic: &str, data: &str) {
        if topic != topics::SCHEDULER_UPDATE {
            warn!(%topic, "Unexpected topic for monitor");
            return;
        }
        let snapshot = match serde_json::from_str::<ViewSnapshot>(data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Malformed snapshot dropped");
                return;
            }
        };

        *self.updates.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let line = snapshot.summary();
        if latest.as_ref().map(ViewSnapshot::summary).as_deref() != Some(line.as_str()) {
            info!(view = %line, "Scheduler view");
        }
        *latest = Some(snapshot);
    }
}
