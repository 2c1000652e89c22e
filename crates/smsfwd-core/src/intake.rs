//! Intake path: decides, per inbound message, whether anything happens at all.
//!
//! The sequence is fixed: read settings, gate on the enabled flag, poke the
//! live sink, enqueue. Only the enabled flag gates; incomplete email settings
//! are a delivery-time concern because the user may finish configuring before
//! the attempt runs.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::{DeliveryJob, InboundMessage};
use crate::ports::{ConfigStore, JobQueue, NotifySink};

pub struct IntakeDispatcher {
    store: Arc<dyn ConfigStore>,
    sink: Arc<dyn NotifySink>,
    queue: Arc<dyn JobQueue>,
}

impl IntakeDispatcher {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        sink: Arc<dyn NotifySink>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self { store, sink, queue }
    }

    /// Handles one inbound message. Never returns an error: every failure
    /// mode is a logging decision, not something the event source can act on.
    pub async fn handle(&self, message: InboundMessage) {
        let config = match self.store.load().await {
            Ok(config) => config,
            Err(e) => {
                warn!("dropping message, settings unreadable: {e}");
                return;
            }
        };
        if !config.enabled {
            debug!("forwarding disabled, ignoring message");
            return;
        }

        // Best effort only; an absent consumer must not affect enqueueing.
        if let Err(e) = self.sink.notify(&message).await {
            debug!("live notify skipped: {e}");
        }

        let job = DeliveryJob::from(message);
        match self.queue.enqueue(job).await {
            Ok(id) => info!(job_id = %id, "queued delivery job"),
            Err(e) => error!("failed to enqueue delivery job, message lost: {e}"),
        }
    }
}
