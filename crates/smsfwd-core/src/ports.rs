//! Ports implemented by adapter crates and the daemon binary.
//!
//! The pipeline only ever talks to these traits; swapping a real adapter for
//! an in-memory fake is how the tests exercise intake and delivery.

use async_trait::async_trait;

use crate::domain::{DeliveryJob, ForwardingConfig, InboundMessage, JobId, Outcome, OutboundEmail};
use crate::Result;

/// Source of the current forwarding settings.
///
/// `load` is called fresh for every decision; implementations must not cache
/// across calls.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<ForwardingConfig>;
}

/// Best-effort live notification of a foreground consumer.
///
/// Failures here are expected whenever no consumer is attached and must never
/// influence whether a message gets enqueued.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn notify(&self, message: &InboundMessage) -> Result<()>;
}

/// Durable job queue. `enqueue` returns once the job is persisted.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: DeliveryJob) -> Result<JobId>;
}

/// Raw transport reply, classified by the delivery worker.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Outbound email delivery.
///
/// Implementations return `Ok` for any reply the remote service produced,
/// whatever its status code, and `Err` only when no reply was obtained at
/// all (connect failure, timeout, bad address).
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, credential: &str, email: &OutboundEmail) -> Result<TransportResponse>;
}

/// One delivery attempt for a previously enqueued job.
///
/// Implemented by the delivery worker and driven by the queue runner.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &DeliveryJob) -> Outcome;
}
