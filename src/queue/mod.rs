//! # Campaign Queue
//!
//! Delivery seam between the scheduler/orchestrator and whatever actually
//! carries jobs: a durable delayed queue in WORKER deployments, nothing at
//! all in CRON deployments where the poll loop picks work up by
//! `next_follow_up_at`. The seam is deliberately thin: the core only ever
//! calls [`CampaignQueue::enqueue`], and a broker outage degrades to
//! "unavailable" rather than an error so the poll path can take over.

pub mod in_process;

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

pub use in_process::{DelayedCampaignJob, InProcessQueue};

/// Result of an enqueue attempt. Never an error: queue unavailability is an
/// expected steady-state outcome, handled by falling back to poll-based
/// pickup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued { job_id: String },
    Rejected { reason: String },
}

impl EnqueueOutcome {
    pub fn unavailable() -> Self {
        Self::Rejected {
            reason: "unavailable".to_string(),
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Queued { job_id } => Some(job_id),
            Self::Rejected { .. } => None,
        }
    }
}

/// Delivery mechanism for campaign jobs.
#[async_trait]
pub trait CampaignQueue: Send + Sync {
    /// Ask the queue to deliver `customer_id` to a worker after `delay`.
    /// Implementations must degrade gracefully: return
    /// [`EnqueueOutcome::Rejected`] with reason `"unavailable"` rather than
    /// panic or error when the broker is unreachable.
    async fn enqueue(&self, customer_id: Uuid, reason: &str, delay: Duration) -> EnqueueOutcome;
}

/// Queue stand-in for CRON deployments: every enqueue reports unavailable,
/// so all pickup happens through the poll loop.
#[derive(Debug, Clone, Default)]
pub struct DisconnectedQueue;

#[async_trait]
impl CampaignQueue for DisconnectedQueue {
    async fn enqueue(&self, _customer_id: Uuid, _reason: &str, _delay: Duration) -> EnqueueOutcome {
        EnqueueOutcome::unavailable()
    }
}
