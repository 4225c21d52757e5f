//! In-process delayed queue backing WORKER-mode deployments that run the
//! worker loop inside the same process, and every test that needs to observe
//! queue traffic. Jobs become visible to [`InProcessQueue::drain_due`] once
//! their delay has elapsed.

use super::{CampaignQueue, EnqueueOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedCampaignJob {
    pub job_id: String,
    pub customer_id: Uuid,
    pub reason: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InProcessQueue {
    jobs: Mutex<VecDeque<DelayedCampaignJob>>,
    sequence: AtomicU64,
    // Flipped by tests and operational toggles to simulate a broker outage.
    unavailable: AtomicBool,
}

impl InProcessQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate (or record) broker unavailability; subsequent enqueues
    /// report `unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Remove and return all jobs due at or before `now`, oldest first.
    pub fn drain_due(&self, now: DateTime<Utc>) -> Vec<DelayedCampaignJob> {
        let mut jobs = self.jobs.lock().expect("queue lock poisoned");
        let mut due = Vec::new();
        let mut remaining = VecDeque::with_capacity(jobs.len());
        for job in jobs.drain(..) {
            if job.due_at <= now {
                due.push(job);
            } else {
                remaining.push_back(job);
            }
        }
        *jobs = remaining;
        due.sort_by_key(|job| job.due_at);
        due
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CampaignQueue for InProcessQueue {
    async fn enqueue(&self, customer_id: Uuid, reason: &str, delay: Duration) -> EnqueueOutcome {
        if self.unavailable.load(Ordering::SeqCst) {
            return EnqueueOutcome::unavailable();
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let job_id = format!("job-{sequence}");
        let due_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        let job = DelayedCampaignJob {
            job_id: job_id.clone(),
            customer_id,
            reason: reason.to_string(),
            due_at,
        };
        self.jobs.lock().expect("queue lock poisoned").push_back(job);

        tracing::debug!(
            customer_id = %customer_id,
            job_id = %job_id,
            delay_ms = delay.as_millis() as u64,
            "Enqueued campaign job"
        );

        EnqueueOutcome::Queued { job_id }
    }
}
