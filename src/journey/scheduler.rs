//! # Batch Scheduler
//!
//! Selects a bounded set of eligible customers respecting the daily cap and
//! working hours, and asks the orchestrator to enqueue each. "Nothing to
//! do" conditions (automation disabled, outside hours, cap reached) are
//! expected steady-state outcomes reported as structured results, never
//! errors.

use crate::error::Result;
use crate::journey::orchestrator::{CampaignOrchestrator, EnqueueDecision};
use crate::models::{AutomationSettings, CallMode};
use crate::storage::{BatchCandidateQuery, JourneyStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Why a batch run did nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BatchSkipReason {
    AutomationDisabled,
    OutsideWorkingHours,
    DailyCapReached { used_today: i64, daily_cap: i64 },
}

/// Accounting for one completed batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub queued: usize,
    pub daily_cap: i64,
    pub used_today: i64,
    pub remaining_cap: i64,
    /// Customers that entered `call_pending` this run, in selection order.
    /// CRON deployments process these inline after the batch.
    pub queued_customer_ids: Vec<Uuid>,
}

/// Structured result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchOutcome {
    Skipped(BatchSkipReason),
    Completed(BatchReport),
}

impl BatchOutcome {
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped(_) => None,
        }
    }
}

pub struct BatchScheduler<S: JourneyStore> {
    store: Arc<S>,
    orchestrator: Arc<CampaignOrchestrator<S>>,
}

impl<S: JourneyStore> BatchScheduler<S> {
    pub fn new(store: Arc<S>, orchestrator: Arc<CampaignOrchestrator<S>>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Run one automation batch against a settings snapshot.
    pub async fn run_automation_batch(
        &self,
        settings: &AutomationSettings,
    ) -> Result<BatchOutcome> {
        if !settings.enabled {
            return Ok(BatchOutcome::Skipped(BatchSkipReason::AutomationDisabled));
        }

        let now = Utc::now();
        if !settings.within_working_hours(now) {
            return Ok(BatchOutcome::Skipped(BatchSkipReason::OutsideWorkingHours));
        }

        let used_today = self
            .store
            .calls_placed_since(CallMode::Ai, settings.start_of_local_day(now))
            .await?;
        let remaining_cap = (settings.daily_cap - used_today).max(0);
        if remaining_cap == 0 {
            return Ok(BatchOutcome::Skipped(BatchSkipReason::DailyCapReached {
                used_today,
                daily_cap: settings.daily_cap,
            }));
        }

        let batch_limit = settings.batch_size.min(remaining_cap);
        let candidates = self
            .store
            .select_batch_candidates(&BatchCandidateQuery {
                statuses: settings.eligible_statuses.iter().copied().collect(),
                now,
                max_retries: (settings.max_retries > 0).then_some(settings.max_retries),
                limit: batch_limit,
            })
            .await?;

        let mut queued = 0;
        let mut queued_customer_ids = Vec::new();
        let attempted = candidates.len();

        for candidate in &candidates {
            match self
                .orchestrator
                .enqueue_if_eligible(candidate.id, "automation_batch", settings)
                .await
            {
                Ok(EnqueueDecision::Enqueued { .. }) => {
                    queued += 1;
                    queued_customer_ids.push(candidate.id);
                }
                Ok(EnqueueDecision::AlreadyPending) => {
                    // Still ours to deliver in CRON mode; not counted as new.
                    queued_customer_ids.push(candidate.id);
                }
                Ok(EnqueueDecision::Ineligible { reason }) => {
                    tracing::debug!(
                        customer_id = %candidate.id,
                        reason = %reason,
                        "Candidate dropped at enqueue time"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        customer_id = %candidate.id,
                        error = %err,
                        "Enqueue failed; continuing batch"
                    );
                }
            }
        }

        tracing::info!(
            attempted = attempted,
            queued = queued,
            used_today = used_today,
            remaining_cap = remaining_cap,
            "Automation batch completed"
        );

        Ok(BatchOutcome::Completed(BatchReport {
            attempted,
            queued,
            daily_cap: settings.daily_cap,
            used_today,
            remaining_cap,
            queued_customer_ids,
        }))
    }
}
