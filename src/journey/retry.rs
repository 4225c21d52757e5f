//! # Retry/Backoff Policy
//!
//! Classifies call failures as retryable or terminal and computes the
//! exponential backoff window for the next attempt.
//!
//! ## Overview
//!
//! Failure codes arrive from the telephony leg, the AI leg, and provider
//! callbacks. Codes in the retryable set reschedule the customer with
//! exponential backoff (base one minute, doubling per attempt, capped at
//! four hours); anything else parks the customer in `call_failed`. Hitting
//! the retry ceiling parks the customer in `call_failed` with
//! `manual_review` set so an operator picks it up.
//!
//! Every transition here is keyed by the *failed* attempt, so a replayed
//! failure signal (redelivered webhook, requeued job) collapses in the
//! ledger instead of double-incrementing `retry_count`.

use crate::constants::{failure_codes, transition_reasons, BACKOFF_BASE_MS, BACKOFF_CAP_MS};
use crate::error::Result;
use crate::journey::ledger::{IdempotencyScope, TransitionLedger, TransitionRequest};
use crate::journey::states::CustomerStatus;
use crate::models::{
    AutomationSettings, CallMode, CallStatus, CampaignJobStatus, CustomerChanges,
    ExecutionRuntime, NewCallLog, NewCampaignJob, TransitionSource,
};
use crate::queue::CampaignQueue;
use crate::storage::JourneyStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Exponential backoff delay for a retry attempt: `2^max(1, n)` minutes,
/// capped at four hours.
pub fn calculate_backoff_ms(retry_count: u32) -> u64 {
    let exponent = retry_count.max(1).min(20);
    BACKOFF_BASE_MS
        .saturating_mul(1u64 << exponent)
        .min(BACKOFF_CAP_MS)
}

/// Lowercase, trimmed failure code ready for classification.
pub fn normalize_failure_code(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Is this (normalized) failure code one the policy will reschedule?
pub fn is_retryable_failure(code: &str) -> bool {
    failure_codes::RETRYABLE.contains(&code)
}

/// A failure report for one call attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSignal {
    pub customer_id: Uuid,
    pub failure_code: String,
    pub error_message: Option<String>,
    /// 1-based number of the attempt that failed. This keys the retry
    /// idempotency scope, so the same signal delivered twice hashes to the
    /// same ledger entry.
    pub attempt: i32,
    pub tenant_id: Option<Uuid>,
}

/// What the policy decided for one failure signal.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// The customer is missing or archived; nothing was scheduled.
    NotScheduled { reason: &'static str },
    /// Failure code is outside the retryable set; customer parked in
    /// `call_failed`.
    NonRetryable { failure_code: String },
    /// Retry ceiling reached; customer parked in `call_failed` with
    /// `manual_review` set.
    MaxRetriesReached { retry_count: i32 },
    /// A retry was scheduled (or an identical signal had already scheduled
    /// one).
    Scheduled {
        retry_count: i32,
        next_follow_up_at: DateTime<Utc>,
        delay_ms: u64,
        /// True when this signal was a replay and no state changed.
        idempotent: bool,
        /// True when a delayed worker job was also enqueued (WORKER mode).
        queued: bool,
    },
}

/// Applies the retry policy through the transition ledger.
#[derive(Debug, Clone, Default)]
pub struct RetryScheduler {
    ledger: TransitionLedger,
}

impl RetryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one failure signal: classify, transition, and (in WORKER mode)
    /// re-enqueue with the computed delay.
    pub async fn schedule_retry_for_failure<S>(
        &self,
        store: &S,
        queue: &dyn CampaignQueue,
        settings: &AutomationSettings,
        runtime: ExecutionRuntime,
        signal: FailureSignal,
    ) -> Result<RetryDecision>
    where
        S: JourneyStore + ?Sized,
    {
        let customer = match store.find_customer(signal.customer_id).await? {
            Some(customer) if !customer.is_archived() => customer,
            _ => {
                tracing::warn!(
                    customer_id = %signal.customer_id,
                    "Retry requested for missing or archived customer"
                );
                return Ok(RetryDecision::NotScheduled {
                    reason: "customer_not_found",
                });
            }
        };

        let failure_code = normalize_failure_code(&signal.failure_code);
        let scope = IdempotencyScope::RetryFailure {
            failure_code: failure_code.clone(),
            attempt: signal.attempt,
        };
        let metadata = serde_json::json!({
            "failure_code": failure_code,
            "error_message": signal.error_message,
            "failed_attempt": signal.attempt,
        });

        if !is_retryable_failure(&failure_code) {
            let request = TransitionRequest::new(
                signal.customer_id,
                CustomerStatus::CallFailed,
                transition_reasons::NON_RETRYABLE_FAILURE,
                TransitionSource::AiAutomation,
                scope,
            )
            .with_changes(CustomerChanges::none().with_in_active_call(false))
            .with_metadata(metadata)
            .with_call_log(NewCallLog {
                customer_id: signal.customer_id,
                status: CallStatus::Failed,
                mode: CallMode::Ai,
                attempt_number: signal.attempt,
                ai_provider_used: None,
            });
            let request = match signal.tenant_id {
                Some(tenant_id) => request.with_tenant(tenant_id),
                None => request,
            };
            self.ledger.apply_transition(store, request).await?;
            return Ok(RetryDecision::NonRetryable { failure_code });
        }

        let max_retries = settings.effective_max_retries(customer.max_retries);
        let next_retry_count = customer.retry_count + 1;

        if next_retry_count >= max_retries {
            let request = TransitionRequest::new(
                signal.customer_id,
                CustomerStatus::CallFailed,
                transition_reasons::MAX_RETRIES_REACHED,
                TransitionSource::AiAutomation,
                scope,
            )
            .with_changes(
                CustomerChanges::none()
                    .with_retry_count(next_retry_count)
                    .with_in_active_call(false)
                    .with_manual_review(true),
            )
            .with_metadata(metadata);
            let request = match signal.tenant_id {
                Some(tenant_id) => request.with_tenant(tenant_id),
                None => request,
            };
            self.ledger.apply_transition(store, request).await?;
            return Ok(RetryDecision::MaxRetriesReached {
                retry_count: next_retry_count,
            });
        }

        let delay_ms = calculate_backoff_ms(next_retry_count as u32);
        let next_follow_up_at = Utc::now() + ChronoDuration::milliseconds(delay_ms as i64);

        let request = TransitionRequest::new(
            signal.customer_id,
            CustomerStatus::RetryScheduled,
            transition_reasons::RETRY_SCHEDULED,
            TransitionSource::AiAutomation,
            scope,
        )
        .with_changes(
            CustomerChanges::none()
                .with_retry_count(next_retry_count)
                .with_next_follow_up_at(Some(next_follow_up_at))
                .with_in_active_call(false),
        )
        .with_metadata(serde_json::json!({
            "failure_code": failure_code,
            "error_message": signal.error_message,
            "failed_attempt": signal.attempt,
            "delay_ms": delay_ms,
        }));
        let request = match signal.tenant_id {
            Some(tenant_id) => request.with_tenant(tenant_id),
            None => request,
        };

        let outcome = self.ledger.apply_transition(store, request).await?;

        if outcome.is_idempotent() {
            // Replayed signal: report what the original application did.
            return Ok(RetryDecision::Scheduled {
                retry_count: customer.retry_count,
                next_follow_up_at: customer.next_follow_up_at.unwrap_or(next_follow_up_at),
                delay_ms,
                idempotent: true,
                queued: false,
            });
        }

        // CRON mode stops here: the batch poll naturally picks the customer
        // up once next_follow_up_at passes. WORKER mode also enqueues a
        // delayed job and moves the customer to call_pending so queue and
        // status stay consistent.
        let mut queued = false;
        if runtime == ExecutionRuntime::Worker {
            let enqueue_outcome = queue
                .enqueue(
                    signal.customer_id,
                    transition_reasons::RETRY_SCHEDULED,
                    Duration::from_millis(delay_ms),
                )
                .await;

            if let Some(job_id) = enqueue_outcome.job_id() {
                store
                    .record_campaign_job(NewCampaignJob {
                        queue_job_id: Some(job_id.to_string()),
                        customer_id: signal.customer_id,
                        reason: transition_reasons::RETRY_SCHEDULED.to_string(),
                        status: CampaignJobStatus::Queued,
                        execution_runtime: runtime,
                        metadata: Some(serde_json::json!({ "delay_ms": delay_ms })),
                    })
                    .await?;

                let pending = TransitionRequest::new(
                    signal.customer_id,
                    CustomerStatus::CallPending,
                    transition_reasons::RETRY_SCHEDULED,
                    TransitionSource::AiAutomation,
                    IdempotencyScope::Enqueue {
                        attempt: next_retry_count + 1,
                    },
                );
                let pending = match signal.tenant_id {
                    Some(tenant_id) => pending.with_tenant(tenant_id),
                    None => pending,
                };
                self.ledger.apply_transition(store, pending).await?;
                queued = true;
            } else {
                tracing::warn!(
                    customer_id = %signal.customer_id,
                    "Queue unavailable for retry; falling back to poll pickup"
                );
            }
        }

        Ok(RetryDecision::Scheduled {
            retry_count: next_retry_count,
            next_follow_up_at,
            delay_ms,
            idempotent: false,
            queued,
        })
    }
}
