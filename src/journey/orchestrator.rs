//! # Campaign Orchestrator
//!
//! Drives a single customer through one automated call attempt:
//! `call_pending` → `calling` → (AI script → telephony dial) → asynchronous
//! outcome → disposition or retry.
//!
//! ## Overview
//!
//! Every step is wrapped by the transition ledger, so each is idempotent
//! under replays and safe under concurrent workers: the `calling` transition
//! sets `in_active_call` atomically with its ledger row and the initial call
//! log, which is what guarantees no two executions process the same
//! customer's call simultaneously. Failures on either provider leg feed the
//! retry policy; completed calls are summarized by the AI router and land in
//! a terminal disposition.

use crate::constants::{failure_codes, transition_reasons};
use crate::error::{CoreError, Result};
use crate::journey::eligibility::{check_eligibility, IneligibilityReason};
use crate::journey::ledger::{IdempotencyScope, TransitionLedger, TransitionRequest};
use crate::journey::retry::{FailureSignal, RetryDecision, RetryScheduler};
use crate::journey::states::{CustomerStatus, Disposition};
use crate::models::{
    AutomationSettings, CallLog, CallLogUpdate, CallMode, CallStatus, CampaignJob,
    CampaignJobStatus, Customer, CustomerChanges, ExecutionRuntime, NewCallLog, NewCampaignJob,
    ProviderKind, TransitionSource,
};
use crate::providers::{FailoverRouter, ProviderTask};
use crate::queue::CampaignQueue;
use crate::storage::JourneyStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Result of an enqueue attempt.
#[derive(Debug)]
pub enum EnqueueDecision {
    /// The customer entered `call_pending` and a campaign job was recorded.
    /// `queued` is false when the broker was unavailable and the poll loop
    /// will deliver instead.
    Enqueued { job: CampaignJob, queued: bool },
    /// Eligibility re-check failed; a skipped job was recorded.
    Ineligible { reason: IneligibilityReason },
    /// This attempt was already enqueued (idempotent replay).
    AlreadyPending,
}

/// Result of running the dial leg of one attempt.
#[derive(Debug)]
pub enum CallAttemptOutcome {
    /// The call is in flight; the outcome arrives via provider callback.
    Dialed {
        call_log_id: Uuid,
        provider_call_id: String,
        telephony_provider: String,
    },
    /// Another execution already owns this attempt, or the customer left
    /// the journey; nothing was dialed.
    Skipped,
    /// The telephony leg failed before the call reached anyone; the retry
    /// policy has already handled it.
    FailureHandled { decision: RetryDecision },
}

/// A terminal delivery-status callback for a placed call.
#[derive(Debug, Clone)]
pub struct CallCompletion {
    pub provider_call_id: String,
    /// Normalized status; webhook handlers map vendor vocabularies through
    /// the adapter's `map_status`.
    pub status: CallStatus,
    pub transcript: Option<String>,
    pub error_message: Option<String>,
}

/// Result of handling a delivery-status callback.
#[derive(Debug)]
pub enum CompletionOutcome {
    /// The call completed and was classified into a disposition.
    Disposed {
        disposition: Disposition,
        customer_status: CustomerStatus,
    },
    /// The call failed or went unanswered; the retry policy handled it.
    FailureHandled { decision: RetryDecision },
    /// Mid-call (non-terminal) update; the call log was refreshed.
    Acknowledged,
    /// No call log matches the provider call id.
    UnknownCall,
}

pub struct CampaignOrchestrator<S: JourneyStore> {
    store: Arc<S>,
    queue: Arc<dyn CampaignQueue>,
    ai_router: Arc<FailoverRouter>,
    telephony_router: Arc<FailoverRouter>,
    ledger: TransitionLedger,
    retry: RetryScheduler,
    runtime: ExecutionRuntime,
    callback_base_url: String,
}

impl<S: JourneyStore> CampaignOrchestrator<S> {
    pub fn new(
        store: Arc<S>,
        queue: Arc<dyn CampaignQueue>,
        ai_router: Arc<FailoverRouter>,
        telephony_router: Arc<FailoverRouter>,
        runtime: ExecutionRuntime,
        callback_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            ai_router,
            telephony_router,
            ledger: TransitionLedger::new(),
            retry: RetryScheduler::new(),
            runtime,
            callback_base_url: callback_base_url.into(),
        }
    }

    pub fn runtime(&self) -> ExecutionRuntime {
        self.runtime
    }

    /// Re-check eligibility and move the customer into `call_pending`,
    /// recording a campaign job and asking the queue to deliver the attempt.
    /// Idempotent per attempt: a duplicate enqueue of the same attempt is a
    /// no-op.
    pub async fn enqueue_if_eligible(
        &self,
        customer_id: Uuid,
        reason: &str,
        settings: &AutomationSettings,
    ) -> Result<EnqueueDecision> {
        let customer = self
            .store
            .find_customer(customer_id)
            .await?
            .ok_or(CoreError::CustomerNotFound { customer_id })?;

        // State may have changed since the scheduler selected this customer.
        if let Some(reason_code) = check_eligibility(&customer, settings) {
            tracing::debug!(
                customer_id = %customer_id,
                reason = %reason_code,
                "Customer no longer eligible at enqueue time"
            );
            self.store
                .record_campaign_job(NewCampaignJob {
                    queue_job_id: None,
                    customer_id,
                    reason: reason.to_string(),
                    status: CampaignJobStatus::Skipped,
                    execution_runtime: self.runtime,
                    metadata: Some(serde_json::json!({ "skip_reason": reason_code.to_string() })),
                })
                .await?;
            return Ok(EnqueueDecision::Ineligible {
                reason: reason_code,
            });
        }

        let attempt = customer.retry_count + 1;
        let outcome = self
            .ledger
            .apply_transition(
                self.store.as_ref(),
                TransitionRequest::new(
                    customer_id,
                    CustomerStatus::CallPending,
                    transition_reasons::QUEUED,
                    TransitionSource::AiAutomation,
                    IdempotencyScope::Enqueue { attempt },
                )
                .with_metadata(serde_json::json!({ "enqueue_reason": reason })),
            )
            .await?;

        if outcome.is_idempotent() {
            return Ok(EnqueueDecision::AlreadyPending);
        }
        if outcome.is_skipped() {
            return Ok(EnqueueDecision::Ineligible {
                reason: IneligibilityReason::TerminalStatus,
            });
        }

        let enqueue_outcome = self.queue.enqueue(customer_id, reason, Duration::ZERO).await;
        let queued = enqueue_outcome.is_queued();
        // An unavailable broker is not an error: the customer is parked in
        // call_pending and the poll loop will deliver the attempt.
        let runtime = if queued {
            self.runtime
        } else {
            ExecutionRuntime::Cron
        };

        let job = self
            .store
            .record_campaign_job(NewCampaignJob {
                queue_job_id: enqueue_outcome.job_id().map(str::to_string),
                customer_id,
                reason: reason.to_string(),
                status: CampaignJobStatus::Queued,
                execution_runtime: runtime,
                metadata: Some(serde_json::json!({ "attempt": attempt })),
            })
            .await?;

        Ok(EnqueueDecision::Enqueued { job, queued })
    }

    /// Run the synchronous half of one call attempt: transition to
    /// `calling`, build the script, and dial. The call's outcome arrives
    /// later through [`CampaignOrchestrator::complete_call`].
    pub async fn run_call_attempt(
        &self,
        customer_id: Uuid,
        settings: &AutomationSettings,
    ) -> Result<CallAttemptOutcome> {
        let customer = self
            .store
            .find_customer(customer_id)
            .await?
            .ok_or(CoreError::CustomerNotFound { customer_id })?;

        if customer.in_active_call {
            tracing::debug!(customer_id = %customer_id, "Attempt skipped: call already in flight");
            return Ok(CallAttemptOutcome::Skipped);
        }

        let attempt = customer.retry_count + 1;
        let outcome = self
            .ledger
            .apply_transition(
                self.store.as_ref(),
                TransitionRequest::new(
                    customer_id,
                    CustomerStatus::Calling,
                    transition_reasons::CALL_STARTED,
                    TransitionSource::AiAutomation,
                    IdempotencyScope::CallStart { attempt },
                )
                .with_changes(
                    CustomerChanges::none()
                        .with_in_active_call(true)
                        .with_last_contacted_at(Utc::now())
                        .with_next_follow_up_at(None),
                )
                .with_call_log(NewCallLog {
                    customer_id,
                    status: CallStatus::Initiated,
                    mode: CallMode::Ai,
                    attempt_number: attempt,
                    ai_provider_used: None,
                }),
            )
            .await?;

        let call_log = match outcome {
            crate::journey::ledger::TransitionOutcome::Applied { call_log, .. } => {
                call_log.ok_or_else(|| {
                    CoreError::InvalidTransition(
                        "calling transition committed without a call log".to_string(),
                    )
                })?
            }
            // Idempotent: another worker owns this attempt. Skipped: the
            // customer reached a terminal state first.
            _ => return Ok(CallAttemptOutcome::Skipped),
        };

        let script = match self.build_call_script(&customer, &call_log).await {
            Ok(script) => script,
            Err(err) => {
                // Do not dial with an empty script: record the failure, hand
                // the attempt to the retry policy, and surface the error.
                self.fail_call_log(&call_log).await?;
                let failure_code = script_failure_code(&err);
                self.retry
                    .schedule_retry_for_failure(
                        self.store.as_ref(),
                        self.queue.as_ref(),
                        settings,
                        self.runtime,
                        FailureSignal {
                            customer_id,
                            failure_code: failure_code.to_string(),
                            error_message: Some(err.to_string()),
                            attempt,
                            tenant_id: None,
                        },
                    )
                    .await?;
                return Err(err);
            }
        };

        let dial_payload = serde_json::json!({
            "customer_id": customer_id,
            "call_log_id": call_log.id,
            "phone": customer.phone,
            "script": script,
            "callbacks": {
                "turn_url": format!("{}/turn/{}", self.callback_base_url, call_log.id),
                "status_url": format!("{}/status/{}", self.callback_base_url, call_log.id),
            },
        });

        let telephony_providers = self
            .store
            .list_enabled_providers(ProviderKind::Telephony)
            .await?;
        match self
            .telephony_router
            .invoke_with_failover(telephony_providers, ProviderTask::InitiateCall, &dial_payload)
            .await
        {
            Ok(dialed) => {
                let provider_call_id = dialed
                    .result
                    .get("provider_call_id")
                    .or_else(|| dialed.result.get("call_id"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| call_log.id.to_string());

                let mut update = CallLogUpdate::for_log(call_log.id);
                update.provider_call_id = Some(provider_call_id.clone());
                update.telephony_provider_used = Some(dialed.provider.name.clone());
                update.telephony_provider_type = Some(dialed.provider.provider_type.clone());
                self.store.update_call_log(&update).await?;

                tracing::info!(
                    customer_id = %customer_id,
                    provider = %dialed.provider.name,
                    provider_call_id = %provider_call_id,
                    attempt = attempt,
                    "Outbound call placed"
                );

                Ok(CallAttemptOutcome::Dialed {
                    call_log_id: call_log.id,
                    provider_call_id,
                    telephony_provider: dialed.provider.name,
                })
            }
            Err(err) => {
                self.fail_call_log(&call_log).await?;
                let decision = self
                    .retry
                    .schedule_retry_for_failure(
                        self.store.as_ref(),
                        self.queue.as_ref(),
                        settings,
                        self.runtime,
                        FailureSignal {
                            customer_id,
                            failure_code: failure_codes::TELEPHONY_FAILURE.to_string(),
                            error_message: Some(err.to_string()),
                            attempt,
                            tenant_id: None,
                        },
                    )
                    .await?;
                Ok(CallAttemptOutcome::FailureHandled { decision })
            }
        }
    }

    /// Handle a delivery-status callback for a placed call. Terminal
    /// completed calls are summarized and disposed; terminal failures go to
    /// the retry policy; mid-call updates just refresh the call log.
    /// Replayed callbacks collapse on the `CallOutcome` idempotency scope.
    pub async fn complete_call(
        &self,
        completion: CallCompletion,
        settings: &AutomationSettings,
    ) -> Result<CompletionOutcome> {
        let call_log = match self
            .store
            .find_call_log_by_provider_call_id(&completion.provider_call_id)
            .await?
        {
            Some(log) => log,
            None => {
                tracing::warn!(
                    provider_call_id = %completion.provider_call_id,
                    "Status callback for unknown call"
                );
                return Ok(CompletionOutcome::UnknownCall);
            }
        };

        if !completion.status.is_terminal() {
            let mut update = CallLogUpdate::for_log(call_log.id);
            update.status = Some(completion.status);
            self.store.update_call_log(&update).await?;
            return Ok(CompletionOutcome::Acknowledged);
        }

        let mut update = CallLogUpdate::for_log(call_log.id);
        update.status = Some(completion.status);
        update.transcript = completion.transcript.clone();
        update.ended_at = Some(Utc::now());
        self.store.update_call_log(&update).await?;

        if completion.status == CallStatus::Completed {
            return self
                .dispose_completed_call(&call_log, &completion, settings)
                .await;
        }

        let failure_code = match completion.status {
            CallStatus::NoAnswer => failure_codes::NO_ANSWER,
            CallStatus::Busy => failure_codes::BUSY,
            _ => failure_codes::FAILED,
        };
        let decision = self
            .retry
            .schedule_retry_for_failure(
                self.store.as_ref(),
                self.queue.as_ref(),
                settings,
                self.runtime,
                FailureSignal {
                    customer_id: call_log.customer_id,
                    failure_code: failure_code.to_string(),
                    error_message: completion.error_message.clone(),
                    attempt: call_log.attempt_number,
                    tenant_id: None,
                },
            )
            .await?;
        Ok(CompletionOutcome::FailureHandled { decision })
    }

    /// Operator-initiated reset: put the customer back at the start of the
    /// journey with a cleared retry counter. The only sanctioned decrease of
    /// `retry_count`.
    pub async fn reset_customer(&self, customer_id: Uuid, token: &str) -> Result<()> {
        self.ledger
            .apply_transition(
                self.store.as_ref(),
                TransitionRequest::new(
                    customer_id,
                    CustomerStatus::New,
                    transition_reasons::MANUAL_RESET,
                    TransitionSource::Manual,
                    IdempotencyScope::Manual {
                        token: token.to_string(),
                    },
                )
                .with_changes(
                    CustomerChanges::none()
                        .with_retry_count(0)
                        .with_in_active_call(false)
                        .with_manual_review(false)
                        .with_next_follow_up_at(None),
                ),
            )
            .await?;
        Ok(())
    }

    async fn build_call_script(&self, customer: &Customer, call_log: &CallLog) -> Result<String> {
        let script_payload = serde_json::json!({
            "customer": {
                "id": customer.id,
                "full_name": customer.full_name,
                "phone": customer.phone,
                "previous_summary": customer.ai_summary,
                "previous_intent": customer.ai_intent,
                "attempt_number": call_log.attempt_number,
            },
        });

        let ai_providers = self.store.list_enabled_providers(ProviderKind::Ai).await?;
        let generated = self
            .ai_router
            .invoke_with_failover(ai_providers, ProviderTask::CallScript, &script_payload)
            .await?;

        let mut update = CallLogUpdate::for_log(call_log.id);
        update.ai_provider_used = Some(generated.provider.name.clone());
        self.store.update_call_log(&update).await?;

        let script = generated
            .result
            .get("script")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| generated.result.to_string());
        if script.is_empty() {
            return Err(CoreError::Provider {
                provider_name: generated.provider.name,
                message: "empty call script".to_string(),
            });
        }
        Ok(script)
    }

    async fn dispose_completed_call(
        &self,
        call_log: &CallLog,
        completion: &CallCompletion,
        _settings: &AutomationSettings,
    ) -> Result<CompletionOutcome> {
        let summary_payload = serde_json::json!({
            "transcript": completion.transcript,
            "customer_id": call_log.customer_id,
            "attempt_number": call_log.attempt_number,
        });

        let ai_providers = self.store.list_enabled_providers(ProviderKind::Ai).await?;
        let (summary, intent, next_action, review_needed) = match self
            .ai_router
            .invoke_with_failover(ai_providers, ProviderTask::CallSummary, &summary_payload)
            .await
        {
            Ok(outcome) => {
                let summary = outcome
                    .result
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let intent = outcome
                    .result
                    .get("intent")
                    .and_then(|v| v.as_str())
                    .unwrap_or("follow_up")
                    .to_string();
                let next_action = outcome
                    .result
                    .get("next_action")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                (summary, intent, next_action, false)
            }
            Err(err) => {
                // The call happened; losing the summarizer must not lose the
                // outcome. Park the thread with a human.
                tracing::warn!(
                    customer_id = %call_log.customer_id,
                    error = %err,
                    "Call summary failed; disposing as follow_up with manual review"
                );
                (String::new(), "follow_up".to_string(), None, true)
            }
        };

        let disposition = Disposition::from_intent(&intent);
        let target_status = disposition.target_status();

        let mut update = CallLogUpdate::for_log(call_log.id);
        if !summary.is_empty() {
            update.summary = Some(summary.clone());
        }
        update.intent = Some(intent.clone());
        update.next_action = next_action;
        self.store.update_call_log(&update).await?;

        let mut changes = CustomerChanges::none()
            .with_in_active_call(false)
            .with_last_contacted_at(Utc::now())
            .with_ai_intent(intent.clone());
        if !summary.is_empty() {
            changes = changes.with_ai_summary(summary);
        }
        if review_needed {
            changes = changes.with_manual_review(true);
        }
        if disposition == Disposition::FollowUp {
            // Keep follow-ups visible to the next batch without waiting on a
            // manual touch.
            changes = changes.with_next_follow_up_at(Some(Utc::now() + chrono::Duration::days(1)));
        }

        self.ledger
            .apply_transition(
                self.store.as_ref(),
                TransitionRequest::new(
                    call_log.customer_id,
                    target_status,
                    transition_reasons::CALL_COMPLETED,
                    TransitionSource::AiAutomation,
                    IdempotencyScope::CallOutcome {
                        provider_call_id: completion.provider_call_id.clone(),
                    },
                )
                .with_changes(changes)
                .with_metadata(serde_json::json!({
                    "disposition": disposition,
                    "call_log_id": call_log.id,
                })),
            )
            .await?;

        Ok(CompletionOutcome::Disposed {
            disposition,
            customer_status: target_status,
        })
    }

    async fn fail_call_log(&self, call_log: &CallLog) -> Result<()> {
        let mut update = CallLogUpdate::for_log(call_log.id);
        update.status = Some(CallStatus::Failed);
        update.ended_at = Some(Utc::now());
        self.store.update_call_log(&update).await?;
        Ok(())
    }
}

/// Classify a script-generation error into a failure code. Timeouts map to
/// `ai_timeout`; everything else is a generic retryable failure.
fn script_failure_code(err: &CoreError) -> &'static str {
    match err {
        CoreError::AllProvidersFailed { details, .. }
            if details.iter().any(|f| f.message.contains("timed out")) =>
        {
            failure_codes::AI_TIMEOUT
        }
        _ => failure_codes::FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderFailure;

    #[test]
    fn test_script_failure_code_classification() {
        let timeout = CoreError::AllProvidersFailed {
            message: "timed out after 12000ms".to_string(),
            details: vec![ProviderFailure {
                provider_id: Uuid::new_v4(),
                provider_name: "primary".to_string(),
                message: "timed out after 12000ms".to_string(),
            }],
        };
        assert_eq!(script_failure_code(&timeout), failure_codes::AI_TIMEOUT);

        let refused = CoreError::AllProvidersFailed {
            message: "connection refused".to_string(),
            details: vec![ProviderFailure {
                provider_id: Uuid::new_v4(),
                provider_name: "primary".to_string(),
                message: "connection refused".to_string(),
            }],
        };
        assert_eq!(script_failure_code(&refused), failure_codes::FAILED);
    }
}
