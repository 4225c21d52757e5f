//! # Transition Ledger
//!
//! Append-only, idempotent record of customer status changes.
//!
//! ## Overview
//!
//! Every status change in the campaign journey flows through
//! [`TransitionLedger::apply_transition`], which runs a single atomic
//! transaction: check for an existing idempotency key, load and lock the
//! customer, enforce the terminal-state and archival rules, write the new
//! customer fields, append the ledger row, and optionally insert an
//! associated call log. The unique `transition_key` constraint checked
//! inside that transaction is the authoritative concurrency guard; every
//! other check in the system is an optimization layered on top of it.
//!
//! ## Idempotency
//!
//! The key is a deterministic hash over the operation's identity:
//! (customer, target status, reason, source, scope). Scopes form a closed
//! set with one variant per operation type, so call sites cannot invent
//! free-form shapes that accidentally collide or accidentally fail to
//! collide.

use crate::error::{CoreError, Result};
use crate::journey::states::CustomerStatus;
use crate::logging::log_transition;
use crate::models::{
    CallLog, Customer, CustomerChanges, CustomerTransition, NewCallLog, NewCustomerTransition,
    TransitionSource,
};
use crate::storage::{JourneyStore, TransitionInsert};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Closed set of idempotency-scope shapes, one per operation type. Two calls
/// collapse to one ledger row exactly when they carry the same scope (and
/// the same customer / status / reason / source).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum IdempotencyScope {
    /// Queuing a customer for a given campaign attempt.
    Enqueue { attempt: i32 },
    /// Starting the dial leg of a given attempt.
    CallStart { attempt: i32 },
    /// Applying the outcome of a specific provider call.
    CallOutcome { provider_call_id: String },
    /// Scheduling (or terminally failing) a retry for a specific failed
    /// attempt. Keyed by the *failed* attempt, not the next one, so a
    /// replayed failure signal hashes identically.
    RetryFailure { failure_code: String, attempt: i32 },
    /// Operator-initiated change, keyed by an explicit token.
    Manual { token: String },
}

/// Compute the deterministic ledger key for one logical operation.
/// Hash output is a 16-character hex string.
pub fn transition_key(
    customer_id: Uuid,
    to_status: CustomerStatus,
    reason: &str,
    source: TransitionSource,
    scope: &IdempotencyScope,
) -> String {
    let mut hasher = DefaultHasher::new();
    customer_id.hash(&mut hasher);
    to_status.to_string().hash(&mut hasher);
    reason.hash(&mut hasher);
    source.to_string().hash(&mut hasher);
    scope.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// One requested status change, with everything needed to apply it
/// atomically.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub customer_id: Uuid,
    /// When set, the customer must belong to this tenant; a mismatch reads
    /// as "not found".
    pub tenant_id: Option<Uuid>,
    pub to_status: CustomerStatus,
    pub reason: String,
    pub source: TransitionSource,
    pub scope: IdempotencyScope,
    /// Customer fields written alongside the status; absent fields are
    /// preserved.
    pub changes: CustomerChanges,
    pub metadata: Option<serde_json::Value>,
    /// Call log row inserted atomically with the transition, if any.
    pub call_log: Option<NewCallLog>,
}

impl TransitionRequest {
    pub fn new(
        customer_id: Uuid,
        to_status: CustomerStatus,
        reason: impl Into<String>,
        source: TransitionSource,
        scope: IdempotencyScope,
    ) -> Self {
        Self {
            customer_id,
            tenant_id: None,
            to_status,
            reason: reason.into(),
            source,
            scope,
            changes: CustomerChanges::none(),
            metadata: None,
            call_log: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_changes(mut self, changes: CustomerChanges) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_call_log(mut self, call_log: NewCallLog) -> Self {
        self.call_log = Some(call_log);
        self
    }

    /// The ledger key this request resolves to.
    pub fn key(&self) -> String {
        transition_key(
            self.customer_id,
            self.to_status,
            &self.reason,
            self.source,
            &self.scope,
        )
    }
}

/// Why a transition request was skipped without error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Current status is terminal and the requested status differs; terminal
    /// states absorb all further transitions.
    TerminalState { current: CustomerStatus },
}

/// Outcome of applying a transition request.
#[derive(Debug)]
pub enum TransitionOutcome {
    /// The transition was applied; carries the new ledger row, the inserted
    /// call log (if requested), and the updated customer.
    Applied {
        transition: CustomerTransition,
        call_log: Option<CallLog>,
        customer: Customer,
    },
    /// An identical operation already happened; nothing was written.
    Idempotent { existing: CustomerTransition },
    /// The request was absorbed without error (terminal state).
    Skipped { reason: SkipReason },
}

impl TransitionOutcome {
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Self::Idempotent { .. })
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// The ledger itself. Stateless (all state lives in the store), so a single
/// instance is shared freely.
#[derive(Debug, Clone, Default)]
pub struct TransitionLedger;

impl TransitionLedger {
    pub fn new() -> Self {
        Self
    }

    /// Apply one status change with at-most-once semantics per idempotency
    /// scope.
    ///
    /// Ordering inside the transaction matters: the key check runs first so
    /// replays exit before touching the customer row, and the unique-key
    /// insert runs before commit so concurrent racers collapse to one
    /// winner. The loser observes `DuplicateKey`, discards its staged
    /// writes, and reports the surviving row as idempotent.
    pub async fn apply_transition<S>(
        &self,
        store: &S,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome>
    where
        S: JourneyStore + ?Sized,
    {
        let key = request.key();
        let mut tx = store.begin().await?;

        if let Some(existing) = tx.find_transition_by_key(&key).await? {
            log_transition(
                request.customer_id,
                existing.from_status.map(|s| s.to_string()).as_deref(),
                &existing.to_status.to_string(),
                &request.reason,
                true,
            );
            return Ok(TransitionOutcome::Idempotent { existing });
        }

        let customer = tx
            .lock_customer(request.customer_id, request.tenant_id)
            .await?
            .ok_or(CoreError::CustomerNotFound {
                customer_id: request.customer_id,
            })?;

        if customer.is_archived() {
            return Err(CoreError::CustomerArchived {
                customer_id: request.customer_id,
            });
        }

        if customer.status.is_terminal() && customer.status != request.to_status {
            tracing::debug!(
                customer_id = %request.customer_id,
                current = %customer.status,
                requested = %request.to_status,
                "Terminal state absorbed transition request"
            );
            return Ok(TransitionOutcome::Skipped {
                reason: SkipReason::TerminalState {
                    current: customer.status,
                },
            });
        }

        tx.update_customer(request.customer_id, request.to_status, &request.changes)
            .await?;

        let row = NewCustomerTransition {
            customer_id: request.customer_id,
            from_status: Some(customer.status),
            to_status: request.to_status,
            reason: request.reason.clone(),
            source: request.source,
            transition_key: key.clone(),
            metadata: request.metadata.clone(),
        };

        let transition = match tx.insert_transition(row).await? {
            TransitionInsert::Inserted(transition) => transition,
            TransitionInsert::DuplicateKey => {
                // A concurrent caller won the race between our key check and
                // our insert. Discard staged writes and report theirs.
                drop(tx);
                let existing = store.find_transition_by_key(&key).await?.ok_or_else(|| {
                    CoreError::InvalidTransition(format!(
                        "transition key {key} conflicted but no row found"
                    ))
                })?;
                return Ok(TransitionOutcome::Idempotent { existing });
            }
        };

        let call_log = match request.call_log {
            Some(new_log) => Some(tx.insert_call_log(new_log).await?),
            None => None,
        };

        tx.commit().await?;

        let from_status = customer.status.to_string();
        log_transition(
            request.customer_id,
            Some(from_status.as_str()),
            &request.to_status.to_string(),
            &request.reason,
            false,
        );

        let mut updated = customer;
        updated.status = request.to_status;
        request.changes.apply_to(&mut updated);

        Ok(TransitionOutcome::Applied {
            transition,
            call_log,
            customer: updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> IdempotencyScope {
        IdempotencyScope::Enqueue { attempt: 1 }
    }

    #[test]
    fn test_transition_key_is_deterministic() {
        let customer_id = Uuid::new_v4();
        let a = transition_key(
            customer_id,
            CustomerStatus::CallPending,
            "queued_for_campaign",
            TransitionSource::AiAutomation,
            &scope(),
        );
        let b = transition_key(
            customer_id,
            CustomerStatus::CallPending,
            "queued_for_campaign",
            TransitionSource::AiAutomation,
            &scope(),
        );
        assert_eq!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_transition_key_varies_by_scope() {
        let customer_id = Uuid::new_v4();
        let first = transition_key(
            customer_id,
            CustomerStatus::CallPending,
            "queued_for_campaign",
            TransitionSource::AiAutomation,
            &IdempotencyScope::Enqueue { attempt: 1 },
        );
        let second = transition_key(
            customer_id,
            CustomerStatus::CallPending,
            "queued_for_campaign",
            TransitionSource::AiAutomation,
            &IdempotencyScope::Enqueue { attempt: 2 },
        );
        assert_ne!(first, second);
    }

    #[test]
    fn test_transition_key_varies_by_operation_type() {
        // Same field values under different variants must not collide.
        let customer_id = Uuid::new_v4();
        let enqueue = transition_key(
            customer_id,
            CustomerStatus::CallPending,
            "r",
            TransitionSource::System,
            &IdempotencyScope::Enqueue { attempt: 1 },
        );
        let call_start = transition_key(
            customer_id,
            CustomerStatus::CallPending,
            "r",
            TransitionSource::System,
            &IdempotencyScope::CallStart { attempt: 1 },
        );
        assert_ne!(enqueue, call_start);
    }

    #[test]
    fn test_request_key_matches_free_function() {
        let customer_id = Uuid::new_v4();
        let request = TransitionRequest::new(
            customer_id,
            CustomerStatus::Calling,
            "call_started",
            TransitionSource::AiAutomation,
            IdempotencyScope::CallStart { attempt: 2 },
        );
        assert_eq!(
            request.key(),
            transition_key(
                customer_id,
                CustomerStatus::Calling,
                "call_started",
                TransitionSource::AiAutomation,
                &IdempotencyScope::CallStart { attempt: 2 },
            )
        );
    }
}
