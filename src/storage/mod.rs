//! # Storage Layer
//!
//! Persistence seam for the journey core. The [`JourneyStore`] trait covers
//! the reads the orchestrator and scheduler need; [`JourneyTx`] is the
//! transactional surface the transition ledger commits through. The ledger's
//! atomicity guarantee (check-key → load → write → insert, all or nothing)
//! holds for every implementation: Postgres via a real transaction, the
//! in-memory store via a staged clone swapped in on commit.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::journey::states::CustomerStatus;
use crate::models::{
    CallLog, CallLogUpdate, CallMode, CampaignJob, CampaignJobStatus, Customer, CustomerChanges,
    CustomerTransition, NewCallLog, NewCampaignJob, NewCustomerTransition, ProviderConfig,
    ProviderKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::InMemoryJourneyStore;
pub use postgres::PgJourneyStore;

/// Candidate selection parameters for a batch run.
#[derive(Debug, Clone)]
pub struct BatchCandidateQuery {
    /// Statuses allowed into this batch (the settings' eligible set).
    pub statuses: Vec<CustomerStatus>,
    /// Customers whose `next_follow_up_at` is null or at/before this instant
    /// are due.
    pub now: DateTime<Utc>,
    /// Campaign-wide retry ceiling; `None` defers to each customer's own
    /// `max_retries`.
    pub max_retries: Option<i32>,
    pub limit: i64,
}

/// Result of attempting to append a ledger row. A duplicate key is an
/// expected outcome, not an error: it is how concurrent idempotent callers
/// lose the race cleanly.
#[derive(Debug)]
pub enum TransitionInsert {
    Inserted(CustomerTransition),
    DuplicateKey,
}

/// Transactional handle for a single ledger commit. All writes staged
/// through one `JourneyTx` become visible atomically at [`JourneyTx::commit`];
/// dropping the handle without committing discards them.
#[async_trait]
pub trait JourneyTx: Send {
    /// Look up an existing ledger row by idempotency key, seeing staged
    /// writes within this transaction.
    async fn find_transition_by_key(&mut self, key: &str) -> Result<Option<CustomerTransition>>;

    /// Load a customer with a row lock, optionally scoped to a tenant.
    /// A tenant mismatch reads as "not found".
    async fn lock_customer(
        &mut self,
        customer_id: Uuid,
        tenant_id: Option<Uuid>,
    ) -> Result<Option<Customer>>;

    /// Write the customer's new status plus any explicitly-present field
    /// changes; absent fields are preserved.
    async fn update_customer(
        &mut self,
        customer_id: Uuid,
        status: CustomerStatus,
        changes: &CustomerChanges,
    ) -> Result<()>;

    /// Append a ledger row. Unique-key conflicts report
    /// [`TransitionInsert::DuplicateKey`] rather than erroring.
    async fn insert_transition(&mut self, row: NewCustomerTransition) -> Result<TransitionInsert>;

    /// Insert a call log row atomically with the transition.
    async fn insert_call_log(&mut self, row: NewCallLog) -> Result<CallLog>;

    /// Make all staged writes visible.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Read/write surface of the journey core's persistence.
#[async_trait]
pub trait JourneyStore: Send + Sync {
    /// Open a ledger transaction.
    async fn begin(&self) -> Result<Box<dyn JourneyTx>>;

    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>>;

    async fn find_transition_by_key(&self, key: &str) -> Result<Option<CustomerTransition>>;

    /// Transition history for a customer, oldest first.
    async fn list_transitions(&self, customer_id: Uuid) -> Result<Vec<CustomerTransition>>;

    /// Most recent transition for a customer.
    async fn latest_transition(&self, customer_id: Uuid) -> Result<Option<CustomerTransition>>;

    /// Number of ledger rows landing in the given status, across all
    /// customers. Feeds campaign dashboards.
    async fn count_transitions_to(&self, to_status: CustomerStatus) -> Result<i64>;

    /// Customers eligible for the next batch, ordered by
    /// (`next_follow_up_at` asc nulls last, `created_at` asc).
    async fn select_batch_candidates(&self, query: &BatchCandidateQuery)
        -> Result<Vec<Customer>>;

    /// Number of call attempts of the given mode started at or after `since`.
    async fn calls_placed_since(&self, mode: CallMode, since: DateTime<Utc>) -> Result<i64>;

    async fn find_call_log(&self, call_log_id: Uuid) -> Result<Option<CallLog>>;

    async fn find_call_log_by_provider_call_id(
        &self,
        provider_call_id: &str,
    ) -> Result<Option<CallLog>>;

    /// Apply a partial update to a call log. Returns the updated row, or
    /// `None` when the log does not exist.
    async fn update_call_log(&self, update: &CallLogUpdate) -> Result<Option<CallLog>>;

    async fn record_campaign_job(&self, job: NewCampaignJob) -> Result<CampaignJob>;

    async fn update_campaign_job_status(
        &self,
        job_id: i64,
        status: CampaignJobStatus,
    ) -> Result<Option<CampaignJob>>;

    /// Enabled provider configs for one router, unordered; ordering is the
    /// router's concern.
    async fn list_enabled_providers(&self, kind: ProviderKind) -> Result<Vec<ProviderConfig>>;

    /// Customers parked in `call_failed` with `manual_review` set, for the
    /// admin review list.
    async fn list_manual_review(&self, limit: i64) -> Result<Vec<Customer>>;
}
