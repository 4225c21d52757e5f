//! # In-Memory Store
//!
//! Full [`JourneyStore`] implementation over process memory. Backs the test
//! suites and the no-database bootstrap path. Transactions clone the store
//! state while holding the store lock, stage every write against the clone,
//! and swap the clone in on commit. Dropping a transaction without
//! committing discards it, matching the rollback semantics of the Postgres
//! implementation.

use super::{BatchCandidateQuery, JourneyStore, JourneyTx, TransitionInsert};
use crate::error::{CoreError, Result};
use crate::journey::states::CustomerStatus;
use crate::models::{
    CallLog, CallLogUpdate, CallMode, CampaignJob, CampaignJobStatus, Customer, CustomerChanges,
    CustomerTransition, NewCallLog, NewCampaignJob, NewCustomer, NewCustomerTransition,
    ProviderConfig, ProviderKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryInner {
    customers: HashMap<Uuid, Customer>,
    transitions: Vec<CustomerTransition>,
    transition_seq: i64,
    call_logs: HashMap<Uuid, CallLog>,
    campaign_jobs: Vec<CampaignJob>,
    job_seq: i64,
    providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryJourneyStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl InMemoryJourneyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a customer in the initial journey state.
    pub async fn insert_customer(&self, new: NewCustomer) -> Customer {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            full_name: new.full_name,
            phone: new.phone,
            status: CustomerStatus::New,
            retry_count: 0,
            max_retries: new.max_retries,
            in_active_call: false,
            next_follow_up_at: None,
            last_contacted_at: None,
            archived_at: None,
            ai_summary: None,
            ai_intent: None,
            manual_review: false,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .customers
            .insert(customer.id, customer.clone());
        customer
    }

    /// Insert or replace a fully-specified customer record.
    pub async fn put_customer(&self, customer: Customer) {
        self.inner
            .lock()
            .await
            .customers
            .insert(customer.id, customer);
    }

    pub async fn seed_provider(&self, provider: ProviderConfig) {
        self.inner.lock().await.providers.push(provider);
    }

    /// All call logs for a customer, oldest first.
    pub async fn call_logs_for(&self, customer_id: Uuid) -> Vec<CallLog> {
        let inner = self.inner.lock().await;
        let mut logs: Vec<CallLog> = inner
            .call_logs
            .values()
            .filter(|log| log.customer_id == customer_id)
            .cloned()
            .collect();
        logs.sort_by_key(|log| log.created_at);
        logs
    }

    /// All campaign jobs recorded, oldest first.
    pub async fn campaign_jobs(&self) -> Vec<CampaignJob> {
        self.inner.lock().await.campaign_jobs.clone()
    }

    pub async fn transition_count(&self) -> usize {
        self.inner.lock().await.transitions.len()
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryInner>,
    staged: MemoryInner,
}

#[async_trait]
impl JourneyTx for MemoryTx {
    async fn find_transition_by_key(&mut self, key: &str) -> Result<Option<CustomerTransition>> {
        Ok(self
            .staged
            .transitions
            .iter()
            .find(|t| t.transition_key == key)
            .cloned())
    }

    async fn lock_customer(
        &mut self,
        customer_id: Uuid,
        tenant_id: Option<Uuid>,
    ) -> Result<Option<Customer>> {
        let customer = self.staged.customers.get(&customer_id).cloned();
        Ok(customer.filter(|c| tenant_id.map_or(true, |tenant| c.tenant_id == tenant)))
    }

    async fn update_customer(
        &mut self,
        customer_id: Uuid,
        status: CustomerStatus,
        changes: &CustomerChanges,
    ) -> Result<()> {
        let customer = self
            .staged
            .customers
            .get_mut(&customer_id)
            .ok_or(CoreError::CustomerNotFound { customer_id })?;
        customer.status = status;
        changes.apply_to(customer);
        customer.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_transition(&mut self, row: NewCustomerTransition) -> Result<TransitionInsert> {
        if self
            .staged
            .transitions
            .iter()
            .any(|t| t.transition_key == row.transition_key)
        {
            return Ok(TransitionInsert::DuplicateKey);
        }
        self.staged.transition_seq += 1;
        let transition = CustomerTransition {
            id: self.staged.transition_seq,
            customer_id: row.customer_id,
            from_status: row.from_status,
            to_status: row.to_status,
            reason: row.reason,
            source: row.source,
            transition_key: row.transition_key,
            metadata: row.metadata,
            created_at: Utc::now(),
        };
        self.staged.transitions.push(transition.clone());
        Ok(TransitionInsert::Inserted(transition))
    }

    async fn insert_call_log(&mut self, row: NewCallLog) -> Result<CallLog> {
        let now = Utc::now();
        let log = CallLog {
            id: Uuid::new_v4(),
            customer_id: row.customer_id,
            status: row.status,
            mode: row.mode,
            provider_call_id: None,
            telephony_provider_used: None,
            telephony_provider_type: None,
            ai_provider_used: row.ai_provider_used,
            transcript: None,
            summary: None,
            intent: None,
            next_action: None,
            attempt_number: row.attempt_number,
            started_at: now,
            ended_at: None,
            created_at: now,
            updated_at: now,
        };
        self.staged.call_logs.insert(log.id, log.clone());
        Ok(log)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        *this.guard = this.staged;
        Ok(())
    }
}

fn follow_up_order(a: &Customer, b: &Customer) -> Ordering {
    match (a.next_follow_up_at, b.next_follow_up_at) {
        (Some(a_at), Some(b_at)) => a_at.cmp(&b_at),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then(a.created_at.cmp(&b.created_at))
}

#[async_trait]
impl JourneyStore for InMemoryJourneyStore {
    async fn begin(&self) -> Result<Box<dyn JourneyTx>> {
        let guard = self.inner.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }

    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>> {
        Ok(self.inner.lock().await.customers.get(&customer_id).cloned())
    }

    async fn find_transition_by_key(&self, key: &str) -> Result<Option<CustomerTransition>> {
        Ok(self
            .inner
            .lock()
            .await
            .transitions
            .iter()
            .find(|t| t.transition_key == key)
            .cloned())
    }

    async fn list_transitions(&self, customer_id: Uuid) -> Result<Vec<CustomerTransition>> {
        Ok(self
            .inner
            .lock()
            .await
            .transitions
            .iter()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn latest_transition(&self, customer_id: Uuid) -> Result<Option<CustomerTransition>> {
        Ok(self
            .inner
            .lock()
            .await
            .transitions
            .iter()
            .filter(|t| t.customer_id == customer_id)
            .max_by_key(|t| t.id)
            .cloned())
    }

    async fn count_transitions_to(&self, to_status: CustomerStatus) -> Result<i64> {
        Ok(self
            .inner
            .lock()
            .await
            .transitions
            .iter()
            .filter(|t| t.to_status == to_status)
            .count() as i64)
    }

    async fn select_batch_candidates(
        &self,
        query: &BatchCandidateQuery,
    ) -> Result<Vec<Customer>> {
        let inner = self.inner.lock().await;
        let mut candidates: Vec<Customer> = inner
            .customers
            .values()
            .filter(|c| {
                !c.is_archived()
                    && !c.in_active_call
                    && query.statuses.contains(&c.status)
                    && c.retry_count < query.max_retries.unwrap_or(c.max_retries)
                    && c.next_follow_up_at.map_or(true, |at| at <= query.now)
            })
            .cloned()
            .collect();
        candidates.sort_by(follow_up_order);
        candidates.truncate(query.limit.max(0) as usize);
        Ok(candidates)
    }

    async fn calls_placed_since(&self, mode: CallMode, since: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .inner
            .lock()
            .await
            .call_logs
            .values()
            .filter(|log| log.mode == mode && log.started_at >= since)
            .count() as i64)
    }

    async fn find_call_log(&self, call_log_id: Uuid) -> Result<Option<CallLog>> {
        Ok(self.inner.lock().await.call_logs.get(&call_log_id).cloned())
    }

    async fn find_call_log_by_provider_call_id(
        &self,
        provider_call_id: &str,
    ) -> Result<Option<CallLog>> {
        Ok(self
            .inner
            .lock()
            .await
            .call_logs
            .values()
            .find(|log| log.provider_call_id.as_deref() == Some(provider_call_id))
            .cloned())
    }

    async fn update_call_log(&self, update: &CallLogUpdate) -> Result<Option<CallLog>> {
        let mut inner = self.inner.lock().await;
        match inner.call_logs.get_mut(&update.call_log_id) {
            Some(log) => {
                update.apply_to(log);
                log.updated_at = Utc::now();
                Ok(Some(log.clone()))
            }
            None => Ok(None),
        }
    }

    async fn record_campaign_job(&self, job: NewCampaignJob) -> Result<CampaignJob> {
        let mut inner = self.inner.lock().await;
        inner.job_seq += 1;
        let now = Utc::now();
        let record = CampaignJob {
            id: inner.job_seq,
            queue_job_id: job.queue_job_id,
            customer_id: job.customer_id,
            reason: job.reason,
            status: job.status,
            execution_runtime: job.execution_runtime,
            metadata: job.metadata,
            created_at: now,
            updated_at: now,
        };
        inner.campaign_jobs.push(record.clone());
        Ok(record)
    }

    async fn update_campaign_job_status(
        &self,
        job_id: i64,
        status: CampaignJobStatus,
    ) -> Result<Option<CampaignJob>> {
        let mut inner = self.inner.lock().await;
        match inner.campaign_jobs.iter_mut().find(|job| job.id == job_id) {
            Some(job) => {
                job.status = status;
                job.updated_at = Utc::now();
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_enabled_providers(&self, kind: ProviderKind) -> Result<Vec<ProviderConfig>> {
        Ok(self
            .inner
            .lock()
            .await
            .providers
            .iter()
            .filter(|p| p.kind == kind && p.enabled)
            .cloned()
            .collect())
    }

    async fn list_manual_review(&self, limit: i64) -> Result<Vec<Customer>> {
        let inner = self.inner.lock().await;
        let mut flagged: Vec<Customer> = inner
            .customers
            .values()
            .filter(|c| {
                c.status == CustomerStatus::CallFailed && c.manual_review && !c.is_archived()
            })
            .cloned()
            .collect();
        flagged.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        flagged.truncate(limit.max(0) as usize);
        Ok(flagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_customer() -> NewCustomer {
        NewCustomer {
            tenant_id: Uuid::new_v4(),
            full_name: "Test Customer".to_string(),
            phone: "+15550102".to_string(),
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = InMemoryJourneyStore::new();
        let customer = store.insert_customer(new_customer()).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.update_customer(
                customer.id,
                CustomerStatus::Calling,
                &CustomerChanges::none().with_in_active_call(true),
            )
            .await
            .unwrap();
            // Dropped without commit.
        }

        let reloaded = store.find_customer(customer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, CustomerStatus::New);
        assert!(!reloaded.in_active_call);
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let store = InMemoryJourneyStore::new();
        let customer = store.insert_customer(new_customer()).await;

        let mut tx = store.begin().await.unwrap();
        tx.update_customer(
            customer.id,
            CustomerStatus::CallPending,
            &CustomerChanges::none(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let reloaded = store.find_customer(customer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, CustomerStatus::CallPending);
    }

    #[tokio::test]
    async fn test_duplicate_transition_key_detected() {
        let store = InMemoryJourneyStore::new();
        let customer = store.insert_customer(new_customer()).await;

        let row = NewCustomerTransition {
            customer_id: customer.id,
            from_status: Some(CustomerStatus::New),
            to_status: CustomerStatus::CallPending,
            reason: "queued_for_campaign".to_string(),
            source: crate::models::TransitionSource::System,
            transition_key: "abc123".to_string(),
            metadata: None,
        };

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.insert_transition(row.clone()).await.unwrap(),
            TransitionInsert::Inserted(_)
        ));
        assert!(matches!(
            tx.insert_transition(row).await.unwrap(),
            TransitionInsert::DuplicateKey
        ));
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_candidate_ordering_prioritizes_due_retries() {
        let store = InMemoryJourneyStore::new();
        let fresh = store.insert_customer(new_customer()).await;

        let mut retry_due = store.insert_customer(new_customer()).await;
        retry_due.status = CustomerStatus::RetryScheduled;
        retry_due.next_follow_up_at = Some(Utc::now() - chrono::Duration::minutes(5));
        store.put_customer(retry_due.clone()).await;

        let query = BatchCandidateQuery {
            statuses: vec![CustomerStatus::New, CustomerStatus::RetryScheduled],
            now: Utc::now(),
            max_retries: Some(3),
            limit: 10,
        };
        let candidates = store.select_batch_candidates(&query).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, retry_due.id);
        assert_eq!(candidates[1].id, fresh.id);
    }

    #[tokio::test]
    async fn test_campaign_job_status_update() {
        let store = InMemoryJourneyStore::new();
        let customer = store.insert_customer(new_customer()).await;

        let job = store
            .record_campaign_job(crate::models::NewCampaignJob {
                queue_job_id: Some("job-0".to_string()),
                customer_id: customer.id,
                reason: "queued_for_campaign".to_string(),
                status: crate::models::CampaignJobStatus::Queued,
                execution_runtime: crate::models::ExecutionRuntime::Worker,
                metadata: None,
            })
            .await
            .unwrap();

        let updated = store
            .update_campaign_job_status(job.id, crate::models::CampaignJobStatus::Completed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, crate::models::CampaignJobStatus::Completed);

        let missing = store
            .update_campaign_job_status(9999, crate::models::CampaignJobStatus::Failed)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_candidates_exclude_not_yet_due() {
        let store = InMemoryJourneyStore::new();
        let mut future_retry = store.insert_customer(new_customer()).await;
        future_retry.status = CustomerStatus::RetryScheduled;
        future_retry.next_follow_up_at = Some(Utc::now() + chrono::Duration::hours(1));
        store.put_customer(future_retry).await;

        let query = BatchCandidateQuery {
            statuses: vec![CustomerStatus::RetryScheduled],
            now: Utc::now(),
            max_retries: Some(3),
            limit: 10,
        };
        let candidates = store.select_batch_candidates(&query).await.unwrap();
        assert!(candidates.is_empty());
    }
}
