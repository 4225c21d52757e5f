//! # Postgres Store
//!
//! sqlx-backed [`JourneyStore`] implementation. Ledger commits run inside a
//! real database transaction with the customer row locked `FOR UPDATE`; the
//! unique index on `customer_transitions.transition_key` is the authoritative
//! concurrency guard, surfaced to the ledger as
//! [`TransitionInsert::DuplicateKey`] via `ON CONFLICT DO NOTHING`.
//!
//! Schema lives in `migrations/` and is owned by the host application's
//! deployment tooling; this module assumes it is in place.

use super::{BatchCandidateQuery, JourneyStore, JourneyTx, TransitionInsert};
use crate::error::Result;
use crate::journey::states::CustomerStatus;
use crate::models::{
    CallLog, CallLogUpdate, CallMode, CampaignJob, CampaignJobStatus, Customer, CustomerChanges,
    CustomerTransition, NewCallLog, NewCampaignJob, NewCustomerTransition, ProviderConfig,
    ProviderKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

const CUSTOMER_COLUMNS: &str = "id, tenant_id, full_name, phone, status, retry_count, \
     max_retries, in_active_call, next_follow_up_at, last_contacted_at, archived_at, \
     ai_summary, ai_intent, manual_review, created_at, updated_at";

const TRANSITION_COLUMNS: &str =
    "id, customer_id, from_status, to_status, reason, source, transition_key, metadata, created_at";

const CALL_LOG_COLUMNS: &str = "id, customer_id, status, mode, provider_call_id, \
     telephony_provider_used, telephony_provider_type, ai_provider_used, transcript, summary, \
     intent, next_action, attempt_number, started_at, ended_at, created_at, updated_at";

const CAMPAIGN_JOB_COLUMNS: &str =
    "id, queue_job_id, customer_id, reason, status, execution_runtime, metadata, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgJourneyStore {
    pool: PgPool,
}

impl PgJourneyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl JourneyTx for PgTx {
    async fn find_transition_by_key(&mut self, key: &str) -> Result<Option<CustomerTransition>> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM customer_transitions WHERE transition_key = $1"
        );
        let transition = sqlx::query_as::<_, CustomerTransition>(&sql)
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(transition)
    }

    async fn lock_customer(
        &mut self,
        customer_id: Uuid,
        tenant_id: Option<Uuid>,
    ) -> Result<Option<Customer>> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2) \
             FOR UPDATE"
        );
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(customer_id)
            .bind(tenant_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(customer)
    }

    async fn update_customer(
        &mut self,
        customer_id: Uuid,
        status: CustomerStatus,
        changes: &CustomerChanges,
    ) -> Result<()> {
        let mut sets = vec!["status = $2".to_string(), "updated_at = NOW()".to_string()];
        let mut next_param = 3;
        let mut push = |column: &str| {
            let fragment = format!("{column} = ${next_param}");
            next_param += 1;
            sets.push(fragment);
        };

        if changes.retry_count.is_some() {
            push("retry_count");
        }
        if changes.in_active_call.is_some() {
            push("in_active_call");
        }
        if changes.manual_review.is_some() {
            push("manual_review");
        }
        if changes.next_follow_up_at.is_some() {
            push("next_follow_up_at");
        }
        if changes.last_contacted_at.is_some() {
            push("last_contacted_at");
        }
        if changes.ai_summary.is_some() {
            push("ai_summary");
        }
        if changes.ai_intent.is_some() {
            push("ai_intent");
        }

        let sql = format!(
            "UPDATE customers SET {} WHERE id = $1",
            sets.join(", ")
        );

        let mut query = sqlx::query(&sql).bind(customer_id).bind(status);
        if let Some(retry_count) = changes.retry_count {
            query = query.bind(retry_count);
        }
        if let Some(in_active_call) = changes.in_active_call {
            query = query.bind(in_active_call);
        }
        if let Some(manual_review) = changes.manual_review {
            query = query.bind(manual_review);
        }
        if let Some(next_follow_up_at) = changes.next_follow_up_at {
            query = query.bind(next_follow_up_at);
        }
        if let Some(last_contacted_at) = changes.last_contacted_at {
            query = query.bind(last_contacted_at);
        }
        if let Some(ref ai_summary) = changes.ai_summary {
            query = query.bind(ai_summary.clone());
        }
        if let Some(ref ai_intent) = changes.ai_intent {
            query = query.bind(ai_intent.clone());
        }

        query.execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_transition(&mut self, row: NewCustomerTransition) -> Result<TransitionInsert> {
        let sql = format!(
            "INSERT INTO customer_transitions \
             (customer_id, from_status, to_status, reason, source, transition_key, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (transition_key) DO NOTHING \
             RETURNING {TRANSITION_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, CustomerTransition>(&sql)
            .bind(row.customer_id)
            .bind(row.from_status)
            .bind(row.to_status)
            .bind(&row.reason)
            .bind(row.source)
            .bind(&row.transition_key)
            .bind(&row.metadata)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(match inserted {
            Some(transition) => TransitionInsert::Inserted(transition),
            None => TransitionInsert::DuplicateKey,
        })
    }

    async fn insert_call_log(&mut self, row: NewCallLog) -> Result<CallLog> {
        let sql = format!(
            "INSERT INTO call_logs \
             (id, customer_id, status, mode, ai_provider_used, attempt_number, started_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             RETURNING {CALL_LOG_COLUMNS}"
        );
        let log = sqlx::query_as::<_, CallLog>(&sql)
            .bind(Uuid::new_v4())
            .bind(row.customer_id)
            .bind(row.status)
            .bind(row.mode)
            .bind(&row.ai_provider_used)
            .bind(row.attempt_number)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(log)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl JourneyStore for PgJourneyStore {
    async fn begin(&self) -> Result<Box<dyn JourneyTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn find_transition_by_key(&self, key: &str) -> Result<Option<CustomerTransition>> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM customer_transitions WHERE transition_key = $1"
        );
        let transition = sqlx::query_as::<_, CustomerTransition>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(transition)
    }

    async fn list_transitions(&self, customer_id: Uuid) -> Result<Vec<CustomerTransition>> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM customer_transitions \
             WHERE customer_id = $1 ORDER BY id ASC"
        );
        let transitions = sqlx::query_as::<_, CustomerTransition>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(transitions)
    }

    async fn latest_transition(&self, customer_id: Uuid) -> Result<Option<CustomerTransition>> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM customer_transitions \
             WHERE customer_id = $1 ORDER BY id DESC LIMIT 1"
        );
        let transition = sqlx::query_as::<_, CustomerTransition>(&sql)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(transition)
    }

    async fn count_transitions_to(&self, to_status: CustomerStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM customer_transitions WHERE to_status = $1",
        )
        .bind(to_status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn select_batch_candidates(
        &self,
        query: &BatchCandidateQuery,
    ) -> Result<Vec<Customer>> {
        let statuses: Vec<String> = query.statuses.iter().map(|s| s.to_string()).collect();
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE archived_at IS NULL \
               AND in_active_call = FALSE \
               AND status::text = ANY($1) \
               AND retry_count < COALESCE($2, max_retries) \
               AND (next_follow_up_at IS NULL OR next_follow_up_at <= $3) \
             ORDER BY next_follow_up_at ASC NULLS LAST, created_at ASC \
             LIMIT $4"
        );
        let candidates = sqlx::query_as::<_, Customer>(&sql)
            .bind(&statuses)
            .bind(query.max_retries)
            .bind(query.now)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(candidates)
    }

    async fn calls_placed_since(&self, mode: CallMode, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM call_logs WHERE mode = $1 AND started_at >= $2",
        )
        .bind(mode)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_call_log(&self, call_log_id: Uuid) -> Result<Option<CallLog>> {
        let sql = format!("SELECT {CALL_LOG_COLUMNS} FROM call_logs WHERE id = $1");
        let log = sqlx::query_as::<_, CallLog>(&sql)
            .bind(call_log_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(log)
    }

    async fn find_call_log_by_provider_call_id(
        &self,
        provider_call_id: &str,
    ) -> Result<Option<CallLog>> {
        let sql = format!(
            "SELECT {CALL_LOG_COLUMNS} FROM call_logs \
             WHERE provider_call_id = $1 ORDER BY created_at DESC LIMIT 1"
        );
        let log = sqlx::query_as::<_, CallLog>(&sql)
            .bind(provider_call_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(log)
    }

    async fn update_call_log(&self, update: &CallLogUpdate) -> Result<Option<CallLog>> {
        let mut sets = vec!["updated_at = NOW()".to_string()];
        let mut next_param = 2;
        let mut push = |column: &str| {
            let fragment = format!("{column} = ${next_param}");
            next_param += 1;
            sets.push(fragment);
        };

        if update.status.is_some() {
            push("status");
        }
        if update.provider_call_id.is_some() {
            push("provider_call_id");
        }
        if update.telephony_provider_used.is_some() {
            push("telephony_provider_used");
        }
        if update.telephony_provider_type.is_some() {
            push("telephony_provider_type");
        }
        if update.ai_provider_used.is_some() {
            push("ai_provider_used");
        }
        if update.transcript.is_some() {
            push("transcript");
        }
        if update.summary.is_some() {
            push("summary");
        }
        if update.intent.is_some() {
            push("intent");
        }
        if update.next_action.is_some() {
            push("next_action");
        }
        if update.ended_at.is_some() {
            push("ended_at");
        }

        let sql = format!(
            "UPDATE call_logs SET {} WHERE id = $1 RETURNING {CALL_LOG_COLUMNS}",
            sets.join(", ")
        );

        let mut query = sqlx::query_as::<_, CallLog>(&sql).bind(update.call_log_id);
        if let Some(status) = update.status {
            query = query.bind(status);
        }
        if let Some(ref provider_call_id) = update.provider_call_id {
            query = query.bind(provider_call_id.clone());
        }
        if let Some(ref used) = update.telephony_provider_used {
            query = query.bind(used.clone());
        }
        if let Some(ref kind) = update.telephony_provider_type {
            query = query.bind(kind.clone());
        }
        if let Some(ref used) = update.ai_provider_used {
            query = query.bind(used.clone());
        }
        if let Some(ref transcript) = update.transcript {
            query = query.bind(transcript.clone());
        }
        if let Some(ref summary) = update.summary {
            query = query.bind(summary.clone());
        }
        if let Some(ref intent) = update.intent {
            query = query.bind(intent.clone());
        }
        if let Some(ref next_action) = update.next_action {
            query = query.bind(next_action.clone());
        }
        if let Some(ended_at) = update.ended_at {
            query = query.bind(ended_at);
        }

        let log = query.fetch_optional(&self.pool).await?;
        Ok(log)
    }

    async fn record_campaign_job(&self, job: NewCampaignJob) -> Result<CampaignJob> {
        let sql = format!(
            "INSERT INTO campaign_jobs \
             (queue_job_id, customer_id, reason, status, execution_runtime, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {CAMPAIGN_JOB_COLUMNS}"
        );
        let record = sqlx::query_as::<_, CampaignJob>(&sql)
            .bind(&job.queue_job_id)
            .bind(job.customer_id)
            .bind(&job.reason)
            .bind(job.status)
            .bind(job.execution_runtime)
            .bind(&job.metadata)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    async fn update_campaign_job_status(
        &self,
        job_id: i64,
        status: CampaignJobStatus,
    ) -> Result<Option<CampaignJob>> {
        let sql = format!(
            "UPDATE campaign_jobs SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {CAMPAIGN_JOB_COLUMNS}"
        );
        let record = sqlx::query_as::<_, CampaignJob>(&sql)
            .bind(job_id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_enabled_providers(&self, kind: ProviderKind) -> Result<Vec<ProviderConfig>> {
        let sql = "SELECT id, kind, name, provider_type, endpoint, api_key, priority, enabled, \
                   is_active, timeout_ms, metadata, created_at, updated_at \
                   FROM provider_configs WHERE kind = $1 AND enabled = TRUE";
        let providers = sqlx::query_as::<_, ProviderConfig>(sql)
            .bind(kind)
            .fetch_all(&self.pool)
            .await?;
        Ok(providers)
    }

    async fn list_manual_review(&self, limit: i64) -> Result<Vec<Customer>> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE status = 'call_failed' AND manual_review = TRUE AND archived_at IS NULL \
             ORDER BY updated_at DESC LIMIT $1"
        );
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }
}
