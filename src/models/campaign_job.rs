//! # Campaign Job Model
//!
//! Queue-tracking record bridging the delivery shell (worker queue or poll
//! loop) and the orchestrator. Not itself part of the state machine; it
//! exists so operators can reconcile "what the queue thinks" with "what the
//! journey did."

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "campaign_job_status", rename_all = "snake_case")]
pub enum CampaignJobStatus {
    Queued,
    Active,
    Completed,
    Failed,
    Skipped,
}

/// How the job is delivered to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "execution_runtime", rename_all = "snake_case")]
pub enum ExecutionRuntime {
    Worker,
    Cron,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CampaignJob {
    pub id: i64,
    pub queue_job_id: Option<String>,
    pub customer_id: Uuid,
    pub reason: String,
    pub status: CampaignJobStatus,
    pub execution_runtime: ExecutionRuntime,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaignJob {
    pub queue_job_id: Option<String>,
    pub customer_id: Uuid,
    pub reason: String,
    pub status: CampaignJobStatus,
    pub execution_runtime: ExecutionRuntime,
    pub metadata: Option<serde_json::Value>,
}
