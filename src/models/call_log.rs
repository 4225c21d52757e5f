//! # Call Log Model
//!
//! One record per call attempt. Created by the orchestrator when a call is
//! actually placed, then updated by provider status callbacks and by the
//! call-completion flow.
//!
//! ## Database Schema
//!
//! Maps to the `call_logs` table:
//! - `id`: Primary key (UUID)
//! - `customer_id`: The customer called (UUID)
//! - `status`: Normalized telephony outcome (VARCHAR)
//! - `provider_call_id`: Vendor-side call identifier, set once dialing
//!   succeeds (VARCHAR, indexed)
//! - `attempt_number`: 1-based attempt counter within the campaign

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Normalized telephony call outcome, vendor statuses are mapped into this
/// set by each provider adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "call_status", rename_all = "snake_case")]
pub enum CallStatus {
    Initiated,
    Answered,
    NoAnswer,
    Busy,
    Failed,
    Completed,
}

impl CallStatus {
    /// Terminal call statuses: the attempt is over and outcome handling may
    /// run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NoAnswer | Self::Busy | Self::Failed | Self::Completed
        )
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initiated => write!(f, "initiated"),
            Self::Answered => write!(f, "answered"),
            Self::NoAnswer => write!(f, "no_answer"),
            Self::Busy => write!(f, "busy"),
            Self::Failed => write!(f, "failed"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Whether the attempt was placed by the automation or by a human agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "call_mode", rename_all = "snake_case")]
pub enum CallMode {
    Ai,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CallLog {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: CallStatus,
    pub mode: CallMode,
    pub provider_call_id: Option<String>,
    pub telephony_provider_used: Option<String>,
    pub telephony_provider_type: Option<String>,
    pub ai_provider_used: Option<String>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub intent: Option<String>,
    pub next_action: Option<String>,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New call log row, written atomically with its CALLING transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCallLog {
    pub customer_id: Uuid,
    pub status: CallStatus,
    pub mode: CallMode,
    pub attempt_number: i32,
    pub ai_provider_used: Option<String>,
}

/// Partial update applied by dial results and provider callbacks. Fields are
/// written only when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallLogUpdate {
    pub call_log_id: Uuid,
    pub status: Option<CallStatus>,
    pub provider_call_id: Option<String>,
    pub telephony_provider_used: Option<String>,
    pub telephony_provider_type: Option<String>,
    pub ai_provider_used: Option<String>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub intent: Option<String>,
    pub next_action: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallLogUpdate {
    pub fn for_log(call_log_id: Uuid) -> Self {
        Self {
            call_log_id,
            ..Self::default()
        }
    }

    /// Apply this update to an owned call log record in place.
    pub fn apply_to(&self, log: &mut CallLog) {
        if let Some(status) = self.status {
            log.status = status;
        }
        if let Some(ref provider_call_id) = self.provider_call_id {
            log.provider_call_id = Some(provider_call_id.clone());
        }
        if let Some(ref used) = self.telephony_provider_used {
            log.telephony_provider_used = Some(used.clone());
        }
        if let Some(ref kind) = self.telephony_provider_type {
            log.telephony_provider_type = Some(kind.clone());
        }
        if let Some(ref used) = self.ai_provider_used {
            log.ai_provider_used = Some(used.clone());
        }
        if let Some(ref transcript) = self.transcript {
            log.transcript = Some(transcript.clone());
        }
        if let Some(ref summary) = self.summary {
            log.summary = Some(summary.clone());
        }
        if let Some(ref intent) = self.intent {
            log.intent = Some(intent.clone());
        }
        if let Some(ref next_action) = self.next_action {
            log.next_action = Some(next_action.clone());
        }
        if let Some(ended_at) = self.ended_at {
            log.ended_at = Some(ended_at);
        }
    }
}
