//! # Customer Transition Model
//!
//! Append-only audit record of customer status changes, and the source of
//! truth for "did this side effect already happen."
//!
//! ## Overview
//!
//! Every status change the automation core makes goes through the transition
//! ledger, which writes exactly one row per logical operation. The
//! `transition_key` column carries a deterministic hash of the operation's
//! identity and is unique: a duplicate key is detected inside the ledger
//! transaction and collapses to a no-op, which is what makes retried webhook
//! deliveries and duplicate enqueues safe.
//!
//! ## Database Schema
//!
//! Maps to the `customer_transitions` table:
//! - `id`: Primary key (BIGSERIAL)
//! - `customer_id`: The customer this row belongs to (UUID)
//! - `from_status` / `to_status`: Journey states (VARCHAR)
//! - `transition_key`: Deterministic operation hash (VARCHAR, unique index)
//! - `source`: Who initiated the change (manual / ai_automation / system)
//! - `metadata`: JSONB operation context

use crate::journey::states::CustomerStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Who initiated a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "transition_source", rename_all = "snake_case")]
pub enum TransitionSource {
    Manual,
    AiAutomation,
    System,
}

impl std::fmt::Display for TransitionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::AiAutomation => write!(f, "ai_automation"),
            Self::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CustomerTransition {
    pub id: i64,
    pub customer_id: Uuid,
    pub from_status: Option<CustomerStatus>,
    pub to_status: CustomerStatus,
    pub reason: String,
    pub source: TransitionSource,
    pub transition_key: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// New transition for creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomerTransition {
    pub customer_id: Uuid,
    pub from_status: Option<CustomerStatus>,
    pub to_status: CustomerStatus,
    pub reason: String,
    pub source: TransitionSource,
    pub transition_key: String,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_display() {
        assert_eq!(TransitionSource::AiAutomation.to_string(), "ai_automation");
        assert_eq!(TransitionSource::Manual.to_string(), "manual");
    }

    #[test]
    fn test_source_serde() {
        let json = serde_json::to_string(&TransitionSource::System).unwrap();
        assert_eq!(json, "\"system\"");
    }
}
