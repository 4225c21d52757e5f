//! # Customer Model
//!
//! The mutable per-customer record the campaign journey operates on.
//!
//! ## Overview
//!
//! A `Customer` is the orchestration unit of the automation core: its
//! `status` is driven exclusively through the transition ledger, and the
//! `in_active_call` flag is the per-customer concurrency guard (set
//! atomically in the same transaction that transitions to `calling`).
//!
//! ## Database Schema
//!
//! Maps to the `customers` table:
//! - `id`: Primary key (UUID)
//! - `tenant_id`: Owning tenant (UUID)
//! - `status`: Current journey status (VARCHAR, ledger-managed)
//! - `retry_count` / `max_retries`: Retry bookkeeping
//! - `next_follow_up_at`: Due time for the next automated attempt
//! - `archived_at`: Soft delete; non-null excludes the customer from all
//!   automation

use crate::journey::states::CustomerStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub status: CustomerStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub in_active_call: bool,
    pub next_follow_up_at: Option<DateTime<Utc>>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub ai_summary: Option<String>,
    pub ai_intent: Option<String>,
    pub manual_review: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Archived customers are excluded from all automation.
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// New customer for creation (without generated fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub tenant_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub max_retries: i32,
}

/// Field updates applied alongside a status transition. Each field is only
/// written when explicitly present; absent fields are preserved. Nullable
/// columns use a nested `Option` so "set to null" and "leave unchanged"
/// stay distinguishable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerChanges {
    pub retry_count: Option<i32>,
    pub in_active_call: Option<bool>,
    pub manual_review: Option<bool>,
    pub next_follow_up_at: Option<Option<DateTime<Utc>>>,
    pub last_contacted_at: Option<Option<DateTime<Utc>>>,
    pub ai_summary: Option<Option<String>>,
    pub ai_intent: Option<Option<String>>,
}

impl CustomerChanges {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_retry_count(mut self, retry_count: i32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_in_active_call(mut self, in_active_call: bool) -> Self {
        self.in_active_call = Some(in_active_call);
        self
    }

    pub fn with_manual_review(mut self, manual_review: bool) -> Self {
        self.manual_review = Some(manual_review);
        self
    }

    pub fn with_next_follow_up_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.next_follow_up_at = Some(at);
        self
    }

    pub fn with_last_contacted_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_contacted_at = Some(Some(at));
        self
    }

    pub fn with_ai_summary(mut self, summary: impl Into<String>) -> Self {
        self.ai_summary = Some(Some(summary.into()));
        self
    }

    pub fn with_ai_intent(mut self, intent: impl Into<String>) -> Self {
        self.ai_intent = Some(Some(intent.into()));
        self
    }

    /// Apply these changes to an owned customer record in place.
    pub fn apply_to(&self, customer: &mut Customer) {
        if let Some(retry_count) = self.retry_count {
            customer.retry_count = retry_count;
        }
        if let Some(in_active_call) = self.in_active_call {
            customer.in_active_call = in_active_call;
        }
        if let Some(manual_review) = self.manual_review {
            customer.manual_review = manual_review;
        }
        if let Some(ref next_follow_up_at) = self.next_follow_up_at {
            customer.next_follow_up_at = *next_follow_up_at;
        }
        if let Some(ref last_contacted_at) = self.last_contacted_at {
            customer.last_contacted_at = *last_contacted_at;
        }
        if let Some(ref ai_summary) = self.ai_summary {
            customer.ai_summary = ai_summary.clone();
        }
        if let Some(ref ai_intent) = self.ai_intent {
            customer.ai_intent = ai_intent.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.retry_count.is_none()
            && self.in_active_call.is_none()
            && self.manual_review.is_none()
            && self.next_follow_up_at.is_none()
            && self.last_contacted_at.is_none()
            && self.ai_summary.is_none()
            && self.ai_intent.is_none()
    }
}
