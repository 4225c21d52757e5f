//! # Automation Settings
//!
//! Singleton campaign configuration, admin-managed via read-modify-write.
//! The core consumes a snapshot: settings are loaded once per batch or
//! operation and passed by reference, never re-read mid-run, so a single
//! batch always sees one consistent view.

use crate::constants::DEFAULT_MAX_RETRIES;
use crate::journey::states::CustomerStatus;
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSettings {
    /// Master switch for the whole automation.
    pub enabled: bool,
    /// Campaign-wide retry ceiling. Zero means "defer to the customer's own
    /// `max_retries`".
    pub max_retries: i32,
    /// Upper bound of customers selected per batch run.
    pub batch_size: i64,
    /// Worker-pool concurrency bound.
    pub concurrency: usize,
    /// Maximum AI calls placed per local day.
    pub daily_cap: i64,
    /// Calls may only start inside `[working_hours_start, working_hours_end)`
    /// local time.
    pub working_hours_start: NaiveTime,
    pub working_hours_end: NaiveTime,
    /// Local timezone as a UTC offset in minutes. Named-zone resolution is
    /// the admin surface's concern; the core needs only the offset.
    pub utc_offset_minutes: i32,
    /// Customer statuses allowed into automation.
    pub eligible_statuses: HashSet<CustomerStatus>,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: DEFAULT_MAX_RETRIES,
            batch_size: 10,
            concurrency: 2,
            daily_cap: 100,
            working_hours_start: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            working_hours_end: NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
            utc_offset_minutes: 0,
            eligible_statuses: HashSet::from([
                CustomerStatus::New,
                CustomerStatus::FollowUp,
                CustomerStatus::RetryScheduled,
                CustomerStatus::CallPending,
            ]),
        }
    }
}

impl AutomationSettings {
    /// Retry ceiling for a given customer: the campaign-wide limit when set,
    /// falling back to the customer's own limit.
    pub fn effective_max_retries(&self, customer_max_retries: i32) -> i32 {
        if self.max_retries > 0 {
            self.max_retries
        } else {
            customer_max_retries
        }
    }

    /// The configured timezone as a chrono offset. Falls back to UTC when the
    /// stored offset is out of range.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("UTC offset is valid"))
    }

    /// Is `now` inside the configured working hours window, in the
    /// configured timezone? The window is half-open: `[start, end)`.
    pub fn within_working_hours(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone()).time();
        if self.working_hours_start <= self.working_hours_end {
            local >= self.working_hours_start && local < self.working_hours_end
        } else {
            // Overnight window, e.g. 20:00-04:00.
            local >= self.working_hours_start || local < self.working_hours_end
        }
    }

    /// Start of the current local day, in UTC. Daily-cap accounting counts
    /// calls since this instant.
    pub fn start_of_local_day(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let tz = self.timezone();
        let local_day = now.with_timezone(&tz).date_naive();
        match local_day
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| dt.and_local_timezone(tz).single())
        {
            Some(midnight) => midnight.with_timezone(&Utc),
            None => now, // degenerate offset; count from now rather than panic
        }
    }
}
