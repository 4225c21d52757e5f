use serde::{Deserialize, Serialize};
use std::fmt;

/// Customer status definitions for the campaign journey state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "customer_status", rename_all = "snake_case")]
pub enum CustomerStatus {
    /// Initial state when a customer record is created
    New,
    /// Queued for an automated call attempt
    CallPending,
    /// A call attempt is in flight
    Calling,
    /// Completed call classified as interested
    Interested,
    /// Completed call classified as not interested
    NotInterested,
    /// Completed call requiring a later follow-up
    FollowUp,
    /// Customer converted; campaign over
    Converted,
    /// Call attempt failed terminally or exhausted retries
    CallFailed,
    /// A retry has been scheduled for a future follow-up time
    RetryScheduled,
    /// Customer must never be called again
    DoNotCall,
}

impl CustomerStatus {
    /// Check if this is a terminal (absorbing) state: once entered, any
    /// further transition attempt is a no-op.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DoNotCall | Self::Converted)
    }

    /// Check if this is an active state (a call attempt is being processed).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::CallPending | Self::Calling)
    }

    /// Check if this status represents a completed-call disposition.
    pub fn is_disposition(&self) -> bool {
        matches!(
            self,
            Self::Interested
                | Self::NotInterested
                | Self::FollowUp
                | Self::Converted
                | Self::DoNotCall
        )
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::CallPending => write!(f, "call_pending"),
            Self::Calling => write!(f, "calling"),
            Self::Interested => write!(f, "interested"),
            Self::NotInterested => write!(f, "not_interested"),
            Self::FollowUp => write!(f, "follow_up"),
            Self::Converted => write!(f, "converted"),
            Self::CallFailed => write!(f, "call_failed"),
            Self::RetryScheduled => write!(f, "retry_scheduled"),
            Self::DoNotCall => write!(f, "do_not_call"),
        }
    }
}

impl std::str::FromStr for CustomerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "call_pending" => Ok(Self::CallPending),
            "calling" => Ok(Self::Calling),
            "interested" => Ok(Self::Interested),
            "not_interested" => Ok(Self::NotInterested),
            "follow_up" => Ok(Self::FollowUp),
            "converted" => Ok(Self::Converted),
            "call_failed" => Ok(Self::CallFailed),
            "retry_scheduled" => Ok(Self::RetryScheduled),
            "do_not_call" => Ok(Self::DoNotCall),
            _ => Err(format!("Invalid customer status: {s}")),
        }
    }
}

impl Default for CustomerStatus {
    fn default() -> Self {
        Self::New
    }
}

/// Final classification of a completed call, mapped onto a customer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Interested,
    NotInterested,
    FollowUp,
    Converted,
    DoNotCall,
}

impl Disposition {
    /// The customer status this disposition lands the journey in.
    pub fn target_status(&self) -> CustomerStatus {
        match self {
            Self::Interested => CustomerStatus::Interested,
            Self::NotInterested => CustomerStatus::NotInterested,
            Self::FollowUp => CustomerStatus::FollowUp,
            Self::Converted => CustomerStatus::Converted,
            Self::DoNotCall => CustomerStatus::DoNotCall,
        }
    }

    /// Map a summarizer intent string to a disposition. Unknown intents fall
    /// back to `FollowUp` so a human picks the thread up.
    pub fn from_intent(intent: &str) -> Self {
        match intent.to_lowercase().as_str() {
            "interested" => Self::Interested,
            "not_interested" | "declined" => Self::NotInterested,
            "converted" => Self::Converted,
            "do_not_call" | "dnc" => Self::DoNotCall,
            _ => Self::FollowUp,
        }
    }
}
