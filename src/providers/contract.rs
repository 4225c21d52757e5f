//! # Provider Adapter Contract
//!
//! Capability-typed interface every AI-engine and telephony backend plugs in
//! through. One adapter implementation exists per vendor integration,
//! selected at runtime by `ProviderConfig.provider_type`; new backend types
//! plug in without touching the router or the orchestrator.

use crate::error::Result;
use crate::models::{CallStatus, ProviderConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Operations the routers dispatch to adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTask {
    /// Build the call script for a customer (AI).
    CallScript,
    /// Summarize and classify a completed call transcript (AI).
    CallSummary,
    /// Place an outbound call (telephony).
    InitiateCall,
    /// Connectivity probe for the admin "test provider" surface.
    CheckConnection,
}

impl std::fmt::Display for ProviderTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CallScript => write!(f, "call_script"),
            Self::CallSummary => write!(f, "call_summary"),
            Self::InitiateCall => write!(f, "initiate_call"),
            Self::CheckConnection => write!(f, "check_connection"),
        }
    }
}

/// One vendor integration. Implementations are registered once at startup
/// under their `provider_type` tag and resolved per invocation.
#[async_trait]
pub trait CallProviderAdapter: std::fmt::Debug + Send + Sync {
    /// Registry tag this adapter serves; must match
    /// `ProviderConfig.provider_type`.
    fn provider_type(&self) -> &str;

    /// Capability check. The router only dispatches tasks the adapter
    /// supports.
    fn supports(&self, task: ProviderTask) -> bool;

    /// Execute one task against the vendor. The router bounds this call with
    /// the provider's configured timeout; implementations do not need their
    /// own outer deadline.
    async fn invoke(
        &self,
        task: ProviderTask,
        payload: &serde_json::Value,
        config: &ProviderConfig,
    ) -> Result<serde_json::Value>;

    /// Map a vendor-specific delivery status onto the normalized set.
    fn map_status(&self, provider_status: &str) -> CallStatus {
        map_telephony_status(provider_status)
    }

    /// Connectivity probe.
    async fn check_connection(&self, config: &ProviderConfig) -> Result<bool>;
}

/// Vendor-neutral fallback mapping for telephony delivery statuses. Adapters
/// override [`CallProviderAdapter::map_status`] when a vendor's vocabulary
/// diverges.
pub fn map_telephony_status(provider_status: &str) -> CallStatus {
    match provider_status.trim().to_lowercase().as_str() {
        "initiated" | "queued" | "ringing" | "in-progress" => CallStatus::Initiated,
        "answered" | "in_call" => CallStatus::Answered,
        "completed" | "ended" | "hangup" => CallStatus::Completed,
        "busy" => CallStatus::Busy,
        "no-answer" | "no_answer" | "noanswer" | "unanswered" => CallStatus::NoAnswer,
        _ => CallStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_covers_common_vocabulary() {
        assert_eq!(map_telephony_status("Completed"), CallStatus::Completed);
        assert_eq!(map_telephony_status("no-answer"), CallStatus::NoAnswer);
        assert_eq!(map_telephony_status("BUSY"), CallStatus::Busy);
        assert_eq!(map_telephony_status("ringing"), CallStatus::Initiated);
        assert_eq!(map_telephony_status("gibberish"), CallStatus::Failed);
    }

    #[test]
    fn test_task_display() {
        assert_eq!(ProviderTask::CallScript.to_string(), "call_script");
        assert_eq!(ProviderTask::InitiateCall.to_string(), "initiate_call");
    }
}
