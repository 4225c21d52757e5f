//! # System Constants
//!
//! Core constants and defaults that define the operational boundaries of the
//! campaign automation system: backoff bounds, provider timeouts, and the
//! failure-code vocabulary shared between the telephony callbacks and the
//! retry policy.

/// Backoff base delay: one minute, doubled per retry attempt.
pub const BACKOFF_BASE_MS: u64 = 60_000;

/// Backoff ceiling: four hours.
pub const BACKOFF_CAP_MS: u64 = 4 * 3600 * 1000;

/// Default bounded timeout for a single provider invocation.
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 12_000;

/// Default retry ceiling when neither settings nor customer specify one.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Failure codes emitted by the telephony/AI legs and consumed by the retry
/// policy. Codes are normalized to lowercase before comparison.
pub mod failure_codes {
    pub const TELEPHONY_FAILURE: &str = "telephony_failure";
    pub const AI_TIMEOUT: &str = "ai_timeout";
    pub const NO_ANSWER: &str = "no_answer";
    pub const BUSY: &str = "busy";
    pub const NETWORK_ERROR: &str = "network_error";
    pub const FAILED: &str = "failed";

    /// The set of codes the retry policy will reschedule. Anything else is a
    /// terminal call failure.
    pub const RETRYABLE: [&str; 6] = [
        TELEPHONY_FAILURE,
        AI_TIMEOUT,
        NO_ANSWER,
        BUSY,
        NETWORK_ERROR,
        FAILED,
    ];
}

/// Transition reasons recorded on ledger rows. Kept as constants so reasons
/// stay greppable across the ledger, orchestrator, and retry policy.
pub mod transition_reasons {
    pub const QUEUED: &str = "queued_for_campaign";
    pub const CALL_STARTED: &str = "call_started";
    pub const CALL_COMPLETED: &str = "call_completed";
    pub const RETRY_SCHEDULED: &str = "retry_scheduled";
    pub const NON_RETRYABLE_FAILURE: &str = "non_retryable_failure";
    pub const MAX_RETRIES_REACHED: &str = "max_retries_reached";
    pub const MANUAL_RESET: &str = "manual_reset";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_set_membership() {
        assert!(failure_codes::RETRYABLE.contains(&"busy"));
        assert!(failure_codes::RETRYABLE.contains(&"no_answer"));
        assert!(!failure_codes::RETRYABLE.contains(&"invalid_number"));
    }

    #[test]
    fn test_backoff_bounds() {
        assert_eq!(BACKOFF_BASE_MS, 60_000);
        assert_eq!(BACKOFF_CAP_MS, 14_400_000);
    }
}
