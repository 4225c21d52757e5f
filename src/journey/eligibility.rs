//! # Eligibility Filter
//!
//! Pure predicate deciding whether a customer may enter automation right
//! now. No side effects, callable any number of times; the scheduler uses it
//! for candidate filtering and the orchestrator re-checks it at enqueue time
//! because state may have changed in between.

use crate::models::{AutomationSettings, Customer};

/// Why a customer was rejected, for logging and skip reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibilityReason {
    Archived,
    AutomationDisabled,
    StatusNotEligible,
    DoNotCall,
    TerminalStatus,
    InActiveCall,
    RetryLimitReached,
}

impl std::fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Archived => "archived",
            Self::AutomationDisabled => "automation_disabled",
            Self::StatusNotEligible => "status_not_eligible",
            Self::DoNotCall => "do_not_call",
            Self::TerminalStatus => "terminal_status",
            Self::InActiveCall => "in_active_call",
            Self::RetryLimitReached => "retry_limit_reached",
        };
        write!(f, "{s}")
    }
}

/// Check each condition in order and report the first failure, or `None`
/// when the customer is eligible.
pub fn check_eligibility(
    customer: &Customer,
    settings: &AutomationSettings,
) -> Option<IneligibilityReason> {
    if customer.is_archived() {
        return Some(IneligibilityReason::Archived);
    }
    if !settings.enabled {
        return Some(IneligibilityReason::AutomationDisabled);
    }
    if !settings.eligible_statuses.contains(&customer.status) {
        return Some(IneligibilityReason::StatusNotEligible);
    }
    if customer.status == crate::journey::states::CustomerStatus::DoNotCall {
        return Some(IneligibilityReason::DoNotCall);
    }
    if customer.status.is_terminal() {
        return Some(IneligibilityReason::TerminalStatus);
    }
    if customer.in_active_call {
        return Some(IneligibilityReason::InActiveCall);
    }
    if customer.retry_count >= settings.effective_max_retries(customer.max_retries) {
        return Some(IneligibilityReason::RetryLimitReached);
    }
    None
}

/// Is this customer allowed into automation right now?
pub fn is_eligible_for_automation(customer: &Customer, settings: &AutomationSettings) -> bool {
    check_eligibility(customer, settings).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journey::states::CustomerStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn eligible_customer() -> Customer {
        Customer {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            full_name: "Jo Mireles".to_string(),
            phone: "+15550101".to_string(),
            status: CustomerStatus::New,
            retry_count: 0,
            max_retries: 3,
            in_active_call: false,
            next_follow_up_at: None,
            last_contacted_at: None,
            archived_at: None,
            ai_summary: None,
            ai_intent: None,
            manual_review: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn enabled_settings() -> AutomationSettings {
        AutomationSettings {
            enabled: true,
            ..AutomationSettings::default()
        }
    }

    #[test]
    fn test_new_customer_is_eligible() {
        assert!(is_eligible_for_automation(
            &eligible_customer(),
            &enabled_settings()
        ));
    }

    #[test]
    fn test_do_not_call_is_rejected() {
        let mut customer = eligible_customer();
        customer.status = CustomerStatus::DoNotCall;
        let mut settings = enabled_settings();
        // Even a misconfigured eligible set cannot let DNC through.
        settings.eligible_statuses.insert(CustomerStatus::DoNotCall);
        assert_eq!(
            check_eligibility(&customer, &settings),
            Some(IneligibilityReason::DoNotCall)
        );
    }

    #[test]
    fn test_status_outside_eligible_set_is_rejected_until_added() {
        let mut customer = eligible_customer();
        customer.status = CustomerStatus::Interested;
        let mut settings = enabled_settings();
        assert_eq!(
            check_eligibility(&customer, &settings),
            Some(IneligibilityReason::StatusNotEligible)
        );

        settings.eligible_statuses.insert(CustomerStatus::Interested);
        assert!(is_eligible_for_automation(&customer, &settings));
    }

    #[test]
    fn test_disabled_automation_rejects_everyone() {
        let mut settings = enabled_settings();
        settings.enabled = false;
        assert_eq!(
            check_eligibility(&eligible_customer(), &settings),
            Some(IneligibilityReason::AutomationDisabled)
        );
    }

    #[test]
    fn test_archived_short_circuits_first() {
        let mut customer = eligible_customer();
        customer.archived_at = Some(Utc::now());
        customer.in_active_call = true;
        let mut settings = enabled_settings();
        settings.enabled = false;
        assert_eq!(
            check_eligibility(&customer, &settings),
            Some(IneligibilityReason::Archived)
        );
    }

    #[test]
    fn test_in_active_call_is_rejected() {
        let mut customer = eligible_customer();
        customer.in_active_call = true;
        assert_eq!(
            check_eligibility(&customer, &enabled_settings()),
            Some(IneligibilityReason::InActiveCall)
        );
    }

    #[test]
    fn test_retry_limit_uses_settings_then_customer() {
        let mut customer = eligible_customer();
        customer.retry_count = 3;
        let mut settings = enabled_settings();
        settings.max_retries = 5;
        assert!(is_eligible_for_automation(&customer, &settings));

        settings.max_retries = 0; // defer to customer.max_retries (3)
        assert_eq!(
            check_eligibility(&customer, &settings),
            Some(IneligibilityReason::RetryLimitReached)
        );
    }
}
