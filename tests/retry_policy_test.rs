//! Retry policy: backoff vectors, classification, ceiling behavior, and
//! replay idempotency.

mod common;

use chrono::Utc;
use common::open_settings;
use journey_core::journey::retry::{FailureSignal, RetryDecision, RetryScheduler};
use journey_core::journey::states::CustomerStatus;
use journey_core::models::{CallStatus, ExecutionRuntime, NewCustomer};
use journey_core::queue::{DisconnectedQueue, InProcessQueue};
use journey_core::storage::{InMemoryJourneyStore, JourneyStore};
use uuid::Uuid;

async fn seeded_store() -> (InMemoryJourneyStore, journey_core::models::Customer) {
    let store = InMemoryJourneyStore::new();
    let customer = store
        .insert_customer(NewCustomer {
            tenant_id: Uuid::new_v4(),
            full_name: "Luis Ferreira".to_string(),
            phone: "+15550105".to_string(),
            max_retries: 3,
        })
        .await;
    (store, customer)
}

fn busy_signal(customer_id: Uuid, attempt: i32) -> FailureSignal {
    FailureSignal {
        customer_id,
        failure_code: "busy".to_string(),
        error_message: Some("line busy".to_string()),
        attempt,
        tenant_id: None,
    }
}

#[tokio::test]
async fn busy_at_zero_retries_schedules_two_minute_backoff() {
    let (store, customer) = seeded_store().await;
    let scheduler = RetryScheduler::new();
    let before = Utc::now();

    let decision = scheduler
        .schedule_retry_for_failure(
            &store,
            &DisconnectedQueue,
            &open_settings(),
            ExecutionRuntime::Cron,
            busy_signal(customer.id, 1),
        )
        .await
        .unwrap();

    match decision {
        RetryDecision::Scheduled {
            retry_count,
            next_follow_up_at,
            delay_ms,
            idempotent,
            queued,
        } => {
            assert_eq!(retry_count, 1);
            assert_eq!(delay_ms, 120_000);
            assert!(!idempotent);
            assert!(!queued);
            let delta = next_follow_up_at - before;
            assert!(delta >= chrono::Duration::seconds(115));
            assert!(delta <= chrono::Duration::seconds(125));
        }
        other => panic!("expected scheduled, got {other:?}"),
    }

    let reloaded = store.find_customer(customer.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CustomerStatus::RetryScheduled);
    assert_eq!(reloaded.retry_count, 1);
    assert!(reloaded.next_follow_up_at.is_some());
    assert!(!reloaded.in_active_call);
}

#[tokio::test]
async fn reaching_the_ceiling_parks_for_manual_review() {
    let (store, customer) = seeded_store().await;
    let scheduler = RetryScheduler::new();

    let mut near_limit = customer.clone();
    near_limit.retry_count = 2; // next retry would be 3 == max_retries
    store.put_customer(near_limit).await;

    let decision = scheduler
        .schedule_retry_for_failure(
            &store,
            &DisconnectedQueue,
            &open_settings(),
            ExecutionRuntime::Cron,
            busy_signal(customer.id, 3),
        )
        .await
        .unwrap();

    assert_eq!(decision, RetryDecision::MaxRetriesReached { retry_count: 3 });

    let reloaded = store.find_customer(customer.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CustomerStatus::CallFailed);
    assert!(reloaded.manual_review);
}

#[tokio::test]
async fn non_retryable_code_parks_immediately_with_call_log() {
    let (store, customer) = seeded_store().await;
    let scheduler = RetryScheduler::new();

    let decision = scheduler
        .schedule_retry_for_failure(
            &store,
            &DisconnectedQueue,
            &open_settings(),
            ExecutionRuntime::Cron,
            FailureSignal {
                customer_id: customer.id,
                failure_code: "Invalid_Number".to_string(),
                error_message: Some("number not in service".to_string()),
                attempt: 1,
                tenant_id: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(
        decision,
        RetryDecision::NonRetryable {
            failure_code: "invalid_number".to_string()
        }
    );

    let reloaded = store.find_customer(customer.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CustomerStatus::CallFailed);
    assert_eq!(reloaded.retry_count, 0); // no attempt consumed

    let logs = store.call_logs_for(customer.id).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, CallStatus::Failed);
}

#[tokio::test]
async fn replayed_signal_does_not_double_increment() {
    let (store, customer) = seeded_store().await;
    let scheduler = RetryScheduler::new();
    let settings = open_settings();

    let first = scheduler
        .schedule_retry_for_failure(
            &store,
            &DisconnectedQueue,
            &settings,
            ExecutionRuntime::Cron,
            busy_signal(customer.id, 1),
        )
        .await
        .unwrap();
    let RetryDecision::Scheduled { retry_count, .. } = first else {
        panic!("expected scheduled");
    };
    assert_eq!(retry_count, 1);

    // Same failure signal, delivered again.
    let replay = scheduler
        .schedule_retry_for_failure(
            &store,
            &DisconnectedQueue,
            &settings,
            ExecutionRuntime::Cron,
            busy_signal(customer.id, 1),
        )
        .await
        .unwrap();

    match replay {
        RetryDecision::Scheduled {
            retry_count,
            idempotent,
            ..
        } => {
            assert_eq!(retry_count, 1);
            assert!(idempotent);
        }
        other => panic!("expected scheduled, got {other:?}"),
    }

    let reloaded = store.find_customer(customer.id).await.unwrap().unwrap();
    assert_eq!(reloaded.retry_count, 1);
}

#[tokio::test]
async fn missing_customer_reports_not_scheduled() {
    let store = InMemoryJourneyStore::new();
    let scheduler = RetryScheduler::new();

    let decision = scheduler
        .schedule_retry_for_failure(
            &store,
            &DisconnectedQueue,
            &open_settings(),
            ExecutionRuntime::Cron,
            busy_signal(Uuid::new_v4(), 1),
        )
        .await
        .unwrap();

    assert_eq!(
        decision,
        RetryDecision::NotScheduled {
            reason: "customer_not_found"
        }
    );
}

#[tokio::test]
async fn worker_mode_enqueues_delayed_job_and_moves_to_call_pending() {
    let (store, customer) = seeded_store().await;
    let scheduler = RetryScheduler::new();
    let queue = InProcessQueue::new();

    let decision = scheduler
        .schedule_retry_for_failure(
            &store,
            &queue,
            &open_settings(),
            ExecutionRuntime::Worker,
            busy_signal(customer.id, 1),
        )
        .await
        .unwrap();

    match decision {
        RetryDecision::Scheduled { queued, .. } => assert!(queued),
        other => panic!("expected scheduled, got {other:?}"),
    }

    // The delayed job exists but is not yet due.
    assert_eq!(queue.len(), 1);
    assert!(queue.drain_due(Utc::now()).is_empty());

    let reloaded = store.find_customer(customer.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CustomerStatus::CallPending);
    assert_eq!(reloaded.retry_count, 1);

    let jobs = store.campaign_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].customer_id, customer.id);
}

#[tokio::test]
async fn cron_mode_leaves_pickup_to_the_poll() {
    let (store, customer) = seeded_store().await;
    let scheduler = RetryScheduler::new();
    let queue = InProcessQueue::new();

    scheduler
        .schedule_retry_for_failure(
            &store,
            &queue,
            &open_settings(),
            ExecutionRuntime::Cron,
            busy_signal(customer.id, 1),
        )
        .await
        .unwrap();

    assert!(queue.is_empty());
    let reloaded = store.find_customer(customer.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CustomerStatus::RetryScheduled);
}
