//! Execution shells: the CRON poll runner and the WORKER drain loop both
//! drive the same orchestrator core.

mod common;

use common::{open_settings, TestHarness};
use journey_core::execution::{InMemorySettingsSource, PollRunner, TickOutcome, WorkerRunner};
use journey_core::journey::states::CustomerStatus;
use journey_core::models::ExecutionRuntime;
use journey_core::storage::JourneyStore;
use std::sync::Arc;

#[tokio::test]
async fn poll_tick_runs_batch_and_processes_customers_inline() {
    let harness = TestHarness::new(ExecutionRuntime::Cron).await;
    harness.seed_default_providers().await;
    harness.script_happy_path("call-300", "interested");
    let customer = harness.seed_customer().await;

    let runner = PollRunner::new(
        harness.scheduler.clone(),
        harness.orchestrator.clone(),
        Arc::new(InMemorySettingsSource::new(open_settings())),
    );

    let outcome = runner.tick().await.unwrap();
    let TickOutcome::Ran { batch, processed } = outcome else {
        panic!("expected a completed tick");
    };
    assert_eq!(batch.report().unwrap().queued, 1);
    assert_eq!(processed, 1);

    // The customer was enqueued and dialed within one tick.
    let reloaded = harness
        .store
        .find_customer(customer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, CustomerStatus::Calling);
    assert!(reloaded.in_active_call);
}

#[tokio::test]
async fn disabled_settings_tick_is_a_clean_noop() {
    let harness = TestHarness::new(ExecutionRuntime::Cron).await;
    harness.seed_customer().await;

    let mut settings = open_settings();
    settings.enabled = false;
    let runner = PollRunner::new(
        harness.scheduler.clone(),
        harness.orchestrator.clone(),
        Arc::new(InMemorySettingsSource::new(settings)),
    );

    let outcome = runner.tick().await.unwrap();
    let TickOutcome::Ran { batch, processed } = outcome else {
        panic!("expected a tick result");
    };
    assert!(batch.report().is_none());
    assert_eq!(processed, 0);
}

#[tokio::test]
async fn worker_runner_drains_due_jobs() {
    let harness = TestHarness::new(ExecutionRuntime::Worker).await;
    harness.seed_default_providers().await;
    harness.script_happy_path("call-400", "interested");
    let customer = harness.seed_customer().await;
    let settings = open_settings();

    harness
        .orchestrator
        .enqueue_if_eligible(customer.id, "automation_batch", &settings)
        .await
        .unwrap();
    assert_eq!(harness.queue.len(), 1);

    let runner = WorkerRunner::new(
        harness.queue.clone(),
        harness.orchestrator.clone(),
        Arc::new(InMemorySettingsSource::new(settings)),
    );

    let processed = runner.drain_once().await.unwrap();
    assert_eq!(processed, 1);
    assert!(harness.queue.is_empty());

    let reloaded = harness
        .store
        .find_customer(customer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, CustomerStatus::Calling);
}

#[tokio::test]
async fn empty_queue_drain_is_zero() {
    let harness = TestHarness::new(ExecutionRuntime::Worker).await;
    let runner = WorkerRunner::new(
        harness.queue.clone(),
        harness.orchestrator.clone(),
        Arc::new(InMemorySettingsSource::new(open_settings())),
    );
    assert_eq!(runner.drain_once().await.unwrap(), 0);
}
