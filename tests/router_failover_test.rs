//! Failover router: resolved ordering, per-provider timeout, aggregated
//! failure detail.

mod common;

use common::{provider, Behavior, MockAdapter};
use journey_core::config::CoreConfig;
use journey_core::error::CoreError;
use journey_core::models::ProviderKind;
use journey_core::providers::{AdapterRegistry, FailoverRouter, ProviderTask};
use std::sync::Arc;

async fn router_with_adapter() -> (FailoverRouter, Arc<MockAdapter>) {
    let adapter = Arc::new(MockAdapter::new());
    let registry = Arc::new(AdapterRegistry::new());
    registry.register(adapter.clone()).await;
    let router = FailoverRouter::new(ProviderKind::Ai, registry, &CoreConfig::default());
    (router, adapter)
}

#[tokio::test]
async fn active_pin_is_tried_first_and_failover_returns_second_result() {
    let (router, adapter) = router_with_adapter().await;

    // priority 2 / inactive vs priority 1 / active: the active pin leads.
    let providers = vec![
        provider(ProviderKind::Ai, "fallback", 2, false),
        provider(ProviderKind::Ai, "pinned", 1, true),
    ];
    let resolved = router.resolve_order(providers.clone());
    assert_eq!(resolved[0].name, "pinned");
    assert_eq!(resolved[1].name, "fallback");

    adapter.set(
        "pinned",
        ProviderTask::CallScript,
        Behavior::Fail("upstream 503".to_string()),
    );
    adapter.set(
        "fallback",
        ProviderTask::CallScript,
        Behavior::Succeed(serde_json::json!({ "script": "fallback script" })),
    );

    let outcome = router
        .invoke_with_failover(providers, ProviderTask::CallScript, &serde_json::json!({}))
        .await
        .unwrap();

    assert_eq!(outcome.provider.name, "fallback");
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].provider_name, "pinned");
    assert_eq!(outcome.attempted, vec!["pinned", "fallback"]);
    assert_eq!(outcome.result["script"], "fallback script");
}

#[tokio::test]
async fn exhausted_providers_aggregate_with_first_failure_message() {
    let (router, adapter) = router_with_adapter().await;

    let providers = vec![
        provider(ProviderKind::Ai, "alpha", 1, false),
        provider(ProviderKind::Ai, "beta", 2, false),
    ];
    adapter.set(
        "alpha",
        ProviderTask::CallScript,
        Behavior::Fail("connection refused".to_string()),
    );
    adapter.set(
        "beta",
        ProviderTask::CallScript,
        Behavior::Fail("upstream 500".to_string()),
    );

    let err = router
        .invoke_with_failover(providers, ProviderTask::CallScript, &serde_json::json!({}))
        .await
        .unwrap_err();

    match err {
        CoreError::AllProvidersFailed { message, details } => {
            assert!(message.contains("connection refused"));
            assert_eq!(details.len(), 2);
            assert_eq!(details[0].provider_name, "alpha");
            assert_eq!(details[1].provider_name, "beta");
        }
        other => panic!("expected aggregated failure, got {other}"),
    }
}

#[tokio::test]
async fn hung_provider_times_out_and_fails_over() {
    let (router, adapter) = router_with_adapter().await;

    // Provider timeout is 200ms (common::provider); hang well past it.
    let providers = vec![
        provider(ProviderKind::Ai, "hung", 1, false),
        provider(ProviderKind::Ai, "healthy", 2, false),
    ];
    adapter.set("hung", ProviderTask::CallScript, Behavior::Hang(2_000));
    adapter.set(
        "healthy",
        ProviderTask::CallScript,
        Behavior::Succeed(serde_json::json!({ "script": "ok" })),
    );

    let outcome = router
        .invoke_with_failover(providers, ProviderTask::CallScript, &serde_json::json!({}))
        .await
        .unwrap();

    assert_eq!(outcome.provider.name, "healthy");
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].message.contains("timed out"));
}

#[tokio::test]
async fn unregistered_provider_type_fails_fast() {
    let registry = Arc::new(AdapterRegistry::new());
    let router = FailoverRouter::new(ProviderKind::Ai, registry, &CoreConfig::default());

    let mut unknown = provider(ProviderKind::Ai, "mystery", 1, false);
    unknown.provider_type = "unregistered_vendor".to_string();

    let err = router
        .invoke_with_failover(
            vec![unknown],
            ProviderTask::CallScript,
            &serde_json::json!({}),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::UnregisteredProviderType { .. }));
}
