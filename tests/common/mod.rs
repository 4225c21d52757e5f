//! Shared test harness: an in-memory store, an in-process queue, scriptable
//! provider adapters, and a fully wired orchestrator/scheduler stack.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use journey_core::config::CoreConfig;
use journey_core::error::{CoreError, Result};
use journey_core::journey::orchestrator::CampaignOrchestrator;
use journey_core::journey::scheduler::BatchScheduler;
use journey_core::models::{
    AutomationSettings, ExecutionRuntime, NewCustomer, ProviderConfig, ProviderKind,
};
use journey_core::providers::{AdapterRegistry, CallProviderAdapter, FailoverRouter, ProviderTask};
use journey_core::queue::InProcessQueue;
use journey_core::storage::InMemoryJourneyStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const MOCK_PROVIDER_TYPE: &str = "mock";

/// What a mock provider does when invoked.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed(serde_json::Value),
    Fail(String),
    /// Sleep past the provider timeout so the router observes a timeout.
    Hang(u64),
}

/// Scriptable adapter: behavior is looked up by (provider name, task), then
/// by provider name alone.
#[derive(Debug, Default)]
pub struct MockAdapter {
    behaviors: Mutex<HashMap<(String, Option<ProviderTask>), Behavior>>,
    pub calls: Mutex<Vec<(String, ProviderTask)>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, provider_name: &str, task: ProviderTask, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert((provider_name.to_string(), Some(task)), behavior);
    }

    pub fn set_all_tasks(&self, provider_name: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert((provider_name.to_string(), None), behavior);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn behavior_for(&self, provider_name: &str, task: ProviderTask) -> Behavior {
        let behaviors = self.behaviors.lock().unwrap();
        behaviors
            .get(&(provider_name.to_string(), Some(task)))
            .or_else(|| behaviors.get(&(provider_name.to_string(), None)))
            .cloned()
            .unwrap_or_else(|| Behavior::Fail(format!("no behavior scripted for {provider_name}")))
    }
}

#[async_trait]
impl CallProviderAdapter for MockAdapter {
    fn provider_type(&self) -> &str {
        MOCK_PROVIDER_TYPE
    }

    fn supports(&self, _task: ProviderTask) -> bool {
        true
    }

    async fn invoke(
        &self,
        task: ProviderTask,
        _payload: &serde_json::Value,
        config: &ProviderConfig,
    ) -> Result<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .push((config.name.clone(), task));
        match self.behavior_for(&config.name, task) {
            Behavior::Succeed(value) => Ok(value),
            Behavior::Fail(message) => Err(CoreError::Provider {
                provider_name: config.name.clone(),
                message,
            }),
            Behavior::Hang(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(serde_json::json!({}))
            }
        }
    }

    async fn check_connection(&self, _config: &ProviderConfig) -> Result<bool> {
        Ok(true)
    }
}

pub fn provider(
    kind: ProviderKind,
    name: &str,
    priority: i32,
    is_active: bool,
) -> ProviderConfig {
    let now = Utc::now();
    ProviderConfig {
        id: Uuid::new_v4(),
        kind,
        name: name.to_string(),
        provider_type: MOCK_PROVIDER_TYPE.to_string(),
        endpoint: "http://localhost:9".to_string(),
        api_key: None,
        priority,
        enabled: true,
        is_active,
        timeout_ms: Some(200),
        metadata: None,
        created_at: now,
        updated_at: now,
    }
}

/// Settings snapshot that always passes the enabled/working-hours gates.
pub fn open_settings() -> AutomationSettings {
    AutomationSettings {
        enabled: true,
        working_hours_start: chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        working_hours_end: chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        ..AutomationSettings::default()
    }
}

pub struct TestHarness {
    pub store: Arc<InMemoryJourneyStore>,
    pub queue: Arc<InProcessQueue>,
    pub adapter: Arc<MockAdapter>,
    pub registry: Arc<AdapterRegistry>,
    pub orchestrator: Arc<CampaignOrchestrator<InMemoryJourneyStore>>,
    pub scheduler: Arc<BatchScheduler<InMemoryJourneyStore>>,
}

impl TestHarness {
    pub async fn new(runtime: ExecutionRuntime) -> Self {
        let store = Arc::new(InMemoryJourneyStore::new());
        let queue = Arc::new(InProcessQueue::new());
        let adapter = Arc::new(MockAdapter::new());

        let registry = Arc::new(AdapterRegistry::new());
        registry.register(adapter.clone()).await;

        let config = CoreConfig::default();
        let ai_router = Arc::new(FailoverRouter::new(
            ProviderKind::Ai,
            registry.clone(),
            &config,
        ));
        let telephony_router = Arc::new(FailoverRouter::new(
            ProviderKind::Telephony,
            registry.clone(),
            &config,
        ));

        let orchestrator = Arc::new(CampaignOrchestrator::new(
            store.clone(),
            queue.clone(),
            ai_router,
            telephony_router,
            runtime,
            "http://localhost:3000/api/calls",
        ));
        let scheduler = Arc::new(BatchScheduler::new(store.clone(), orchestrator.clone()));

        Self {
            store,
            queue,
            adapter,
            registry,
            orchestrator,
            scheduler,
        }
    }

    /// Seed one AI and one telephony provider, both served by the mock
    /// adapter.
    pub async fn seed_default_providers(&self) {
        self.store
            .seed_provider(provider(ProviderKind::Ai, "ai-primary", 1, false))
            .await;
        self.store
            .seed_provider(provider(ProviderKind::Telephony, "tel-primary", 1, false))
            .await;
    }

    /// Script the happy path: script generation, dialing, and summarization
    /// all succeed.
    pub fn script_happy_path(&self, provider_call_id: &str, intent: &str) {
        self.adapter.set(
            "ai-primary",
            ProviderTask::CallScript,
            Behavior::Succeed(serde_json::json!({ "script": "Hello, this is a call script." })),
        );
        self.adapter.set(
            "ai-primary",
            ProviderTask::CallSummary,
            Behavior::Succeed(serde_json::json!({
                "summary": "Customer discussed loan options.",
                "intent": intent,
                "next_action": "send_brochure",
            })),
        );
        self.adapter.set(
            "tel-primary",
            ProviderTask::InitiateCall,
            Behavior::Succeed(serde_json::json!({ "provider_call_id": provider_call_id })),
        );
    }

    pub async fn seed_customer(&self) -> journey_core::models::Customer {
        self.store
            .insert_customer(NewCustomer {
                tenant_id: Uuid::new_v4(),
                full_name: "Priya Raman".to_string(),
                phone: "+15550103".to_string(),
                max_retries: 3,
            })
            .await
    }
}
