//! # Provider Failover Router
//!
//! Ordered failover across the enabled backends of one kind (AI engines or
//! telephony providers).
//!
//! ## Overview
//!
//! The router resolves a deterministic attempt order (active-pinned
//! provider first regardless of priority, then ascending priority, ties
//! broken alphabetically) and tries each provider under a bounded timeout
//! until one succeeds. A hung backend costs one timeout window, never a
//! stalled worker. When every provider fails, the caller receives a single
//! aggregated error carrying per-provider detail; the orchestrator treats
//! that as a hard failure for the current call attempt and hands it to the
//! retry policy.
//!
//! When no enabled configs exist at all, the router falls back to the
//! implicit environment-default provider so the system is never fully
//! unroutable.

use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::logging::log_provider_operation;
use crate::models::{ProviderConfig, ProviderKind};
use crate::providers::contract::ProviderTask;
use crate::providers::registry::AdapterRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One provider's failure inside a failover sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider_id: Uuid,
    pub provider_name: String,
    pub message: String,
}

/// Identity of the provider that ultimately served an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub id: Uuid,
    pub name: String,
    pub provider_type: String,
}

/// Successful failover result: who served it, what they returned, and what
/// it took to get there.
#[derive(Debug, Clone)]
pub struct FailoverOutcome {
    pub provider: ProviderIdentity,
    pub result: serde_json::Value,
    /// Provider names in the order they were attempted, including the
    /// successful one.
    pub attempted: Vec<String>,
    /// Failures accumulated before the success.
    pub errors: Vec<ProviderFailure>,
}

/// Sort enabled providers into deterministic failover order:
/// (`is_active` desc, `priority` asc, `name` asc).
pub fn resolve_order(providers: Vec<ProviderConfig>) -> Vec<ProviderConfig> {
    let mut enabled: Vec<ProviderConfig> =
        providers.into_iter().filter(|p| p.enabled).collect();
    enabled.sort_by(|a, b| {
        b.is_active
            .cmp(&a.is_active)
            .then(a.priority.cmp(&b.priority))
            .then(a.name.cmp(&b.name))
    });
    enabled
}

/// Failover router for one provider kind. Two instances exist per
/// deployment: one over AI engines, one over telephony providers.
pub struct FailoverRouter {
    kind: ProviderKind,
    registry: Arc<AdapterRegistry>,
    default_timeout_ms: u64,
    fallback: ProviderConfig,
}

impl FailoverRouter {
    pub fn new(kind: ProviderKind, registry: Arc<AdapterRegistry>, config: &CoreConfig) -> Self {
        Self {
            kind,
            registry,
            default_timeout_ms: config.provider_timeout_ms,
            fallback: ProviderConfig::environment_default(kind, config),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Resolve the attempt order for this invocation. Zero enabled configs
    /// falls back to the environment-default provider.
    pub fn resolve_order(&self, providers: Vec<ProviderConfig>) -> Vec<ProviderConfig> {
        let ordered = resolve_order(providers);
        if ordered.is_empty() {
            tracing::debug!(
                kind = %self.kind,
                fallback = %self.fallback.name,
                "No enabled providers configured; using environment default"
            );
            vec![self.fallback.clone()]
        } else {
            ordered
        }
    }

    /// Try each provider in resolved order until one serves the task.
    ///
    /// Adapter resolution failures (unregistered type) and unsupported
    /// capabilities are configuration errors and fail fast; transient
    /// invocation failures and timeouts advance to the next provider.
    pub async fn invoke_with_failover(
        &self,
        providers: Vec<ProviderConfig>,
        task: ProviderTask,
        payload: &serde_json::Value,
    ) -> Result<FailoverOutcome> {
        let ordered = self.resolve_order(providers);
        let mut attempted = Vec::with_capacity(ordered.len());
        let mut errors: Vec<ProviderFailure> = Vec::new();

        for provider in &ordered {
            let adapter = self.registry.resolve(&provider.provider_type).await?;
            if !adapter.supports(task) {
                return Err(CoreError::Configuration(format!(
                    "provider type '{}' does not support {task}",
                    provider.provider_type
                )));
            }

            attempted.push(provider.name.clone());
            let timeout_ms = provider.effective_timeout_ms(self.default_timeout_ms);
            let started = std::time::Instant::now();

            let invocation = adapter.invoke(task, payload, provider);
            match tokio::time::timeout(Duration::from_millis(timeout_ms), invocation).await {
                Ok(Ok(result)) => {
                    log_provider_operation(
                        &self.kind.to_string(),
                        &provider.name,
                        &task.to_string(),
                        "success",
                        Some(started.elapsed().as_millis() as u64),
                    );
                    return Ok(FailoverOutcome {
                        provider: ProviderIdentity {
                            id: provider.id,
                            name: provider.name.clone(),
                            provider_type: provider.provider_type.clone(),
                        },
                        result,
                        attempted,
                        errors,
                    });
                }
                Ok(Err(err)) => {
                    log_provider_operation(
                        &self.kind.to_string(),
                        &provider.name,
                        &task.to_string(),
                        "failure",
                        Some(started.elapsed().as_millis() as u64),
                    );
                    errors.push(ProviderFailure {
                        provider_id: provider.id,
                        provider_name: provider.name.clone(),
                        message: err.to_string(),
                    });
                }
                Err(_) => {
                    log_provider_operation(
                        &self.kind.to_string(),
                        &provider.name,
                        &task.to_string(),
                        "timeout",
                        Some(timeout_ms),
                    );
                    errors.push(ProviderFailure {
                        provider_id: provider.id,
                        provider_name: provider.name.clone(),
                        message: format!("timed out after {timeout_ms}ms"),
                    });
                }
            }
        }

        let message = errors
            .first()
            .map(|failure| failure.message.clone())
            .unwrap_or_else(|| "no providers available".to_string());
        Err(CoreError::AllProvidersFailed {
            message,
            details: errors,
        })
    }

    /// Connectivity probe against the first provider in resolved order that
    /// supports it.
    pub async fn check_connection(&self, providers: Vec<ProviderConfig>) -> Result<bool> {
        let ordered = self.resolve_order(providers);
        for provider in &ordered {
            let adapter = self.registry.resolve(&provider.provider_type).await?;
            if !adapter.supports(ProviderTask::CheckConnection) {
                continue;
            }
            let timeout_ms = provider.effective_timeout_ms(self.default_timeout_ms);
            let probe = adapter.check_connection(provider);
            match tokio::time::timeout(Duration::from_millis(timeout_ms), probe).await {
                Ok(Ok(healthy)) => return Ok(healthy),
                Ok(Err(_)) | Err(_) => continue,
            }
        }
        Ok(false)
    }
}
