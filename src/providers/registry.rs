//! # Adapter Registry
//!
//! Thread-safe mapping from provider-type tag to the adapter implementing
//! it. Registration happens once at startup; resolution is a lookup with an
//! explicit "unregistered type" error rather than a silent fallback.

use crate::error::{CoreError, Result};
use crate::providers::contract::CallProviderAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn CallProviderAdapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its provider-type tag. Re-registering a tag
    /// replaces the previous adapter.
    pub async fn register(&self, adapter: Arc<dyn CallProviderAdapter>) {
        let provider_type = adapter.provider_type().to_string();
        let mut adapters = self.adapters.write().await;
        adapters.insert(provider_type.clone(), adapter);
        info!(provider_type = %provider_type, "Registered provider adapter");
    }

    /// Resolve the adapter for a provider type.
    pub async fn resolve(&self, provider_type: &str) -> Result<Arc<dyn CallProviderAdapter>> {
        let adapters = self.adapters.read().await;
        adapters
            .get(provider_type)
            .cloned()
            .ok_or_else(|| CoreError::UnregisteredProviderType {
                provider_type: provider_type.to_string(),
            })
    }

    pub async fn is_registered(&self, provider_type: &str) -> bool {
        self.adapters.read().await.contains_key(provider_type)
    }

    pub async fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.adapters.read().await.keys().cloned().collect();
        types.sort();
        types
    }
}
