use crate::constants::DEFAULT_PROVIDER_TIMEOUT_MS;
use crate::error::{CoreError, Result};
use std::collections::HashMap;

/// Process-level configuration resolved once at startup from the
/// environment. Campaign behavior (caps, hours, eligible statuses) lives in
/// [`crate::models::AutomationSettings`], which is admin-managed data; this
/// struct only carries infrastructure wiring and the environment-default
/// provider credentials used when no provider configs exist yet.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    pub provider_timeout_ms: u64,
    pub default_ai_endpoint: String,
    pub default_ai_api_key: Option<String>,
    pub default_telephony_endpoint: String,
    pub default_telephony_api_key: Option<String>,
    pub callback_base_url: String,
    pub custom_settings: HashMap<String, String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/journey_core_development".to_string(),
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            default_ai_endpoint: "http://localhost:8089/v1".to_string(),
            default_ai_api_key: None,
            default_telephony_endpoint: "http://localhost:8090".to_string(),
            default_telephony_api_key: None,
            callback_base_url: "http://localhost:3000/api/calls".to_string(),
            custom_settings: HashMap::new(),
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(timeout) = std::env::var("JOURNEY_PROVIDER_TIMEOUT_MS") {
            config.provider_timeout_ms = timeout.parse().map_err(|e| {
                CoreError::Configuration(format!("Invalid provider_timeout_ms: {e}"))
            })?;
        }

        if let Ok(endpoint) = std::env::var("JOURNEY_DEFAULT_AI_ENDPOINT") {
            config.default_ai_endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("JOURNEY_DEFAULT_AI_API_KEY") {
            config.default_ai_api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("JOURNEY_DEFAULT_TELEPHONY_ENDPOINT") {
            config.default_telephony_endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("JOURNEY_DEFAULT_TELEPHONY_API_KEY") {
            config.default_telephony_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("JOURNEY_CALLBACK_BASE_URL") {
            config.callback_base_url = url;
        }

        Ok(config)
    }
}
