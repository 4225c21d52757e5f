//! # Provider Config Model
//!
//! Admin-managed backend configuration for the AI and telephony failover
//! routers. The core only reads enabled configs and sorts them; creation and
//! editing belong to the admin surface.
//!
//! ## Database Schema
//!
//! Maps to the `provider_configs` table:
//! - `id`: Primary key (UUID)
//! - `kind`: ai | telephony
//! - `provider_type`: Adapter registry tag (VARCHAR)
//! - `priority`: Lower is tried first
//! - `is_active`: Preferred pin; an active provider is always tried first
//!   regardless of priority

use crate::config::CoreConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which router a provider config belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "provider_kind", rename_all = "snake_case")]
pub enum ProviderKind {
    Ai,
    Telephony,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ai => write!(f, "ai"),
            Self::Telephony => write!(f, "telephony"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProviderConfig {
    pub id: Uuid,
    pub kind: ProviderKind,
    pub name: String,
    pub provider_type: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    pub is_active: bool,
    pub timeout_ms: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderConfig {
    /// Effective invocation timeout for this provider.
    pub fn effective_timeout_ms(&self, default_ms: u64) -> u64 {
        match self.timeout_ms {
            Some(ms) if ms > 0 => ms as u64,
            _ => default_ms,
        }
    }

    /// Implicit provider built from environment defaults, used when no
    /// enabled configs exist so the system is never fully unroutable. The
    /// "no admin configuration yet" bootstrap case is an explicit, testable
    /// constructor rather than a hidden special case.
    pub fn environment_default(kind: ProviderKind, config: &CoreConfig) -> Self {
        let now = Utc::now();
        let (name, provider_type, endpoint, api_key) = match kind {
            ProviderKind::Ai => (
                "env-default-ai",
                "openai_compatible",
                config.default_ai_endpoint.clone(),
                config.default_ai_api_key.clone(),
            ),
            ProviderKind::Telephony => (
                "env-default-telephony",
                "sip_gateway",
                config.default_telephony_endpoint.clone(),
                config.default_telephony_api_key.clone(),
            ),
        };
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.to_string(),
            provider_type: provider_type.to_string(),
            endpoint,
            api_key,
            priority: i32::MAX,
            enabled: true,
            is_active: false,
            timeout_ms: Some(config.provider_timeout_ms as i64),
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }
}
