//! # Structured Error Handling
//!
//! Layered error types for the journey core. Domain errors (customer not
//! found, archived, unregistered provider type) are distinct variants so
//! callers can route them to the retry policy or surface them directly;
//! infrastructure errors wrap their sources.

use crate::providers::router::ProviderFailure;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Customer {customer_id} not found")]
    CustomerNotFound { customer_id: uuid::Uuid },

    #[error("Customer {customer_id} is archived and excluded from automation")]
    CustomerArchived { customer_id: uuid::Uuid },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No adapter registered for provider type '{provider_type}'")]
    UnregisteredProviderType { provider_type: String },

    #[error("Provider '{provider_name}' failed: {message}")]
    Provider {
        provider_name: String,
        message: String,
    },

    #[error("All providers failed: {message}")]
    AllProvidersFailed {
        /// Message of the first failure, per the router contract.
        message: String,
        /// Per-provider failure detail, in attempt order.
        details: Vec<ProviderFailure>,
    },

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<String> for CoreError {
    fn from(msg: String) -> Self {
        Self::Configuration(msg)
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<&str> for CoreError {
    fn from(msg: &str) -> Self {
        Self::Configuration(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// True when the error is one the retry policy may act on, as opposed to
    /// a configuration or domain error that must surface to the caller.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::AllProvidersFailed { .. }
        )
    }
}
