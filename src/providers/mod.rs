//! # Provider Layer
//!
//! Pluggable AI-engine and telephony backends behind a capability
//! interface: the adapter contract, the startup registry mapping
//! provider-type tags to adapters, and the failover router that sweeps
//! enabled providers in deterministic order.

pub mod contract;
pub mod registry;
pub mod router;

pub use contract::{map_telephony_status, CallProviderAdapter, ProviderTask};
pub use registry::AdapterRegistry;
pub use router::{
    resolve_order, FailoverOutcome, FailoverRouter, ProviderFailure, ProviderIdentity,
};
