#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Journey Core
//!
//! Rust implementation of the loan-CRM customer journey and AI-calling
//! campaign automation core.
//!
//! ## Overview
//!
//! The core is the state machine governing a customer's progression through
//! an automated outbound-calling campaign: idempotent ledger-driven status
//! transitions, provider failover across AI engines and telephony backends,
//! exponential retry/backoff, and bounded batch scheduling. The surrounding
//! application (HTTP handlers, admin CRUD, webhook endpoints) calls in
//! through a small operation surface (`enqueue_if_eligible`,
//! `run_call_attempt`, `complete_call`, `schedule_retry_for_failure`,
//! `run_automation_batch`) and owns everything else.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────────────────────┐
//! │ Batch        │──▶│ Eligibility │──▶│ Campaign Orchestrator        │
//! │ Scheduler    │   │ Filter      │   │  ├─ AI Router ──▶ script     │
//! └──────────────┘   └─────────────┘   │  ├─ Telephony Router ──▶ dial│
//!                                      │  └─ Transition Ledger        │
//!                                      └───────────────┬──────────────┘
//!                                        (on failure)  ▼
//!                                      ┌──────────────────────────────┐
//!                                      │ Retry Policy ─▶ re-enqueue / │
//!                                      │ terminal disposition         │
//!                                      └──────────────────────────────┘
//! ```
//!
//! ## Key Guarantees
//!
//! - **At-most-once side effects**: every status change carries a
//!   deterministic `transition_key`; duplicates collapse inside one atomic
//!   transaction.
//! - **Terminal states absorb**: `do_not_call` and `converted` swallow any
//!   further transition attempt as a no-op.
//! - **No double-dialing**: `in_active_call` is set in the same transaction
//!   that transitions to `calling` and is checked before every enqueue.
//! - **Bounded external calls**: every provider invocation runs under its
//!   configured timeout; a hung backend triggers failover, not a stalled
//!   worker.
//!
//! ## Module Organization
//!
//! - [`models`] - Customer, transition, call log, job, and settings records
//! - [`journey`] - States, ledger, eligibility, retry policy, orchestrator,
//!   scheduler
//! - [`providers`] - Adapter contract, registry, failover router
//! - [`storage`] - Store traits plus Postgres and in-memory implementations
//! - [`queue`] - Campaign queue seam and the in-process delayed queue
//! - [`execution`] - Poll (CRON) and worker delivery shells
//! - [`config`] / [`constants`] / [`error`] / [`logging`] - ambient wiring

pub mod config;
pub mod constants;
pub mod error;
pub mod execution;
pub mod journey;
pub mod logging;
pub mod models;
pub mod providers;
pub mod queue;
pub mod storage;

pub use config::CoreConfig;
pub use error::{CoreError, Result};
pub use journey::{
    calculate_backoff_ms, is_eligible_for_automation, BatchOutcome, BatchReport, BatchScheduler,
    CampaignOrchestrator, CustomerStatus, Disposition, FailureSignal, IdempotencyScope,
    RetryDecision, RetryScheduler, TransitionLedger, TransitionOutcome, TransitionRequest,
};
pub use providers::{AdapterRegistry, CallProviderAdapter, FailoverRouter, ProviderTask};
pub use storage::{InMemoryJourneyStore, JourneyStore, PgJourneyStore};
