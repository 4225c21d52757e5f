//! # Execution Shell
//!
//! Delivery mechanisms that invoke the orchestrator: the CRON-mode poll
//! runner (periodic `run_automation_batch` plus inline processing of the
//! batch's customers) and the WORKER-mode loop draining the in-process
//! delayed queue. Both paths call the same orchestrator core; the only
//! branching here is "how is this invocation triggered."
//!
//! A tick guard ensures only one poll run proceeds per interval window even
//! if a tick fires while the previous run is still in flight.

use crate::error::{CoreError, Result};
use crate::journey::orchestrator::CampaignOrchestrator;
use crate::journey::scheduler::{BatchOutcome, BatchScheduler};
use crate::models::AutomationSettings;
use crate::queue::InProcessQueue;
use crate::storage::JourneyStore;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Read seam for the admin-owned settings singleton. Runners read one
/// snapshot per tick and thread it through the whole run.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn read(&self) -> Result<AutomationSettings>;
}

/// Settings held in process memory, swapped wholesale by the admin surface.
#[derive(Debug, Default)]
pub struct InMemorySettingsSource {
    settings: RwLock<AutomationSettings>,
}

impl InMemorySettingsSource {
    pub fn new(settings: AutomationSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub async fn write(&self, settings: AutomationSettings) {
        *self.settings.write().await = settings;
    }
}

#[async_trait]
impl SettingsSource for InMemorySettingsSource {
    async fn read(&self) -> Result<AutomationSettings> {
        Ok(self.settings.read().await.clone())
    }
}

/// What one poll tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// A previous tick is still running; this one did nothing.
    Overlapped,
    /// The batch ran (or was skipped for a steady-state reason); carries the
    /// batch outcome and how many customers were processed inline.
    Ran {
        batch: BatchOutcome,
        processed: usize,
    },
}

/// CRON-mode delivery: a periodic poll that runs the batch scheduler and
/// then drives each queued customer through the orchestrator inline.
pub struct PollRunner<S: JourneyStore> {
    scheduler: Arc<BatchScheduler<S>>,
    orchestrator: Arc<CampaignOrchestrator<S>>,
    settings: Arc<dyn SettingsSource>,
    running: AtomicBool,
}

impl<S: JourneyStore + 'static> PollRunner<S> {
    pub fn new(
        scheduler: Arc<BatchScheduler<S>>,
        orchestrator: Arc<CampaignOrchestrator<S>>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            scheduler,
            orchestrator,
            settings,
            running: AtomicBool::new(false),
        }
    }

    /// Run one poll cycle. Guarded: a tick that fires while another is in
    /// flight reports [`TickOutcome::Overlapped`] without touching anything.
    pub async fn tick(&self) -> Result<TickOutcome> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(TickOutcome::Overlapped);
        }
        let result = self.tick_inner().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn tick_inner(&self) -> Result<TickOutcome> {
        let settings = self.settings.read().await?;
        let batch = self.scheduler.run_automation_batch(&settings).await?;

        let mut processed = 0;
        if let Some(report) = batch.report() {
            let concurrency = settings.concurrency.max(1);
            let outcomes: Vec<_> = stream::iter(report.queued_customer_ids.clone())
                .map(|customer_id| {
                    let orchestrator = Arc::clone(&self.orchestrator);
                    let settings = settings.clone();
                    async move {
                        orchestrator
                            .run_call_attempt(customer_id, &settings)
                            .await
                            .map_err(|err| (customer_id, err))
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome {
                    Ok(_) => processed += 1,
                    Err((customer_id, err)) => {
                        tracing::error!(
                            customer_id = %customer_id,
                            error = %err,
                            "Call attempt failed in poll run"
                        );
                    }
                }
            }
        }

        Ok(TickOutcome::Ran { batch, processed })
    }

    /// Poll on `interval` until `shutdown` flips to true.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::error!(error = %err, "Poll tick failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Poll runner shutting down");
                        return;
                    }
                }
            }
        }
    }
}

/// WORKER-mode delivery: drains due jobs from the in-process delayed queue
/// and drives each through the orchestrator, bounded by the configured
/// concurrency.
pub struct WorkerRunner<S: JourneyStore> {
    queue: Arc<InProcessQueue>,
    orchestrator: Arc<CampaignOrchestrator<S>>,
    settings: Arc<dyn SettingsSource>,
}

impl<S: JourneyStore + 'static> WorkerRunner<S> {
    pub fn new(
        queue: Arc<InProcessQueue>,
        orchestrator: Arc<CampaignOrchestrator<S>>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            settings,
        }
    }

    /// Process all currently-due jobs. Returns how many were processed.
    pub async fn drain_once(&self) -> Result<usize> {
        let jobs = self.queue.drain_due(Utc::now());
        if jobs.is_empty() {
            return Ok(0);
        }

        let settings = self.settings.read().await?;
        let concurrency = settings.concurrency.max(1);
        let results: Vec<std::result::Result<(), (uuid::Uuid, CoreError)>> =
            stream::iter(jobs)
                .map(|job| {
                    let orchestrator = Arc::clone(&self.orchestrator);
                    let settings = settings.clone();
                    async move {
                        orchestrator
                            .run_call_attempt(job.customer_id, &settings)
                            .await
                            .map(|_| ())
                            .map_err(|err| (job.customer_id, err))
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut processed = 0;
        for result in results {
            match result {
                Ok(()) => processed += 1,
                Err((customer_id, err)) => {
                    tracing::error!(
                        customer_id = %customer_id,
                        error = %err,
                        "Worker job failed"
                    );
                }
            }
        }
        Ok(processed)
    }

    /// Drain on `interval` until `shutdown` flips to true.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.drain_once().await {
                        tracing::error!(error = %err, "Worker drain failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Worker runner shutting down");
                        return;
                    }
                }
            }
        }
    }
}
