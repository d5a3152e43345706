//! Cycle orchestration: which delegates to reconstruct, in what pool, and what
//! happens to the results.

use std::sync::Arc;
use std::time::Duration;

use rewards_chain::ChainSource;
use rewards_store::{DelegationStateStore, StoredDelegationState};
use rewards_types::{Address, Cycle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collector::Collector;
use crate::config::CollectorConfig;
use crate::fetch_state::{FetchCoordinator, FetchGuard};
use crate::parallel_processor::ParallelProcessor;
use crate::CollectorError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Recompute states that are already stored.
    pub force: bool,
    /// Log every applied ledger entry.
    pub debug: bool,
}

/// Outcome of one [`Engine::fetch_cycle`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub cycle: Cycle,
    /// Reconstructed and persisted.
    pub stored: Vec<Address>,
    /// Already in the store.
    pub skipped: Vec<Address>,
    /// Being reconstructed by another worker.
    pub in_flight: Vec<Address>,
    /// No recorded minimum, or the minimum was never crossed.
    pub ineligible: Vec<Address>,
    pub failed: Vec<(Address, String)>,
    pub pruned: usize,
    pub cancelled: bool,
}

impl FetchReport {
    fn new(cycle: Cycle) -> Self {
        Self {
            cycle,
            ..Self::default()
        }
    }

    /// Every delegate of the cycle was handled and nothing needs a retry.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.in_flight.is_empty() && !self.cancelled
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub parallelism: usize,
    pub poll_interval: Duration,
    pub max_catch_up_cycles: u32,
}

impl EngineSettings {
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self {
            parallelism: config.parallelism,
            poll_interval: config.poll_interval(),
            max_catch_up_cycles: config.max_catch_up_cycles,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&CollectorConfig::default())
    }
}

/// Reconstructs whole cycles and persists the results.
pub struct Engine<C, S> {
    collector: Collector<C>,
    store: Arc<S>,
    coordinator: Arc<FetchCoordinator>,
    processor: ParallelProcessor,
    settings: EngineSettings,
}

impl<C, S> Engine<C, S>
where
    C: ChainSource + 'static,
    S: DelegationStateStore + 'static,
{
    pub fn new(
        chain: Arc<C>,
        store: Arc<S>,
        coordinator: Arc<FetchCoordinator>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            collector: Collector::new(chain),
            store,
            coordinator,
            processor: ParallelProcessor::new(settings.parallelism),
            settings,
        }
    }

    pub fn collector(&self) -> &Collector<C> {
        &self.collector
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<FetchCoordinator> {
        &self.coordinator
    }

    /// Reconstruct and store every active delegate of `cycle`.
    ///
    /// Per-delegate failures are collected in the report; only failing to list
    /// the delegates, or a store error while pruning, fails the whole pass.
    pub async fn fetch_cycle(
        &self,
        cycle: Cycle,
        options: FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<FetchReport, CollectorError> {
        let delegates = self
            .collector
            .get_active_delegates_from_cycle(cycle, cancel)
            .await?;
        let mut report = FetchReport::new(cycle);

        let mut work: Vec<(Address, FetchGuard)> = Vec::with_capacity(delegates.len());
        for delegate in delegates {
            if !options.force && self.store.exists(&delegate, cycle)? {
                debug!(delegate = %delegate, cycle, "already stored");
                report.skipped.push(delegate);
                continue;
            }
            match self.coordinator.begin(cycle, &delegate) {
                Some(guard) => work.push((delegate, guard)),
                None => {
                    debug!(delegate = %delegate, cycle, "already being fetched");
                    report.in_flight.push(delegate);
                }
            }
        }

        let order: Vec<Address> = work.iter().map(|(d, _)| d.clone()).collect();
        let collector = self.collector.clone();
        let store = Arc::clone(&self.store);
        let task_cancel = cancel.clone();
        let debug_ledger = options.debug;

        let results = self
            .processor
            .run(work, move |(delegate, guard)| {
                let collector = collector.clone();
                let store = Arc::clone(&store);
                let cancel = task_cancel.clone();
                async move {
                    let _guard = guard;
                    let mut state = collector
                        .reconstruct(&delegate, cycle, debug_ledger, &cancel)
                        .await?;
                    // Stored under the cycle it was requested for, so the
                    // existence check of the next pass finds it.
                    if state.cycle != cycle {
                        debug!(
                            delegate = %delegate,
                            cycle,
                            recorded_cycle = state.cycle,
                            "minimum recorded under another cycle"
                        );
                        state.cycle = cycle;
                    }
                    store.upsert(&StoredDelegationState::from_state(state))?;
                    Ok(())
                }
            })
            .await;

        for (delegate, result) in order.into_iter().zip(results) {
            match result {
                Ok(()) => report.stored.push(delegate),
                Err(e) if e.is_ineligible() => {
                    debug!(delegate = %delegate, cycle, reason = %e, "delegate ineligible");
                    report.ineligible.push(delegate);
                }
                Err(e) if e.is_cancelled() => report.cancelled = true,
                Err(e) => {
                    warn!(delegate = %delegate, cycle, error = %e, "reconstruction failed");
                    report.failed.push((delegate, e.to_string()));
                }
            }
        }
        report.cancelled |= cancel.is_cancelled();

        if !report.cancelled {
            report.pruned = self.store.prune(cycle)?;
            if report.pruned > 0 {
                debug!(cycle, pruned = report.pruned, "pruned old states");
            }
        }

        if report.is_complete() {
            self.coordinator.advance_last_fetched_cycle(cycle);
        }

        info!(
            cycle,
            stored = report.stored.len(),
            skipped = report.skipped.len(),
            in_flight = report.in_flight.len(),
            ineligible = report.ineligible.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "cycle processed"
        );
        Ok(report)
    }

    /// Process every completed cycle after the last fetched one, going back at
    /// most `max_catch_up_cycles`. Stops at the first incomplete cycle so the
    /// next pass retries it.
    ///
    /// A last fetched cycle of 0 means nothing was fetched yet, so catch-up
    /// never reaches cycle 0 itself. Use [`Engine::fetch_cycle`] for it.
    pub async fn catch_up(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<FetchReport>, CollectorError> {
        let last_completed = self.collector.last_completed_cycle(cancel).await?;
        let window = Cycle::from(self.settings.max_catch_up_cycles.max(1));
        let start = (self.coordinator.last_fetched_cycle() + 1)
            .max(last_completed - window + 1)
            .max(0);

        let mut reports = Vec::new();
        for cycle in start..=last_completed {
            if cancel.is_cancelled() {
                break;
            }
            let report = self.fetch_cycle(cycle, FetchOptions::default(), cancel).await?;
            let complete = report.is_complete();
            reports.push(report);
            if !complete {
                break;
            }
        }
        Ok(reports)
    }

    /// Collect continuously until `cancel` fires.
    ///
    /// The last fetched cycle is seeded from the store first, so a restart
    /// resumes where the previous process stopped.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), CollectorError> {
        let stored = self.store.last_fetched_cycle()?;
        self.coordinator.advance_last_fetched_cycle(stored);
        info!(
            last_fetched_cycle = self.coordinator.last_fetched_cycle(),
            parallelism = self.processor.max_concurrent(),
            "collector started"
        );

        loop {
            match self.catch_up(&cancel).await {
                Ok(reports) => {
                    if let Some(last) = reports.last() {
                        debug!(cycles = reports.len(), last = last.cycle, "catch-up pass done");
                    }
                }
                Err(e) if e.is_cancelled() => break,
                Err(e) => warn!(error = %e, "collection pass failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        info!(
            last_fetched_cycle = self.coordinator.last_fetched_cycle(),
            "collector stopped"
        );
        Ok(())
    }
}
