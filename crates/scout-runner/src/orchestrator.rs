//! Bulk orchestrator for running many sources in one job.
//!
//! The `BulkOrchestrator` resolves which adapters to run, drives each one
//! under a deadline, pushes their records into a [`LeadSink`] in batches and
//! keeps a [`JobProgress`] snapshot that can be read while the run is going.
//! A failing, hung or empty source never aborts the run.

use crate::error::{FailureKind, Result, RunError, SourceFailure};
use crate::events::JobObserver;
use crate::progress::{JobProgress, SourceRunResult, SourceTally};
use crate::sink::LeadSink;
use futures::stream::{FuturesUnordered, StreamExt};
use scout_core::{MetricsRecorder, Record, RunnerConfig, SourceRunStatus};
use scout_source::{
    AdapterRegistry, ControlSignal, SearchContext, SearchItem, SearchOptions, SearchQuery,
    SourceAdapter, SourceSelection,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a run executes its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerPolicy {
    /// Deadline for each source
    pub source_timeout: Duration,
    /// Sources run at once
    pub concurrency: usize,
    /// Ids never picked by a `Working` selection
    pub excluded: Vec<String>,
    /// Records per sink upsert
    pub batch_size: usize,
}

impl From<&RunnerConfig> for RunnerPolicy {
    fn from(config: &RunnerConfig) -> Self {
        let secs = if config.test_mode {
            config.test_timeout_secs
        } else {
            config.source_timeout_secs
        };
        Self {
            source_timeout: Duration::from_secs(secs),
            concurrency: config.concurrency.max(1),
            excluded: config.excluded_sources.clone(),
            batch_size: config.upsert_batch_size.max(1),
        }
    }
}

impl Default for RunnerPolicy {
    fn default() -> Self {
        Self::from(&RunnerConfig::default())
    }
}

/// Inputs to a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Which sources to run
    pub selection: SourceSelection,
    /// What each source searches for
    pub query: SearchQuery,
    /// Localities, page caps and filters handed to each source
    pub search: SearchOptions,
    /// Per-source deadline overriding the policy
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            selection: SourceSelection::all_working(),
            query: SearchQuery::everyone(),
            search: SearchOptions::default(),
            timeout: None,
        }
    }
}

impl RunOptions {
    /// Run exactly these sources, in this order.
    #[must_use]
    pub fn explicit<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selection: SourceSelection::Explicit(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Set the search options.
    #[must_use]
    pub fn with_search(mut self, search: SearchOptions) -> Self {
        self.search = search;
        self
    }

    /// Override the per-source deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Clears the running flag however `run()` exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs many sources into one sink.
pub struct BulkOrchestrator {
    registry: AdapterRegistry,
    sink: Arc<dyn LeadSink>,
    metrics: Arc<MetricsRecorder>,
    policy: RunnerPolicy,
    observers: Vec<Arc<dyn JobObserver>>,
    running: AtomicBool,
    cancel_requested: AtomicBool,
    progress: RwLock<JobProgress>,
}

impl BulkOrchestrator {
    /// Create an orchestrator with the default policy.
    #[must_use]
    pub fn new(
        registry: AdapterRegistry,
        sink: Arc<dyn LeadSink>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            registry,
            sink,
            metrics,
            policy: RunnerPolicy::default(),
            observers: Vec::new(),
            running: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            progress: RwLock::new(JobProgress::default()),
        }
    }

    /// Replace the run policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RunnerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a lifecycle observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// The policy in effect.
    #[must_use]
    pub fn policy(&self) -> &RunnerPolicy {
        &self.policy
    }

    /// Whether a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Point-in-time copy of the current (or last) run's progress.
    #[must_use]
    pub fn progress(&self) -> JobProgress {
        self.progress
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ask the current run to stop before its next source.
    ///
    /// Sources already running are left to finish.
    pub fn cancel(&self) {
        if self.is_running() {
            info!("cancellation requested");
            self.cancel_requested.store(true, Ordering::SeqCst);
        }
    }

    fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    fn update_progress(&self, f: impl FnOnce(&mut JobProgress)) {
        let mut progress = self.progress.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut progress);
    }

    /// Run the selected sources and return the final progress.
    ///
    /// # Errors
    /// Returns [`RunError::AlreadyRunning`] if another run is in progress.
    /// Failures inside the run are recorded per source instead.
    pub async fn run(&self, options: RunOptions) -> Result<JobProgress> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RunError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);
        self.cancel_requested.store(false, Ordering::SeqCst);

        let resolution = self.registry.resolve(&options.selection, &self.policy.excluded);
        let job_id = uuid::Uuid::new_v4().to_string();
        let total = resolution.adapters.len() + resolution.unknown.len();
        self.update_progress(|p| *p = JobProgress::start(job_id.clone(), total));

        info!(job_id = %job_id, total, "starting run");
        for observer in &self.observers {
            observer.on_run_started(&job_id, total);
        }

        for id in resolution.unknown {
            let failure = SourceFailure::new(
                FailureKind::UnknownSource,
                format!("no adapter registered as '{id}'"),
            );
            self.finish_source(SourceRunResult::unresolved(id, failure));
        }

        let deadline = options.timeout.unwrap_or(self.policy.source_timeout);
        let mut pending = resolution.adapters.into_iter();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.policy.concurrency && !self.is_cancel_requested() {
                let Some(adapter) = pending.next() else {
                    break;
                };
                self.start_source(adapter.id().as_str());
                in_flight.push(self.run_source(adapter, &options, deadline));
            }

            match in_flight.next().await {
                Some(result) => self.finish_source(result),
                None => break,
            }
        }

        let cancelled = self.is_cancel_requested();
        let skipped_by_cancel = pending.len();
        if cancelled {
            info!(not_started = skipped_by_cancel, "run cancelled");
        }

        let mut final_progress = JobProgress::default();
        self.update_progress(|p| {
            p.finish(cancelled);
            final_progress = p.clone();
        });

        let summary = final_progress.to_summary();
        self.metrics.record_job(summary.clone());
        if let Err(e) = self.sink.record_job_run(&summary).await {
            warn!(job_id = %job_id, error = %e, "failed to record job run");
        }

        for observer in &self.observers {
            observer.on_run_completed(&final_progress);
        }
        info!(
            job_id = %job_id,
            completed = final_progress.completed,
            failed = final_progress.failed,
            skipped = final_progress.skipped,
            records = final_progress.records,
            cancelled,
            "run finished"
        );

        Ok(final_progress)
    }

    fn start_source(&self, source_id: &str) {
        info!(source = source_id, "starting source");
        self.update_progress(|p| p.current_source = Some(source_id.to_string()));
        for observer in &self.observers {
            observer.on_source_started(source_id);
        }
    }

    fn finish_source(&self, result: SourceRunResult) {
        if result.status == SourceRunStatus::Failed {
            warn!(
                source = %result.source_id,
                error = ?result.failure.as_ref().map(ToString::to_string),
                records = result.records,
                "source failed"
            );
            for observer in &self.observers {
                observer.on_source_failed(&result);
            }
        } else {
            info!(
                source = %result.source_id,
                status = %result.status,
                records = result.records,
                inserted = result.upserts.inserted,
                duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
                "source finished"
            );
            for observer in &self.observers {
                observer.on_source_completed(&result);
            }
        }
        self.update_progress(|p| p.apply(result));
    }

    /// Run one source to completion or deadline.
    async fn run_source(
        &self,
        adapter: Arc<dyn SourceAdapter>,
        options: &RunOptions,
        deadline: Duration,
    ) -> SourceRunResult {
        let source_id = adapter.id().as_str().to_string();
        let started = Instant::now();
        let token = CancellationToken::new();
        let ctx = SearchContext::new(token.clone(), Arc::clone(&self.metrics));
        let mut tally = SourceTally::default();
        let mut batch = Vec::new();

        let outcome = tokio::time::timeout(
            deadline,
            self.drain(adapter.as_ref(), options, ctx, &mut tally, &mut batch),
        )
        .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(failure)) => Some(failure),
            Err(_) => {
                token.cancel();
                warn!(source = %source_id, ?deadline, "source timed out");
                if let Err(e) = self.flush(&source_id, &mut batch, &mut tally).await {
                    warn!(source = %source_id, error = %e, "failed to store partial results");
                }
                Some(SourceFailure::new(
                    FailureKind::Timeout,
                    format!("no result within {deadline:?}"),
                ))
            }
        };

        SourceRunResult::from_tally(source_id, tally, failure, started.elapsed())
    }

    /// Pull the adapter's stream dry, upserting records in batches.
    async fn drain(
        &self,
        adapter: &dyn SourceAdapter,
        options: &RunOptions,
        ctx: SearchContext,
        tally: &mut SourceTally,
        batch: &mut Vec<Record>,
    ) -> std::result::Result<(), SourceFailure> {
        let source = adapter.id().as_str();
        let mut stream = adapter.search(options.query.clone(), options.search.clone(), ctx);

        while let Some(item) = stream.next().await {
            match item {
                Ok(SearchItem::Record(mut record)) => {
                    if record.source.is_empty() {
                        record.source = source.to_string();
                    }
                    tally.observe_record(&record);
                    batch.push(record);
                    if batch.len() >= self.policy.batch_size {
                        self.flush(source, batch, tally).await?;
                    }
                }
                Ok(SearchItem::Signal(signal)) => {
                    log_signal(source, &signal);
                    tally.observe_signal(&signal);
                }
                Err(e) => {
                    self.flush(source, batch, tally).await?;
                    return Err(SourceFailure::new(FailureKind::Adapter, e.to_string()));
                }
            }
        }

        self.flush(source, batch, tally).await
    }

    async fn flush(
        &self,
        source: &str,
        batch: &mut Vec<Record>,
        tally: &mut SourceTally,
    ) -> std::result::Result<(), SourceFailure> {
        if batch.is_empty() {
            return Ok(());
        }
        let stats = self
            .sink
            .upsert(batch, source)
            .await
            .map_err(|e| SourceFailure::new(FailureKind::Sink, e.to_string()))?;
        batch.clear();
        tally.upserts.absorb(stats);
        Ok(())
    }
}

fn log_signal(source: &str, signal: &ControlSignal) {
    match signal {
        ControlSignal::Blocked { reason, locality, page } => {
            warn!(source, %locality, page, reason = %reason, "source blocked");
        }
        ControlSignal::Placeholder { reason, .. } => {
            info!(source, reason = %reason, "source produced no usable records");
        }
        ControlSignal::Progress { index, total, locality } => {
            debug!(source, index, total, %locality, "searching locality");
        }
        ControlSignal::LocalityFinished {
            locality,
            pages,
            records,
            stop,
        } => {
            debug!(source, %locality, pages, records, stop = %stop, "locality finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_config() {
        let mut config = RunnerConfig::default();
        let normal = RunnerPolicy::from(&config);
        assert_eq!(normal.source_timeout, Duration::from_secs(30 * 60));
        assert_eq!(normal.concurrency, 1);

        config.test_mode = true;
        config.concurrency = 0;
        config.upsert_batch_size = 0;
        let test = RunnerPolicy::from(&config);
        assert_eq!(test.source_timeout, Duration::from_secs(2 * 60));
        assert_eq!(test.concurrency, 1);
        assert_eq!(test.batch_size, 1);
    }

    #[test]
    fn test_run_options_explicit() {
        let options = RunOptions::explicit(["texas-bar", "florida-bar"])
            .with_timeout(Duration::from_secs(5));
        assert_eq!(
            options.selection,
            SourceSelection::Explicit(vec!["texas-bar".into(), "florida-bar".into()])
        );
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }
}
