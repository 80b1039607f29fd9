//! Passive per-source counters and per-job history.
//!
//! One `MetricsRecorder` is constructed per process (or per run) and handed to
//! the orchestrator, each adapter invocation and the cross-reference engine as
//! an `Arc`. Nothing reads it back to make decisions.

use crate::types::{JobRunSummary, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counters for a single source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounters {
    /// Requests issued
    pub requests: u64,
    /// Successful responses
    pub successes: u64,
    /// Transport faults and non-success statuses
    pub failures: u64,
    /// 403/429 responses
    pub blocks: u64,
    /// Pages carrying a CAPTCHA marker
    pub captcha_hits: u64,
    /// Records yielded to the caller
    pub records: u64,
}

#[derive(Debug, Default)]
struct MetricsState {
    sources: BTreeMap<SourceId, SourceCounters>,
    jobs: Vec<JobRunSummary>,
}

/// Thread-safe metrics sink shared by all components of a run.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    state: Mutex<MetricsState>,
}

impl MetricsRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        // Counters stay meaningful even if a holder panicked mid-update.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, source: &SourceId, f: impl FnOnce(&mut SourceCounters)) {
        let mut state = self.lock();
        f(state.sources.entry(source.clone()).or_default());
    }

    /// Count an outbound request.
    pub fn record_request(&self, source: &SourceId) {
        self.update(source, |c| c.requests += 1);
    }

    /// Count a successful response.
    pub fn record_success(&self, source: &SourceId) {
        self.update(source, |c| c.successes += 1);
    }

    /// Count a failed request (transport fault or unexpected status).
    pub fn record_failure(&self, source: &SourceId) {
        self.update(source, |c| c.failures += 1);
    }

    /// Count a 403/429 block response.
    pub fn record_block(&self, source: &SourceId) {
        self.update(source, |c| {
            c.failures += 1;
            c.blocks += 1;
        });
    }

    /// Count a CAPTCHA page.
    pub fn record_captcha(&self, source: &SourceId) {
        self.update(source, |c| c.captcha_hits += 1);
    }

    /// Count records yielded by a source.
    pub fn record_records(&self, source: &SourceId, count: usize) {
        self.update(source, |c| c.records += count as u64);
    }

    /// Append a finished job to the history.
    pub fn record_job(&self, summary: JobRunSummary) {
        self.lock().jobs.push(summary);
    }

    /// Counters for one source (zeroes if never seen).
    #[must_use]
    pub fn source(&self, source: &SourceId) -> SourceCounters {
        self.lock().sources.get(source).copied().unwrap_or_default()
    }

    /// Counters for every source seen so far, ordered by id.
    #[must_use]
    pub fn sources(&self) -> BTreeMap<SourceId, SourceCounters> {
        self.lock().sources.clone()
    }

    /// All recorded job summaries, oldest first.
    #[must_use]
    pub fn jobs(&self) -> Vec<JobRunSummary> {
        self.lock().jobs.clone()
    }
}
