//! Job progress as seen by observers and callers.

use crate::error::SourceFailure;
use scout_core::{
    ContactField, JobRunSummary, Record, SourceRunStatus, SourceRunSummary, Timestamp, UpsertStats,
};
use scout_source::{ControlSignal, StopReason};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of running one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRunResult {
    /// Source identifier
    pub source_id: String,
    /// Completed, failed or skipped
    pub status: SourceRunStatus,
    /// Records yielded
    pub records: usize,
    /// Records carrying an email address
    pub with_email: usize,
    /// Records carrying a phone number
    pub with_phone: usize,
    /// Records carrying a website
    pub with_website: usize,
    /// Sink counts
    pub upserts: UpsertStats,
    /// Localities that ended blocked
    pub blocked_localities: usize,
    /// Whether any locality stopped before the source was exhausted
    pub truncated: bool,
    /// Failure detail when `status` is `Failed`
    pub failure: Option<SourceFailure>,
    /// Wall-clock time spent
    pub duration: Duration,
}

impl SourceRunResult {
    /// Result for a source that never ran.
    pub fn unresolved(source_id: impl Into<String>, failure: SourceFailure) -> Self {
        Self::from_tally(source_id, SourceTally::default(), Some(failure), Duration::ZERO)
    }

    /// Build a result from what was observed while the source ran.
    pub fn from_tally(
        source_id: impl Into<String>,
        tally: SourceTally,
        failure: Option<SourceFailure>,
        duration: Duration,
    ) -> Self {
        let status = match (&failure, tally.records) {
            (Some(_), _) => SourceRunStatus::Failed,
            (None, 0) => SourceRunStatus::Skipped,
            (None, _) => SourceRunStatus::Completed,
        };
        Self {
            source_id: source_id.into(),
            status,
            records: tally.records,
            with_email: tally.with_email,
            with_phone: tally.with_phone,
            with_website: tally.with_website,
            upserts: tally.upserts,
            blocked_localities: tally.blocked_localities,
            truncated: tally.truncated,
            failure,
            duration,
        }
    }

    /// Persistable form.
    #[must_use]
    pub fn to_summary(&self) -> SourceRunSummary {
        SourceRunSummary {
            source_id: self.source_id.clone(),
            status: self.status,
            error: self.failure.as_ref().map(ToString::to_string),
            records: self.records,
            upserts: self.upserts,
            duration_ms: u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Running counts for the source in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTally {
    /// Records yielded
    pub records: usize,
    /// Records carrying an email address
    pub with_email: usize,
    /// Records carrying a phone number
    pub with_phone: usize,
    /// Records carrying a website
    pub with_website: usize,
    /// Sink counts so far
    pub upserts: UpsertStats,
    /// Localities that ended blocked
    pub blocked_localities: usize,
    /// Whether any locality was cut short
    pub truncated: bool,
}

impl SourceTally {
    /// Count a yielded record.
    pub fn observe_record(&mut self, record: &Record) {
        self.records += 1;
        self.with_email += usize::from(record.has(ContactField::Email));
        self.with_phone += usize::from(record.has(ContactField::Phone));
        self.with_website += usize::from(record.has(ContactField::Website));
    }

    /// Count a control signal.
    pub fn observe_signal(&mut self, signal: &ControlSignal) {
        if let ControlSignal::LocalityFinished { stop, .. } = signal {
            if *stop == StopReason::Blocked {
                self.blocked_localities += 1;
            }
            self.truncated |= stop.is_truncated();
        }
    }
}

/// Snapshot of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Run identifier
    pub job_id: String,
    /// Sources selected (including unknown explicit ids)
    pub total: usize,
    /// Sources that produced records
    pub completed: usize,
    /// Sources that failed
    pub failed: usize,
    /// Sources that ran cleanly with nothing to show
    pub skipped: usize,
    /// Records collected so far
    pub records: usize,
    /// Records with an email address
    pub with_email: usize,
    /// Records with a phone number
    pub with_phone: usize,
    /// Records with a website
    pub with_website: usize,
    /// Sink totals
    pub upserts: UpsertStats,
    /// Source most recently started, while the run is active
    pub current_source: Option<String>,
    /// When the run started
    pub started_at: Option<Timestamp>,
    /// When the run finished
    pub completed_at: Option<Timestamp>,
    /// Whether the run is in progress
    pub running: bool,
    /// Whether `cancel()` stopped the run early
    pub cancelled: bool,
    /// Per-source results in completion order
    pub results: Vec<SourceRunResult>,
}

impl JobProgress {
    /// Fresh progress for a starting run.
    #[must_use]
    pub fn start(job_id: impl Into<String>, total: usize) -> Self {
        Self {
            job_id: job_id.into(),
            total,
            started_at: Some(Timestamp::now()),
            running: true,
            ..Self::default()
        }
    }

    /// Sources finished so far, whatever the outcome.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.completed + self.failed + self.skipped
    }

    /// Fold a finished source into the totals.
    pub fn apply(&mut self, result: SourceRunResult) {
        match result.status {
            SourceRunStatus::Completed => self.completed += 1,
            SourceRunStatus::Failed => self.failed += 1,
            SourceRunStatus::Skipped => self.skipped += 1,
        }
        self.records += result.records;
        self.with_email += result.with_email;
        self.with_phone += result.with_phone;
        self.with_website += result.with_website;
        self.upserts.absorb(result.upserts);
        self.results.push(result);
    }

    /// Mark the run finished.
    pub fn finish(&mut self, cancelled: bool) {
        self.running = false;
        self.cancelled = cancelled;
        self.current_source = None;
        self.completed_at = Some(Timestamp::now());
    }

    /// Aggregate record for the sink and metrics history.
    #[must_use]
    pub fn to_summary(&self) -> JobRunSummary {
        let started_at = self.started_at.unwrap_or_else(Timestamp::now);
        JobRunSummary {
            id: self.job_id.clone(),
            started_at,
            completed_at: self.completed_at.unwrap_or_else(Timestamp::now),
            total_sources: self.total,
            completed: self.completed,
            failed: self.failed,
            skipped: self.skipped,
            records: self.records,
            with_email: self.with_email,
            with_phone: self.with_phone,
            with_website: self.with_website,
            upserts: self.upserts,
            cancelled: self.cancelled,
            sources: self.results.iter().map(SourceRunResult::to_summary).collect(),
        }
    }
}
