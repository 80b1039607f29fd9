//! Run lifecycle notifications.

use crate::progress::{JobProgress, SourceRunResult};
use serde::Serialize;
use tokio::sync::mpsc;

/// Receives lifecycle notifications from a run.
///
/// Every method defaults to a no-op. For a given source,
/// `on_source_started` always precedes its `on_source_completed` or
/// `on_source_failed`.
pub trait JobObserver: Send + Sync {
    /// The run resolved its sources and is about to start.
    fn on_run_started(&self, _job_id: &str, _total: usize) {}

    /// A source's search is starting.
    fn on_source_started(&self, _source_id: &str) {}

    /// A source finished without failing (completed or skipped).
    fn on_source_completed(&self, _result: &SourceRunResult) {}

    /// A source failed.
    fn on_source_failed(&self, _result: &SourceRunResult) {}

    /// The run finished.
    fn on_run_completed(&self, _progress: &JobProgress) {}
}

/// Owned form of a lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// Run started
    RunStarted {
        /// Run identifier
        job_id: String,
        /// Sources selected
        total: usize,
    },
    /// Source started
    SourceStarted {
        /// Source identifier
        source_id: String,
    },
    /// Source completed or was skipped
    SourceCompleted(SourceRunResult),
    /// Source failed
    SourceFailed(SourceRunResult),
    /// Run completed
    RunCompleted(Box<JobProgress>),
}

/// Forwards notifications as [`JobEvent`]s over an unbounded channel.
///
/// Sends after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiver it feeds.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}

impl JobObserver for ChannelObserver {
    fn on_run_started(&self, job_id: &str, total: usize) {
        self.send(JobEvent::RunStarted {
            job_id: job_id.to_string(),
            total,
        });
    }

    fn on_source_started(&self, source_id: &str) {
        self.send(JobEvent::SourceStarted {
            source_id: source_id.to_string(),
        });
    }

    fn on_source_completed(&self, result: &SourceRunResult) {
        self.send(JobEvent::SourceCompleted(result.clone()));
    }

    fn on_source_failed(&self, result: &SourceRunResult) {
        self.send(JobEvent::SourceFailed(result.clone()));
    }

    fn on_run_completed(&self, progress: &JobProgress) {
        self.send(JobEvent::RunCompleted(Box::new(progress.clone())));
    }
}
