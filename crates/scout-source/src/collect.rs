//! Draining a search stream into memory.

use crate::adapter::SearchStream;
use crate::error::Result;
use crate::signal::{ControlSignal, SearchItem, StopReason};
use futures::TryStreamExt;
use scout_core::Record;

/// Everything a search produced, split by tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Records in stream order
    pub records: Vec<Record>,
    /// Control signals in stream order
    pub signals: Vec<ControlSignal>,
}

impl SearchOutcome {
    /// Whether any locality was blocked.
    #[must_use]
    pub fn blocked(&self) -> bool {
        self.signals
            .iter()
            .any(|s| matches!(s, ControlSignal::Blocked { .. }))
    }

    /// Stop reason of every finished locality, in order.
    #[must_use]
    pub fn stops(&self) -> Vec<StopReason> {
        self.signals
            .iter()
            .filter_map(|s| match s {
                ControlSignal::LocalityFinished { stop, .. } => Some(*stop),
                _ => None,
            })
            .collect()
    }

    /// Whether the source may hold more than was collected.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.stops().into_iter().any(StopReason::is_truncated)
    }

    /// Whether the search ended with a placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.signals
            .iter()
            .any(|s| matches!(s, ControlSignal::Placeholder { .. }))
    }
}

/// Drain `stream`, stopping at the first error.
pub async fn collect(stream: SearchStream<'_>) -> Result<SearchOutcome> {
    stream
        .try_fold(SearchOutcome::default(), |mut outcome, item| async move {
            match item {
                SearchItem::Record(record) => outcome.records.push(record),
                SearchItem::Signal(signal) => outcome.signals.push(signal),
            }
            Ok(outcome)
        })
        .await
}
