//! Items yielded by an adapter search.
//!
//! A search stream interleaves directory records with control signals.
//! Signals are never records; consumers branch on the tag.

use scout_core::{Locality, Record};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One element of a search stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchItem {
    /// A normalized directory record
    Record(Record),
    /// An in-band control signal
    Signal(ControlSignal),
}

impl SearchItem {
    /// The record, if this item is one.
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Signal(_) => None,
        }
    }

    /// The signal, if this item is one.
    #[must_use]
    pub fn as_signal(&self) -> Option<&ControlSignal> {
        match self {
            Self::Signal(signal) => Some(signal),
            Self::Record(_) => None,
        }
    }
}

impl From<Record> for SearchItem {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<ControlSignal> for SearchItem {
    fn from(signal: ControlSignal) -> Self {
        Self::Signal(signal)
    }
}

/// Control signals emitted alongside records.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
    /// A locality is about to be searched (`index` is 1-based).
    Progress {
        /// Position of the locality in the search
        index: usize,
        /// Number of localities in the search
        total: usize,
        /// The locality being started
        locality: Locality,
    },

    /// The source refused to serve a page (CAPTCHA or persistent 403/429).
    Blocked {
        /// What the source presented
        reason: String,
        /// Locality being searched
        locality: Locality,
        /// Page that was refused
        page: u32,
    },

    /// The search produced no usable records.
    Placeholder {
        /// Why nothing was produced
        reason: String,
        /// Localities or strategies attempted
        strategies_tried: Vec<String>,
    },

    /// A locality finished, with the reason it stopped.
    LocalityFinished {
        /// The locality
        locality: Locality,
        /// Pages fetched successfully
        pages: u32,
        /// Records yielded for this locality
        records: usize,
        /// Why pagination stopped
        stop: StopReason,
    },
}

/// Why pagination of a locality stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The first page had no records
    NoResults,
    /// A page came back shorter than the nominal page size
    ShortPage,
    /// The source's reported total was reached
    TotalReached,
    /// The caller's page cap was reached; more results may exist
    PageCap,
    /// Too many consecutive empty pages
    EmptyPages,
    /// The source presented a block page
    Blocked,
    /// The rate limiter gave up after repeated failures
    GaveUp,
    /// The search was cancelled
    Cancelled,
}

impl StopReason {
    /// Whether the source may hold more results than were collected.
    #[must_use]
    pub fn is_truncated(self) -> bool {
        matches!(self, Self::PageCap | Self::Blocked | Self::GaveUp | Self::Cancelled)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoResults => "no results",
            Self::ShortPage => "short page",
            Self::TotalReached => "total reached",
            Self::PageCap => "page cap",
            Self::EmptyPages => "empty pages",
            Self::Blocked => "blocked",
            Self::GaveUp => "gave up",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
