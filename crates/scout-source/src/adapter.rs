//! The contract every directory source implements.

use crate::error::SourceError;
use crate::signal::SearchItem;
use futures::stream::BoxStream;
use scout_core::{Locality, MetricsRecorder, Record, SourceId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Operational health of a source, maintained by hand as sites change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Returns results reliably
    Working,
    /// Returns partial results or blocks frequently
    Degraded,
    /// Currently unusable
    Broken,
}

/// Static metadata describing an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    /// Unique identifier, also used as the source tag on upserted records
    pub id: SourceId,
    /// Human-readable name
    pub name: String,
    /// Country code (`US`, `CA`, `UK`, ...)
    pub country: String,
    /// State, province or region served, if the source is regional
    pub region: Option<String>,
    /// Operational health
    pub status: SourceStatus,
    /// Locality-only directory used for cross-referencing, never bulk-scraped
    pub directory_only: bool,
    /// Nominal records per page, when the source has a fixed page size
    pub page_size: Option<usize>,
}

impl AdapterDescriptor {
    /// Create a working, bulk-capable descriptor.
    #[must_use]
    pub fn new(id: SourceId, name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            country: country.into(),
            region: None,
            status: SourceStatus::Working,
            directory_only: false,
            page_size: None,
        }
    }

    /// Set the region served.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the operational status.
    #[must_use]
    pub fn with_status(mut self, status: SourceStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the nominal page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Mark as a locality-only directory.
    #[must_use]
    pub fn directory_only(mut self) -> Self {
        self.directory_only = true;
        self
    }

    /// Whether the source is currently usable.
    #[must_use]
    pub fn is_working(&self) -> bool {
        self.status == SourceStatus::Working
    }
}

/// What to look for. Empty fields mean "everyone".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    /// Last-name filter
    pub last_name: Option<String>,
    /// First-name filter
    pub first_name: Option<String>,
    /// Practice-area filter, where the source supports one
    pub practice_area: Option<String>,
}

impl SearchQuery {
    /// Query for everyone in the target localities.
    #[must_use]
    pub fn everyone() -> Self {
        Self::default()
    }

    /// Query by name.
    #[must_use]
    pub fn by_name(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            practice_area: None,
        }
    }
}

/// Per-adapter enrichment switches. Directory-only adapters ignore them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentOptions {
    /// Follow each result to its profile page for contact details
    pub fetch_profiles: bool,
    /// Look up firm websites for records without one
    pub lookup_websites: bool,
}

/// How far and how wide to search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Target localities; empty means the adapter's own default list
    pub localities: Vec<Locality>,
    /// Page cap per locality
    pub max_pages: Option<u32>,
    /// Drop records admitted before this year (records with no known year pass)
    pub min_admission_year: Option<i32>,
    /// Enrichment sub-config
    pub enrichment: EnrichmentOptions,
}

impl SearchOptions {
    /// Restrict the search to the given localities.
    #[must_use]
    pub fn with_localities(mut self, localities: Vec<Locality>) -> Self {
        self.localities = localities;
        self
    }

    /// Cap pages per locality.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Only keep records admitted in or after `year`.
    #[must_use]
    pub fn with_min_admission_year(mut self, year: i32) -> Self {
        self.min_admission_year = Some(year);
        self
    }

    /// Whether a record passes the caller's filter.
    #[must_use]
    pub fn admits(&self, record: &Record) -> bool {
        match (self.min_admission_year, record.admission_year()) {
            (Some(min), Some(year)) => year >= min,
            _ => true,
        }
    }
}

/// Collaborators handed to every search.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    /// Cooperative cancellation, checked at locality and page boundaries
    pub cancel: CancellationToken,
    /// Shared request counters
    pub metrics: Arc<MetricsRecorder>,
}

impl SearchContext {
    /// Create a context from its parts.
    #[must_use]
    pub fn new(cancel: CancellationToken, metrics: Arc<MetricsRecorder>) -> Self {
        Self { cancel, metrics }
    }
}

/// Stream of records and control signals. An `Err` item ends the search.
pub type SearchStream<'a> = BoxStream<'a, Result<SearchItem, SourceError>>;

/// A directory source.
///
/// `search` is lazy: nothing is requested until the stream is polled, and
/// dropping the stream abandons the search. Blocking is reported in-band as
/// a `Blocked` signal rather than as an error.
pub trait SourceAdapter: Send + Sync {
    /// Static metadata.
    fn descriptor(&self) -> &AdapterDescriptor;

    /// Start a search.
    fn search(
        &self,
        query: SearchQuery,
        options: SearchOptions,
        ctx: SearchContext,
    ) -> SearchStream<'_>;

    /// Convenience accessor for the adapter id.
    fn id(&self) -> &SourceId {
        &self.descriptor().id
    }
}
