//! LeadScout Source - the adapter contract and the machinery every
//! directory source shares.
//!
//! # Architecture
//!
//! - **Contract** ([`adapter`]): `SourceAdapter`, search query/options and the
//!   cancellation + metrics context handed to every search
//! - **Signals** ([`signal`]): the tagged `SearchItem` stream element
//! - **Pagination** ([`pagination`]): the locality → page → stop state machine
//!   that turns a per-site `PageSource` into an adapter
//! - **Registry** ([`registry`], [`filter`]): registered adapters and run selection
//! - **HTTP** ([`http`]): `reqwest`-backed page fetching
//! - **Errors** ([`error`]): source-specific error types
//!
//! # Example
//!
//! ```rust
//! use scout_core::{Locality, SourceId};
//! use scout_source::{AdapterDescriptor, AdapterRegistry, SearchOptions, SourceSelection};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = AdapterDescriptor::new(SourceId::new("texas-bar")?, "State Bar of Texas", "US")
//!     .with_region("TX")
//!     .with_page_size(25);
//! assert!(descriptor.is_working());
//!
//! let options = SearchOptions::default()
//!     .with_localities(vec![Locality::new("Austin", "TX")])
//!     .with_max_pages(5);
//! assert_eq!(options.max_pages, Some(5));
//!
//! let registry = AdapterRegistry::new();
//! let resolution = registry.resolve(&SourceSelection::Explicit(vec!["texas-bar".into()]), &[]);
//! assert_eq!(resolution.unknown, vec!["texas-bar"]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod captcha;
pub mod collect;
pub mod error;
pub mod filter;
pub mod http;
pub mod pagination;
pub mod registry;
pub mod signal;

pub use adapter::{
    AdapterDescriptor, EnrichmentOptions, SearchContext, SearchOptions, SearchQuery, SearchStream,
    SourceAdapter, SourceStatus,
};
pub use collect::{collect, SearchOutcome};
pub use error::{ParseError, Result, SourceError, TransportError};
pub use filter::{AdapterFilter, SourceSelection};
pub use http::HttpFetcher;
pub use pagination::{
    PageRequest, PageSource, PaginatedSource, PaginationPolicy, ParsedPage, RawPage,
};
pub use registry::{AdapterRegistry, Resolution};
pub use signal::{ControlSignal, SearchItem, StopReason};
