//! LeadScout Runner - bulk orchestration of directory sources.
//!
//! This crate runs many source adapters in one job and stores what they find.
//! Each source runs in isolation under its own deadline: errors, timeouts and
//! empty results are recorded per source and never abort the run.
//!
//! # Features
//!
//! - Explicit or "all working" source selection with country/region filters
//! - Per-source deadlines that cancel the adapter's token on expiry
//! - Batched, idempotent upserts into any [`LeadSink`] (SQLite or in-memory)
//! - Optional bounded concurrency
//! - Lifecycle notifications via [`JobObserver`] or a [`ChannelObserver`]
//! - Live [`JobProgress`] snapshots and cooperative cancellation
//!
//! # Example
//!
//! ```rust
//! use scout_core::MetricsRecorder;
//! use scout_runner::{BulkOrchestrator, MemorySink, RunOptions};
//! use scout_source::AdapterRegistry;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = BulkOrchestrator::new(
//!     AdapterRegistry::new(),
//!     Arc::new(MemorySink::new()),
//!     Arc::new(MetricsRecorder::new()),
//! );
//!
//! let progress = orchestrator.run(RunOptions::explicit(["texas-bar"])).await?;
//! assert_eq!(progress.failed, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod progress;
pub mod sink;

// Re-export commonly used types
pub use error::{FailureKind, Result, RunError, SourceFailure};
pub use events::{ChannelObserver, JobEvent, JobObserver};
pub use orchestrator::{BulkOrchestrator, RunOptions, RunnerPolicy};
pub use progress::{JobProgress, SourceRunResult, SourceTally};
pub use sink::{LeadSink, MemorySink};
