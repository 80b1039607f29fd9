//! LeadScout Cross-Reference - enrich leads from a directory source.
//!
//! Leads collected elsewhere are grouped by city and state; each locality is
//! fetched once from a directory adapter and cached, and every lead is
//! matched against the cached entries by Dice bigram similarity of first
//! and last names. A match only fills contact fields the lead is missing.
//!
//! # Example
//!
//! ```rust
//! use scout_xref::{dice, MatchPolicy};
//! use scout_core::Record;
//!
//! assert!((dice("smith", "smith") - 1.0).abs() < f64::EPSILON);
//!
//! let policy = MatchPolicy::default();
//! let lead = Record::named("Jane", "Doe");
//! assert!(policy.score(&lead, &Record::named("Jane", "Doe")).is_some());
//! assert!(policy.score(&lead, &Record::named("Jane", "Smith")).is_none());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod engine;
pub mod similarity;

pub use engine::{
    CrossRefOptions, CrossRefStats, CrossReferenceEngine, MatchPolicy, ProgressFn, ENRICHED_FIELDS,
};
pub use similarity::dice;
