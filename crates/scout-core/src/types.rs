//! Shared types used across LeadScout.
//!
//! This module defines common newtypes and value types that provide type safety
//! and clear domain modeling.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static SOURCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,48}[a-z0-9]$").expect("valid regex"));

/// Newtype for source (adapter) identifiers with validation.
///
/// Source IDs must be lowercase alphanumeric with hyphens, 3-50 characters,
/// e.g. `texas-bar` or `lso-ontario`. They double as the source tag written
/// alongside every upserted record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Create a new `SourceId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate source ID format: lowercase alphanumeric with hyphens, 3-50 chars.
    fn validate(id: &str) -> Result<(), CoreError> {
        if id.len() < 3 || id.len() > 50 {
            return Err(CoreError::Validation(format!(
                "invalid source ID: must be 3-50 characters, got {} characters",
                id.len()
            )));
        }

        if SOURCE_REGEX.is_match(id) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "invalid source ID: must be lowercase alphanumeric with hyphens, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase, trim and collapse internal whitespace.
///
/// Used for every comparison key in the system (locality keys, dedup keys).
#[must_use]
pub fn normalize_key_part(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A city/region unit of batched querying and caching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locality {
    /// City name; empty for a state- or province-wide search
    pub city: String,
    /// State or province code/name
    pub state: String,
    /// Country code (`US`, `CA`, `UK`, ...)
    #[serde(default)]
    pub country: String,
}

impl Locality {
    /// Create a locality for a city within a state or province.
    #[must_use]
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            state: state.into(),
            country: String::new(),
        }
    }

    /// Set the country code.
    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Normalized `(city, state)` key.
    #[must_use]
    pub fn key(&self) -> LocalityKey {
        LocalityKey::new(&self.city, &self.state)
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.city.trim().is_empty(), self.state.trim().is_empty()) {
            (false, false) => write!(f, "{}, {}", self.city.trim(), self.state.trim()),
            (false, true) => write!(f, "{}", self.city.trim()),
            (true, false) => write!(f, "{}", self.state.trim()),
            (true, true) => write!(f, "(anywhere)"),
        }
    }
}

/// Normalized `(city, stateOrProvince)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalityKey {
    /// Normalized city
    pub city: String,
    /// Normalized state or province
    pub state: String,
}

impl LocalityKey {
    /// Build a key from raw city and state strings.
    #[must_use]
    pub fn new(city: &str, state: &str) -> Self {
        Self {
            city: normalize_key_part(city),
            state: normalize_key_part(state),
        }
    }
}

impl fmt::Display for LocalityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.city, self.state)
    }
}

/// Outcome counts of one sink upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertStats {
    /// Records whose dedup key was new
    pub inserted: usize,
    /// Existing records that gained at least one field
    pub updated: usize,
    /// Existing records left untouched
    pub unchanged: usize,
}

impl UpsertStats {
    /// Total number of records considered.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    /// Accumulate another batch's counts.
    pub fn absorb(&mut self, other: UpsertStats) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }
}

/// Aggregate record of one orchestrator run, kept for trend tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunSummary {
    /// Unique run identifier
    pub id: String,
    /// When the run started
    pub started_at: Timestamp,
    /// When the run finished
    pub completed_at: Timestamp,
    /// Number of sources selected for the run
    pub total_sources: usize,
    /// Sources that produced leads
    pub completed: usize,
    /// Sources that errored or timed out
    pub failed: usize,
    /// Sources that ran cleanly but produced nothing
    pub skipped: usize,
    /// Records collected across all sources
    pub records: usize,
    /// Records carrying an email address
    pub with_email: usize,
    /// Records carrying a phone number
    pub with_phone: usize,
    /// Records carrying a website
    pub with_website: usize,
    /// Sink insert/update/unchanged totals
    pub upserts: UpsertStats,
    /// Whether the run stopped early because of `cancel()`
    pub cancelled: bool,
    /// Per-source outcomes in run order
    #[serde(default)]
    pub sources: Vec<SourceRunSummary>,
}

/// How a single source fared within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRunStatus {
    /// Ran and produced records
    Completed,
    /// Errored, timed out, or could not be resolved
    Failed,
    /// Ran cleanly but produced nothing
    Skipped,
}

impl SourceRunStatus {
    /// Parse the stored form; unknown values read as `Failed`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "skipped" => Self::Skipped,
            _ => Self::Failed,
        }
    }

    /// Stored form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for SourceRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-source line of a [`JobRunSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRunSummary {
    /// Source identifier (may be an unregistered id for resolution failures)
    pub source_id: String,
    /// Outcome
    pub status: SourceRunStatus,
    /// Failure description
    pub error: Option<String>,
    /// Records yielded by the source
    pub records: usize,
    /// Sink counts for this source's records
    pub upserts: UpsertStats,
    /// Wall-clock time spent on the source
    pub duration_ms: u64,
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, CoreError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| CoreError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Milliseconds elapsed from `earlier` to `self` (zero if negative).
    #[must_use]
    pub fn millis_since(&self, earlier: &Timestamp) -> u64 {
        u64::try_from((self.0 - earlier.0).num_milliseconds()).unwrap_or(0)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
