//! Batch cross-referencing of leads against one directory source.

use crate::similarity::dice;
use scout_core::{ContactField, CrossRefConfig, Locality, LocalityKey, MetricsRecorder, Record};
use scout_source::{
    collect, SearchContext, SearchOptions, SearchQuery, SourceAdapter, StopReason,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fields a match may fill on a lead.
pub const ENRICHED_FIELDS: [ContactField; 4] = ContactField::ALL;

/// Thresholds and weights for accepting a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// Minimum last-name similarity, also the minimum combined score
    pub last_name_threshold: f64,
    /// Minimum first-name similarity
    pub first_name_threshold: f64,
    /// Weight of last-name similarity
    pub last_name_weight: f64,
    /// Weight of first-name similarity
    pub first_name_weight: f64,
    /// Page cap for each locality lookup
    pub max_pages: u32,
}

impl From<&CrossRefConfig> for MatchPolicy {
    fn from(config: &CrossRefConfig) -> Self {
        Self {
            last_name_threshold: config.last_name_threshold,
            first_name_threshold: config.first_name_threshold,
            last_name_weight: config.last_name_weight,
            first_name_weight: config.first_name_weight,
            max_pages: config.max_pages_per_locality.max(1),
        }
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::from(&CrossRefConfig::default())
    }
}

impl MatchPolicy {
    /// Combined score of a candidate, or `None` if either name falls short.
    #[must_use]
    pub fn score(&self, lead: &Record, candidate: &Record) -> Option<f64> {
        let (lead_first, lead_last) = names(lead);
        let (cand_first, cand_last) = names(candidate);

        let last = dice(lead_last, cand_last);
        if last < self.last_name_threshold {
            return None;
        }
        let first = dice(lead_first, cand_first);
        if first < self.first_name_threshold {
            return None;
        }
        Some(self.last_name_weight * last + self.first_name_weight * first)
    }

    /// Highest-scoring acceptable candidate; the earliest wins a tie.
    #[must_use]
    pub fn best_match<'c>(&self, lead: &Record, candidates: &'c [Record]) -> Option<&'c Record> {
        let mut best: Option<(&Record, f64)> = None;
        for candidate in candidates {
            let Some(score) = self.score(lead, candidate) else {
                continue;
            };
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }
        best.filter(|(_, score)| *score >= self.last_name_threshold)
            .map(|(candidate, _)| candidate)
    }
}

/// First and last name, falling back to splitting the full name.
fn names(record: &Record) -> (&str, &str) {
    let first = record.first_name.as_deref().unwrap_or("");
    let last = record.last_name.as_deref().unwrap_or("");
    if !last.trim().is_empty() {
        return (first, last);
    }
    let full = record.full_name.as_deref().unwrap_or("").trim();
    match full.rsplit_once(char::is_whitespace) {
        Some((head, tail)) => (
            if first.trim().is_empty() {
                head.split_whitespace().next().unwrap_or("")
            } else {
                first
            },
            tail,
        ),
        None => (first, full),
    }
}

/// Per-lead progress callback: `(leads done, leads total)`.
pub type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + Send + 'a>;

/// Controls for one batch.
#[derive(Default)]
pub struct CrossRefOptions<'a> {
    /// Stops the batch at the next locality or lead
    pub cancel: CancellationToken,
    /// Called after each lead is considered
    pub on_progress: Option<ProgressFn<'a>>,
    /// Page cap overriding the policy
    pub max_pages: Option<u32>,
}

impl fmt::Debug for CrossRefOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossRefOptions")
            .field("cancel", &self.cancel)
            .field("on_progress", &self.on_progress.is_some())
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

impl<'a> CrossRefOptions<'a> {
    /// Use this cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report progress after each lead.
    #[must_use]
    pub fn with_progress(mut self, f: impl FnMut(usize, usize) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Cap pages per locality lookup.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}

/// What a batch achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossRefStats {
    /// Leads matched to a directory entry
    pub matches: usize,
    /// Fields filled across all matched leads
    pub fields_filled: usize,
    /// Localities queried during this batch
    pub cities_searched: usize,
    /// Localities whose lookup errored
    pub localities_failed: usize,
    /// Whether the batch stopped early
    pub cancelled: bool,
}

/// Matches leads against one directory adapter, caching each locality.
///
/// The cache lives as long as the engine; a locality is queried at most once
/// unless its lookup failed or was cancelled.
pub struct CrossReferenceEngine {
    adapter: Arc<dyn SourceAdapter>,
    metrics: Arc<MetricsRecorder>,
    policy: MatchPolicy,
    cache: HashMap<LocalityKey, Vec<Record>>,
}

impl fmt::Debug for CrossReferenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossReferenceEngine")
            .field("adapter", &self.adapter.id().as_str())
            .field("policy", &self.policy)
            .field("cached_localities", &self.cache.len())
            .finish()
    }
}

impl CrossReferenceEngine {
    /// Create an engine over `adapter` with the default policy.
    #[must_use]
    pub fn new(adapter: Arc<dyn SourceAdapter>, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            adapter,
            metrics,
            policy: MatchPolicy::default(),
            cache: HashMap::new(),
        }
    }

    /// Replace the match policy.
    #[must_use]
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The match policy in effect.
    #[must_use]
    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Number of localities cached.
    #[must_use]
    pub fn cached_localities(&self) -> usize {
        self.cache.len()
    }

    /// Cached directory entries for a locality.
    #[must_use]
    pub fn cached(&self, key: &LocalityKey) -> Option<&[Record]> {
        self.cache.get(key).map(Vec::as_slice)
    }

    /// Drop every cached locality.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Fill empty contact fields on `leads` from their best directory match.
    ///
    /// Localities not yet cached are looked up first, in the order their
    /// leads appear. Leads without a city have no candidates.
    pub async fn batch_cross_reference(
        &mut self,
        leads: &mut [Record],
        mut options: CrossRefOptions<'_>,
    ) -> CrossRefStats {
        let mut stats = CrossRefStats::default();
        let max_pages = options.max_pages.unwrap_or(self.policy.max_pages);

        let mut pending: Vec<(LocalityKey, Locality)> = Vec::new();
        for lead in leads.iter() {
            let Some(key) = lead.locality_key() else {
                continue;
            };
            if self.cache.contains_key(&key) || pending.iter().any(|(k, _)| *k == key) {
                continue;
            }
            let locality = Locality::new(
                lead.city.as_deref().unwrap_or("").trim(),
                lead.state.as_deref().unwrap_or("").trim(),
            );
            pending.push((key, locality));
        }

        info!(
            source = %self.adapter.id(),
            leads = leads.len(),
            localities = pending.len(),
            "cross-referencing leads"
        );

        for (key, locality) in pending {
            if options.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            stats.cities_searched += 1;
            match self.lookup(&locality, max_pages, &options.cancel).await {
                Some(records) => {
                    self.cache.insert(key, records);
                }
                None if options.cancel.is_cancelled() => {
                    stats.cancelled = true;
                    break;
                }
                None => stats.localities_failed += 1,
            }
        }

        let total = leads.len();
        let source = self.adapter.id().as_str().to_string();
        for (done, lead) in leads.iter_mut().enumerate() {
            if stats.cancelled || options.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            let candidates = lead
                .locality_key()
                .and_then(|key| self.cache.get(&key))
                .map_or(&[][..], Vec::as_slice);

            if let Some(best) = self.policy.best_match(lead, candidates) {
                let filled = lead.fill_if_empty(best, &ENRICHED_FIELDS, &source);
                stats.matches += 1;
                stats.fields_filled += filled.len();
                debug!(lead = %lead.display_name(), filled = filled.len(), "matched lead");
            }

            if let Some(on_progress) = options.on_progress.as_mut() {
                on_progress(done + 1, total);
            }
        }

        info!(
            source = %source,
            matches = stats.matches,
            fields_filled = stats.fields_filled,
            cities_searched = stats.cities_searched,
            "cross-reference finished"
        );
        stats
    }

    /// Fetch every entry the adapter lists for one locality.
    ///
    /// `None` when the lookup errored or was cancelled; neither is cached.
    async fn lookup(
        &self,
        locality: &Locality,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Option<Vec<Record>> {
        let options = SearchOptions::default()
            .with_localities(vec![locality.clone()])
            .with_max_pages(max_pages);
        let ctx = SearchContext::new(cancel.child_token(), Arc::clone(&self.metrics));

        match collect(self.adapter.search(SearchQuery::everyone(), options, ctx)).await {
            Ok(outcome)
                if cancel.is_cancelled() || outcome.stops().contains(&StopReason::Cancelled) =>
            {
                debug!(%locality, records = outcome.records.len(), "locality lookup cancelled");
                None
            }
            Ok(outcome) => {
                if outcome.blocked() {
                    warn!(%locality, records = outcome.records.len(), "locality lookup blocked");
                }
                debug!(%locality, records = outcome.records.len(), "cached locality");
                Some(outcome.records)
            }
            Err(e) => {
                warn!(%locality, error = %e, "locality lookup failed");
                None
            }
        }
    }
}
