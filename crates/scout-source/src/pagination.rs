//! The locality → page → stop skeleton shared by paginated sources.
//!
//! A source only describes how to fetch and parse one page
//! ([`PageSource`]); [`PaginatedSource`] turns it into a [`SourceAdapter`]
//! whose search is a pull-driven state machine: pacing, block handling,
//! CAPTCHA detection, empty-page tolerance and termination are handled here
//! once for every source.
//!
//! "Page" is whatever the source paginates by: an offset, a cursor, a form
//! postback or an API page number. The machine only counts them.

use crate::adapter::{
    AdapterDescriptor, SearchContext, SearchOptions, SearchQuery, SearchStream, SourceAdapter,
};
use crate::captcha;
use crate::error::{ParseError, TransportError};
use crate::signal::{ControlSignal, SearchItem, StopReason};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use scout_core::{Locality, PaginationConfig, Record};
use scout_throttle::{RateLimitPolicy, RateLimiter};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// A response as received from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl RawPage {
    /// A page with an explicit status.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A `200 OK` page.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 403 and 429: the source is refusing us.
    #[must_use]
    pub fn is_block(&self) -> bool {
        matches!(self.status, 403 | 429)
    }

    /// Worth backing off and re-requesting: blocks and server errors.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_block() || (500..600).contains(&self.status)
    }
}

/// One page request within a locality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Locality being searched
    pub locality: Locality,
    /// 1-based page number
    pub page: u32,
    /// The caller's query
    pub query: SearchQuery,
    /// Outbound identity (user agent) to present
    pub identity: String,
}

/// Records extracted from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Records in page order
    pub records: Vec<Record>,
    /// Total result count for the locality, when the source reports one
    pub total: Option<usize>,
}

impl ParsedPage {
    /// A page with no known total.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            total: None,
        }
    }

    /// Set the reported total.
    #[must_use]
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }
}

/// Per-site fetch and parse logic.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Static metadata; `page_size` drives short-page termination.
    fn descriptor(&self) -> &AdapterDescriptor;

    /// Localities searched when the caller names none.
    fn default_localities(&self) -> Vec<Locality>;

    /// Pacing policy for this source.
    fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::default()
    }

    /// Issue the request for one page.
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, TransportError>;

    /// Extract records from a successful page.
    fn parse_page(&self, page: &RawPage, request: &PageRequest) -> Result<ParsedPage, ParseError>;

    /// Whether a successful response is actually a challenge page.
    fn is_block_page(&self, page: &RawPage) -> bool {
        captcha::contains_captcha(&page.body)
    }
}

/// Termination knobs shared by every paginated source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationPolicy {
    /// Consecutive empty pages (after page 1) that end a locality
    pub empty_page_threshold: u32,
    /// Page cap used when the caller sets none
    pub max_pages: Option<u32>,
}

impl From<&PaginationConfig> for PaginationPolicy {
    fn from(config: &PaginationConfig) -> Self {
        Self {
            empty_page_threshold: config.empty_page_threshold.max(1),
            max_pages: config.max_pages_per_locality,
        }
    }
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self::from(&PaginationConfig::default())
    }
}

/// Adapts a [`PageSource`] into a full [`SourceAdapter`].
pub struct PaginatedSource<S> {
    source: S,
    pagination: PaginationPolicy,
    throttle: RateLimitPolicy,
}

impl<S: PageSource> PaginatedSource<S> {
    /// Wrap a source with default pagination and its own pacing policy.
    pub fn new(source: S) -> Self {
        let throttle = source.rate_limit_policy();
        Self {
            source,
            pagination: PaginationPolicy::default(),
            throttle,
        }
    }

    /// Override termination knobs.
    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationPolicy) -> Self {
        self.pagination = pagination;
        self
    }

    /// Override the pacing policy.
    #[must_use]
    pub fn with_throttle(mut self, throttle: RateLimitPolicy) -> Self {
        self.throttle = throttle;
        self
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.source
    }
}

impl<S: PageSource> SourceAdapter for PaginatedSource<S> {
    fn descriptor(&self) -> &AdapterDescriptor {
        self.source.descriptor()
    }

    fn search(
        &self,
        query: SearchQuery,
        options: SearchOptions,
        ctx: SearchContext,
    ) -> SearchStream<'_> {
        let localities = if options.localities.is_empty() {
            self.source.default_localities()
        } else {
            options.localities.clone()
        };

        let crawl = Crawl {
            source: &self.source,
            policy: self.pagination.clone(),
            limiter: RateLimiter::new(self.throttle.clone()),
            query,
            options,
            ctx,
            localities,
            next_locality: 0,
            cursor: None,
            pending: VecDeque::new(),
            yielded: 0,
            defended: 0,
            done: false,
        };

        stream::unfold(crawl, |mut crawl| async move {
            let item = crawl.next_item().await?;
            Some((Ok(item), crawl))
        })
        .boxed()
    }
}

/// Position within the locality being paginated.
struct Cursor {
    locality: Locality,
    page: u32,
    pages: u32,
    records: usize,
    fetched: usize,
    empty_streak: u32,
}

impl Cursor {
    fn new(locality: Locality) -> Self {
        Self {
            locality,
            page: 1,
            pages: 0,
            records: 0,
            fetched: 0,
            empty_streak: 0,
        }
    }
}

/// Search state carried between polls.
struct Crawl<'a, S> {
    source: &'a S,
    policy: PaginationPolicy,
    limiter: RateLimiter,
    query: SearchQuery,
    options: SearchOptions,
    ctx: SearchContext,
    localities: Vec<Locality>,
    next_locality: usize,
    cursor: Option<Cursor>,
    pending: VecDeque<SearchItem>,
    yielded: usize,
    /// Localities that ended `Blocked` or `GaveUp`
    defended: usize,
    done: bool,
}

impl<S: PageSource> Crawl<'_, S> {
    async fn next_item(&mut self) -> Option<SearchItem> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.done {
                return None;
            }
            match self.cursor.take() {
                None => self.start_locality(),
                Some(cursor) => self.fetch(cursor).await,
            }
        }
    }

    fn start_locality(&mut self) {
        if self.ctx.cancel.is_cancelled() {
            debug!(source = %self.source.descriptor().id, "search cancelled between localities");
            self.done = true;
            return;
        }

        let Some(locality) = self.localities.get(self.next_locality).cloned() else {
            self.finish();
            return;
        };
        self.next_locality += 1;

        debug!(
            source = %self.source.descriptor().id,
            locality = %locality,
            index = self.next_locality,
            total = self.localities.len(),
            "starting locality"
        );
        self.pending.push_back(SearchItem::Signal(ControlSignal::Progress {
            index: self.next_locality,
            total: self.localities.len(),
            locality: locality.clone(),
        }));
        self.cursor = Some(Cursor::new(locality));
    }

    async fn fetch(&mut self, cursor: Cursor) {
        let source = self.source;
        let id = &source.descriptor().id;
        let cancel = self.ctx.cancel.clone();

        if cancel.is_cancelled() {
            self.stop(cursor, StopReason::Cancelled);
            return;
        }

        let cancelled = tokio::select! {
            biased;
            () = cancel.cancelled() => true,
            () = self.limiter.wait() => false,
        };
        if cancelled {
            self.stop(cursor, StopReason::Cancelled);
            return;
        }

        let request = PageRequest {
            locality: cursor.locality.clone(),
            page: cursor.page,
            query: self.query.clone(),
            identity: self.limiter.identity().to_string(),
        };
        self.ctx.metrics.record_request(id);

        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = source.fetch_page(&request) => Some(result),
        };
        let Some(result) = fetched else {
            self.stop(cursor, StopReason::Cancelled);
            return;
        };

        match result {
            Err(err) => {
                self.ctx.metrics.record_failure(id);
                warn!(
                    source = %id,
                    locality = %cursor.locality,
                    page = cursor.page,
                    status = err.status,
                    error = %err.message,
                    "page request failed"
                );
                self.retry_or_stop(cursor, err.status, StopReason::GaveUp).await;
            }
            Ok(raw) if raw.is_retryable() => {
                let give_up = if raw.is_block() {
                    self.ctx.metrics.record_block(id);
                    StopReason::Blocked
                } else {
                    self.ctx.metrics.record_failure(id);
                    StopReason::GaveUp
                };
                warn!(
                    source = %id,
                    locality = %cursor.locality,
                    page = cursor.page,
                    status = raw.status,
                    "source refused page"
                );
                self.retry_or_stop(cursor, raw.status, give_up).await;
            }
            Ok(raw) => self.handle_page(cursor, &request, &raw),
        }
    }

    /// Back off and re-request the same page, or end the locality.
    async fn retry_or_stop(&mut self, cursor: Cursor, status: u16, give_up: StopReason) {
        let cancel = self.ctx.cancel.clone();
        let retry = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            retry = self.limiter.handle_block(status) => Some(retry),
        };
        let Some(retry) = retry else {
            self.stop(cursor, StopReason::Cancelled);
            return;
        };

        if retry {
            self.cursor = Some(cursor);
            return;
        }

        if give_up == StopReason::Blocked {
            self.pending.push_back(SearchItem::Signal(ControlSignal::Blocked {
                reason: format!(
                    "HTTP {status} persisted after {} retries",
                    self.limiter.policy().max_consecutive_failures
                ),
                locality: cursor.locality.clone(),
                page: cursor.page,
            }));
        }
        self.stop(cursor, give_up);
    }

    fn handle_page(&mut self, mut cursor: Cursor, request: &PageRequest, raw: &RawPage) {
        let source = self.source;
        let descriptor = source.descriptor();
        let id = &descriptor.id;

        self.limiter.reset_backoff();
        self.ctx.metrics.record_success(id);

        if source.is_block_page(raw) {
            self.ctx.metrics.record_captcha(id);
            warn!(
                source = %id,
                locality = %cursor.locality,
                page = cursor.page,
                "CAPTCHA challenge detected"
            );
            self.pending.push_back(SearchItem::Signal(ControlSignal::Blocked {
                reason: "CAPTCHA challenge detected".to_string(),
                locality: cursor.locality.clone(),
                page: cursor.page,
            }));
            self.stop(cursor, StopReason::Blocked);
            return;
        }

        cursor.pages += 1;
        let parsed = if raw.is_success() {
            source.parse_page(raw, request).unwrap_or_else(|err| {
                warn!(
                    source = %id,
                    locality = %cursor.locality,
                    page = cursor.page,
                    error = %err,
                    "malformed page, treating as empty"
                );
                ParsedPage::default()
            })
        } else {
            warn!(
                source = %id,
                locality = %cursor.locality,
                page = cursor.page,
                status = raw.status,
                "unexpected status, treating page as empty"
            );
            ParsedPage::default()
        };

        let count = parsed.records.len();
        if count == 0 {
            if cursor.page == 1 {
                self.stop(cursor, StopReason::NoResults);
                return;
            }
            cursor.empty_streak += 1;
            if cursor.empty_streak >= self.policy.empty_page_threshold.max(1) {
                self.stop(cursor, StopReason::EmptyPages);
            } else if self.reached_page_cap(&cursor) {
                self.stop(cursor, StopReason::PageCap);
            } else {
                cursor.page += 1;
                self.cursor = Some(cursor);
            }
            return;
        }

        cursor.empty_streak = 0;
        cursor.fetched += count;

        let mut kept = 0;
        for mut record in parsed.records {
            if !self.options.admits(&record) {
                continue;
            }
            if record.source.is_empty() {
                record.source = id.to_string();
            }
            record.tag_contact_sources(id.as_str());
            self.pending.push_back(SearchItem::Record(record));
            kept += 1;
        }
        cursor.records += kept;
        self.yielded += kept;
        self.ctx.metrics.record_records(id, kept);

        debug!(
            source = %id,
            locality = %cursor.locality,
            page = cursor.page,
            count,
            kept,
            "page parsed"
        );

        let stop = if descriptor.page_size.is_some_and(|size| count < size) {
            Some(StopReason::ShortPage)
        } else if parsed.total.is_some_and(|total| cursor.fetched >= total) {
            Some(StopReason::TotalReached)
        } else if self.reached_page_cap(&cursor) {
            Some(StopReason::PageCap)
        } else {
            None
        };

        match stop {
            Some(reason) => self.stop(cursor, reason),
            None => {
                cursor.page += 1;
                self.cursor = Some(cursor);
            }
        }
    }

    fn reached_page_cap(&self, cursor: &Cursor) -> bool {
        self.options
            .max_pages
            .or(self.policy.max_pages)
            .is_some_and(|cap| cursor.page >= cap)
    }

    /// End the current locality.
    fn stop(&mut self, cursor: Cursor, reason: StopReason) {
        debug!(
            source = %self.source.descriptor().id,
            locality = %cursor.locality,
            pages = cursor.pages,
            records = cursor.records,
            stop = %reason,
            "locality finished"
        );
        self.pending
            .push_back(SearchItem::Signal(ControlSignal::LocalityFinished {
                locality: cursor.locality,
                pages: cursor.pages,
                records: cursor.records,
                stop: reason,
            }));
        match reason {
            StopReason::Blocked | StopReason::GaveUp => self.defended += 1,
            StopReason::Cancelled => self.done = true,
            _ => {}
        }
    }

    /// All localities done.
    fn finish(&mut self) {
        self.done = true;
        let id = &self.source.descriptor().id;

        // A source that blocked us is not exhausted.
        if self.yielded == 0 && self.defended == 0 {
            let reason = if self.localities.is_empty() {
                "no localities to search".to_string()
            } else {
                format!("no records found in {} localities", self.localities.len())
            };
            self.pending
                .push_back(SearchItem::Signal(ControlSignal::Placeholder {
                    reason,
                    strategies_tried: self.localities.iter().map(ToString::to_string).collect(),
                }));
        }

        info!(
            source = %id,
            localities = self.localities.len(),
            records = self.yielded,
            "search finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_page_classification() {
        assert!(RawPage::ok("x").is_success());
        assert!(RawPage::new(403, "").is_block());
        assert!(RawPage::new(429, "").is_retryable());
        assert!(RawPage::new(503, "").is_retryable());
        assert!(!RawPage::new(503, "").is_block());
        assert!(!RawPage::new(404, "").is_retryable());
        assert!(!RawPage::new(404, "").is_success());
    }

    #[test]
    fn test_policy_from_config() {
        let config = PaginationConfig {
            empty_page_threshold: 0,
            max_pages_per_locality: Some(7),
        };
        let policy = PaginationPolicy::from(&config);
        assert_eq!(policy.empty_page_threshold, 1);
        assert_eq!(policy.max_pages, Some(7));
    }

    #[test]
    fn test_parsed_page_total() {
        let page = ParsedPage::new(vec![Record::named("A", "B")]).with_total(40);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.total, Some(40));
    }
}
