use crate::identity::IdentityPool;
use rand::Rng;
use scout_core::ThrottleConfig;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Pacing and backoff settings for one adapter instance.
///
/// Adapters may carry their own tuned policy; the default mirrors
/// [`ThrottleConfig::default`].
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitPolicy {
    /// Lower bound of the randomized inter-request delay
    pub min_delay: Duration,
    /// Upper bound of the randomized inter-request delay
    pub max_delay: Duration,
    /// Backoff after the first block
    pub base_backoff: Duration,
    /// Backoff ceiling
    pub max_backoff: Duration,
    /// Growth factor per consecutive block
    pub backoff_multiplier: f64,
    /// Extra growth factor for HTTP 429
    pub rate_limit_multiplier: f64,
    /// Give up once this many consecutive failures are exceeded
    pub max_consecutive_failures: u32,
    /// Rotate identity every N consecutive blocks (0 = never)
    pub rotate_identity_after: u32,
    /// Identity pool; empty uses the built-in defaults
    pub user_agents: Vec<String>,
}

impl RateLimitPolicy {
    /// Set the inter-request delay range.
    #[must_use]
    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max.max(min);
        self
    }

    /// Set the backoff range.
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max.max(base);
        self
    }

    /// Set the consecutive-failure cap.
    #[must_use]
    pub fn with_max_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }
}

impl From<&ThrottleConfig> for RateLimitPolicy {
    fn from(config: &ThrottleConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.min_delay_ms)),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.base_backoff_ms)),
            backoff_multiplier: config.backoff_multiplier.max(1.0),
            rate_limit_multiplier: config.rate_limit_multiplier.max(1.0),
            max_consecutive_failures: config.max_consecutive_failures,
            rotate_identity_after: config.rotate_identity_after,
            user_agents: config.user_agents.clone(),
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from(&ThrottleConfig::default())
    }
}

/// Per-invocation request pacer.
///
/// Created fresh for each adapter search and dropped when it completes; never
/// shared between adapters. It never fails: persistent trouble is reported
/// through the `false` return of [`RateLimiter::handle_block`].
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    identities: IdentityPool,
    consecutive_failures: u32,
    current_backoff: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter at baseline state.
    #[must_use]
    pub fn new(policy: RateLimitPolicy) -> Self {
        let identities = IdentityPool::new(policy.user_agents.clone());
        Self {
            policy,
            identities,
            consecutive_failures: 0,
            current_backoff: Duration::ZERO,
            last_request: None,
        }
    }

    /// Suspend until the next request is permitted.
    ///
    /// The first request goes out immediately; later ones are spaced by a
    /// random delay within the policy's range, measured from the previous
    /// request.
    pub async fn wait(&mut self) {
        let delay = self.next_delay();
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn next_delay(&self) -> Duration {
        let min = self.policy.min_delay;
        let max = self.policy.max_delay;
        if max <= min {
            return min;
        }
        let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Current outbound identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.identities.current()
    }

    /// React to a block or transport failure (`status == 0`).
    ///
    /// Escalates the backoff, rotates identity every
    /// `rotate_identity_after` consecutive failures, sleeps for the new
    /// backoff and returns `true` to retry. Returns `false` without sleeping
    /// once `max_consecutive_failures` has been exceeded.
    pub async fn handle_block(&mut self, status: u16) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures > self.policy.max_consecutive_failures {
            warn!(
                status,
                failures = self.consecutive_failures,
                "giving up after {} consecutive failures",
                self.policy.max_consecutive_failures
            );
            return false;
        }

        self.current_backoff = self.escalate(status);

        if self.policy.rotate_identity_after > 0
            && self.consecutive_failures % self.policy.rotate_identity_after == 0
        {
            let identity = self.identities.rotate();
            debug!(identity, "rotated outbound identity");
        }

        warn!(
            status,
            failures = self.consecutive_failures,
            backoff_ms = u64::try_from(self.current_backoff.as_millis()).unwrap_or(u64::MAX),
            "request blocked, backing off"
        );
        sleep(self.current_backoff).await;
        true
    }

    /// Next backoff: grows geometrically from the base, never shrinks while
    /// failures continue, and is capped at `max_backoff`.
    fn escalate(&self, status: u16) -> Duration {
        let grown = if self.current_backoff.is_zero() {
            self.policy.base_backoff
        } else {
            scale(self.current_backoff, self.policy.backoff_multiplier, self.policy.max_backoff)
        };
        let grown = if status == 429 {
            scale(grown, self.policy.rate_limit_multiplier, self.policy.max_backoff)
        } else {
            grown
        };
        grown.max(self.current_backoff).min(self.policy.max_backoff)
    }

    /// Return to baseline after any successful response.
    pub fn reset_backoff(&mut self) {
        if self.consecutive_failures > 0 {
            debug!(failures = self.consecutive_failures, "backoff reset");
        }
        self.consecutive_failures = 0;
        self.current_backoff = Duration::ZERO;
    }

    /// Backoff applied by the most recent block (zero at baseline).
    #[must_use]
    pub fn current_backoff(&self) -> Duration {
        self.current_backoff
    }

    /// Failures since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// The policy this limiter was built with.
    #[must_use]
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }
}

fn scale(duration: Duration, factor: f64, cap: Duration) -> Duration {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor.max(1.0)).unwrap_or(cap)
}
