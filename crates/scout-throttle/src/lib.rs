//! Adaptive request pacing for directory sources.
//!
//! Provides randomized inter-request delays, user-agent rotation and an
//! exponential, capped block backoff that resets on the first success.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod identity;
pub mod limiter;

pub use identity::{IdentityPool, DEFAULT_USER_AGENTS};
pub use limiter::{RateLimitPolicy, RateLimiter};
