//! Per-client request throttling.
//!
//! ## Fixed Window
//!
//! ```text
//! |<------ window ------>|<------ window ------>|
//! | req req ... req(60)  | req ...              |
//!   count 1 ........ 60    count reset to 1
//!                   61st → denied, retry_after = secs until window end
//! ```
//!
//! [`FixedWindowLimiter`] keeps windows in process memory, so under
//! horizontal scaling each instance enforces its own limit. A shared counter
//! can be substituted by implementing [`RateLimiter`].

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use memory::{ClientWindow, FixedWindowLimiter};

/// Default request ceiling per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 60;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default fraction of calls that trigger a sweep of stale windows.
pub const DEFAULT_SWEEP_PROBABILITY: f64 = 0.01;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum allowed requests per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
    /// Probability in `[0, 1]` that a call sweeps expired windows.
    pub sweep_probability: f64,
    /// Reverse proxies in front of the service whose `X-Forwarded-For`
    /// entries are trusted. Zero keys clients on the socket peer alone.
    pub trusted_proxy_hops: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
            sweep_probability: DEFAULT_SWEEP_PROBABILITY,
            trusted_proxy_hops: 0,
        }
    }
}

impl RateLimitConfig {
    /// Load from `RATE_LIMIT_MAX`, `RATE_LIMIT_WINDOW_SECS`,
    /// `RATE_LIMIT_SWEEP_PROBABILITY` and `RATE_LIMIT_TRUSTED_PROXY_HOPS`,
    /// falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests: std::env::var("RATE_LIMIT_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_requests),
            window: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
            sweep_probability: std::env::var("RATE_LIMIT_SWEEP_PROBABILITY")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .map(|p| p.clamp(0.0, 1.0))
                .unwrap_or(defaults.sweep_probability),
            trusted_proxy_hops: std::env::var("RATE_LIMIT_TRUSTED_PROXY_HOPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.trusted_proxy_hops),
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Seconds until the window resets. Set only on denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl RateLimitDecision {
    /// An allowed decision.
    pub fn allow(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after: None,
        }
    }

    /// A denied decision.
    pub fn deny(retry_after: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after: Some(retry_after),
        }
    }
}

/// Trait for rate-limit backends.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a request from `client_id` and decide whether it may proceed.
    async fn check(&self, client_id: &str) -> RateLimitDecision;
}
