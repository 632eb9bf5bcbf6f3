//! In-process fixed-window rate limiter.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{RateLimitConfig, RateLimitDecision, RateLimiter};
use crate::clock::{Clock, SystemClock};

/// One client's current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindow {
    /// When the window opened.
    pub window_start: DateTime<Utc>,
    /// Requests admitted in this window.
    pub count: u32,
}

/// Fixed-window limiter over an in-memory map.
///
/// The map lock is held only for the bookkeeping of a single call; nothing
/// awaits while holding it.
pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    window: Duration,
    windows: Mutex<HashMap<String, ClientWindow>>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    /// Create a limiter on the system clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let window = Duration::from_std(config.window).unwrap_or_else(|_| Duration::seconds(60));
        Self {
            config,
            window,
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Synchronous check; [`RateLimiter::check`] delegates here.
    pub fn check_now(&self, client_id: &str) -> RateLimitDecision {
        let now = self.clock.now();

        if self.config.sweep_probability > 0.0 && rand::random::<f64>() < self.config.sweep_probability {
            self.sweep_expired();
        }

        let mut windows = self.windows.lock();
        let limit = self.config.max_requests;

        if let Some(w) = windows.get_mut(client_id) {
            if now - w.window_start < self.window {
                if w.count >= limit {
                    let remaining_ms = (w.window_start + self.window - now).num_milliseconds();
                    let retry_after = (remaining_ms.max(1) as u64).div_ceil(1000);
                    tracing::debug!(
                        target: "filing_gate::ratelimit",
                        client_id = client_id,
                        retry_after = retry_after,
                        "request throttled"
                    );
                    return RateLimitDecision::deny(retry_after);
                }
                w.count += 1;
                return RateLimitDecision::allow(limit.saturating_sub(w.count));
            }
        }

        windows.insert(
            client_id.to_string(),
            ClientWindow {
                window_start: now,
                count: 1,
            },
        );
        RateLimitDecision::allow(limit.saturating_sub(1))
    }

    /// Drop windows that opened more than two window lengths ago.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let cutoff = self.clock.now() - self.window * 2;
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| w.window_start > cutoff);
        before - windows.len()
    }

    /// Current window for `client_id`, if any.
    pub fn window(&self, client_id: &str) -> Option<ClientWindow> {
        self.windows.lock().get(client_id).copied()
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn check(&self, client_id: &str) -> RateLimitDecision {
        self.check_now(client_id)
    }
}
