//! Service configuration.
//!
//! ## Environment
//!
//! - `HOST` (default `0.0.0.0`), `PORT` (default `8002`)
//! - `RATE_LIMIT_MAX`, `RATE_LIMIT_WINDOW_SECS`, `RATE_LIMIT_SWEEP_PROBABILITY`,
//!   `RATE_LIMIT_TRUSTED_PROXY_HOPS`
//! - `STRIPE_WEBHOOK_SECRET`: webhook signing secret
//! - `STRIPE_PRICE_CATEGORY_PRO`, `STRIPE_PRICE_PREMIER`: comma-separated price ids
//!
//! Provider and database settings are read by their own `from_env`
//! constructors.

use crate::provider::PriceTierMap;
use crate::ratelimit::RateLimitConfig;

/// Top-level service settings.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Rate limiter settings.
    pub rate_limit: RateLimitConfig,
    /// Price id to tier mapping.
    pub prices: PriceTierMap,
    /// Webhook signing secret. Webhooks are rejected when empty.
    pub webhook_secret: Vec<u8>,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8002),
            rate_limit: RateLimitConfig::from_env(),
            prices: PriceTierMap::from_env(),
            webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
                .map(String::into_bytes)
                .unwrap_or_else(|_| {
                    tracing::warn!("STRIPE_WEBHOOK_SECRET not set, subscription webhooks will be rejected");
                    Vec::new()
                }),
        }
    }

    /// `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8002,
            rate_limit: RateLimitConfig::default(),
            prices: PriceTierMap::default(),
            webhook_secret: Vec::new(),
        }
    }
}
