//! Shared service state.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::entitlement::EntitlementResolver;
use crate::export::ExportGuard;
use crate::provider::SubscriptionProvider;
use crate::ratelimit::{FixedWindowLimiter, RateLimiter};
use crate::store::{PostgresStore, PreferenceStore, RecordStore};

/// Shared service state.
///
/// Every collaborator sits behind a trait object so the router can run
/// against in-memory stores in tests and PostgreSQL in production.
#[derive(Clone)]
pub struct ServiceState {
    /// Filing records.
    pub records: Arc<dyn RecordStore>,
    /// Entitlement resolution and preference updates.
    pub resolver: EntitlementResolver,
    /// Export rules.
    pub export: ExportGuard,
    /// Subscription provider (checkout).
    pub provider: Arc<dyn SubscriptionProvider>,
    /// Per-client throttle.
    pub limiter: Arc<dyn RateLimiter>,
    /// Trusted reverse-proxy hops when deriving the client id.
    pub trusted_proxy_hops: usize,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Database handle for health reporting, when running on PostgreSQL.
    pub database: Option<PostgresStore>,
    webhook_secret: Arc<Vec<u8>>,
}

impl ServiceState {
    /// Create state using the wall clock.
    pub fn new(
        records: Arc<dyn RecordStore>,
        preferences: Arc<dyn PreferenceStore>,
        provider: Arc<dyn SubscriptionProvider>,
        config: &ServiceConfig,
    ) -> Self {
        Self::with_clock(records, preferences, provider, config, Arc::new(SystemClock))
    }

    /// Create state with an explicit clock.
    pub fn with_clock(
        records: Arc<dyn RecordStore>,
        preferences: Arc<dyn PreferenceStore>,
        provider: Arc<dyn SubscriptionProvider>,
        config: &ServiceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolver = EntitlementResolver::new(
            preferences,
            Arc::clone(&provider),
            config.prices.clone(),
            Arc::clone(&clock),
        );
        let limiter = FixedWindowLimiter::with_clock(config.rate_limit.clone(), Arc::clone(&clock));

        Self {
            records,
            export: ExportGuard::new(resolver.clone()),
            resolver,
            provider,
            limiter: Arc::new(limiter),
            trusted_proxy_hops: config.rate_limit.trusted_proxy_hops,
            clock,
            database: None,
            webhook_secret: Arc::new(config.webhook_secret.clone()),
        }
    }

    /// Attach the database used for health checks.
    pub fn with_database(mut self, database: PostgresStore) -> Self {
        self.database = Some(database);
        self
    }

    /// Webhook signing secret.
    pub(crate) fn webhook_secret(&self) -> &[u8] {
        &self.webhook_secret
    }
}
