//! Provider backed by a fixed in-process table, for tests and local runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{ActiveSubscription, CheckoutSession, PriceTierMap, ProviderError, SubscriptionProvider};
use crate::types::{normalize_email, Tier};

/// In-process subscription table.
///
/// Can be switched into an unavailable mode to exercise degradation paths.
#[derive(Debug, Default)]
pub struct StaticSubscriptionProvider {
    subscriptions: RwLock<HashMap<String, ActiveSubscription>>,
    prices: PriceTierMap,
    checkout_base_url: String,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl StaticSubscriptionProvider {
    /// Empty table with no configured prices.
    pub fn new() -> Self {
        Self::with_prices(PriceTierMap::default())
    }

    /// Empty table using `prices` for checkout.
    pub fn with_prices(prices: PriceTierMap) -> Self {
        Self {
            prices,
            checkout_base_url: "https://checkout.invalid/session".to_string(),
            ..Default::default()
        }
    }

    /// Register an active subscription.
    pub fn add(&self, email: &str, price_id: &str) {
        let email = normalize_email(email);
        let customer_id = format!("cus_{}", email.replace(['@', '.'], "_"));
        self.subscriptions.write().insert(
            email,
            ActiveSubscription {
                price_id: price_id.to_string(),
                customer_id,
            },
        );
    }

    /// Drop a subscription.
    pub fn remove(&self, email: &str) {
        self.subscriptions.write().remove(&normalize_email(email));
    }

    /// Make every call fail with [`ProviderError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of subscription lookups served.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("static provider switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionProvider for StaticSubscriptionProvider {
    async fn active_subscription(&self, email: &str) -> Result<Option<ActiveSubscription>, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.subscriptions.read().get(&normalize_email(email)).cloned())
    }

    async fn create_checkout(&self, email: &str, tier: Tier) -> Result<CheckoutSession, ProviderError> {
        self.check_available()?;
        let price = self
            .prices
            .checkout_price(tier)
            .ok_or(ProviderError::NoCheckoutForTier(tier))?;
        Ok(CheckoutSession {
            url: format!(
                "{}?price={}&email={}",
                self.checkout_base_url,
                price,
                normalize_email(email)
            ),
            session_id: None,
        })
    }
}
