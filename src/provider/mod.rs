//! Subscription provider seam.
//!
//! The resolver asks the provider one question: does this email have an
//! active paid subscription, and at which price? Checkout creation goes
//! through the same trait so the service never talks to the payment API
//! directly.

pub mod fixed;

#[cfg(feature = "service")]
pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AccessError;
use crate::types::Tier;

pub use fixed::StaticSubscriptionProvider;

#[cfg(feature = "service")]
pub use stripe::{StripeConfig, StripeSubscriptionProvider};

/// An active paid subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSubscription {
    /// Price the subscription is billed at.
    pub price_id: String,
    /// Provider-side customer id.
    pub customer_id: String,
}

/// A hosted checkout the caller is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Redirect URL.
    pub url: String,
    /// Provider-side session id, when the provider reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Provider failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure.
    #[cfg(feature = "service")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an error.
    #[error("{message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Provider message, passed through verbatim.
        message: String,
    },

    /// Provider could not be reached.
    #[error("Subscription provider unavailable: {0}")]
    Unavailable(String),

    /// Provider is missing configuration for the request.
    #[error("Subscription provider not configured: {0}")]
    NotConfigured(String),

    /// No checkout exists for the requested tier.
    #[error("No checkout available for tier {0}")]
    NoCheckoutForTier(Tier),

    /// Response body could not be decoded.
    #[error("Unexpected provider response: {0}")]
    Decode(String),
}

impl From<ProviderError> for AccessError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NoCheckoutForTier(_) => AccessError::Validation(e.to_string()),
            other => AccessError::Upstream(other.to_string()),
        }
    }
}

/// Trait for subscription providers.
#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    /// Active paid subscription for `email`, if any.
    async fn active_subscription(&self, email: &str) -> Result<Option<ActiveSubscription>, ProviderError>;

    /// Start a hosted checkout for `tier`.
    async fn create_checkout(&self, email: &str, tier: Tier) -> Result<CheckoutSession, ProviderError>;
}

/// Maps provider price ids onto tiers.
///
/// Several price ids may map to one tier (monthly and annual, legacy prices).
/// The first id listed for a tier is the one used for new checkouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTierMap {
    /// Prices that grant `category_pro`.
    pub category_pro: Vec<String>,
    /// Prices that grant `premier`.
    pub premier: Vec<String>,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl PriceTierMap {
    /// Build from explicit lists.
    pub fn new(
        category_pro: impl IntoIterator<Item = impl Into<String>>,
        premier: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            category_pro: category_pro.into_iter().map(Into::into).collect(),
            premier: premier.into_iter().map(Into::into).collect(),
        }
    }

    /// Load from `STRIPE_PRICE_CATEGORY_PRO` and `STRIPE_PRICE_PREMIER`
    /// (comma-separated).
    pub fn from_env() -> Self {
        Self {
            category_pro: std::env::var("STRIPE_PRICE_CATEGORY_PRO")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            premier: std::env::var("STRIPE_PRICE_PREMIER")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
        }
    }

    /// Tier granted by `price_id`.
    ///
    /// An unrecognised price grants `category_pro`, the narrower paid tier.
    pub fn tier_for(&self, price_id: &str) -> Tier {
        if self.premier.iter().any(|p| p == price_id) {
            Tier::Premier
        } else if self.category_pro.iter().any(|p| p == price_id) {
            Tier::CategoryPro
        } else {
            tracing::warn!(
                target: "filing_gate::reconcile",
                price_id = %price_id,
                "Unrecognised price id, granting category_pro"
            );
            Tier::CategoryPro
        }
    }

    /// Price used for new checkouts of `tier`.
    pub fn checkout_price(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::None => None,
            Tier::CategoryPro => self.category_pro.first().map(String::as_str),
            Tier::Premier => self.premier.first().map(String::as_str),
        }
    }
}
