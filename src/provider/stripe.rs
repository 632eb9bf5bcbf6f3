//! Stripe REST client.
//!
//! ## Configuration
//!
//! - `STRIPE_SECRET_KEY`: API key (required for live calls)
//! - `STRIPE_API_BASE`: API root (default: `https://api.stripe.com`)
//! - `STRIPE_TIMEOUT_SECS`: request timeout (default: 10)
//! - `CHECKOUT_SUCCESS_URL` / `CHECKOUT_CANCEL_URL`: checkout redirects
//! - `STRIPE_PRICE_CATEGORY_PRO` / `STRIPE_PRICE_PREMIER`: see [`PriceTierMap`]

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{ActiveSubscription, CheckoutSession, PriceTierMap, ProviderError, SubscriptionProvider};
use crate::types::Tier;

/// Stripe client configuration.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key.
    pub secret_key: String,
    /// API root.
    pub api_base: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Redirect after a completed checkout.
    pub success_url: String,
    /// Redirect after an abandoned checkout.
    pub cancel_url: String,
    /// Price ids per tier.
    pub prices: PriceTierMap,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            secret_key: std::env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            timeout: Duration::from_secs(
                std::env::var("STRIPE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            success_url: std::env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000/subscribe/success".to_string()),
            cancel_url: std::env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:3000/subscribe".to_string()),
            prices: PriceTierMap::from_env(),
        }
    }

    /// Whether a secret key is present.
    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    items: List<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: Price,
}

#[derive(Debug, Deserialize)]
struct Price {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Session {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Stripe-backed [`SubscriptionProvider`].
pub struct StripeSubscriptionProvider {
    client: Client,
    config: StripeConfig,
}

impl StripeSubscriptionProvider {
    /// Create a client from configuration.
    pub fn new(config: StripeConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        if self.config.is_configured() {
            Ok(&self.config.secret_key)
        } else {
            Err(ProviderError::NotConfigured("STRIPE_SECRET_KEY is not set".to_string()))
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SubscriptionProvider for StripeSubscriptionProvider {
    async fn active_subscription(&self, email: &str) -> Result<Option<ActiveSubscription>, ProviderError> {
        let key = self.require_key()?;

        let response = self
            .client
            .get(self.url("customers"))
            .bearer_auth(key)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let customers: List<Customer> = Self::decode(response).await?;
        let Some(customer) = customers.data.into_iter().next() else {
            return Ok(None);
        };

        let response = self
            .client
            .get(self.url("subscriptions"))
            .bearer_auth(key)
            .query(&[
                ("customer", customer.id.as_str()),
                ("status", "active"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let subscriptions: List<Subscription> = Self::decode(response).await?;

        let price_id = subscriptions
            .data
            .into_iter()
            .next()
            .and_then(|s| s.items.data.into_iter().next())
            .map(|item| item.price.id);

        Ok(price_id.map(|price_id| ActiveSubscription {
            price_id,
            customer_id: customer.id,
        }))
    }

    async fn create_checkout(&self, email: &str, tier: Tier) -> Result<CheckoutSession, ProviderError> {
        let key = self.require_key()?;
        let price = self
            .config
            .prices
            .checkout_price(tier)
            .ok_or(ProviderError::NoCheckoutForTier(tier))?;

        let form = [
            ("mode", "subscription"),
            ("customer_email", email),
            ("line_items[0][price]", price),
            ("line_items[0][quantity]", "1"),
            ("success_url", self.config.success_url.as_str()),
            ("cancel_url", self.config.cancel_url.as_str()),
            ("subscription_data[metadata][email]", email),
            ("subscription_data[metadata][tier]", tier.as_str()),
        ];

        let response = self
            .client
            .post(self.url("checkout/sessions"))
            .bearer_auth(key)
            .form(&form)
            .send()
            .await?;
        let session: Session = Self::decode(response).await?;

        let url = session
            .url
            .ok_or_else(|| ProviderError::Decode("checkout session has no url".to_string()))?;

        tracing::info!(
            target: "filing_gate::access",
            tier = %tier,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CheckoutSession {
            url,
            session_id: Some(session.id),
        })
    }
}
