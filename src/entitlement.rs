//! Entitlement resolution and preference management.
//!
//! ## Resolution
//!
//! ```text
//! identity ──▶ lookup (token, then email) ── found ──▶ Entitlement
//!                    │
//!                    └─ missing + email ──▶ reconcile ── active sub ──▶ insert_if_absent ──▶ lookup
//!                                               │
//!                                               └─ none / provider down ──▶ NotFound
//! ```
//!
//! `lookup` never writes. `reconcile` is the only path that creates a record
//! from provider state, and it converges under concurrency because the write
//! is keyed by email and keeps whatever record got there first.
//!
//! Nothing is cached: every call reads the preference store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::clock::Clock;
use crate::cooldown::{cooldown_status, evaluate_change, ChangeOutcome, ChangeRequest};
use crate::error::AccessError;
use crate::provider::{PriceTierMap, SubscriptionProvider};
use crate::store::PreferenceStore;
use crate::taxonomy::Category;
use crate::types::{normalize_email, Tier, TierState, UserPreference};

/// Who is asking. A token is preferred over an email when both are given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Opaque preference token.
    #[serde(default)]
    pub token: Option<String>,
    /// Subscriber email.
    #[serde(default)]
    pub email: Option<String>,
}

impl CallerIdentity {
    /// Identity carrying only a token.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            email: None,
        }
    }

    /// Identity carrying only an email.
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            token: None,
            email: Some(email.into()),
        }
    }

    fn token_value(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    fn email_value(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
    }
}

/// Resolved access rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    /// Subscriber email.
    pub email: String,
    /// Tier.
    pub tier: Tier,
    /// Selected category (category_pro only).
    pub tier_category: Option<Category>,
    /// Whether a category change would pass the cooldown now.
    pub can_change_category: bool,
    /// End of a running cooldown.
    pub cooldown_ends_at: Option<DateTime<Utc>>,
}

impl Entitlement {
    fn from_preference(pref: &UserPreference, now: DateTime<Utc>) -> Self {
        let status = cooldown_status(pref.tier.category_changed_at(), now);
        Self {
            email: pref.email.clone(),
            tier: pref.tier(),
            tier_category: pref.tier.tier_category(),
            can_change_category: status.can_change,
            cooldown_ends_at: status.cooldown_ends_at,
        }
    }

    /// Whether the tier is paid.
    pub fn is_pro(&self) -> bool {
        self.tier.is_paid()
    }
}

/// Full preference view returned by the preference endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceView {
    /// Subscriber email.
    pub email: String,
    /// Whether the tier is paid.
    pub is_pro: bool,
    /// Tier.
    pub tier: Tier,
    /// Selected category (category_pro only).
    pub tier_category: Option<Category>,
    /// Categories of interest (premier only).
    pub categories: Vec<Category>,
    /// Free report opt-in.
    pub receive_free_report: bool,
    /// Whether a category change would pass the cooldown now.
    pub can_change_category: bool,
    /// End of a running cooldown.
    pub cooldown_ends_at: Option<DateTime<Utc>>,
}

impl PreferenceView {
    fn new(pref: &UserPreference, now: DateTime<Utc>) -> Self {
        let status = cooldown_status(pref.tier.category_changed_at(), now);
        Self {
            email: pref.email.clone(),
            is_pro: pref.is_pro(),
            tier: pref.tier(),
            tier_category: pref.tier.tier_category(),
            categories: pref.tier.categories().into_iter().collect(),
            receive_free_report: pref.receive_free_report,
            can_change_category: status.can_change,
            cooldown_ends_at: status.cooldown_ends_at,
        }
    }
}

/// Requested preference changes. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceUpdate {
    /// Free report opt-in.
    #[serde(default)]
    pub receive_free_report: Option<bool>,
    /// Category to select (category_pro only).
    #[serde(default)]
    pub tier_category: Option<String>,
    /// Categories of interest (premier only).
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Explicit confirmation for a category switch.
    #[serde(default)]
    pub confirm_change: bool,
}

/// Payment-status change for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    /// A subscription is active at `price_id`.
    Activated {
        /// Billed price.
        price_id: String,
    },
    /// The subscription ended.
    Canceled,
}

fn parse_selectable(name: &str) -> Result<Category, AccessError> {
    Category::from_name(name)
        .filter(|c| Category::SELECTABLE.contains(c))
        .ok_or_else(|| AccessError::Validation(format!("Unknown category: {}", name.trim())))
}

/// Resolves identities to entitlements and applies preference changes.
#[derive(Clone)]
pub struct EntitlementResolver {
    preferences: Arc<dyn PreferenceStore>,
    provider: Arc<dyn SubscriptionProvider>,
    prices: PriceTierMap,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EntitlementResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementResolver")
            .field("prices", &self.prices)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl EntitlementResolver {
    /// Create a resolver.
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        provider: Arc<dyn SubscriptionProvider>,
        prices: PriceTierMap,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            preferences,
            provider,
            prices,
            clock,
        }
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Side-effect-free read: by token first, then by email.
    pub async fn lookup(&self, identity: &CallerIdentity) -> Result<Option<UserPreference>, AccessError> {
        if let Some(token) = identity.token_value() {
            if let Some(pref) = self.preferences.get_by_token(token).await? {
                return Ok(Some(pref));
            }
        }
        if let Some(email) = identity.email_value() {
            return Ok(self.preferences.get_by_email(&email).await?);
        }
        Ok(None)
    }

    /// Resolve an identity, reconciling against the provider when the
    /// email is unknown locally.
    pub async fn resolve(&self, identity: &CallerIdentity) -> Result<Entitlement, AccessError> {
        if let Some(pref) = self.lookup(identity).await? {
            return Ok(Entitlement::from_preference(&pref, self.now()));
        }

        let Some(email) = identity.email_value() else {
            return Err(AccessError::NotFound("No subscriber for this token".to_string()));
        };

        if self.reconcile(&email).await?.is_none() {
            return Err(AccessError::NotFound(format!("No subscriber for {}", email)));
        }

        match self.lookup(&CallerIdentity::email(email.clone())).await? {
            Some(pref) => Ok(Entitlement::from_preference(&pref, self.now())),
            None => Err(AccessError::NotFound(format!("No subscriber for {}", email))),
        }
    }

    /// Create a local record from an active provider subscription.
    ///
    /// Returns `Ok(None)` when the provider has no active subscription or
    /// cannot be reached. An existing record for the email is returned
    /// untouched.
    pub async fn reconcile(&self, email: &str) -> Result<Option<UserPreference>, AccessError> {
        let email = normalize_email(email);

        let subscription = match self.provider.active_subscription(&email).await {
            Ok(Some(sub)) => sub,
            Ok(None) => {
                tracing::debug!(target: "filing_gate::reconcile", email = %email, "No active subscription");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(
                    target: "filing_gate::reconcile",
                    email = %email,
                    error = %e,
                    "Subscription provider lookup failed, treating as not found"
                );
                return Ok(None);
            }
        };

        let tier = self.prices.tier_for(&subscription.price_id);
        let candidate = UserPreference::new(&email, TierState::fresh(tier), self.now());
        let stored = self.preferences.insert_if_absent(&candidate).await?;

        tracing::info!(
            target: "filing_gate::reconcile",
            email = %email,
            tier = %stored.tier(),
            customer_id = %subscription.customer_id,
            created = stored.token == candidate.token,
            "Reconciled subscriber from provider"
        );

        Ok(Some(stored))
    }

    /// Preference view for a token.
    pub async fn preferences(&self, token: &str) -> Result<PreferenceView, AccessError> {
        let pref = self.require_token(token).await?;
        Ok(PreferenceView::new(&pref, self.now()))
    }

    /// Preference view for any identity, reconciling an unknown email first.
    pub async fn preferences_for(&self, identity: &CallerIdentity) -> Result<PreferenceView, AccessError> {
        if let Some(token) = identity.token_value() {
            return self.preferences(token).await;
        }
        let entitlement = self.resolve(identity).await?;
        let pref = self
            .preferences
            .get_by_email(&entitlement.email)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("No subscriber for {}", entitlement.email)))?;
        Ok(PreferenceView::new(&pref, self.now()))
    }

    /// Apply a preference update.
    ///
    /// The whole record is computed first and written once; any rejection
    /// leaves the stored record untouched.
    pub async fn save_preferences(
        &self,
        token: &str,
        update: &PreferenceUpdate,
    ) -> Result<PreferenceView, AccessError> {
        let current = self.require_token(token).await?;
        let now = self.now();
        let mut next = current.clone();

        if let Some(name) = update.tier_category.as_deref() {
            let TierState::CategoryPro { category, changed_at } = current.tier else {
                return Err(AccessError::Authorization(
                    "Category selection requires a Category Pro subscription".to_string(),
                ));
            };
            let requested = parse_selectable(name)?;
            let request = ChangeRequest {
                requested,
                confirmed: update.confirm_change,
            };

            next.tier = match evaluate_change(category.into(), changed_at, request, now)? {
                ChangeOutcome::Initial(c) => TierState::CategoryPro {
                    category: Some(c),
                    changed_at,
                },
                ChangeOutcome::Unchanged => current.tier.clone(),
                ChangeOutcome::Changed { from, to, changed_at } => {
                    tracing::info!(
                        target: "filing_gate::access",
                        email = %current.email,
                        from = %from,
                        to = %to,
                        "Category changed"
                    );
                    TierState::CategoryPro {
                        category: Some(to),
                        changed_at: Some(changed_at),
                    }
                }
            };
        }

        if let Some(names) = update.categories.as_ref() {
            if current.tier() != Tier::Premier {
                return Err(AccessError::Authorization(
                    "Category interests require a Premier subscription".to_string(),
                ));
            }
            let categories = names
                .iter()
                .map(|n| parse_selectable(n))
                .collect::<Result<BTreeSet<_>, _>>()?;
            next.tier = TierState::Premier { categories };
        }

        if let Some(receive) = update.receive_free_report {
            next.receive_free_report = receive;
        }

        if next == current {
            return Ok(PreferenceView::new(&current, now));
        }

        next.updated_at = now;
        let stored = self.preferences.upsert(&next).await?;
        Ok(PreferenceView::new(&stored, now))
    }

    /// Apply a payment-status change.
    ///
    /// Returns `Ok(None)` for a cancellation of an unknown subscriber.
    pub async fn apply_subscription_event(
        &self,
        email: &str,
        event: &SubscriptionEvent,
    ) -> Result<Option<UserPreference>, AccessError> {
        let email = normalize_email(email);
        let now = self.now();
        let existing = self.preferences.get_by_email(&email).await?;

        let next = match (event, existing) {
            (SubscriptionEvent::Activated { price_id }, Some(mut pref)) => {
                let tier = self.prices.tier_for(price_id);
                if pref.tier() != tier {
                    pref.tier = TierState::fresh(tier);
                }
                pref.updated_at = now;
                pref
            }
            (SubscriptionEvent::Activated { price_id }, None) => {
                UserPreference::new(&email, TierState::fresh(self.prices.tier_for(price_id)), now)
            }
            (SubscriptionEvent::Canceled, Some(mut pref)) => {
                pref.tier = TierState::None;
                pref.updated_at = now;
                pref
            }
            (SubscriptionEvent::Canceled, None) => {
                tracing::debug!(target: "filing_gate::access", email = %email, "Cancellation for unknown subscriber");
                return Ok(None);
            }
        };

        let stored = self.preferences.upsert(&next).await?;
        tracing::info!(
            target: "filing_gate::access",
            email = %email,
            tier = %stored.tier(),
            "Subscription event applied"
        );
        Ok(Some(stored))
    }

    async fn require_token(&self, token: &str) -> Result<UserPreference, AccessError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AccessError::Validation("A token is required".to_string()));
        }
        self.preferences
            .get_by_token(token)
            .await?
            .ok_or_else(|| AccessError::NotFound("Unknown preference token".to_string()))
    }
}
