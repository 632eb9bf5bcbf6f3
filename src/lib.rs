//! # filing-gate
//!
//! Entitlement-aware access control and bounded query construction for a
//! label-filing data API.
//!
//! The gate answers one question per request:
//!
//! > Given this caller, which filings may they see, and how many?
//!
//! ## Core Contract
//!
//! 1. Throttle each client to a fixed number of requests per window
//! 2. Resolve the caller's tier from local preferences, reconciling against
//!    the subscription provider when the caller is unknown
//! 3. Build a bounded, fully parameterized search from untrusted filters
//! 4. Scope exports to the caller's tier and cap them at a fixed row count
//!
//! ## Architecture
//!
//! ```text
//! Request → RateLimiter → EntitlementResolver → QueryBuilder → RecordStore
//!                              │                     │
//!                   PreferenceStore +          ExportGuard (tier scope,
//!                   SubscriptionProvider        row ceiling)
//! ```
//!
//! ## Guarantees
//!
//! - Filter values are always bound parameters; SQL text depends only on
//!   which filters are present
//! - Category classification is deterministic and first-match-wins
//! - A single-category subscriber changes category at most once per cooldown,
//!   and only with explicit confirmation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod cooldown;
pub mod entitlement;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod provider;
pub mod query;
pub mod ratelimit;
pub mod store;
pub mod taxonomy;
pub mod types;
pub mod webhook;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServiceConfig;
pub use cooldown::{
    category_cooldown, cooldown_status, evaluate_change, CategoryState, ChangeOutcome,
    ChangeRejection, ChangeRequest, CooldownStatus, CATEGORY_COOLDOWN_DAYS,
};
pub use entitlement::{
    CallerIdentity, Entitlement, EntitlementResolver, PreferenceUpdate, PreferenceView,
    SubscriptionEvent,
};
pub use error::{AccessError, StoreError};
pub use export::{scope_filters, ExportGuard, ExportPlan, ExportResult, EXPORT_ROW_CEILING};
pub use fingerprint::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use provider::{
    ActiveSubscription, CheckoutSession, PriceTierMap, ProviderError, StaticSubscriptionProvider,
    SubscriptionProvider,
};
pub use query::{
    PageParams, Predicate, QueryBuilder, QueryError, RenderedQuery, SearchFilters, SearchPage,
    SearchQuery, SortColumn, SortDirection, SqlParam,
};
pub use ratelimit::{FixedWindowLimiter, RateLimitConfig, RateLimitDecision, RateLimiter};
pub use store::{InMemoryPreferenceStore, InMemoryRecordStore, PreferenceStore, RecordStore};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresStore};
pub use taxonomy::{classify, normalize_code, Category, Classification};
pub use types::{FilingRecord, FilingStatus, Signal, Tier, TierState, UserPreference};
pub use webhook::{parse_event, sign, verify_signature, WebhookError, WebhookEvent};

#[cfg(feature = "service")]
pub use provider::{StripeConfig, StripeSubscriptionProvider};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};
