//! Access-layer error taxonomy.
//!
//! | Variant | Recoverable by | Envelope code |
//! |---------|----------------|---------------|
//! | `Validation` | fixing input | `VALIDATION_ERROR` |
//! | `Authorization` | subscribing | `AUTHORIZATION_ERROR` |
//! | `RateLimited` | waiting `retry_after` | `RATE_LIMITED` |
//! | `NotFound` | - | `NOT_FOUND` |
//! | `CooldownActive` | waiting until `cooldown_ends_at` | `COOLDOWN_ACTIVE` |
//! | `ConfirmationRequired` | resubmitting with confirmation | `CONFIRMATION_REQUIRED` |
//! | `PageOutOfRange` | narrowing filters | `PAGE_OUT_OF_RANGE` |
//! | `Upstream` | retrying later | `UPSTREAM_ERROR` |
//! | `Store` | - | `INTERNAL_ERROR` |

use chrono::{DateTime, Utc};

use crate::taxonomy::Category;

/// Error raised by the persistence collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error.
    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored row could not be mapped to a domain type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
    /// A uniqueness constraint other than the upsert key was violated.
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by the access-control layer.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Caller input is invalid.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Caller is not entitled to the operation.
    #[error("Not authorized: {0}")]
    Authorization(String),
    /// Caller is throttled.
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited {
        /// Seconds until the caller's window resets.
        retry_after: u64,
    },
    /// Unknown token, email or record.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Category change attempted inside the cooldown.
    #[error("Category can be changed after {cooldown_ends_at}")]
    CooldownActive {
        /// When the cooldown ends.
        cooldown_ends_at: DateTime<Utc>,
    },
    /// Category change needs an explicit confirmation.
    #[error("Changing category from {current} to {requested} requires confirmation")]
    ConfirmationRequired {
        /// Current category.
        current: Category,
        /// Requested category.
        requested: Category,
    },
    /// Requested page is past the page ceiling.
    #[error("Page {page} exceeds the maximum of {max}")]
    PageOutOfRange {
        /// Requested page.
        page: u32,
        /// Page ceiling.
        max: u32,
    },
    /// Subscription provider failure on a path where it must be surfaced.
    #[error("{0}")]
    Upstream(String),
    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AccessError {
    /// Machine-readable code used in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Authorization(_) => "AUTHORIZATION_ERROR",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            Self::ConfirmationRequired { .. } => "CONFIRMATION_REQUIRED",
            Self::PageOutOfRange { .. } => "PAGE_OUT_OF_RANGE",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }
}
