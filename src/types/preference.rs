//! Persisted subscriber preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tier::{Tier, TierState};

/// One subscriber's preference record.
///
/// Keyed by unique `email`, with a unique opaque `token` used by links in
/// outgoing mail and by the export/preference endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    /// Unique, lower-cased email.
    pub email: String,
    /// Unique opaque access token.
    pub token: String,
    /// Tier and tier-owned fields.
    pub tier: TierState,
    /// Opt-in for the free periodic report.
    pub receive_free_report: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    /// New record with a freshly generated token.
    pub fn new(email: &str, tier: TierState, now: DateTime<Utc>) -> Self {
        Self {
            email: normalize_email(email),
            token: generate_token(),
            tier,
            receive_free_report: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the subscriber is on a paid tier.
    pub fn is_pro(&self) -> bool {
        self.tier.tier().is_paid()
    }

    /// Bare tier.
    pub fn tier(&self) -> Tier {
        self.tier.tier()
    }
}

/// Canonical email key: trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Generate an opaque preference token.
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}
