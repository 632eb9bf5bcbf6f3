//! Storage collaborators.
//!
//! Two traits sit at the persistence seam:
//!
//! - [`RecordStore`]: read-only filing records, queried only through a
//!   parameterized [`SearchQuery`].
//! - [`PreferenceStore`]: subscriber preferences keyed by unique email with a
//!   unique secondary token.
//!
//! In-memory implementations are always available; PostgreSQL
//! implementations are behind the `postgres` feature.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::query::{SearchPage, SearchQuery};
use crate::types::{FilingRecord, UserPreference};

/// Trait for filing record backends.
///
/// Implementations must order results exactly as
/// [`SearchQuery::order_sql`] describes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run a search and return the requested page plus the total match count.
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, StoreError>;

    /// Fetch one record by id.
    async fn get(&self, ttb_id: &str) -> Result<Option<FilingRecord>, StoreError>;
}

/// Trait for preference persistence.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Look up by opaque token.
    async fn get_by_token(&self, token: &str) -> Result<Option<UserPreference>, StoreError>;

    /// Look up by email (normalised by the caller).
    async fn get_by_email(&self, email: &str) -> Result<Option<UserPreference>, StoreError>;

    /// Insert or update by email, in one write.
    ///
    /// An existing record keeps its token and `created_at`; every other
    /// field is replaced. Returns the stored record.
    async fn upsert(&self, pref: &UserPreference) -> Result<UserPreference, StoreError>;

    /// Insert only if no record exists for the email. Returns whichever
    /// record is stored afterwards, so concurrent callers converge.
    async fn insert_if_absent(&self, pref: &UserPreference) -> Result<UserPreference, StoreError>;
}

pub use memory::{InMemoryPreferenceStore, InMemoryRecordStore};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresStore};
