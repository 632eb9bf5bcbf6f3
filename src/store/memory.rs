//! In-memory stores for tests and local development.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{PreferenceStore, RecordStore};
use crate::error::StoreError;
use crate::query::{SearchPage, SearchQuery};
use crate::types::{FilingRecord, UserPreference};

/// In-memory filing records.
///
/// Evaluates [`SearchQuery`] predicates directly, with the same semantics
/// the SQL rendering has.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<String, FilingRecord>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `records`.
    pub fn with_records(records: impl IntoIterator<Item = FilingRecord>) -> Self {
        let store = Self::new();
        for r in records {
            store.add(r);
        }
        store
    }

    /// Add or replace a record.
    pub fn add(&self, record: FilingRecord) {
        self.records.write().insert(record.ttb_id.clone(), record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, StoreError> {
        let records = self.records.read();
        let mut matched: Vec<&FilingRecord> = records.values().filter(|r| query.matches(r)).collect();
        let total = matched.len() as u64;

        matched.sort_by(|a, b| query.compare(a, b));

        let rows = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(SearchPage { rows, total })
    }

    async fn get(&self, ttb_id: &str) -> Result<Option<FilingRecord>, StoreError> {
        Ok(self.records.read().get(ttb_id.trim()).cloned())
    }
}

#[derive(Debug, Default)]
struct PreferenceTables {
    by_email: BTreeMap<String, UserPreference>,
    token_to_email: BTreeMap<String, String>,
}

/// In-memory preference store.
///
/// A single lock covers both indexes, so every write is all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    tables: RwLock<PreferenceTables>,
}

impl InMemoryPreferenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.tables.read().by_email.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.read().by_email.is_empty()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get_by_token(&self, token: &str) -> Result<Option<UserPreference>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .token_to_email
            .get(token)
            .and_then(|email| tables.by_email.get(email))
            .cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserPreference>, StoreError> {
        Ok(self.tables.read().by_email.get(email).cloned())
    }

    async fn upsert(&self, pref: &UserPreference) -> Result<UserPreference, StoreError> {
        let mut tables = self.tables.write();

        let stored = match tables.by_email.get(&pref.email) {
            Some(existing) => UserPreference {
                token: existing.token.clone(),
                created_at: existing.created_at,
                ..pref.clone()
            },
            None => {
                if let Some(owner) = tables.token_to_email.get(&pref.token) {
                    return Err(StoreError::Conflict(format!("token already issued to {}", owner)));
                }
                pref.clone()
            }
        };

        tables
            .token_to_email
            .insert(stored.token.clone(), stored.email.clone());
        tables.by_email.insert(stored.email.clone(), stored.clone());
        Ok(stored)
    }

    async fn insert_if_absent(&self, pref: &UserPreference) -> Result<UserPreference, StoreError> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.by_email.get(&pref.email) {
            return Ok(existing.clone());
        }
        if let Some(owner) = tables.token_to_email.get(&pref.token) {
            return Err(StoreError::Conflict(format!("token already issued to {}", owner)));
        }
        tables
            .token_to_email
            .insert(pref.token.clone(), pref.email.clone());
        tables.by_email.insert(pref.email.clone(), pref.clone());
        Ok(pref.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryBuilder, SearchFilters};
    use crate::types::{FilingStatus, Signal, Tier, TierState};
    use chrono::{NaiveDate, Utc};

    fn record(id: &str, brand: &str, code: &str, date: (i32, u32, u32)) -> FilingRecord {
        FilingRecord {
            ttb_id: id.to_string(),
            brand_name: brand.to_string(),
            fanciful_name: None,
            company_name: "Acme Spirits".to_string(),
            class_type_code: code.to_string(),
            origin_code: "KY".to_string(),
            approval_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            status: FilingStatus::Approved,
            signal: Signal::NewBrand,
            refile_count: 0,
        }
    }

    #[tokio::test]
    async fn test_search_filters_sorts_and_pages() {
        let store = InMemoryRecordStore::with_records([
            record("001", "Alpha", "STRAIGHT BOURBON WHISKY", (2024, 1, 5)),
            record("002", "Bravo", "VODKA", (2024, 2, 5)),
            record("003", "Charlie", "TENNESSEE WHISKEY", (2024, 3, 5)),
            record("004", "Delta", "RYE WHISKY", (2024, 4, 5)),
        ]);
        let q = QueryBuilder::new()
            .filters(SearchFilters {
                category: Some("Whiskey".into()),
                ..Default::default()
            })
            .sort(Some("brand_name"), Some("asc"))
            .limit(Some(2))
            .page(Some(2))
            .build()
            .unwrap();

        let page = store.search(&q).await.unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.rows.iter().map(|r| r.ttb_id.as_str()).collect();
        assert_eq!(ids, vec!["004"]);
    }

    #[tokio::test]
    async fn test_get_record() {
        let store = InMemoryRecordStore::with_records([record("42", "X", "GIN", (2023, 5, 1))]);
        assert!(store.get("42").await.unwrap().is_some());
        assert!(store.get("43").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_token_and_created_at() {
        let store = InMemoryPreferenceStore::new();
        let first = UserPreference::new("a@example.com", TierState::None, Utc::now());
        store.upsert(&first).await.unwrap();

        let mut second = UserPreference::new("a@example.com", TierState::fresh(Tier::Premier), Utc::now());
        second.receive_free_report = false;
        let stored = store.upsert(&second).await.unwrap();

        assert_eq!(stored.token, first.token);
        assert_eq!(stored.created_at, first.created_at);
        assert!(stored.is_pro());
        assert_eq!(store.len(), 1);
        assert!(store.get_by_token(&second.token).await.unwrap().is_none());
        assert!(store.get_by_token(&first.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_if_absent_converges() {
        let store = InMemoryPreferenceStore::new();
        let a = UserPreference::new("b@example.com", TierState::fresh(Tier::CategoryPro), Utc::now());
        let b = UserPreference::new("b@example.com", TierState::fresh(Tier::CategoryPro), Utc::now());

        let first = store.insert_if_absent(&a).await.unwrap();
        let second = store.insert_if_absent(&b).await.unwrap();

        assert_eq!(first.token, second.token);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_token_collision_rejected() {
        let store = InMemoryPreferenceStore::new();
        let a = UserPreference::new("c@example.com", TierState::None, Utc::now());
        store.upsert(&a).await.unwrap();

        let mut b = UserPreference::new("d@example.com", TierState::None, Utc::now());
        b.token = a.token.clone();
        assert!(matches!(store.upsert(&b).await, Err(StoreError::Conflict(_))));
        assert!(store.get_by_email("d@example.com").await.unwrap().is_none());
    }
}
