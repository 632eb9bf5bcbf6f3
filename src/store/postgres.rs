//! PostgreSQL stores for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Executor, Row};
use std::time::Duration;

use super::{PreferenceStore, RecordStore};
use crate::error::StoreError;
use crate::query::{SearchPage, SearchQuery, SqlParam};
use crate::taxonomy::Category;
use crate::types::{FilingRecord, FilingStatus, Signal, Tier, TierState, UserPreference};

/// Filing records table.
///
/// `approval_year` / `approval_month` are denormalised from `approval_date`
/// so date-range filters compare integers.
pub const FILING_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS filings (
    ttb_id TEXT PRIMARY KEY,
    brand_name TEXT NOT NULL,
    fanciful_name TEXT,
    company_name TEXT NOT NULL,
    class_type_code TEXT NOT NULL,
    origin_code TEXT NOT NULL,
    approval_date DATE NOT NULL,
    approval_year INTEGER NOT NULL,
    approval_month INTEGER NOT NULL,
    status TEXT NOT NULL,
    signal TEXT NOT NULL,
    refile_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_filings_approval ON filings(approval_year, approval_month);
CREATE INDEX IF NOT EXISTS idx_filings_class_type ON filings(class_type_code);
"#;

/// Subscriber preferences table.
pub const PREFERENCE_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS user_preferences (
    email TEXT PRIMARY KEY,
    token TEXT NOT NULL UNIQUE,
    is_pro BOOLEAN NOT NULL DEFAULT FALSE,
    tier TEXT NOT NULL DEFAULT 'none',
    tier_category TEXT,
    category_changed_at TIMESTAMPTZ,
    categories TEXT[] NOT NULL DEFAULT '{}',
    receive_free_report BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

const FILING_COLUMNS: &str = "ttb_id, brand_name, fanciful_name, company_name, class_type_code, \
     origin_code, approval_date, status, signal, refile_count";

const PREFERENCE_COLUMNS: &str = "email, token, tier, tier_category, category_changed_at, \
     categories, receive_free_report, created_at, updated_at";

/// Configuration for PostgreSQL connection pool.
///
/// Pool size balances concurrency with connection limits; timeouts fail fast.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/filings".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// PostgreSQL-backed record and preference store sharing one pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create both tables if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.pool.execute(FILING_TABLE_SCHEMA).await?;
        self.pool.execute(PREFERENCE_TABLE_SCHEMA).await?;
        Ok(())
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parse_filing_row(row: &PgRow) -> Result<FilingRecord, sqlx::Error> {
        let approval_date: NaiveDate = row.try_get("approval_date")?;
        let status: String = row.try_get("status")?;
        let signal: String = row.try_get("signal")?;

        Ok(FilingRecord {
            ttb_id: row.try_get("ttb_id")?,
            brand_name: row.try_get("brand_name")?,
            fanciful_name: row.try_get("fanciful_name")?,
            company_name: row.try_get("company_name")?,
            class_type_code: row.try_get("class_type_code")?,
            origin_code: row.try_get("origin_code")?,
            approval_date,
            status: FilingStatus::parse(&status),
            signal: Signal::parse(&signal),
            refile_count: row.try_get("refile_count")?,
        })
    }

    fn parse_preference_row(row: &PgRow) -> Result<UserPreference, StoreError> {
        let email: String = row.try_get("email")?;
        let tier_raw: String = row.try_get("tier")?;
        let tier = Tier::from_str(&tier_raw)
            .ok_or_else(|| StoreError::CorruptRow(format!("unknown tier '{}' for {}", tier_raw, email)))?;

        let tier_category: Option<String> = row.try_get("tier_category")?;
        let tier_category = match tier_category {
            Some(name) => match Category::from_name(&name) {
                Some(c) => Some(c),
                None => {
                    tracing::warn!(email = %email, category = %name, "Dropping unknown stored category");
                    None
                }
            },
            None => None,
        };
        let categories: Vec<String> = row.try_get("categories")?;
        let changed_at: Option<DateTime<Utc>> = row.try_get("category_changed_at")?;

        Ok(UserPreference {
            token: row.try_get("token")?,
            tier: TierState::from_columns(
                tier,
                tier_category,
                changed_at,
                categories.iter().filter_map(|c| Category::from_name(c)),
            ),
            receive_free_report: row.try_get("receive_free_report")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            email,
        })
    }

    fn bind_preference<'q>(
        q: Query<'q, Postgres, PgArguments>,
        pref: &UserPreference,
    ) -> Query<'q, Postgres, PgArguments> {
        let categories: Vec<String> = pref
            .tier
            .categories()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();
        q.bind(pref.email.clone())
            .bind(pref.token.clone())
            .bind(pref.is_pro())
            .bind(pref.tier().as_str())
            .bind(pref.tier.tier_category().map(|c| c.as_str()))
            .bind(pref.tier.category_changed_at())
            .bind(categories)
            .bind(pref.receive_free_report)
            .bind(pref.created_at)
            .bind(pref.updated_at)
    }
}

fn bind_params<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &[SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        q = match param {
            SqlParam::Text(s) => q.bind(s.clone()),
            SqlParam::Int(i) => q.bind(*i),
            SqlParam::TextList(list) => q.bind(list.clone()),
        };
    }
    q
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, StoreError> {
        let rendered = query.to_sql();
        let n = rendered.params.len();

        let count_sql = format!("SELECT COUNT(*) AS total FROM filings WHERE {}", rendered.where_sql);
        let rows_sql = format!(
            "SELECT {} FROM filings WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
            FILING_COLUMNS,
            rendered.where_sql,
            rendered.order_sql,
            n + 1,
            n + 2,
        );

        let total: i64 = bind_params(sqlx::query(&count_sql), &rendered.params)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let rows = bind_params(sqlx::query(&rows_sql), &rendered.params)
            .bind(i64::from(rendered.limit))
            .bind(i64::from(rendered.offset))
            .fetch_all(&self.pool)
            .await?;

        let rows = rows
            .iter()
            .map(Self::parse_filing_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            fingerprint = %query.structure_fingerprint(),
            total,
            returned = rows.len(),
            "Search executed"
        );

        Ok(SearchPage {
            rows,
            total: total.max(0) as u64,
        })
    }

    async fn get(&self, ttb_id: &str) -> Result<Option<FilingRecord>, StoreError> {
        let sql = format!("SELECT {} FROM filings WHERE ttb_id = $1", FILING_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(ttb_id.trim())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(Self::parse_filing_row(r)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PreferenceStore for PostgresStore {
    async fn get_by_token(&self, token: &str) -> Result<Option<UserPreference>, StoreError> {
        let sql = format!("SELECT {} FROM user_preferences WHERE token = $1", PREFERENCE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_preference_row).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserPreference>, StoreError> {
        let sql = format!("SELECT {} FROM user_preferences WHERE email = $1", PREFERENCE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_preference_row).transpose()
    }

    async fn upsert(&self, pref: &UserPreference) -> Result<UserPreference, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO user_preferences (
                email, token, is_pro, tier, tier_category, category_changed_at,
                categories, receive_free_report, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (email) DO UPDATE SET
                is_pro = EXCLUDED.is_pro,
                tier = EXCLUDED.tier,
                tier_category = EXCLUDED.tier_category,
                category_changed_at = EXCLUDED.category_changed_at,
                categories = EXCLUDED.categories,
                receive_free_report = EXCLUDED.receive_free_report,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            PREFERENCE_COLUMNS
        );
        let row = Self::bind_preference(sqlx::query(&sql), pref)
            .fetch_one(&self.pool)
            .await
            .map_err(conflict_or_database)?;

        Self::parse_preference_row(&row)
    }

    async fn insert_if_absent(&self, pref: &UserPreference) -> Result<UserPreference, StoreError> {
        let sql = r#"
            INSERT INTO user_preferences (
                email, token, is_pro, tier, tier_category, category_changed_at,
                categories, receive_free_report, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (email) DO NOTHING
        "#;
        Self::bind_preference(sqlx::query(sql), pref)
            .execute(&self.pool)
            .await
            .map_err(conflict_or_database)?;

        self.get_by_email(&pref.email)
            .await?
            .ok_or_else(|| StoreError::Conflict(format!("preference for {} vanished after insert", pref.email)))
    }
}

fn conflict_or_database(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Database(e),
    }
}
