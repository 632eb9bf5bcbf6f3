//! Bounded, parameterized search queries.
//!
//! ## Pipeline
//!
//! ```text
//! SearchFilters + sort/order + page/limit
//!        │  QueryBuilder::build()
//!        ▼
//! SearchQuery { predicates, sort, direction, page, limit }
//!        │  to_sql()
//!        ▼
//! RenderedQuery { where_sql, params, order_sql, limit, offset }
//! ```
//!
//! ## Bounds
//!
//! | Bound | Value | On violation |
//! |-------|-------|--------------|
//! | page | 1..=500 | `page > 500` rejected |
//! | limit | 1..=100 | clamped |
//! | search text | 200 chars | truncated |
//! | sort column | allow-list | replaced with `approval_date` |

pub mod builder;
pub mod predicate;

use serde::{Deserialize, Serialize};

use crate::error::AccessError;
use crate::fingerprint::canonical_hash_hex;
use crate::types::FilingRecord;

pub use builder::QueryBuilder;
pub use predicate::{escape_like, CategoryTerms, ParamSink, Predicate, SqlParam, YearMonth};

/// Highest page a search may request.
pub const MAX_PAGE: u32 = 500;

/// Page size when none is given.
pub const DEFAULT_LIMIT: u32 = 50;

/// Largest page size.
pub const MAX_LIMIT: u32 = 100;

/// Longest free-text search honoured, in characters.
pub const MAX_SEARCH_LEN: usize = 200;

/// Caller-supplied filters. Every field is optional; blank values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Free text across brand, fanciful name, company and id.
    #[serde(default)]
    pub q: Option<String>,
    /// Origin code.
    #[serde(default)]
    pub origin: Option<String>,
    /// Filing status.
    #[serde(default)]
    pub status: Option<String>,
    /// Market signal.
    #[serde(default)]
    pub signal: Option<String>,
    /// Exact raw class/type code.
    #[serde(default)]
    pub class_type_code: Option<String>,
    /// Canonical category name.
    #[serde(default)]
    pub category: Option<String>,
    /// Subcategory name (requires `category`).
    #[serde(default)]
    pub subcategory: Option<String>,
    /// Lower approval bound, `YYYY-MM`.
    #[serde(default)]
    pub date_from: Option<String>,
    /// Upper approval bound, `YYYY-MM`.
    #[serde(default)]
    pub date_to: Option<String>,
}

/// Sort and paging parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    /// Sort column name.
    #[serde(default)]
    pub sort: Option<String>,
    /// `asc` or `desc`.
    #[serde(default)]
    pub order: Option<String>,
    /// 1-based page.
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size.
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Sortable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    /// Approval date (default).
    #[default]
    ApprovalDate,
    /// Brand name.
    BrandName,
    /// Company name.
    CompanyName,
    /// Fanciful name.
    FancifulName,
    /// Filing id.
    TtbId,
    /// Re-file count.
    RefileCount,
}

impl SortColumn {
    /// Parse against the allow-list.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "approval_date" => Some(Self::ApprovalDate),
            "brand_name" => Some(Self::BrandName),
            "company_name" => Some(Self::CompanyName),
            "fanciful_name" => Some(Self::FancifulName),
            "ttb_id" => Some(Self::TtbId),
            "refile_count" => Some(Self::RefileCount),
            _ => None,
        }
    }

    /// Column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::ApprovalDate => "approval_date",
            Self::BrandName => "brand_name",
            Self::CompanyName => "company_name",
            Self::FancifulName => "fanciful_name",
            Self::TtbId => "ttb_id",
            Self::RefileCount => "refile_count",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending (default).
    #[default]
    Desc,
}

impl SortDirection {
    /// Parse `asc` / `desc`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Query construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Page beyond [`MAX_PAGE`].
    #[error("Page {page} exceeds the maximum of {max}")]
    PageOutOfRange {
        /// Requested page.
        page: u32,
        /// Ceiling.
        max: u32,
    },
    /// A filter value could not be interpreted.
    #[error("Invalid value for {field}: {value}")]
    InvalidFilter {
        /// Filter name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

impl From<QueryError> for AccessError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::PageOutOfRange { page, max } => AccessError::PageOutOfRange { page, max },
            other => AccessError::Validation(other.to_string()),
        }
    }
}

/// A validated search, ready to render or evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// AND-chained predicates.
    pub predicates: Vec<Predicate>,
    /// Sort column.
    pub sort: SortColumn,
    /// Sort direction.
    pub direction: SortDirection,
    /// 1-based page.
    pub page: u32,
    /// Rows per page.
    pub limit: u32,
}

/// SQL fragments plus bound values for a [`SearchQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedQuery {
    /// Predicate text (without the `WHERE` keyword).
    pub where_sql: String,
    /// Values for `$1..$n`.
    pub params: Vec<SqlParam>,
    /// Ordering (without `ORDER BY`).
    pub order_sql: String,
    /// Row limit.
    pub limit: u32,
    /// Row offset.
    pub offset: u32,
}

impl SearchQuery {
    /// Start building a query.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Render predicates, params and ordering.
    pub fn to_sql(&self) -> RenderedQuery {
        let mut sink = ParamSink::default();
        let clauses: Vec<String> = self.predicates.iter().map(|p| p.to_sql(&mut sink)).collect();
        let where_sql = if clauses.is_empty() {
            "TRUE".to_string()
        } else {
            clauses.join(" AND ")
        };
        RenderedQuery {
            where_sql,
            params: sink.into_params(),
            order_sql: self.order_sql(),
            limit: self.limit,
            offset: self.offset(),
        }
    }

    /// `ORDER BY` body; `ttb_id` breaks ties.
    pub fn order_sql(&self) -> String {
        let dir = self.direction.as_sql();
        match self.sort {
            SortColumn::TtbId => format!("ttb_id {dir}"),
            col => format!("{} {dir} NULLS LAST, ttb_id {dir}", col.column()),
        }
    }

    /// Hash of the rendered SQL text only. Two queries with the same filter
    /// kinds share a fingerprint whatever the filter values are.
    pub fn structure_fingerprint(&self) -> String {
        let rendered = self.to_sql();
        canonical_hash_hex(&(&rendered.where_sql, &rendered.order_sql))
    }

    /// Whether a record satisfies every predicate.
    pub fn matches(&self, record: &FilingRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Ordering comparator with the semantics of [`SearchQuery::order_sql`].
    pub fn compare(&self, a: &FilingRecord, b: &FilingRecord) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        let primary = match self.sort {
            SortColumn::ApprovalDate => a.approval_date.cmp(&b.approval_date),
            SortColumn::BrandName => a.brand_name.cmp(&b.brand_name),
            SortColumn::CompanyName => a.company_name.cmp(&b.company_name),
            SortColumn::RefileCount => a.refile_count.cmp(&b.refile_count),
            SortColumn::TtbId => Ordering::Equal,
            SortColumn::FancifulName => match (&a.fanciful_name, &b.fanciful_name) {
                // NULLS LAST regardless of direction.
                (None, None) => Ordering::Equal,
                (None, Some(_)) => return Ordering::Greater,
                (Some(_), None) => return Ordering::Less,
                (Some(x), Some(y)) => x.cmp(y),
            },
        };
        let ordering = primary.then_with(|| a.ttb_id.cmp(&b.ttb_id));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Rows on this page.
    pub rows: Vec<FilingRecord>,
    /// Total rows matching the predicates.
    pub total: u64,
}
