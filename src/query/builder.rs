//! Filter validation and [`SearchQuery`] construction.

use super::{
    PageParams, Predicate, QueryError, SearchFilters, SearchQuery, SortColumn, SortDirection,
    YearMonth, DEFAULT_LIMIT, MAX_LIMIT, MAX_PAGE, MAX_SEARCH_LEN,
};
use crate::taxonomy::Category;
use crate::types::{FilingStatus, Signal};

/// Builds a [`SearchQuery`] from raw caller input.
///
/// Sort problems are corrected silently; filter values that cannot be
/// interpreted and pages past the ceiling are errors.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    filters: SearchFilters,
    sort: Option<String>,
    order: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl QueryBuilder {
    /// Empty builder: no filters, default sort, first page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filters.
    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Set sort column and direction from raw strings.
    pub fn sort(mut self, column: Option<&str>, order: Option<&str>) -> Self {
        self.sort = column.map(str::to_string);
        self.order = order.map(str::to_string);
        self
    }

    /// Set the 1-based page.
    pub fn page(mut self, page: Option<u32>) -> Self {
        self.page = page;
        self
    }

    /// Set the page size.
    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Apply sort and paging parameters in one go.
    pub fn page_params(self, params: &PageParams) -> Self {
        self.sort(params.sort.as_deref(), params.order.as_deref())
            .page(params.page)
            .limit(params.limit)
    }

    /// Validate and build.
    pub fn build(&self) -> Result<SearchQuery, QueryError> {
        let page = self.page.unwrap_or(1).max(1);
        if page > MAX_PAGE {
            return Err(QueryError::PageOutOfRange { page, max: MAX_PAGE });
        }
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let sort = match self.sort.as_deref() {
            None => SortColumn::default(),
            Some(raw) => SortColumn::from_str(raw).unwrap_or_else(|| {
                tracing::debug!(sort = raw, "unknown sort column, using default");
                SortColumn::default()
            }),
        };
        let direction = self
            .order
            .as_deref()
            .and_then(SortDirection::from_str)
            .unwrap_or_default();

        Ok(SearchQuery {
            predicates: self.predicates()?,
            sort,
            direction,
            page,
            limit,
        })
    }

    /// Validate and build the first page with exactly `rows` rows,
    /// bypassing the interactive page-size clamp.
    pub fn build_with_limit(&self, rows: u32) -> Result<SearchQuery, QueryError> {
        let mut query = self.build()?;
        query.page = 1;
        query.limit = rows.max(1);
        Ok(query)
    }

    fn predicates(&self) -> Result<Vec<Predicate>, QueryError> {
        let f = &self.filters;
        let mut out = Vec::new();

        if let Some(q) = non_blank(&f.q) {
            out.push(Predicate::Search(q.chars().take(MAX_SEARCH_LEN).collect()));
        }
        if let Some(origin) = non_blank(&f.origin) {
            out.push(Predicate::Origin(origin.to_string()));
        }
        if let Some(status) = non_blank(&f.status) {
            let status = FilingStatus::from_str(status).ok_or_else(|| QueryError::InvalidFilter {
                field: "status",
                value: status.to_string(),
            })?;
            out.push(Predicate::Status(status));
        }
        if let Some(signal) = non_blank(&f.signal) {
            let signal = Signal::from_str(signal).ok_or_else(|| QueryError::InvalidFilter {
                field: "signal",
                value: signal.to_string(),
            })?;
            out.push(Predicate::Signal(signal));
        }
        if let Some(code) = non_blank(&f.class_type_code) {
            out.push(Predicate::ClassTypeCode(code.to_string()));
        }

        let category = match non_blank(&f.category) {
            Some(name) => Some(Category::from_name(name).ok_or_else(|| QueryError::InvalidFilter {
                field: "category",
                value: name.to_string(),
            })?),
            None => None,
        };
        if let Some(category) = category {
            out.push(Predicate::Category(category));
        }
        if let Some(sub) = non_blank(&f.subcategory) {
            let category = category.ok_or_else(|| QueryError::InvalidFilter {
                field: "subcategory",
                value: sub.to_string(),
            })?;
            let declared = category
                .subcategories()
                .into_iter()
                .find(|name| name.eq_ignore_ascii_case(sub))
                .ok_or_else(|| QueryError::InvalidFilter {
                    field: "subcategory",
                    value: sub.to_string(),
                })?;
            out.push(Predicate::Subcategory {
                category,
                subcategory: declared.to_string(),
            });
        }

        let from = parse_month(&f.date_from, "date_from")?;
        let to = parse_month(&f.date_to, "date_to")?;
        if from.is_some() || to.is_some() {
            out.push(Predicate::DateRange { from, to });
        }

        Ok(out)
    }
}

fn parse_month(value: &Option<String>, field: &'static str) -> Result<Option<YearMonth>, QueryError> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => YearMonth::parse(raw)
            .map(Some)
            .ok_or_else(|| QueryError::InvalidFilter {
                field,
                value: raw.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SqlParam;

    fn filters() -> SearchFilters {
        SearchFilters::default()
    }

    #[test]
    fn test_defaults() {
        let q = QueryBuilder::new().build().unwrap();
        assert!(q.predicates.is_empty());
        assert_eq!(q.sort, SortColumn::ApprovalDate);
        assert_eq!(q.direction, SortDirection::Desc);
        assert_eq!((q.page, q.limit, q.offset()), (1, DEFAULT_LIMIT, 0));

        let sql = q.to_sql();
        assert_eq!(sql.where_sql, "TRUE");
        assert_eq!(sql.order_sql, "approval_date DESC NULLS LAST, ttb_id DESC");
    }

    #[test]
    fn test_invalid_sort_silently_defaults() {
        let q = QueryBuilder::new()
            .sort(Some("brand_name; DROP TABLE filings"), Some("sideways"))
            .build()
            .unwrap();
        assert_eq!(q.sort, SortColumn::ApprovalDate);
        assert_eq!(q.direction, SortDirection::Desc);
    }

    #[test]
    fn test_page_ceiling_rejected() {
        assert!(QueryBuilder::new().page(Some(500)).build().is_ok());
        assert_eq!(
            QueryBuilder::new().page(Some(501)).build(),
            Err(QueryError::PageOutOfRange { page: 501, max: MAX_PAGE })
        );
    }

    #[test]
    fn test_limit_clamped_and_offset() {
        let q = QueryBuilder::new().page(Some(3)).limit(Some(1000)).build().unwrap();
        assert_eq!(q.limit, MAX_LIMIT);
        assert_eq!(q.offset(), 200);

        let q = QueryBuilder::new().page(Some(0)).limit(Some(0)).build().unwrap();
        assert_eq!((q.page, q.limit), (1, 1));
    }

    #[test]
    fn test_build_with_limit_is_single_unclamped_page() {
        let q = QueryBuilder::new().page(Some(7)).build_with_limit(1000).unwrap();
        assert_eq!((q.page, q.limit, q.offset()), (1, 1000, 0));
    }

    #[test]
    fn test_blank_filters_ignored() {
        let f = SearchFilters {
            q: Some("   ".into()),
            origin: Some(String::new()),
            ..filters()
        };
        let q = QueryBuilder::new().filters(f).build().unwrap();
        assert!(q.predicates.is_empty());
    }

    #[test]
    fn test_predicates_are_and_chained_in_order() {
        let f = SearchFilters {
            q: Some("Eagle".into()),
            origin: Some("ky".into()),
            status: Some("approved".into()),
            category: Some("vodka".into()),
            date_from: Some("2023-02".into()),
            ..filters()
        };
        let sql = QueryBuilder::new().filters(f).build().unwrap().to_sql();
        assert_eq!(
            sql.where_sql,
            "(brand_name ILIKE $1 OR fanciful_name ILIKE $1 OR company_name ILIKE $1 OR ttb_id ILIKE $1) \
             AND UPPER(origin_code) = $2 \
             AND UPPER(status) = $3 \
             AND (UPPER(class_type_code) = ANY($4) \
             OR (NOT UPPER(class_type_code) = ANY($5) \
             AND class_type_code ILIKE ANY($6) \
             AND NOT class_type_code ILIKE ANY($7))) \
             AND (approval_year > $8 OR (approval_year = $8 AND approval_month >= $9))"
        );
        assert_eq!(
            sql.params[..3],
            [
                SqlParam::Text("%Eagle%".into()),
                SqlParam::Text("KY".into()),
                SqlParam::Text("APPROVED".into()),
            ]
        );
        assert_eq!(sql.params[5], SqlParam::TextList(vec!["%VODKA%".into()]));
        assert_eq!(sql.params[7..], [SqlParam::Int(2023), SqlParam::Int(2)]);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let f = SearchFilters {
            category: Some("Kombucha".into()),
            ..filters()
        };
        assert!(matches!(
            QueryBuilder::new().filters(f).build(),
            Err(QueryError::InvalidFilter { field: "category", .. })
        ));
    }

    #[test]
    fn test_subcategory_requires_known_category_pair() {
        let ok = SearchFilters {
            category: Some("Wine".into()),
            subcategory: Some("sparkling wine".into()),
            ..filters()
        };
        let q = QueryBuilder::new().filters(ok).build().unwrap();
        assert!(q.predicates.contains(&Predicate::Subcategory {
            category: Category::Wine,
            subcategory: "Sparkling Wine".into(),
        }));

        let orphan = SearchFilters {
            subcategory: Some("Bourbon".into()),
            ..filters()
        };
        assert!(QueryBuilder::new().filters(orphan).build().is_err());
    }

    #[test]
    fn test_search_text_truncated() {
        let f = SearchFilters {
            q: Some("x".repeat(500)),
            ..filters()
        };
        let q = QueryBuilder::new().filters(f).build().unwrap();
        match &q.predicates[0] {
            Predicate::Search(text) => assert_eq!(text.chars().count(), MAX_SEARCH_LEN),
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn test_adversarial_text_keeps_structure() {
        let benign = SearchFilters {
            q: Some("eagle".into()),
            origin: Some("KY".into()),
            ..filters()
        };
        let hostile = SearchFilters {
            q: Some("x' OR '1'='1'; --\u{0}\n%_".into()),
            origin: Some("KY\"); DELETE FROM filings; --".into()),
            ..filters()
        };
        let a = QueryBuilder::new().filters(benign).build().unwrap();
        let b = QueryBuilder::new().filters(hostile).build().unwrap();

        assert_eq!(a.to_sql().where_sql, b.to_sql().where_sql);
        assert_eq!(a.structure_fingerprint(), b.structure_fingerprint());
        assert!(!b.to_sql().where_sql.contains('\''));
    }
}
