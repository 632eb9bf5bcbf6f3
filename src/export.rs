//! Tier-scoped bulk export.
//!
//! An export is a search with two differences: the caller's entitlement
//! decides which category it may cover, and no more than
//! [`EXPORT_ROW_CEILING`] rows are ever returned.

use serde::{Deserialize, Serialize};

use crate::entitlement::{CallerIdentity, Entitlement, EntitlementResolver};
use crate::error::AccessError;
use crate::query::{QueryBuilder, SearchFilters, SearchQuery};
use crate::store::RecordStore;
use crate::types::{FilingRecord, Tier};

/// Hard cap on exported rows, for every tier.
pub const EXPORT_ROW_CEILING: u32 = 1000;

/// A validated export, ready to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportPlan {
    /// Who the export runs for.
    pub entitlement: Entitlement,
    /// Query with the tier scope applied; a single page of `row_ceiling` rows.
    pub query: SearchQuery,
    /// Row cap.
    pub row_ceiling: u32,
}

/// Rows plus counts, so truncation is visible to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    /// Exported rows.
    pub rows: Vec<FilingRecord>,
    /// Rows matching the scoped filters.
    pub total_matched: u64,
    /// Rows actually returned.
    pub exported_count: usize,
    /// Whether `total_matched` exceeded the ceiling.
    pub truncated: bool,
}

/// Applies tier rules to export requests.
#[derive(Debug, Clone)]
pub struct ExportGuard {
    resolver: EntitlementResolver,
}

impl ExportGuard {
    /// Create a guard over `resolver`.
    pub fn new(resolver: EntitlementResolver) -> Self {
        Self { resolver }
    }

    /// Resolve the caller and build the scoped query.
    pub async fn prepare_export(
        &self,
        identity: &CallerIdentity,
        filters: SearchFilters,
    ) -> Result<ExportPlan, AccessError> {
        let entitlement = match self.resolver.resolve(identity).await {
            Ok(e) => e,
            Err(AccessError::NotFound(_)) => {
                return Err(AccessError::Authorization(
                    "Export requires an active subscription".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };

        let filters = scope_filters(&entitlement, filters)?;
        let query = QueryBuilder::new()
            .filters(filters)
            .build_with_limit(EXPORT_ROW_CEILING)?;

        tracing::info!(
            target: "filing_gate::access",
            email = %entitlement.email,
            tier = %entitlement.tier,
            fingerprint = %query.structure_fingerprint(),
            "Export prepared"
        );

        Ok(ExportPlan {
            entitlement,
            query,
            row_ceiling: EXPORT_ROW_CEILING,
        })
    }

    /// Execute a prepared export.
    pub async fn run_export(&self, plan: &ExportPlan, store: &dyn RecordStore) -> Result<ExportResult, AccessError> {
        let page = store.search(&plan.query).await?;
        let mut rows = page.rows;
        rows.truncate(plan.row_ceiling as usize);

        let result = ExportResult {
            exported_count: rows.len(),
            truncated: page.total > u64::from(plan.row_ceiling),
            total_matched: page.total,
            rows,
        };

        tracing::info!(
            target: "filing_gate::access",
            email = %plan.entitlement.email,
            total_matched = result.total_matched,
            exported = result.exported_count,
            truncated = result.truncated,
            "Export completed"
        );

        Ok(result)
    }
}

/// Apply the tier's category scope to caller filters.
///
/// `category_pro` exports are pinned to the subscriber's category: a
/// caller-supplied category is replaced and a subcategory from another
/// category is dropped.
pub fn scope_filters(entitlement: &Entitlement, mut filters: SearchFilters) -> Result<SearchFilters, AccessError> {
    match entitlement.tier {
        Tier::None => Err(AccessError::Authorization(
            "Export requires an active subscription".to_string(),
        )),
        Tier::Premier => Ok(filters),
        Tier::CategoryPro => {
            let category = entitlement.tier_category.ok_or_else(|| {
                AccessError::Authorization("Select a category first".to_string())
            })?;

            if let Some(requested) = filters.category.as_deref() {
                if !requested.trim().is_empty() && !requested.trim().eq_ignore_ascii_case(category.as_str()) {
                    tracing::debug!(
                        target: "filing_gate::access",
                        requested = %requested,
                        scoped = %category,
                        "Export category replaced by subscriber category"
                    );
                }
            }
            filters.category = Some(category.as_str().to_string());

            let keep_sub = filters.subcategory.as_deref().map_or(false, |sub| {
                category
                    .subcategories()
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(sub.trim()))
            });
            if !keep_sub {
                filters.subcategory = None;
            }
            Ok(filters)
        }
    }
}
