//! Axum routes for the filing API.

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::entitlement::{CallerIdentity, PreferenceUpdate};
use crate::error::AccessError;
use crate::query::{PageParams, QueryBuilder, SearchFilters, MAX_PAGE};
use crate::taxonomy::{classify, Category};
use crate::types::{FilingRecord, Tier};
use crate::webhook::{parse_event, verify_signature, WebhookError, SIGNATURE_HEADER};

use super::middleware::{rate_limit_middleware, record_search_metrics};
use super::state::ServiceState;

/// Type alias for the shared router state.
pub type AppState = Arc<ServiceState>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Success envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always `true`.
    pub success: bool,
    /// Payload.
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data })
    }
}

/// Pagination block of a search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Total matching rows.
    pub total: u64,
    /// Pages available, capped at the page ceiling.
    pub total_pages: u32,
}

/// Search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Always `true`.
    pub success: bool,
    /// Rows.
    pub data: Vec<FilingRecord>,
    /// Paging.
    pub pagination: Pagination,
}

/// A record with its taxonomy placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDetail {
    /// The record.
    #[serde(flatten)]
    pub record: FilingRecord,
    /// Derived category.
    pub category: Category,
    /// Derived subcategory.
    pub subcategory: String,
}

/// Taxonomy listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryListing {
    /// Category.
    pub category: Category,
    /// Subcategory names in declaration order.
    pub subcategories: Vec<String>,
}

/// Export request.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    /// Caller identity.
    #[serde(flatten)]
    pub identity: CallerIdentity,
    /// Filters to export.
    #[serde(default)]
    pub filters: SearchFilters,
}

/// Preference update request.
#[derive(Debug, Clone, Deserialize)]
pub struct SavePreferencesRequest {
    /// Preference token.
    pub token: String,
    /// Changes.
    #[serde(flatten)]
    pub update: PreferenceUpdate,
}

/// Checkout request.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    /// Buyer email.
    pub email: String,
    /// Tier to buy.
    pub tier: String,
}

/// Webhook acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    /// Event was authentic and parsed.
    pub received: bool,
    /// Event changed a subscriber record.
    pub applied: bool,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
}

/// Database health information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub pool_size: u32,
    pub pool_idle: usize,
    pub pool_max: u32,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: bool,
    pub details: Option<String>,
}

/// Structured error envelope.
///
/// Context fields are present only for the errors that carry them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Seconds until a throttled caller may retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// End of a running category cooldown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_ends_at: Option<DateTime<Utc>>,
    /// Set when resubmitting with confirmation would succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
    /// Category currently selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_category: Option<Category>,
    /// Category requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_category: Option<Category>,
    /// Page ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_page: Option<u32>,
}

impl ErrorResponse {
    /// Create an error envelope with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
            retry_after: None,
            cooldown_ends_at: None,
            requires_confirmation: None,
            current_category: None,
            new_category: None,
            max_page: None,
        }
    }
}

impl From<&AccessError> for ErrorResponse {
    fn from(e: &AccessError) -> Self {
        let mut body = Self::new(e.code(), e.to_string());
        match e {
            AccessError::RateLimited { retry_after } => body.retry_after = Some(*retry_after),
            AccessError::CooldownActive { cooldown_ends_at } => {
                body.cooldown_ends_at = Some(*cooldown_ends_at)
            }
            AccessError::ConfirmationRequired { current, requested } => {
                body.requires_confirmation = Some(true);
                body.current_category = Some(*current);
                body.new_category = Some(*requested);
            }
            AccessError::PageOutOfRange { max, .. } => body.max_page = Some(*max),
            AccessError::Store(_) => body.error = "Internal error".to_string(),
            _ => {}
        }
        body
    }
}

/// HTTP status for an access error.
pub fn status_for(e: &AccessError) -> StatusCode {
    match e {
        AccessError::Validation(_) | AccessError::PageOutOfRange { .. } => StatusCode::BAD_REQUEST,
        AccessError::Authorization(_) => StatusCode::FORBIDDEN,
        AccessError::NotFound(_) => StatusCode::NOT_FOUND,
        AccessError::CooldownActive { .. } | AccessError::ConfirmationRequired { .. } => StatusCode::CONFLICT,
        AccessError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        AccessError::Upstream(_) => StatusCode::BAD_GATEWAY,
        AccessError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(code = %self.code(), error = %self, "Request failed");
        } else {
            tracing::warn!(code = %self.code(), error = %self, "Request rejected");
        }

        let mut response = (status, Json(ErrorResponse::from(&self))).into_response();
        if let AccessError::RateLimited { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<QueryRejection> for AccessError {
    fn from(rejection: QueryRejection) -> Self {
        AccessError::Validation(rejection.body_text())
    }
}

impl From<JsonRejection> for AccessError {
    fn from(rejection: JsonRejection) -> Self {
        AccessError::Validation(rejection.body_text())
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Filtered, paginated search.
async fn search_handler(
    State(state): State<AppState>,
    filters: Result<Query<SearchFilters>, QueryRejection>,
    paging: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, AccessError> {
    let (Query(filters), Query(paging)) = (filters?, paging?);
    let start = Instant::now();
    let query = QueryBuilder::new()
        .filters(filters)
        .page_params(&paging)
        .build()?;

    let page = state.records.search(&query).await?;

    let pages = page.total.div_ceil(u64::from(query.limit));
    let total_pages = pages.min(u64::from(MAX_PAGE)) as u32;
    record_search_metrics(page.total, page.rows.len(), query.page, start.elapsed().as_millis() as u64);

    Ok(Json(SearchResponse {
        success: true,
        pagination: Pagination {
            page: query.page,
            limit: query.limit,
            total: page.total,
            total_pages,
        },
        data: page.rows,
    }))
}

/// One record with its classification.
async fn record_handler(
    State(state): State<AppState>,
    Path(ttb_id): Path<String>,
) -> Result<Json<ApiResponse<RecordDetail>>, AccessError> {
    let record = state
        .records
        .get(&ttb_id)
        .await?
        .ok_or_else(|| AccessError::NotFound(format!("No filing {}", ttb_id)))?;

    let placement = classify(&record.class_type_code);
    Ok(ApiResponse::ok(RecordDetail {
        category: placement.category,
        subcategory: placement.subcategory,
        record,
    }))
}

/// Taxonomy listing.
async fn categories_handler() -> Json<ApiResponse<Vec<CategoryListing>>> {
    let listing = Category::SELECTABLE
        .iter()
        .map(|c| CategoryListing {
            category: *c,
            subcategories: c.subcategories().into_iter().map(str::to_string).collect(),
        })
        .collect();
    ApiResponse::ok(listing)
}

/// Tier-scoped export.
async fn export_handler(
    State(state): State<AppState>,
    request: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<crate::export::ExportResult>>, AccessError> {
    let Json(request) = request?;
    let plan = state.export.prepare_export(&request.identity, request.filters).await?;
    let result = state.export.run_export(&plan, state.records.as_ref()).await?;
    Ok(ApiResponse::ok(result))
}

/// Read preferences by token or email.
async fn get_preferences_handler(
    State(state): State<AppState>,
    identity: Result<Query<CallerIdentity>, QueryRejection>,
) -> Result<Json<ApiResponse<crate::entitlement::PreferenceView>>, AccessError> {
    let Query(identity) = identity?;
    if identity.token.is_none() && identity.email.is_none() {
        return Err(AccessError::Validation("A token or email is required".to_string()));
    }
    Ok(ApiResponse::ok(state.resolver.preferences_for(&identity).await?))
}

/// Update preferences.
async fn save_preferences_handler(
    State(state): State<AppState>,
    request: Result<Json<SavePreferencesRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<crate::entitlement::PreferenceView>>, AccessError> {
    let Json(request) = request?;
    let view = state
        .resolver
        .save_preferences(&request.token, &request.update)
        .await?;
    Ok(ApiResponse::ok(view))
}

/// Start a hosted checkout.
async fn checkout_handler(
    State(state): State<AppState>,
    request: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<crate::provider::CheckoutSession>>, AccessError> {
    let Json(request) = request?;
    let email = crate::types::normalize_email(&request.email);
    if email.is_empty() || !email.contains('@') {
        return Err(AccessError::Validation("A valid email is required".to_string()));
    }
    let tier = Tier::from_str(&request.tier)
        .filter(Tier::is_paid)
        .ok_or_else(|| AccessError::Validation(format!("Unknown tier: {}", request.tier)))?;

    let session = state.provider.create_checkout(&email, tier).await?;
    Ok(ApiResponse::ok(session))
}

/// Signed subscription status events.
async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, AccessError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    verify_signature(state.webhook_secret(), signature, &body, state.clock.now())?;

    let Some(event) = parse_event(&body)? else {
        return Ok(ApiResponse::ok(WebhookAck {
            received: true,
            applied: false,
        }));
    };

    tracing::info!(target: "filing_gate::access", event_id = %event.id, "Subscription webhook received");
    let applied = state
        .resolver
        .apply_subscription_event(&event.email, &event.event)
        .await?
        .is_some();

    Ok(ApiResponse::ok(WebhookAck {
        received: true,
        applied,
    }))
}

/// Health check endpoint (detailed).
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match &state.database {
        Some(db) => {
            let connected = db.is_healthy().await;
            let stats = db.pool_stats();
            (
                if connected { "healthy" } else { "degraded" },
                Some(DatabaseHealth {
                    connected,
                    pool_size: stats.size,
                    pool_idle: stats.idle,
                    pool_max: stats.max,
                }),
            )
        }
        None => ("healthy", None),
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}

/// Liveness probe endpoint. Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the database is connected (or none is configured), 503
/// otherwise.
async fn readiness_handler(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let db_healthy = match &state.database {
        Some(db) => db.is_healthy().await,
        None => true,
    };

    if db_healthy {
        Ok(Json(ReadinessResponse {
            ready: true,
            database: state.database.is_some(),
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                database: false,
                details: Some("Database connection failed".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router.
pub fn create_router(state: ServiceState) -> Router {
    let state = Arc::new(state);

    let throttled = Router::new()
        .route("/api/search", get(search_handler))
        .route("/api/records/:ttb_id", get(record_handler))
        .route("/api/export", post(export_handler))
        .route("/api/preferences", get(get_preferences_handler).post(save_preferences_handler))
        .route("/api/checkout", post(checkout_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit_middleware,
        ));

    Router::new()
        .merge(throttled)
        .route("/api/categories", get(categories_handler))
        .route("/api/webhooks/subscription", post(webhook_handler))
        // Health checks
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .layer(middleware::from_fn(super::middleware::metrics_middleware))
        .with_state(state)
}
