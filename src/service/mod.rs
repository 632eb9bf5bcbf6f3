//! Filing API REST service.
//!
//! ## Endpoints
//!
//! - `GET /api/search` - Filtered, paginated search (rate limited)
//! - `GET /api/records/:ttb_id` - One record with its category (rate limited)
//! - `POST /api/export` - Tier-scoped export, max 1000 rows (rate limited)
//! - `GET /api/categories` - Category taxonomy
//! - `GET /api/preferences` - Preferences by `token` or `email` (rate limited)
//! - `POST /api/preferences` - Update preferences (rate limited)
//! - `POST /api/checkout` - Start a subscription checkout (rate limited)
//! - `POST /api/webhooks/subscription` - Signed subscription events
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, rate_limit_middleware, record_rate_limit_denial, record_search_metrics};
pub use routes::{create_router, status_for, AppState, ErrorResponse};
pub use state::ServiceState;
