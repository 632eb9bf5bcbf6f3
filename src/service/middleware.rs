//! Service middleware for metrics and rate limiting.
//!
//! ## Metrics Exposed
//!
//! - `request` - request counts and latency by path pattern, method, status
//! - `search` - rows matched and returned per search
//! - `rate_limit` - denials by client

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::info;

use super::state::ServiceState;
use crate::error::AccessError;

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing; aggregate from logs.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "filing_gate::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Throttle `/api` requests per client.
///
/// The client is the socket peer. With `trusted_proxy_hops` configured, it is
/// the right-most `X-Forwarded-For` entry those proxies did not append.
pub async fn rate_limit_middleware(
    State(state): State<Arc<ServiceState>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_id(&request, state.trusted_proxy_hops);
    let decision = state.limiter.check(&client).await;

    if !decision.allowed {
        record_rate_limit_denial(&client);
        return AccessError::RateLimited {
            retry_after: decision.retry_after.unwrap_or(1),
        }
        .into_response();
    }

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        response.headers_mut().insert("x-ratelimit-remaining", value);
    }
    response
}

fn client_id(request: &Request, trusted_hops: usize) -> String {
    let Some(peer) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
    else {
        return "unknown".to_string();
    };
    if trusted_hops == 0 {
        return peer;
    }

    // Chain as seen by the innermost proxy: forwarded entries, then the peer.
    let mut chain: Vec<String> = request
        .headers()
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    chain.push(peer);

    let index = chain.len().saturating_sub(trusted_hops + 1);
    chain.swap_remove(index)
}

fn record_path_regex() -> Option<&'static regex_lite::Regex> {
    static RE: OnceLock<Option<regex_lite::Regex>> = OnceLock::new();
    RE.get_or_init(|| regex_lite::Regex::new(r"^/api/records/[^/]+").ok())
        .as_ref()
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Record ids become `:ttb_id`.
fn normalize_path(path: &str) -> String {
    match record_path_regex() {
        Some(re) => re.replace(path, "/api/records/:ttb_id").to_string(),
        None => path.to_string(),
    }
}

/// Record search metrics.
pub fn record_search_metrics(total: u64, returned: usize, page: u32, latency_ms: u64) {
    info!(
        target: "filing_gate::metrics",
        metric_type = "search",
        total = total,
        returned = returned,
        page = page,
        latency_ms = latency_ms,
        "search_metric"
    );
}

/// Record a rate-limit denial.
pub fn record_rate_limit_denial(client: &str) {
    info!(
        target: "filing_gate::metrics",
        metric_type = "rate_limit",
        client = %client,
        "rate_limit_metric"
    );
}
