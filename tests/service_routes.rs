//! Router tests against in-memory stores.

#![cfg(feature = "service")]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use filing_gate::service::{create_router, ServiceState};
use filing_gate::{
    sign, FilingRecord, FilingStatus, InMemoryPreferenceStore, InMemoryRecordStore, ManualClock,
    PreferenceStore, PriceTierMap, RateLimitConfig, ServiceConfig, Signal,
    StaticSubscriptionProvider,
};

const SECRET: &[u8] = b"whsec_route_test";

struct App {
    router: Router,
    prefs: Arc<InMemoryPreferenceStore>,
    provider: Arc<StaticSubscriptionProvider>,
    clock: ManualClock,
}

fn filing(n: usize, code: &str) -> FilingRecord {
    FilingRecord {
        ttb_id: format!("25{:012}", n),
        brand_name: format!("Brand {n}"),
        fanciful_name: None,
        company_name: "Example Spirits Co".to_string(),
        class_type_code: code.to_string(),
        origin_code: "KY".to_string(),
        approval_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days((n % 28) as i64),
        status: FilingStatus::Approved,
        signal: Signal::NewBrand,
        refile_count: 0,
    }
}

fn app() -> App {
    app_with_proxy_hops(0)
}

fn app_with_proxy_hops(trusted_proxy_hops: usize) -> App {
    let prices = PriceTierMap::new(["price_cat"], ["price_premier"]);
    let config = ServiceConfig {
        rate_limit: RateLimitConfig {
            max_requests: 60,
            window: StdDuration::from_secs(60),
            sweep_probability: 0.0,
            trusted_proxy_hops,
        },
        prices: prices.clone(),
        webhook_secret: SECRET.to_vec(),
        ..Default::default()
    };

    let records = Arc::new(InMemoryRecordStore::with_records(
        (0..30)
            .map(|n| filing(n, "STRAIGHT BOURBON WHISKY"))
            .chain((30..40).map(|n| filing(n, "VODKA"))),
    ));
    let prefs = Arc::new(InMemoryPreferenceStore::new());
    let provider = Arc::new(StaticSubscriptionProvider::with_prices(prices));
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());

    let state = ServiceState::with_clock(
        records,
        prefs.clone(),
        provider.clone(),
        &config,
        Arc::new(clock.clone()),
    );

    App {
        router: create_router(state),
        prefs,
        provider,
        clock,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn peer(ip: &str) -> ConnectInfo<SocketAddr> {
    ConnectInfo(format!("{ip}:51000").parse().unwrap())
}

fn get(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .extension(peer(client))
        .body(Body::empty())
        .unwrap()
}

fn get_forwarded(uri: &str, client: &str, forwarded: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .extension(peer(client))
        .header("x-forwarded-for", forwarded)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .extension(peer("198.51.100.1"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_search_filters_and_paginates() {
    let app = app();
    let (status, _, body) = send(
        &app.router,
        get("/api/search?category=Whiskey&limit=10&page=2", "203.0.113.1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["pagination"]["total"], 30);
    assert_eq!(body["pagination"]["totalPages"], 3);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_search_rejects_page_past_ceiling() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/api/search?page=501", "203.0.113.2")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "PAGE_OUT_OF_RANGE");
    assert_eq!(body["maxPage"], 500);
}

#[tokio::test]
async fn test_search_rejects_unknown_status() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/api/search?status=PENDING", "203.0.113.3")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_rate_limit_after_sixty_requests() {
    let app = app();
    for i in 0..60 {
        let (status, headers, _) = send(&app.router, get("/api/search", "192.0.2.7")).await;
        assert_eq!(status, StatusCode::OK, "request {i}");
        assert_eq!(headers["x-ratelimit-remaining"], (59 - i).to_string().as_str());
    }

    let (status, headers, body) = send(&app.router, get("/api/search", "192.0.2.7")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(headers[header::RETRY_AFTER], "60");
    assert_eq!(body["retryAfter"], 60);

    // Other clients and unthrottled routes are unaffected.
    let (status, _, _) = send(&app.router, get("/api/search", "192.0.2.8")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app.router, get("/api/categories", "192.0.2.7")).await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance(Duration::seconds(60));
    let (status, _, _) = send(&app.router, get("/api/search", "192.0.2.7")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rotated_forwarded_header_still_throttled() {
    let app = app();
    for i in 0..60 {
        let spoofed = format!("10.9.{}.{}", i / 256, i % 256);
        let (status, _, _) = send(&app.router, get_forwarded("/api/search", "192.0.2.20", &spoofed)).await;
        assert_eq!(status, StatusCode::OK, "request {i}");
    }

    let (status, _, body) = send(
        &app.router,
        get_forwarded("/api/search", "192.0.2.20", "10.9.9.9"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_trusted_proxy_hop_keys_on_forwarded_client() {
    let app = app_with_proxy_hops(1);
    for i in 0..60 {
        // The left-most entry is client-supplied; the proxy appends the real one.
        let forwarded = format!("10.9.0.{i}, 203.0.113.50");
        let (status, _, _) = send(&app.router, get_forwarded("/api/search", "10.0.0.1", &forwarded)).await;
        assert_eq!(status, StatusCode::OK, "request {i}");
    }

    let (status, _, _) = send(
        &app.router,
        get_forwarded("/api/search", "10.0.0.1", "10.9.1.1, 203.0.113.50"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Same proxy, different client.
    let (status, _, _) = send(
        &app.router,
        get_forwarded("/api/search", "10.0.0.1", "203.0.113.51"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_preference_and_checkout_routes_are_throttled() {
    let app = app();
    for i in 0..60 {
        let uri = format!("/api/preferences?email=visitor{i}@example.com");
        let (status, _, _) = send(&app.router, get(&uri, "198.51.100.1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "request {i}");
    }
    assert_eq!(app.provider.lookups(), 60);

    let (status, _, body) = send(
        &app.router,
        get("/api/preferences?email=visitor60@example.com", "198.51.100.1"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(app.provider.lookups(), 60);

    let (status, _, _) = send(
        &app.router,
        post_json("/api/checkout", json!({ "email": "buy@example.com", "tier": "premier" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_malformed_input_uses_error_envelope() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/api/search?page=abc", "203.0.113.10")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let request = Request::builder()
        .method("POST")
        .uri("/api/preferences")
        .header(header::CONTENT_TYPE, "application/json")
        .extension(peer("203.0.113.10"))
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_record_detail_includes_classification() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/api/records/25000000000031", "203.0.113.4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["category"], "Vodka");
    assert_eq!(body["data"]["ttb_id"], "25000000000031");

    let (status, _, body) = send(&app.router, get("/api/records/nope", "203.0.113.4")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_category_switch_requires_confirmation() {
    let app = app();
    app.provider.add("switch@example.com", "price_cat");

    let (status, _, body) = send(
        &app.router,
        get("/api/preferences?email=switch@example.com", "203.0.113.5"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tier"], "category_pro");
    let token = app
        .prefs
        .get_by_email("switch@example.com")
        .await
        .unwrap()
        .unwrap()
        .token;

    let (status, _, _) = send(
        &app.router,
        post_json("/api/preferences", json!({ "token": token, "tierCategory": "Whiskey" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(
        &app.router,
        post_json("/api/preferences", json!({ "token": token, "tierCategory": "Gin" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFIRMATION_REQUIRED");
    assert_eq!(body["requiresConfirmation"], true);
    assert_eq!(body["currentCategory"], "Whiskey");
    assert_eq!(body["newCategory"], "Gin");

    let (status, _, body) = send(
        &app.router,
        post_json(
            "/api/preferences",
            json!({ "token": token, "tierCategory": "Gin", "confirmChange": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tierCategory"], "Gin");
    assert_eq!(body["data"]["canChangeCategory"], false);

    let (status, _, body) = send(
        &app.router,
        post_json(
            "/api/preferences",
            json!({ "token": token, "tierCategory": "Rum", "confirmChange": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "COOLDOWN_ACTIVE");
    assert!(body["cooldownEndsAt"].is_string());
}

#[tokio::test]
async fn test_export_scoped_to_subscriber_category() {
    let app = app();
    app.provider.add("export@example.com", "price_cat");
    let (status, _, _) = send(
        &app.router,
        get("/api/preferences?email=export@example.com", "203.0.113.6"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = app
        .prefs
        .get_by_email("export@example.com")
        .await
        .unwrap()
        .unwrap()
        .token;
    send(
        &app.router,
        post_json("/api/preferences", json!({ "token": token, "tierCategory": "Vodka" })),
    )
    .await;

    let (status, _, body) = send(
        &app.router,
        post_json(
            "/api/export",
            json!({ "token": token, "filters": { "category": "Whiskey" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalMatched"], 10);
    assert_eq!(body["data"]["truncated"], false);

    let (status, _, body) = send(
        &app.router,
        post_json("/api/export", json!({ "email": "stranger@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "AUTHORIZATION_ERROR");
}

#[tokio::test]
async fn test_signed_webhook_applies_subscription() {
    let app = app();
    let payload = json!({
        "id": "evt_route_1",
        "type": "customer.subscription.created",
        "data": { "object": {
            "status": "active",
            "metadata": { "email": "Hook@Example.com" },
            "items": { "data": [ { "price": { "id": "price_premier" } } ] }
        } }
    })
    .to_string();
    let timestamp = app.clock_now_timestamp();
    let signature = sign(SECRET, timestamp, payload.as_bytes()).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/subscription")
        .header("stripe-signature", signature)
        .body(Body::from(payload.clone()))
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["applied"], true);

    let stored = app.prefs.get_by_email("hook@example.com").await.unwrap().unwrap();
    assert_eq!(stored.tier().as_str(), "premier");

    let forged = sign(b"wrong_secret", timestamp, payload.as_bytes()).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/subscription")
        .header("stripe-signature", forged)
        .body(Body::from(payload))
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_checkout_validates_tier() {
    let app = app();
    let (status, _, body) = send(
        &app.router,
        post_json("/api/checkout", json!({ "email": "buy@example.com", "tier": "none" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _, body) = send(
        &app.router,
        post_json("/api/checkout", json!({ "email": "buy@example.com", "tier": "premier" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["url"].is_string());
}

#[tokio::test]
async fn test_health_endpoints_without_database() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/health", "203.0.113.9")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _, body) = send(&app.router, get("/health/ready", "203.0.113.9")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);

    let (status, _, body) = send(&app.router, get("/health/live", "203.0.113.9")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

impl App {
    fn clock_now_timestamp(&self) -> i64 {
        use filing_gate::Clock;
        self.clock.now().timestamp()
    }
}
