//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use bounded_cache::{api::create_router, AppState, BoundedCache, CacheConfig};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_sized_app(100, 80)
}

fn create_sized_app(max_capacity: usize, evict_to_capacity: usize) -> Router {
    let config = CacheConfig::new(16, max_capacity, evict_to_capacity, 0).unwrap();
    let cache = BoundedCache::expiring_lru(config).unwrap();
    create_router(AppState::new(cache, 300))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

async fn set(app: &Router, key: &str, value: &str) {
    let body = format!(r#"{{"key":"{}","value":"{}"}}"#, key, value);
    let response = send(app, "PUT", "/set", Some(&body)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let app = create_test_app();

    let response = send(
        &app,
        "PUT",
        "/set",
        Some(r#"{"key":"test_key","value":"test_value"}"#),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_set_endpoint_with_ttl() {
    let app = create_test_app();

    let response = send(
        &app,
        "PUT",
        "/set",
        Some(r#"{"key":"ttl_key","value":"ttl_value","ttl":60}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "GET", "/get/ttl_key", None).await;
    let json = body_to_json(response.into_body()).await;
    assert!(json["ttl"].as_u64().unwrap() <= 60);
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_success() {
    let app = create_test_app();
    set(&app, "get_key", "get_value").await;

    let response = send(&app, "GET", "/get/get_key", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"].as_str().unwrap(), "get_key");
    assert_eq!(json["value"].as_str().unwrap(), "get_value");
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let response = send(&app, "GET", "/get/nonexistent", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let app = create_test_app();
    set(&app, "del_key", "del_value").await;

    let response = send(&app, "DELETE", "/del/del_key", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "GET", "/get/del_key", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_endpoint_not_found() {
    let app = create_test_app();

    let response = send(&app, "DELETE", "/del/nonexistent", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();
    set(&app, "stats_key", "stats_value").await;

    // hit
    send(&app, "GET", "/get/stats_key", None).await;
    // miss
    send(&app, "GET", "/get/missing", None).await;

    let response = send(&app, "GET", "/stats", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"].as_u64().unwrap(), 1);
    assert_eq!(json["misses"].as_u64().unwrap(), 1);
    assert_eq!(json["total_entries"].as_u64().unwrap(), 1);
    assert_eq!(json["max_capacity"].as_u64().unwrap(), 100);
    assert_eq!(json["evict_to_capacity"].as_u64().unwrap(), 80);
    assert!((json["hit_rate"].as_f64().unwrap() - 0.5).abs() < 0.001);
}

// == CLEANUP Endpoint Tests ==

#[tokio::test]
async fn test_cleanup_endpoint_evicts_least_recent() {
    let app = create_sized_app(5, 3);
    for i in 0..8 {
        set(&app, &format!("key{}", i), "v").await;
        tokio::task::yield_now().await;
    }
    // Let any write-triggered pass settle before forcing one.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = send(&app, "POST", "/cleanup", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"].as_str().unwrap(), "completed");

    let response = send(&app, "GET", "/stats", None).await;
    let json = body_to_json(response.into_body()).await;
    assert!(json["total_entries"].as_u64().unwrap() <= 5);

    for i in 5..8 {
        let response = send(&app, "GET", &format!("/get/key{}", i), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = send(&app, "GET", "/get/key0", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cleanup_endpoint_noop_below_capacity() {
    let app = create_test_app();
    set(&app, "a", "1").await;

    let response = send(&app, "POST", "/cleanup", None).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"].as_str().unwrap(), "completed");
    assert_eq!(json["evicted"].as_u64().unwrap(), 0);
    assert_eq!(json["remaining"].as_u64().unwrap(), 1);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = send(&app, "GET", "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"].as_str().unwrap(), "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = send(&app, "PUT", "/set", Some("not valid json")).await;

    // Axum returns 400 for malformed JSON bodies
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_empty_key_request() {
    let app = create_test_app();

    let response = send(&app, "PUT", "/set", Some(r#"{"key":"","value":"v"}"#)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

// == TTL Expiration via API Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app();

    let response = send(
        &app,
        "PUT",
        "/set",
        Some(r#"{"key":"expiring","value":"soon","ttl":1}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "GET", "/get/expiring", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = send(&app, "GET", "/get/expiring", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
