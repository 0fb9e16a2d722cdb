//! End-to-end tests over a real TCP socket.
//!
//! Starts the router on an ephemeral port and talks to it with reqwest.

use std::net::SocketAddr;

use bounded_cache::{api::create_router, AppState, BoundedCache, CacheConfig};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_test::assert_ok;

async fn spawn_server(max_capacity: usize, evict_to_capacity: usize) -> SocketAddr {
    let config = CacheConfig::new(16, max_capacity, evict_to_capacity, 1).unwrap();
    let cache = BoundedCache::expiring_lru(config).unwrap();
    let app = create_router(AppState::new(cache, 300));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_set_get_delete_round_trip() {
    let addr = spawn_server(100, 80).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let response = assert_ok!(
        client
            .put(format!("{}/set", base))
            .json(&json!({"key": "greeting", "value": "hello", "ttl": 30}))
            .send()
            .await
    );
    assert!(response.status().is_success());

    let response = assert_ok!(client.get(format!("{}/get/greeting", base)).send().await);
    assert!(response.status().is_success());
    let body: Value = assert_ok!(response.json().await);
    assert_eq!(body["value"], "hello");
    assert!(body["ttl"].as_u64().unwrap() <= 30);

    let response = assert_ok!(client.delete(format!("{}/del/greeting", base)).send().await);
    assert!(response.status().is_success());

    let response = assert_ok!(client.get(format!("{}/get/greeting", base)).send().await);
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_stay_bounded() {
    let addr = spawn_server(20, 10).await;
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for t in 0..4 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..25 {
                let response = client
                    .put(format!("http://{}/set", addr))
                    .json(&json!({"key": format!("k{}-{}", t, i), "value": "v"}))
                    .send()
                    .await
                    .unwrap();
                assert!(response.status().is_success());
            }
        }));
    }
    for task in tasks {
        assert_ok!(task.await);
    }

    // A pass may already be running from the write trigger; retry until one
    // of ours completes.
    let mut completed = false;
    for _ in 0..50 {
        let response = assert_ok!(client.post(format!("http://{}/cleanup", addr)).send().await);
        let body: Value = assert_ok!(response.json().await);
        if body["status"] == "completed" {
            completed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(completed);

    let response = assert_ok!(client.get(format!("http://{}/stats", addr)).send().await);
    let stats: Value = assert_ok!(response.json().await);
    assert!(stats["total_entries"].as_u64().unwrap() <= 20);
}
