//! Concurrency test: many callers, one slow upstream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sdk_rust::{ProxyCall, ProxyClient};
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::{spawn_proxy, test_config, API_KEY};

#[tokio::test]
async fn test_calls_do_not_block_each_other() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&upstream)
        .await;

    let mut config = test_config();
    config.rate_limit.enabled = false;
    let (addr, shutdown) = spawn_proxy(config).await;

    let client = Arc::new(ProxyClient::new(&format!("http://{}", addr)).with_api_key(API_KEY));
    let call = ProxyCall::get(&upstream.uri());

    let concurrency = 20;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let call = call.clone();
        tasks.push(tokio::spawn(async move { client.send(&call).await }));
    }

    let mut ok = 0;
    for task in tasks {
        let reply = task.await.unwrap().unwrap();
        if reply.status == 200 && reply.body["data"] == json!({"ok": true}) {
            ok += 1;
        }
    }
    let elapsed = start.elapsed();

    assert_eq!(ok, concurrency);
    // Serialized handling would take 20 × 300ms.
    assert!(elapsed < Duration::from_secs(3), "calls were serialized: {:?}", elapsed);

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_arrivals_share_one_window() {
    let mut config = test_config();
    config.rate_limit.max_requests = 10;
    let (addr, shutdown) = spawn_proxy(config).await;

    let client = Arc::new(ProxyClient::new(&format!("http://{}", addr)).with_api_key(API_KEY));

    let mut tasks = Vec::new();
    for _ in 0..25 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move { client.send_raw(&json!({})).await }));
    }

    let mut admitted = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap().unwrap().status {
            400 => admitted += 1,
            429 => limited += 1,
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(admitted, 10);
    assert_eq!(limited, 15);

    shutdown.trigger();
}
