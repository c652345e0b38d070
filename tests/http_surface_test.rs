// ABOUTME: HTTP surface tests - health, admin stats, and rate-limit headers
// ABOUTME: Runs against a spawned server with the succeed-everything mock pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{make_token, spawn_server, MockBehavior, MockPipeline};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn health_is_public_and_reports_the_store() {
    let server = spawn_server(MockPipeline::new(MockBehavior::Succeed)).await;
    let response = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["database"], json!("up"));
    assert_eq!(body["service"], json!("clipchef"));
}

#[tokio::test]
async fn admin_stats_requires_the_configured_key() {
    let server = spawn_server(MockPipeline::new(MockBehavior::Succeed)).await;
    let client = reqwest::Client::new();
    let url = format!("{}/admin/stats", server.base_url);

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .get(&url)
        .header("x-admin-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("FORBIDDEN"));

    let response = client
        .get(&url)
        .header("x-admin-key", "test-admin-key")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["rate_gate"]["tracked_windows"].is_u64());
    assert!(body["cost_gate"]["daily_global"]["limit"].is_u64());
}

#[tokio::test]
async fn successful_analyze_carries_rate_limit_headers() {
    let server = spawn_server(MockPipeline::new(MockBehavior::Succeed)).await;
    let user = Uuid::new_v4();
    let token = make_token(user);

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/analyze", server.base_url))
        .bearer_auth(&token)
        .json(&json!({"url": "https://www.tiktok.com/@chef/video/1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let limit: u32 = response
        .headers()
        .get("x-ratelimit-limit")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap();
    let remaining: u32 = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap();
    assert_eq!(limit, 10);
    assert_eq!(remaining, 9);
    assert!(response.headers().contains_key("x-ratelimit-reset"));
}

#[tokio::test]
async fn rate_denials_carry_retry_after() {
    let server = spawn_server(MockPipeline::new(MockBehavior::Succeed)).await;
    let user = Uuid::new_v4();
    let token = make_token(user);
    server.profiles.set_quota(user, true, 0).await.unwrap();

    let client = reqwest::Client::new();
    let url = format!("{}/analyze", server.base_url);
    let payload = json!({"url": "https://www.tiktok.com/@chef/video/1"});

    // Exhaust the user minute window (10 allowed; the first one analyzes,
    // the rest return the owner duplicate)
    for _ in 0..10 {
        let response = client
            .post(&url)
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let response = client
        .post(&url)
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 429);
    assert!(response.headers().contains_key("retry-after"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("RATE_LIMITED"));

    // Follow-ups inside the block window report the sticky block
    let response = client
        .post(&url)
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("USER_BLOCKED"));
}
