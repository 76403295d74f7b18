// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth callback server tests.
//!
//! These tests verify that:
//! 1. The callback rejects missing, forged and denied requests
//! 2. A valid callback exchanges the code, saves tokens and signals shutdown

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::*;

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let env = test_env().await;
    let (app, _) = create_test_app(env.config.clone());

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_callback_with_vendor_error() {
    let env = test_env().await;
    let (app, _) = create_test_app(env.config.clone());

    let response = app
        .oneshot(get("/callback?error=access_denied&state=whatever"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_rejects_forged_state() {
    let env = test_env().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a1", "r1")))
        .expect(0)
        .mount(&env.server)
        .await;
    let (app, state) = create_test_app(env.config.clone());
    state.withings.credentials().build_authorization_url().await.unwrap();

    let response = app
        .oneshot(get("/callback?code=abc&state=forged"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!env.token_path().exists());
}

#[tokio::test]
async fn test_callback_requires_state() {
    let env = test_env().await;
    let (app, _) = create_test_app(env.config.clone());

    let response = app.oneshot(get("/callback?code=abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_exchanges_code_and_signals_shutdown() {
    let env = test_env().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a1", "r1")))
        .expect(1)
        .mount(&env.server)
        .await;
    let (app, state) = create_test_app(env.config.clone());

    let url = state.withings.credentials().build_authorization_url().await.unwrap();
    let oauth_state = url
        .split('&')
        .find_map(|p| p.strip_prefix("state="))
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get(&format!("/callback?code=abc&state={}", oauth_state)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&body).contains("authorization complete"));

    assert!(env.token_path().exists());
    tokio::time::timeout(Duration::from_secs(1), state.shutdown.notified())
        .await
        .expect("shutdown should be signalled");
}

#[tokio::test]
async fn test_callback_exchange_failure_is_bad_gateway() {
    let env = test_env().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": 503, "error": "invalid code"})),
        )
        .mount(&env.server)
        .await;
    let (app, state) = create_test_app(env.config.clone());

    let url = state.withings.credentials().build_authorization_url().await.unwrap();
    let oauth_state = url
        .split('&')
        .find_map(|p| p.strip_prefix("state="))
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get(&format!("/callback?code=abc&state={}", oauth_state)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_callback_save_failure_keeps_server_running() {
    let mut env = test_env().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a1", "r1")))
        .expect(1)
        .mount(&env.server)
        .await;
    make_token_path_unwritable(&mut env);
    let (app, state) = create_test_app(env.config.clone());

    let url = state.withings.credentials().build_authorization_url().await.unwrap();
    let oauth_state = url
        .split('&')
        .find_map(|p| p.strip_prefix("state="))
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get(&format!("/callback?code=abc&state={}", oauth_state)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!env.token_path().exists());
    assert!(
        tokio::time::timeout(Duration::from_millis(100), state.shutdown.notified())
            .await
            .is_err(),
        "shutdown must not be signalled"
    );
}
