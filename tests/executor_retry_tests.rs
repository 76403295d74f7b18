// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request executor tests: refresh-once, retry-once.
//!
//! Each test pins exact call counts on the mock vendor, so an extra refresh
//! or retry fails the test when the mock server is dropped.

use serde_json::json;
use withings_mcp::error::AppError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::*;

fn weight_groups() -> serde_json::Value {
    json!([group(1, 0, 1_700_000_000, &[(1, 72_345, -3)])])
}

#[tokio::test]
async fn test_body_401_twice_gives_up_after_one_retry() {
    let env = test_env_with_tokens("a0", "r0").await;
    let rejected = ResponseTemplate::new(200).set_body_json(json!({"status": 401, "error": "XRequestID: Not provided"}));
    mount_measure(&env.server, "a0", rejected.clone(), 1).await;
    mount_refresh(&env.server, "r0", "a1", "r1", 1).await;
    mount_measure(&env.server, "a1", rejected, 1).await;
    let service = env.service();

    let err = service.get_latest_weight(None, None).await.unwrap_err();
    match err {
        AppError::Authentication(message) => assert_eq!(message, AppError::REAUTHENTICATE),
        other => panic!("expected Authentication, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_401_refreshes_and_retries() {
    let env = test_env_with_tokens("a0", "r0").await;
    mount_measure(&env.server, "a0", ResponseTemplate::new(401), 1).await;
    mount_refresh(&env.server, "r0", "a1", "r1", 1).await;
    mount_measure(
        &env.server,
        "a1",
        ResponseTemplate::new(200).set_body_json(measure_body(weight_groups())),
        1,
    )
    .await;
    let service = env.service();

    let weight = service.get_latest_weight(None, None).await.unwrap().unwrap();
    assert!((weight.value - 72.345).abs() < 1e-9);
    assert_eq!(weight.unit, "kg");
}

#[tokio::test]
async fn test_invalid_token_marker_refreshes_and_retries() {
    let env = test_env_with_tokens("a0", "r0").await;
    mount_measure(
        &env.server,
        "a0",
        ResponseTemplate::new(200).set_body_json(json!({
            "status": 100,
            "error": "invalid_token: The access token provided is invalid"
        })),
        1,
    )
    .await;
    mount_refresh(&env.server, "r0", "a1", "r1", 1).await;
    mount_measure(
        &env.server,
        "a1",
        ResponseTemplate::new(200).set_body_json(measure_body(weight_groups())),
        2,
    )
    .await;
    let service = env.service();

    assert!(service.get_latest_weight(None, None).await.unwrap().is_some());

    // The refreshed token is now cached; no further refresh.
    assert!(service.get_latest_weight(None, None).await.is_ok());
}

#[tokio::test]
async fn test_vendor_error_is_not_retried() {
    let env = test_env_with_tokens("a0", "r0").await;
    mount_measure(
        &env.server,
        "a0",
        ResponseTemplate::new(200).set_body_json(json!({"status": 503, "error": "Invalid Params"})),
        1,
    )
    .await;
    mount_refresh(&env.server, "r0", "a1", "r1", 0).await;
    let service = env.service();

    match service.get_latest_weight(None, None).await {
        Err(AppError::VendorApi { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "Invalid Params");
        }
        other => panic!("expected VendorApi, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_carries_http_status() {
    let env = test_env_with_tokens("a0", "r0").await;
    mount_measure(&env.server, "a0", ResponseTemplate::new(500), 1).await;
    mount_refresh(&env.server, "r0", "a1", "r1", 0).await;
    let service = env.service();

    let err = service.get_users().await.unwrap_err();
    assert!(matches!(err, AppError::VendorApi { status: 500, .. }), "{err:?}");
}

#[tokio::test]
async fn test_rejected_refresh_becomes_authentication_error() {
    let env = test_env_with_tokens("a0", "r0").await;
    mount_measure(&env.server, "a0", ResponseTemplate::new(401), 1).await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 503,
            "error": "Invalid Params: invalid refresh_token"
        })))
        .expect(1)
        .mount(&env.server)
        .await;
    let service = env.service();

    let err = service.get_body_composition(None, None).await.unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)), "{err:?}");
}

#[tokio::test]
async fn test_expired_cache_refreshes_before_first_attempt() {
    let env = test_env_with_refresh_token("r0").await;
    mount_refresh(&env.server, "r0", "a1", "r1", 1).await;
    mount_measure(
        &env.server,
        "a1",
        ResponseTemplate::new(200).set_body_json(measure_body(json!([]))),
        1,
    )
    .await;
    let service = env.service();

    assert_eq!(service.get_latest_weight(None, None).await.unwrap(), None);
}

#[tokio::test]
async fn test_unauthenticated_call_asks_for_authorization() {
    let env = test_env().await;
    let err = env.service().get_users().await.unwrap_err();
    assert!(matches!(err, AppError::NoRefreshToken));
    assert!(err.to_string().contains("authorization"));
}
