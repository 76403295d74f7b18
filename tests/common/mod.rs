// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;
use withings_mcp::config::Config;
use withings_mcp::routes::create_router;
use withings_mcp::services::WithingsService;
use withings_mcp::AppState;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock Withings API plus a private token directory.
pub struct TestEnv {
    pub server: MockServer,
    /// Held so the token directory outlives the test.
    #[allow(dead_code)]
    pub dir: TempDir,
    pub config: Config,
}

impl TestEnv {
    #[allow(dead_code)]
    pub fn token_path(&self) -> PathBuf {
        self.config.token_path.clone()
    }

    #[allow(dead_code)]
    pub fn service(&self) -> WithingsService {
        WithingsService::new(&self.config).expect("service should build")
    }
}

/// Point the token file under a regular file so every save fails.
#[allow(dead_code)]
pub fn make_token_path_unwritable(env: &mut TestEnv) {
    let blocker = env.dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").expect("write blocker");
    env.config.token_path = blocker.join("tokens.json");
}

/// Start a mock vendor with no credentials configured.
#[allow(dead_code)]
pub async fn test_env() -> TestEnv {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::test_default(&server.uri(), dir.path().join("tokens.json"));
    TestEnv {
        server,
        dir,
        config,
    }
}

/// Mock vendor with only a refresh token, so the first call must refresh.
#[allow(dead_code)]
pub async fn test_env_with_refresh_token(refresh_token: &str) -> TestEnv {
    let mut env = test_env().await;
    env.config.refresh_token = Some(refresh_token.to_string());
    env
}

/// Mock vendor with a valid access token already in hand.
#[allow(dead_code)]
pub async fn test_env_with_tokens(access_token: &str, refresh_token: &str) -> TestEnv {
    let mut env = test_env().await;
    env.config.access_token = Some(access_token.to_string());
    env.config.refresh_token = Some(refresh_token.to_string());
    env
}

/// Successful token endpoint body.
#[allow(dead_code)]
pub fn token_body(access_token: &str, refresh_token: &str) -> Value {
    json!({
        "status": 0,
        "body": {
            "userid": "12345",
            "access_token": access_token,
            "refresh_token": refresh_token,
            "expires_in": 10800,
            "scope": "user.info,user.metrics,user.activity",
            "token_type": "Bearer"
        }
    })
}

/// Successful `getmeas` body.
#[allow(dead_code)]
pub fn measure_body(groups: Value) -> Value {
    json!({
        "status": 0,
        "body": {
            "updatetime": 1_700_000_000,
            "timezone": "Europe/Paris",
            "more": 0,
            "offset": 0,
            "measuregrps": groups
        }
    })
}

/// One measure group in vendor format. `measures` is `(type, value, unit)`.
#[allow(dead_code)]
pub fn group(grpid: i64, attrib: i64, date: i64, measures: &[(i32, i64, i32)]) -> Value {
    let measures: Vec<Value> = measures
        .iter()
        .map(|(t, v, u)| json!({"value": v, "type": t, "unit": u, "algo": 0, "fm": 131}))
        .collect();
    json!({
        "grpid": grpid,
        "attrib": attrib,
        "date": date,
        "created": date,
        "modified": date,
        "category": 1,
        "deviceid": "scale-1",
        "measures": measures
    })
}

/// Expect exactly `times` refreshes using `old_refresh`, granting the new pair.
#[allow(dead_code)]
pub async fn mount_refresh(
    server: &MockServer,
    old_refresh: &str,
    new_access: &str,
    new_refresh: &str,
    times: u64,
) {
    Mock::given(method("POST"))
        .and(path("/v2/oauth2"))
        .and(body_string_contains("action=requesttoken"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(format!("refresh_token={}", old_refresh)))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(new_access, new_refresh)))
        .expect(times)
        .mount(server)
        .await;
}

/// Expect exactly `times` measurement calls bearing `access_token`.
#[allow(dead_code)]
pub async fn mount_measure(server: &MockServer, access_token: &str, response: ResponseTemplate, times: u64) {
    Mock::given(method("GET"))
        .and(path("/measure"))
        .and(header("authorization", format!("Bearer {}", access_token).as_str()))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

/// Create a callback-server app for `config`.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(config: Config) -> (axum::Router, Arc<AppState>) {
    let withings = WithingsService::new(&config).expect("service should build");
    let state = Arc::new(AppState {
        config,
        withings,
        shutdown: Notify::new(),
    });

    (create_router(state.clone()), state)
}
