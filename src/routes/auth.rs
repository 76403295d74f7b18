// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Withings OAuth callback route.

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/callback", get(auth_callback))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - verify state, exchange code for tokens, then shut down.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<String>> {
    // Check for OAuth errors
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Withings");
        return Err(AppError::BadRequest(format!(
            "Withings denied authorization: {}",
            error
        )));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state parameter".to_string()))?;
    if !state.withings.credentials().verify_state(&oauth_state).await {
        tracing::warn!("Invalid or replayed state parameter");
        return Err(AppError::BadRequest("Invalid state parameter".to_string()));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing code parameter".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    state.withings.credentials().exchange_code(&code).await?;

    tracing::info!(
        path = %state.config.token_path.display(),
        "OAuth successful, tokens stored"
    );
    state.shutdown.notify_one();

    Ok(Html(
        "<html><body><h1>Withings authorization complete</h1>\
         <p>Tokens have been saved. You can close this window.</p></body></html>"
            .to_string(),
    ))
}
