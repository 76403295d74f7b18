// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential lifecycle for a single Withings account.
//!
//! Handles:
//! - Consent URL construction with an anti-CSRF `state`
//! - Authorization code exchange
//! - Access token caching with a conservative expiry
//! - Single-flight refresh shared by concurrent callers
//! - Persisting the rotated refresh token

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{CachedToken, PersistedTokens, TokenEnvelope, TokenGrant};
use crate::services::token_store::{resolve_startup_tokens, TokenStore, TokenStoreError};

/// OAuth scopes requested at consent time.
pub const OAUTH_SCOPE: &str = "user.info,user.metrics,user.activity";

/// Upper bound on how long an access token is trusted (2.5 hours).
const ACCESS_TOKEN_TTL_SECS: i64 = 150 * 60;

/// Safety margin subtracted from the vendor's `expires_in` (30 minutes).
const EXPIRY_MARGIN_SECS: i64 = 30 * 60;

/// Length of the random `state` parameter, in bytes before hex encoding.
const STATE_BYTES: usize = 16;

/// How long an access token is trusted when its real expiry is unknown.
pub fn access_token_ttl() -> Duration {
    Duration::seconds(ACCESS_TOKEN_TTL_SECS)
}

/// Expiry for a freshly granted token.
fn expiry_for(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    let secs = match expires_in {
        Some(expires_in) => (expires_in - EXPIRY_MARGIN_SECS).clamp(0, ACCESS_TOKEN_TTL_SECS),
        None => ACCESS_TOKEN_TTL_SECS,
    };
    now + Duration::seconds(secs)
}

/// Authorization state as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    /// No refresh token; the user must authorize.
    Unauthenticated,
    /// Cached access token is valid.
    Authenticated { expires_at: DateTime<Utc> },
    /// Refresh token present, access token missing or expired.
    Expired,
}

/// Snapshot of what the manager currently holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialStatus {
    #[serde(flatten)]
    pub state: AuthState,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
}

#[derive(Debug, Default)]
struct TokenState {
    access: Option<CachedToken>,
    refresh_token: Option<String>,
}

/// Owns the OAuth credentials and every mutation of them.
pub struct CredentialManager {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    authorize_url: String,
    tokens: RwLock<TokenState>,
    /// Serializes exchange and refresh so concurrent callers share one round trip.
    refresh_lock: Mutex<()>,
    /// `state` of the most recent consent URL, until the callback consumes it.
    pending_state: Mutex<Option<String>>,
    store: Arc<TokenStore>,
    rng: SystemRandom,
}

impl CredentialManager {
    /// Create a manager seeded from the environment and the token file.
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        let store = TokenStore::new(config.token_path.clone());
        let startup = resolve_startup_tokens(
            config.access_token.as_deref(),
            config.refresh_token.as_deref(),
            &store,
            Utc::now(),
            access_token_ttl(),
        );
        tracing::debug!(source = ?startup.source, "Credentials initialized");

        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            token_url: config.token_url.clone(),
            authorize_url: config.authorize_url.clone(),
            tokens: RwLock::new(TokenState {
                access: startup.access,
                refresh_token: startup.refresh_token,
            }),
            refresh_lock: Mutex::new(()),
            pending_state: Mutex::new(None),
            store: Arc::new(store),
            rng: SystemRandom::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    // ─── Authorization ───────────────────────────────────────────────────────

    /// Build the consent URL the user opens in a browser.
    pub async fn build_authorization_url(&self) -> Result<String> {
        let mut bytes = [0u8; STATE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate OAuth state")))?;
        let state = hex::encode(bytes);

        let url = format!(
            "{}?response_type=code&client_id={}&state={}&scope={}&redirect_uri={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            state,
            urlencoding::encode(OAUTH_SCOPE),
            urlencoding::encode(&self.redirect_uri),
        );

        *self.pending_state.lock().await = Some(state);
        Ok(url)
    }

    /// Check a callback's `state` against the last consent URL. Consumes it on match.
    pub async fn verify_state(&self, state: &str) -> bool {
        let mut pending = self.pending_state.lock().await;
        match pending.as_deref() {
            Some(expected) if expected == state => {
                *pending = None;
                true
            }
            _ => false,
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// A rejected exchange mutates nothing. If the grant succeeds but the token
    /// file cannot be written, the tokens stay cached for this process and the
    /// call fails with `AppError::TokenStore`.
    pub async fn exchange_code(&self, code: &str) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let grant = self
            .request_token(
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", self.redirect_uri.as_str()),
                ],
                |status, message| AppError::AuthExchange { status, message },
            )
            .await?;

        if let Err(e) = self.install(grant).await {
            tracing::error!(
                error = %e,
                path = %self.store.path().display(),
                "Authorization succeeded but tokens could not be saved"
            );
            return Err(e.into());
        }
        tracing::info!("Authorization code exchanged");
        Ok(())
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Refresh the access token unconditionally.
    pub async fn refresh(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Get a valid access token, refreshing if the cached one has expired.
    pub async fn get_valid_access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_valid_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.cached_valid_token().await {
            return Ok(token);
        }

        tracing::info!("Access token missing or expired, refreshing");
        self.refresh_locked().await
    }

    /// Replace a token the vendor just rejected.
    ///
    /// If another caller already replaced it, the replacement is returned
    /// without contacting the vendor.
    pub async fn refresh_after_rejection(&self, rejected_token: &str) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(token) = self.cached_valid_token().await {
            if token != rejected_token {
                return Ok(token);
            }
        }

        tracing::info!("Access token rejected by Withings, refreshing");
        self.tokens.write().await.access = None;
        self.refresh_locked().await
    }

    pub async fn status(&self) -> CredentialStatus {
        let tokens = self.tokens.read().await;
        let now = Utc::now();
        let valid = tokens.access.as_ref().filter(|t| t.is_valid_at(now));

        let state = match (valid, &tokens.refresh_token) {
            (Some(cached), _) => AuthState::Authenticated {
                expires_at: cached.expires_at,
            },
            (None, Some(_)) => AuthState::Expired,
            (None, None) => AuthState::Unauthenticated,
        };

        CredentialStatus {
            state,
            has_access_token: tokens.access.is_some(),
            has_refresh_token: tokens.refresh_token.is_some(),
        }
    }

    async fn cached_valid_token(&self) -> Option<String> {
        let tokens = self.tokens.read().await;
        tokens
            .access
            .as_ref()
            .filter(|t| t.is_valid_at(Utc::now()))
            .map(|t| t.access_token.clone())
    }

    /// Refresh with the current refresh token. Caller holds `refresh_lock`.
    async fn refresh_locked(&self) -> Result<String> {
        let refresh_token = self
            .tokens
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or(AppError::NoRefreshToken)?;

        let grant = self
            .request_token(
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                ],
                |status, message| AppError::Refresh { status, message },
            )
            .await?;

        let access_token = grant.access_token.clone();
        // The old refresh token may already be revoked, so memory wins here.
        if let Err(e) = self.install(grant).await {
            tracing::error!(
                error = %e,
                path = %self.store.path().display(),
                "Failed to persist tokens; continuing with in-memory credentials"
            );
        }
        tracing::info!("Access token refreshed");
        Ok(access_token)
    }

    /// POST to the token endpoint and validate the grant.
    async fn request_token(
        &self,
        grant_params: &[(&str, &str)],
        rejected: fn(i64, String) -> AppError,
    ) -> Result<TokenGrant> {
        let mut form = vec![
            ("action", "requesttoken"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant_params);

        let response = self.http.post(&self.token_url).form(&form).send().await?;
        let http_status = response.status();
        let body = response.text().await?;

        let envelope: TokenEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !http_status.is_success() => {
                return Err(rejected(
                    i64::from(http_status.as_u16()),
                    format!("HTTP {}: {}", http_status, body),
                ));
            }
            Err(e) => {
                return Err(rejected(0, format!("Invalid token response: {}", e)));
            }
        };

        envelope.into_grant().map_err(|(status, message)| {
            tracing::warn!(status, error = %message, "Token request rejected");
            rejected(status, message)
        })
    }

    /// Cache a new grant, then persist it off the async runtime.
    async fn install(&self, grant: TokenGrant) -> std::result::Result<(), TokenStoreError> {
        let expires_at = expiry_for(Utc::now(), grant.expires_in);
        {
            let mut tokens = self.tokens.write().await;
            tokens.access = Some(CachedToken {
                access_token: grant.access_token.clone(),
                expires_at,
            });
            tokens.refresh_token = Some(grant.refresh_token.clone());
        }

        let persisted = PersistedTokens {
            refresh_token: grant.refresh_token,
            access_token: Some(grant.access_token),
            access_token_expires_at: Some(expires_at),
        };
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&persisted)).await?
    }
}
