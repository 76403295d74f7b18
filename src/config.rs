// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. A `.env` file in the working directory
//! is honored for local setups.

use std::env;
use std::path::PathBuf;

use crate::models::UnitSystem;

/// Default OAuth redirect URI, served by `withings-mcp authorize`.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/callback";

const DEFAULT_API_BASE_URL: &str = "https://wbsapi.withings.net";
const DEFAULT_TOKEN_URL: &str = "https://wbsapi.withings.net/v2/oauth2";
const DEFAULT_AUTHORIZE_URL: &str = "https://account.withings.com/oauth2_user/authorize2";

/// Token file location relative to the home directory.
const TOKEN_DIR: &str = ".withings-mcp";
const TOKEN_FILE: &str = "tokens.json";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Withings OAuth client ID
    pub client_id: String,
    /// Withings OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with Withings
    pub redirect_uri: String,
    /// Pre-seeded access token (only used together with `refresh_token`)
    pub access_token: Option<String>,
    /// Pre-seeded refresh token
    pub refresh_token: Option<String>,
    /// Attribution used when a tool call doesn't name one
    pub default_user_attrib: Option<i64>,
    /// Unit system used when a tool call doesn't name one
    pub default_unit: UnitSystem,
    /// Where the refresh token is persisted
    pub token_path: PathBuf,

    // --- Vendor endpoints (overridable for testing) ---
    pub api_base_url: String,
    pub token_url: String,
    pub authorize_url: String,

    /// Port for the one-shot OAuth callback server
    pub callback_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            client_id: required("WITHINGS_CLIENT_ID")?,
            client_secret: required("WITHINGS_CLIENT_SECRET")?,
            redirect_uri: env::var("WITHINGS_REDIRECT_URI")
                .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string()),
            access_token: optional("WITHINGS_ACCESS_TOKEN"),
            refresh_token: optional("WITHINGS_REFRESH_TOKEN"),
            default_user_attrib: parse_user_attrib(optional("WITHINGS_USER_ATTRIB").as_deref())?,
            default_unit: parse_unit_system(optional("WITHINGS_UNIT_SYSTEM").as_deref()),
            token_path: match optional("WITHINGS_TOKEN_PATH") {
                Some(path) => PathBuf::from(path),
                None => default_token_path()?,
            },
            api_base_url: env::var("WITHINGS_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            token_url: env::var("WITHINGS_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
            authorize_url: env::var("WITHINGS_AUTHORIZE_URL")
                .unwrap_or_else(|_| DEFAULT_AUTHORIZE_URL.to_string()),
            callback_port: match optional("WITHINGS_CALLBACK_PORT") {
                Some(port) => port.parse().map_err(|_| ConfigError::Invalid {
                    name: "WITHINGS_CALLBACK_PORT",
                    value: port,
                })?,
                None => 3000,
            },
        })
    }

    /// Config for tests, pointing every vendor endpoint at `base_url`.
    pub fn test_default(base_url: &str, token_path: PathBuf) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            access_token: None,
            refresh_token: None,
            default_user_attrib: None,
            default_unit: UnitSystem::Metric,
            token_path,
            api_base_url: base_url.to_string(),
            token_url: format!("{}/v2/oauth2", base_url),
            authorize_url: format!("{}/oauth2_user/authorize2", base_url),
            callback_port: 0,
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

/// Read a variable, treating blank values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_token_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(TOKEN_DIR).join(TOKEN_FILE))
}

/// Parse the default attribution; absent means "all users".
pub fn parse_user_attrib(value: Option<&str>) -> Result<Option<i64>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name: "WITHINGS_USER_ATTRIB",
                value: raw.to_string(),
            }),
    }
}

/// Parse the default unit system. Anything unrecognized falls back to metric.
pub fn parse_unit_system(value: Option<&str>) -> UnitSystem {
    match value {
        None => UnitSystem::Metric,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "Unknown WITHINGS_UNIT_SYSTEM, using metric");
            UnitSystem::Metric
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "Missing required environment variable: {0}. \
         Set WITHINGS_CLIENT_ID and WITHINGS_CLIENT_SECRET."
    )]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("Could not determine home directory; set WITHINGS_TOKEN_PATH")]
    NoHomeDir,
}
