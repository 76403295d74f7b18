// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-file persistence for OAuth tokens.
//!
//! The file holds `{refreshToken, accessToken?, accessTokenExpiresAt?}`.
//! Saves go through a sibling temp file and a rename, so readers see either
//! the old contents or the new ones.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::models::{CachedToken, PersistedTokens};

/// Token store errors
#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("Refusing to save an empty refresh token")]
    EmptyRefreshToken,

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize tokens: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Token save task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Token file at a fixed path.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read saved tokens. A missing or unreadable file means "no saved tokens".
    pub fn load(&self) -> Option<PersistedTokens> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No saved tokens found");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read token file");
                return None;
            }
        };

        match serde_json::from_str::<PersistedTokens>(&contents) {
            Ok(tokens) if !tokens.refresh_token.is_empty() => Some(tokens),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "Token file has an empty refresh token");
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to parse token file");
                None
            }
        }
    }

    /// Persist tokens, replacing the previous file atomically.
    pub fn save(&self, tokens: &PersistedTokens) -> Result<(), TokenStoreError> {
        if tokens.refresh_token.is_empty() {
            return Err(TokenStoreError::EmptyRefreshToken);
        }
        let json = serde_json::to_string_pretty(tokens)?;

        // A poisoned lock only means an earlier writer panicked; the file
        // itself is still whole.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }

        let tmp_path = self.tmp_path();
        let result = write_private(&tmp_path, json.as_bytes())
            .and_then(|()| fs::rename(&tmp_path, &self.path));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(&self.path, e));
        }

        tracing::debug!(path = %self.path.display(), "Tokens saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "tokens.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Where the startup credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    File,
    EnvironmentRefreshOnly,
    None,
}

/// Credentials the process starts with.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupTokens {
    pub access: Option<CachedToken>,
    pub refresh_token: Option<String>,
    pub source: TokenSource,
}

/// Choose startup credentials.
///
/// Precedence: an env access+refresh pair, then the token file, then a lone
/// env refresh token, then nothing. An env access token has no known expiry
/// and is trusted for `access_ttl` from `now`.
pub fn resolve_startup_tokens(
    env_access: Option<&str>,
    env_refresh: Option<&str>,
    store: &TokenStore,
    now: DateTime<Utc>,
    access_ttl: Duration,
) -> StartupTokens {
    let env_access = env_access.filter(|t| !t.is_empty());
    let env_refresh = env_refresh.filter(|t| !t.is_empty());

    if let (Some(access), Some(refresh)) = (env_access, env_refresh) {
        tracing::info!("Using tokens from environment");
        return StartupTokens {
            access: Some(CachedToken {
                access_token: access.to_string(),
                expires_at: now + access_ttl,
            }),
            refresh_token: Some(refresh.to_string()),
            source: TokenSource::Environment,
        };
    }

    if let Some(saved) = store.load() {
        tracing::info!(path = %store.path().display(), "Using saved tokens");
        let access = match (saved.access_token, saved.access_token_expires_at) {
            (Some(access_token), Some(expires_at)) if now < expires_at => Some(CachedToken {
                access_token,
                expires_at,
            }),
            _ => None,
        };
        return StartupTokens {
            access,
            refresh_token: Some(saved.refresh_token),
            source: TokenSource::File,
        };
    }

    if let Some(refresh) = env_refresh {
        tracing::info!("Using refresh token from environment");
        return StartupTokens {
            access: None,
            refresh_token: Some(refresh.to_string()),
            source: TokenSource::EnvironmentRefreshOnly,
        };
    }

    tracing::info!("No tokens available; authorization required");
    StartupTokens {
        access: None,
        refresh_token: None,
        source: TokenSource::None,
    }
}
