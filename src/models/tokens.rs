// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token models: the persisted file and the token endpoint's wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contents of the token file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTokens {
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<DateTime<Utc>>,
}

/// Access token held in memory with its expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Raw token endpoint response: `{status, body?, error?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEnvelope {
    pub status: i64,
    #[serde(default)]
    pub body: Option<TokenBody>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Every field is optional on the wire; `TokenGrant` is the validated form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// A successful token grant with both tokens present.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
}

impl TokenEnvelope {
    /// Decode into a grant, or the vendor status and error text explaining why not.
    pub fn into_grant(self) -> Result<TokenGrant, (i64, String)> {
        if self.status != 0 {
            let message = self.error.unwrap_or_else(|| "Unknown error".to_string());
            return Err((self.status, message));
        }

        let body = self.body.unwrap_or_default();
        match (
            non_empty(body.access_token),
            non_empty(body.refresh_token),
        ) {
            (Some(access_token), Some(refresh_token)) => Ok(TokenGrant {
                access_token,
                refresh_token,
                expires_in: body.expires_in,
            }),
            (None, _) => Err((self.status, "Invalid token response: missing access_token".into())),
            (_, None) => Err((self.status, "Invalid token response: missing refresh_token".into())),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_from_success() {
        let json = r#"{"status":0,"body":{"userid":"1","access_token":"a","refresh_token":"r","expires_in":10800,"scope":"user.metrics","token_type":"Bearer"}}"#;
        let envelope: TokenEnvelope = serde_json::from_str(json).unwrap();
        let grant = envelope.into_grant().unwrap();
        assert_eq!(grant.access_token, "a");
        assert_eq!(grant.refresh_token, "r");
        assert_eq!(grant.expires_in, Some(10800));
    }

    #[test]
    fn test_grant_vendor_error() {
        let json = r#"{"status":503,"error":"Invalid Params: invalid refresh_token"}"#;
        let envelope: TokenEnvelope = serde_json::from_str(json).unwrap();
        let (status, message) = envelope.into_grant().unwrap_err();
        assert_eq!(status, 503);
        assert!(message.contains("invalid refresh_token"));
    }

    #[test]
    fn test_grant_missing_access_token() {
        let json = r#"{"status":0,"body":{"refresh_token":"r"}}"#;
        let envelope: TokenEnvelope = serde_json::from_str(json).unwrap();
        let (_, message) = envelope.into_grant().unwrap_err();
        assert!(message.contains("access_token"));
    }

    #[test]
    fn test_persisted_tokens_file_format() {
        let tokens = PersistedTokens {
            refresh_token: "r".to_string(),
            access_token: None,
            access_token_expires_at: None,
        };
        assert_eq!(
            serde_json::to_string(&tokens).unwrap(),
            r#"{"refreshToken":"r"}"#
        );
    }
}
