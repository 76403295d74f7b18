// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Withings API client and the high-level measurement service.
//!
//! Every call goes through [`WithingsService::request`], which supplies a
//! valid access token and, when the vendor rejects it, refreshes once and
//! retries once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    CompositionRecord, LatestWeight, MeasureBody, MeasureQuery, MeasureType, MeasurementPage,
    Pagination, UnitSystem, UserSettings, UserSummary,
};
use crate::services::credentials::CredentialManager;
use crate::services::reducer;

/// Data endpoint for measurements.
pub const MEASURE_ENDPOINT: &str = "measure";

const HTTP_TIMEOUT_SECS: u64 = 30;

/// Classified vendor response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// `status == 0`; carries `body`.
    Success(Value),
    /// The access token was rejected.
    AuthRejected(String),
    /// Any other failure. `status` is the vendor status, or the HTTP status
    /// when the vendor never produced one.
    Failed { status: i64, error: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: i64,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Classify a raw HTTP response.
pub fn classify(http_status: StatusCode, body: &str) -> ApiOutcome {
    if http_status == StatusCode::UNAUTHORIZED {
        return ApiOutcome::AuthRejected(format!("HTTP {}", http_status));
    }
    if !http_status.is_success() {
        return ApiOutcome::Failed {
            status: i64::from(http_status.as_u16()),
            error: format!("HTTP {}: {}", http_status, body),
        };
    }

    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return ApiOutcome::Failed {
                status: i64::from(http_status.as_u16()),
                error: format!("Invalid JSON response: {}", e),
            }
        }
    };

    let error = envelope.error.unwrap_or_default();
    if envelope.status == 401 || error.contains("invalid_token") {
        return ApiOutcome::AuthRejected(if error.is_empty() {
            format!("status {}", envelope.status)
        } else {
            error
        });
    }
    if envelope.status != 0 {
        return ApiOutcome::Failed {
            status: envelope.status,
            error: if error.is_empty() {
                "Unknown error".to_string()
            } else {
                error
            },
        };
    }

    ApiOutcome::Success(envelope.body.unwrap_or_else(|| Value::Object(Default::default())))
}

/// Low-level Withings data API client.
#[derive(Clone)]
pub struct WithingsClient {
    http: reqwest::Client,
    base_url: String,
}

impl WithingsClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One authenticated GET, classified. Network errors propagate.
    pub async fn call(
        &self,
        access_token: &str,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<ApiOutcome> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok(classify(status, &body))
    }
}

/// Filters for `get_measurement_page`, already validated by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementFilter {
    pub measure_types: Vec<i32>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub user_attrib: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// High-level Withings service: credentials plus API calls.
#[derive(Clone)]
pub struct WithingsService {
    client: WithingsClient,
    credentials: Arc<CredentialManager>,
    default_unit: UnitSystem,
    default_user_attrib: Option<i64>,
}

impl WithingsService {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client: WithingsClient::new(http.clone(), &config.api_base_url),
            credentials: Arc::new(CredentialManager::new(config, http)),
            default_unit: config.default_unit,
            default_user_attrib: config.default_user_attrib,
        })
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    // ─── Executor ────────────────────────────────────────────────────────────

    /// Call an endpoint and return the vendor `body`.
    pub async fn request(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let token = self
            .credentials
            .get_valid_access_token()
            .await
            .map_err(|e| match e {
                AppError::Refresh { .. } => AppError::reauthenticate(),
                other => other,
            })?;

        let reason = match self.client.call(&token, endpoint, params).await? {
            ApiOutcome::AuthRejected(reason) => reason,
            outcome => return into_body(outcome),
        };
        tracing::warn!(endpoint, reason = %reason, "Withings rejected access token, retrying once");

        let token = self
            .credentials
            .refresh_after_rejection(&token)
            .await
            .map_err(|e| {
                if e.is_credential_rejection() {
                    tracing::warn!(error = %e, "Token refresh rejected");
                    AppError::reauthenticate()
                } else {
                    e
                }
            })?;

        match self.client.call(&token, endpoint, params).await? {
            ApiOutcome::AuthRejected(reason) => {
                tracing::warn!(endpoint, reason = %reason, "Withings rejected refreshed token");
                Err(AppError::reauthenticate())
            }
            outcome => into_body(outcome),
        }
    }

    // ─── Measurements ────────────────────────────────────────────────────────

    /// Raw `getmeas` call.
    pub async fn get_measures(&self, query: &MeasureQuery) -> Result<MeasureBody> {
        let body = self.request(MEASURE_ENDPOINT, &query.to_params()).await?;
        serde_json::from_value(body).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Unexpected measurement payload: {}", e))
        })
    }

    /// Measure groups with pagination info, filtered to `[start, end)`.
    pub async fn get_measurement_page(&self, filter: &MeasurementFilter) -> Result<MeasurementPage> {
        if let (Some(start), Some(end)) = (filter.start, filter.end) {
            if start >= end {
                return Err(AppError::BadRequest(
                    "startDate must be before endDate".to_string(),
                ));
            }
        }

        let query = MeasureQuery {
            meastypes: filter.measure_types.clone(),
            startdate: filter.start,
            enddate: filter.end,
            limit: filter.limit,
            offset: filter.offset,
        };
        let body = self.get_measures(&query).await?;

        let attrib = filter.user_attrib.or(self.default_user_attrib);
        let groups: Vec<_> = reducer::filter_time_range(body.measuregrps, filter.start, filter.end)
            .into_iter()
            .filter(|g| attrib.is_none_or(|a| g.attrib == a))
            .collect();

        Ok(MeasurementPage {
            pagination: Pagination {
                limit: filter.limit,
                offset: filter.offset,
                more: body.more,
                total_returned: groups.len(),
            },
            measure_groups: groups,
        })
    }

    /// Most recent weight for a user.
    pub async fn get_latest_weight(
        &self,
        user_attrib: Option<i64>,
        unit: Option<UnitSystem>,
    ) -> Result<Option<LatestWeight>> {
        let body = self
            .get_measures(&MeasureQuery::for_types(&[MeasureType::Weight]))
            .await?;
        Ok(reducer::reduce_latest_weight(
            &body.measuregrps,
            user_attrib.or(self.default_user_attrib),
            unit.unwrap_or(self.default_unit),
        ))
    }

    /// Latest body composition for a user.
    pub async fn get_body_composition(
        &self,
        user_attrib: Option<i64>,
        unit: Option<UnitSystem>,
    ) -> Result<CompositionRecord> {
        let body = self
            .get_measures(&MeasureQuery::for_types(&MeasureType::COMPOSITION))
            .await?;
        Ok(reducer::reduce_composition(
            &body.measuregrps,
            user_attrib.or(self.default_user_attrib),
            unit.unwrap_or(self.default_unit),
        ))
    }

    /// Users (attributions) present in the weight history.
    pub async fn get_users(&self) -> Result<Vec<UserSummary>> {
        let body = self
            .get_measures(&MeasureQuery::for_types(&[MeasureType::Weight]))
            .await?;
        Ok(reducer::summarize_users(&body.measuregrps))
    }

    /// Effective settings, including the account timezone.
    pub async fn get_user_settings(&self) -> Result<UserSettings> {
        let query = MeasureQuery {
            limit: Some(1),
            ..MeasureQuery::for_types(&[MeasureType::Weight])
        };
        let body = self.get_measures(&query).await?;
        let status = self.credentials.status().await;

        Ok(UserSettings {
            timezone: body.timezone,
            unit_system: self.default_unit,
            default_user_attrib: self.default_user_attrib,
            client_id: self.credentials.client_id().to_string(),
            redirect_uri: self.credentials.redirect_uri().to_string(),
            has_access_token: status.has_access_token,
            has_refresh_token: status.has_refresh_token,
        })
    }
}

fn into_body(outcome: ApiOutcome) -> Result<Value> {
    match outcome {
        ApiOutcome::Success(body) => Ok(body),
        ApiOutcome::Failed { status, error } => {
            tracing::warn!(status, error = %error, "Withings API error");
            Err(AppError::VendorApi {
                status,
                message: error,
            })
        }
        ApiOutcome::AuthRejected(_) => Err(AppError::reauthenticate()),
    }
}
