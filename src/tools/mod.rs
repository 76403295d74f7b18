// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MCP tool server over stdio.
//!
//! One JSON-RPC message per line on stdin, one response per line on stdout.
//! Tool failures come back as results with `isError: true`; only malformed
//! messages produce JSON-RPC errors.

pub mod catalog;
pub mod protocol;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::{Config, ConfigError};
use crate::error::{AppError, Result};
use crate::models::UnitSystem;
use crate::services::{MeasurementFilter, WithingsService};
use crate::time_utils::parse_iso_to_epoch;
use catalog::{CompleteAuthArgs, MeasurementArgs, UserArgs};
use protocol::{
    McpRequest, McpResponse, ToolOutput, ERROR_INVALID_PARAMS, ERROR_INVALID_REQUEST,
    ERROR_METHOD_NOT_FOUND, ERROR_PARSE, PROTOCOL_VERSION,
};

pub const SERVER_NAME: &str = "withings-mcp";

/// Dispatches MCP requests to the Withings service.
pub struct ToolServer {
    /// The service, or the configuration error reported on every tool call.
    backend: std::result::Result<WithingsService, String>,
}

impl ToolServer {
    pub fn new(service: WithingsService) -> Self {
        Self {
            backend: Ok(service),
        }
    }

    /// Build from a configuration attempt. A bad configuration still yields a
    /// server, so the client sees the problem instead of a dead process.
    pub fn from_config(config: std::result::Result<Config, ConfigError>) -> Self {
        let backend = config
            .map_err(AppError::from)
            .and_then(|config| WithingsService::new(&config))
            .map_err(|e| {
                tracing::error!(error = %e, "Withings service unavailable");
                e.to_string()
            });
        Self { backend }
    }

    /// Handle one raw line. `None` means nothing should be written back.
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable message");
                return Some(McpResponse::error(
                    Value::Null,
                    ERROR_PARSE,
                    format!("Parse error: {}", e),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(McpResponse::error(
                id,
                ERROR_INVALID_REQUEST,
                format!("Invalid request: {}", e),
            )),
        }
    }

    #[tracing::instrument(skip(self, request), fields(method = %request.method))]
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        if request.is_notification() {
            tracing::debug!("Notification received");
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            "initialize" => McpResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),
            "ping" => McpResponse::success(id, json!({})),
            "tools/list" => McpResponse::success(id, json!({"tools": catalog::tool_definitions()})),
            "tools/call" => self.handle_tool_call(id, request.params).await,
            other => McpResponse::error(
                id,
                ERROR_METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };
        Some(response)
    }

    async fn handle_tool_call(&self, id: Value, params: Option<Value>) -> McpResponse {
        let params = params.unwrap_or(Value::Null);
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return McpResponse::error(id, ERROR_INVALID_PARAMS, "Missing tool name");
        };
        if !catalog::is_known_tool(name) {
            return McpResponse::error(id, ERROR_INVALID_PARAMS, format!("Unknown tool: {}", name));
        }
        let arguments = params
            .get("arguments")
            .cloned()
            .filter(|a| !a.is_null())
            .unwrap_or_else(|| json!({}));

        match self.call_tool(name, arguments).await {
            Ok(output) => McpResponse::success(id, output.into_result()),
            Err(ToolCallError::InvalidParams(message)) => {
                McpResponse::error(id, ERROR_INVALID_PARAMS, message)
            }
        }
    }

    /// Run a tool. Only malformed arguments are an `Err`; failures of the
    /// tool itself are returned as error output.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> std::result::Result<ToolOutput, ToolCallError> {
        let service = match &self.backend {
            Ok(service) => service,
            Err(message) => return Ok(ToolOutput::error(message.clone())),
        };

        tracing::info!(tool = name, "Tool call");
        let result = match name {
            catalog::AUTHORIZE => authorize(service).await,
            catalog::COMPLETE_AUTH => complete_auth(service, parse_args(arguments)?).await,
            catalog::GET_WEIGHT => get_weight(service, parse_args(arguments)?).await,
            catalog::GET_BODY_COMPOSITION => {
                get_body_composition(service, parse_args(arguments)?).await
            }
            catalog::GET_MEASUREMENTS => get_measurements(service, parse_args(arguments)?).await,
            catalog::GET_USERS => to_json(service.get_users().await),
            catalog::GET_USER_SETTINGS => to_json(service.get_user_settings().await),
            other => {
                return Err(ToolCallError::InvalidParams(format!(
                    "Unknown tool: {}",
                    other
                )))
            }
        };

        Ok(match result {
            Ok(text) => ToolOutput::text(text),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool call failed");
                ToolOutput::error(format!("Error: {}", e))
            }
        })
    }
}

/// Errors reported as JSON-RPC errors rather than tool output.
#[derive(Debug, thiserror::Error)]
pub enum ToolCallError {
    #[error("{0}")]
    InvalidParams(String),
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> std::result::Result<T, ToolCallError> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolCallError::InvalidParams(format!("Invalid arguments: {}", e)))
}

fn to_json<T: serde::Serialize>(result: Result<T>) -> Result<String> {
    let value = result?;
    serde_json::to_string_pretty(&value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode result: {}", e)))
}

fn parse_unit(value: Option<&str>) -> Result<Option<UnitSystem>> {
    value
        .map(|v| v.parse::<UnitSystem>().map_err(AppError::BadRequest))
        .transpose()
}

fn parse_date(name: &str, value: Option<&str>) -> Result<Option<i64>> {
    value
        .map(|v| {
            parse_iso_to_epoch(v)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid {}: {:?}", name, v)))
        })
        .transpose()
}

async fn authorize(service: &WithingsService) -> Result<String> {
    let url = service.credentials().build_authorization_url().await?;
    Ok(format!(
        "Open this URL in a browser to authorize access to your Withings data:\n\n{}\n\n\
         After approving, copy the `code` parameter from the redirect URL and call \
         withings_complete_auth with it. Alternatively, run `withings-mcp authorize` \
         to capture the redirect automatically.",
        url
    ))
}

async fn complete_auth(service: &WithingsService, args: CompleteAuthArgs) -> Result<String> {
    let code = args.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("code must not be empty".to_string()));
    }
    service.credentials().exchange_code(code).await?;
    Ok("Authorization successful. Tokens have been saved.".to_string())
}

async fn get_weight(service: &WithingsService, args: UserArgs) -> Result<String> {
    let unit = parse_unit(args.unit_system.as_deref())?;
    match service.get_latest_weight(args.user_attrib, unit).await? {
        Some(weight) => to_json(Ok(weight)),
        None => Ok("No weight measurements found.".to_string()),
    }
}

async fn get_body_composition(service: &WithingsService, args: UserArgs) -> Result<String> {
    let unit = parse_unit(args.unit_system.as_deref())?;
    to_json(service.get_body_composition(args.user_attrib, unit).await)
}

async fn get_measurements(service: &WithingsService, args: MeasurementArgs) -> Result<String> {
    let filter = MeasurementFilter {
        measure_types: args.measure_types.unwrap_or_default(),
        start: parse_date("startDate", args.start_date.as_deref())?,
        end: parse_date("endDate", args.end_date.as_deref())?,
        user_attrib: args.user_attrib,
        limit: args.limit,
        offset: args.offset,
    };
    to_json(service.get_measurement_page(&filter).await)
}

/// Serve MCP over stdin/stdout until stdin closes.
pub async fn run_stdio(server: ToolServer) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    tracing::info!("Tool server ready on stdio");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = server.handle_line(&line).await {
            let mut bytes = serde_json::to_vec(&response)?;
            bytes.push(b'\n');
            stdout.write_all(&bytes).await?;
            stdout.flush().await?;
        }
    }
    tracing::info!("stdin closed, shutting down");
    Ok(())
}
