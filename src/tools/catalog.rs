// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tool names, input schemas and argument types.

use serde::Deserialize;
use serde_json::{json, Value};

pub const AUTHORIZE: &str = "withings_authorize";
pub const COMPLETE_AUTH: &str = "withings_complete_auth";
pub const GET_WEIGHT: &str = "withings_get_weight";
pub const GET_BODY_COMPOSITION: &str = "withings_get_body_composition";
pub const GET_MEASUREMENTS: &str = "withings_get_measurements";
pub const GET_USERS: &str = "withings_get_users";
pub const GET_USER_SETTINGS: &str = "withings_get_user_settings";

/// Arguments for `withings_complete_auth`.
#[derive(Debug, Deserialize)]
pub struct CompleteAuthArgs {
    pub code: String,
}

/// Arguments shared by the weight and body composition tools.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserArgs {
    #[serde(default)]
    pub user_attrib: Option<i64>,
    #[serde(default)]
    pub unit_system: Option<String>,
}

/// Arguments for `withings_get_measurements`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementArgs {
    #[serde(default)]
    pub measure_types: Option<Vec<i32>>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub user_attrib: Option<i64>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

fn user_attrib_schema() -> Value {
    json!({
        "type": "integer",
        "description": "User attribution (0 = device owner, 2 = manual entry, 4 = auto detection, other values = additional users). Defaults to WITHINGS_USER_ATTRIB, or all users."
    })
}

fn unit_system_schema() -> Value {
    json!({
        "type": "string",
        "enum": ["metric", "imperial"],
        "description": "Unit system for mass values. Defaults to WITHINGS_UNIT_SYSTEM, or metric."
    })
}

/// Everything `tools/list` advertises.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": AUTHORIZE,
            "description": "Get the Withings OAuth consent URL. Open it in a browser, approve access, then pass the returned code to withings_complete_auth.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        json!({
            "name": COMPLETE_AUTH,
            "description": "Exchange the authorization code from the Withings redirect for access and refresh tokens.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "code": {"type": "string", "description": "The `code` query parameter from the redirect URL"}
                },
                "required": ["code"]
            }
        }),
        json!({
            "name": GET_WEIGHT,
            "description": "Get the most recent weight measurement.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "userAttrib": user_attrib_schema(),
                    "unitSystem": unit_system_schema()
                }
            }
        }),
        json!({
            "name": GET_BODY_COMPOSITION,
            "description": "Get the latest body composition: weight, fat, muscle, bone, hydration, visceral fat and metabolic age.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "userAttrib": user_attrib_schema(),
                    "unitSystem": unit_system_schema()
                }
            }
        }),
        json!({
            "name": GET_MEASUREMENTS,
            "description": "Get raw measurement groups with optional type, date range and pagination filters. Dates are ISO-8601; the range is [startDate, endDate).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "measureTypes": {
                        "type": "array",
                        "items": {"type": "integer"},
                        "description": "Measure type codes (1 = weight, 6 = fat ratio, 76 = muscle mass, ...)"
                    },
                    "startDate": {"type": "string", "description": "Inclusive start, e.g. 2024-01-01"},
                    "endDate": {"type": "string", "description": "Exclusive end, e.g. 2024-02-01"},
                    "userAttrib": user_attrib_schema(),
                    "limit": {"type": "integer", "minimum": 1},
                    "offset": {"type": "integer", "minimum": 0}
                }
            }
        }),
        json!({
            "name": GET_USERS,
            "description": "List the users (attributions) seen on the scale, most recently measured first.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        json!({
            "name": GET_USER_SETTINGS,
            "description": "Show the effective settings: timezone, unit system, default user and authorization status.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
    ]
}

pub fn is_known_tool(name: &str) -> bool {
    matches!(
        name,
        AUTHORIZE
            | COMPLETE_AUTH
            | GET_WEIGHT
            | GET_BODY_COMPOSITION
            | GET_MEASUREMENTS
            | GET_USERS
            | GET_USER_SETTINGS
    )
}
