// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalized results handed back to tool callers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unit system for mass values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    /// Label for mass values in this system.
    pub fn mass_label(self) -> &'static str {
        match self {
            UnitSystem::Metric => "kg",
            UnitSystem::Imperial => "lb",
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Metric => write!(f, "metric"),
            UnitSystem::Imperial => write!(f, "imperial"),
        }
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            other => Err(format!("Unknown unit system: {}", other)),
        }
    }
}

/// Value of a composition field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompositionValue {
    Number(f64),
    Integer(i64),
}

/// Body composition, keyed by semantic field name (`weight_kg`, `fat_percentage`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionRecord {
    #[serde(flatten)]
    pub fields: BTreeMap<String, CompositionValue>,
    pub unit_system: UnitSystem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_timestamp: Option<i64>,
}

impl CompositionRecord {
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.fields.get(field) {
            Some(CompositionValue::Number(n)) => Some(*n),
            Some(CompositionValue::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Most recent weight reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestWeight {
    pub value: f64,
    pub unit: &'static str,
    pub date: String,
    pub timestamp: i64,
}

/// Users seen in the measurement history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub attrib: i64,
    pub label: String,
    pub measurement_count: usize,
    pub most_recent_date: String,
    pub most_recent_timestamp: i64,
}

/// Effective settings reported by `get_user_settings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub unit_system: UnitSystem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_user_attrib: Option<i64>,
    pub client_id: String,
    pub redirect_uri: String,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
}
