// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Measurement models as delivered by the Withings `getmeas` action.

use serde::{Deserialize, Deserializer, Serialize};

use crate::services::units;

/// Known measurement type codes.
///
/// Measures keep their raw code, so types missing here still flow through
/// `get_measurements` untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeasureType {
    Weight,
    Height,
    FatFreeMass,
    FatRatio,
    FatMass,
    HeartRate,
    MuscleMass,
    Hydration,
    BoneMass,
    MetabolicAge,
    VisceralFat,
}

impl MeasureType {
    /// Types requested for, and reported by, body composition.
    pub const COMPOSITION: [MeasureType; 9] = [
        MeasureType::Weight,
        MeasureType::FatFreeMass,
        MeasureType::FatRatio,
        MeasureType::FatMass,
        MeasureType::MuscleMass,
        MeasureType::Hydration,
        MeasureType::BoneMass,
        MeasureType::MetabolicAge,
        MeasureType::VisceralFat,
    ];

    pub const fn code(self) -> i32 {
        match self {
            MeasureType::Weight => 1,
            MeasureType::Height => 4,
            MeasureType::FatFreeMass => 5,
            MeasureType::FatRatio => 6,
            MeasureType::FatMass => 8,
            MeasureType::HeartRate => 11,
            MeasureType::MuscleMass => 76,
            MeasureType::Hydration => 77,
            MeasureType::BoneMass => 88,
            MeasureType::MetabolicAge => 155,
            MeasureType::VisceralFat => 170,
        }
    }
}

/// A single reading in fixed-point form: `value × 10^unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub value: i64,
    #[serde(rename = "type")]
    pub measure_type: i32,
    pub unit: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algo: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fm: Option<i64>,
}

impl Measure {
    pub fn new(measure_type: MeasureType, value: i64, unit: i32) -> Self {
        Self {
            value,
            measure_type: measure_type.code(),
            unit,
            algo: None,
            fm: None,
        }
    }

    /// Physical value of the reading.
    pub fn decoded(&self) -> f64 {
        units::decode(self.value, self.unit)
    }
}

/// One measurement event: several simultaneous readings sharing a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureGroup {
    pub grpid: i64,
    /// Which user/profile on a shared device the group belongs to.
    pub attrib: i64,
    /// Measurement time (epoch seconds).
    pub date: i64,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
    #[serde(default)]
    pub category: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviceid: Option<String>,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

impl MeasureGroup {
    pub fn find(&self, measure_type: MeasureType) -> Option<&Measure> {
        self.measures
            .iter()
            .find(|m| m.measure_type == measure_type.code())
    }
}

/// `body` of a successful `getmeas` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasureBody {
    #[serde(default)]
    pub measuregrps: Vec<MeasureGroup>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub more: bool,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub updatetime: Option<i64>,
}

/// Withings reports `more` as `0`/`1`; older payloads used booleans.
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        None => false,
    })
}

/// Filters for a `getmeas` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureQuery {
    pub meastypes: Vec<i32>,
    pub startdate: Option<i64>,
    pub enddate: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl MeasureQuery {
    pub fn for_types(types: &[MeasureType]) -> Self {
        Self {
            meastypes: types.iter().map(|t| t.code()).collect(),
            ..Self::default()
        }
    }

    /// Query parameters, `action` included.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("action", "getmeas".to_string())];
        if !self.meastypes.is_empty() {
            let joined = self
                .meastypes
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(",");
            params.push(("meastype", joined));
        }
        if let Some(start) = self.startdate {
            params.push(("startdate", start.to_string()));
        }
        if let Some(end) = self.enddate {
            params.push(("enddate", end.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        params
    }
}

/// Result of `get_measurements`.
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementPage {
    pub measure_groups: Vec<MeasureGroup>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    pub more: bool,
    pub total_returned: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params() {
        let query = MeasureQuery {
            meastypes: vec![1, 6, 76],
            startdate: Some(100),
            enddate: None,
            limit: Some(10),
            offset: None,
        };
        assert_eq!(
            query.to_params(),
            vec![
                ("action", "getmeas".to_string()),
                ("meastype", "1,6,76".to_string()),
                ("startdate", "100".to_string()),
                ("limit", "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_body_parses_vendor_payload() {
        let json = r#"{
            "updatetime": 1700000000,
            "timezone": "Europe/Paris",
            "more": 1,
            "offset": 100,
            "measuregrps": [{
                "grpid": 42, "attrib": 0, "date": 1700000000,
                "created": 1700000005, "modified": 1700000005, "category": 1,
                "deviceid": "abc",
                "measures": [{"value": 72345, "type": 1, "unit": -3, "algo": 0, "fm": 131}]
            }]
        }"#;
        let body: MeasureBody = serde_json::from_str(json).unwrap();
        assert!(body.more);
        assert_eq!(body.timezone.as_deref(), Some("Europe/Paris"));
        let group = &body.measuregrps[0];
        let weight = group.find(MeasureType::Weight).unwrap();
        assert!((weight.decoded() - 72.345).abs() < 1e-9);
    }

    #[test]
    fn test_body_tolerates_missing_fields() {
        let body: MeasureBody = serde_json::from_str("{}").unwrap();
        assert!(body.measuregrps.is_empty());
        assert!(!body.more);
    }
}
