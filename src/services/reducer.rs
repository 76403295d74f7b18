// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reduces raw measure groups into latest readings and body composition.
//!
//! Withings delivers groups most-recent-first. `reduce_latest_weight` relies
//! on that order; `latest_per_type` and `reduce_composition` do not.

use std::collections::{BTreeMap, HashMap};

use crate::models::{
    CompositionRecord, CompositionValue, LatestWeight, MeasureGroup, MeasureType, UnitSystem,
    UserSummary,
};
use crate::services::units::{convert_mass, convert_weight, round_to};
use crate::time_utils::epoch_to_rfc3339;

/// Latest decoded value for a measure type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatestReading {
    pub value: f64,
    pub timestamp: i64,
}

/// Keep groups belonging to `attrib`, or all groups when `None`.
pub fn filter_by_attrib(groups: &[MeasureGroup], attrib: Option<i64>) -> Vec<&MeasureGroup> {
    groups
        .iter()
        .filter(|g| attrib.is_none_or(|a| g.attrib == a))
        .collect()
}

/// Keep groups inside the half-open window `[start, end)`.
pub fn filter_time_range(
    groups: Vec<MeasureGroup>,
    start: Option<i64>,
    end: Option<i64>,
) -> Vec<MeasureGroup> {
    groups
        .into_iter()
        .filter(|g| start.is_none_or(|s| g.date >= s) && end.is_none_or(|e| g.date < e))
        .collect()
}

/// Latest reading per type code. Equal timestamps: the group seen last wins.
pub fn latest_per_type<'a, I>(groups: I) -> BTreeMap<i32, LatestReading>
where
    I: IntoIterator<Item = &'a MeasureGroup>,
{
    let mut latest: BTreeMap<i32, LatestReading> = BTreeMap::new();
    for group in groups {
        for measure in &group.measures {
            let newer = latest
                .get(&measure.measure_type)
                .is_none_or(|current| group.date >= current.timestamp);
            if newer {
                latest.insert(
                    measure.measure_type,
                    LatestReading {
                        value: measure.decoded(),
                        timestamp: group.date,
                    },
                );
            }
        }
    }
    latest
}

/// Latest weight, taken from the first (most recent) group after filtering.
pub fn reduce_latest_weight(
    groups: &[MeasureGroup],
    attrib: Option<i64>,
    unit: UnitSystem,
) -> Option<LatestWeight> {
    let group = filter_by_attrib(groups, attrib).into_iter().next()?;
    let measure = group.find(MeasureType::Weight)?;
    let converted = convert_weight(measure.decoded(), unit);

    Some(LatestWeight {
        value: converted.value,
        unit: converted.unit,
        date: epoch_to_rfc3339(group.date),
        timestamp: group.date,
    })
}

/// Build a composition record from the latest reading of each composition type.
pub fn reduce_composition(
    groups: &[MeasureGroup],
    attrib: Option<i64>,
    unit: UnitSystem,
) -> CompositionRecord {
    let selected = filter_by_attrib(groups, attrib);
    let composition_codes: Vec<i32> = MeasureType::COMPOSITION.iter().map(|t| t.code()).collect();
    let latest: BTreeMap<i32, LatestReading> = latest_per_type(selected)
        .into_iter()
        .filter(|(code, _)| composition_codes.contains(code))
        .collect();

    let reading = |t: MeasureType| latest.get(&t.code()).map(|r| r.value);
    let weight_kg = reading(MeasureType::Weight).filter(|w| *w > 0.0);
    let mut fields = BTreeMap::new();

    let put_mass = |fields: &mut BTreeMap<String, CompositionValue>, name: &str, kg: f64| {
        let converted = convert_mass(kg, unit);
        fields.insert(
            format!("{}_{}", name, converted.unit),
            CompositionValue::Number(round_to(converted.value, 2)),
        );
    };
    let percent_of_weight = |mass_kg: f64| weight_kg.map(|w| round_to(mass_kg / w * 100.0, 1));

    if let Some(weight) = reading(MeasureType::Weight) {
        put_mass(&mut fields, "weight", weight);
    }
    if let Some(ffm) = reading(MeasureType::FatFreeMass) {
        put_mass(&mut fields, "fat_free_mass", ffm);
    }
    if let Some(fat) = reading(MeasureType::FatMass) {
        put_mass(&mut fields, "fat_mass", fat);
    }
    match reading(MeasureType::FatRatio) {
        Some(ratio) => {
            fields.insert(
                "fat_percentage".to_string(),
                CompositionValue::Number(round_to(ratio, 1)),
            );
        }
        None => {
            if let Some(pct) = reading(MeasureType::FatMass).and_then(percent_of_weight) {
                fields.insert("fat_percentage".to_string(), CompositionValue::Number(pct));
            }
        }
    }
    for (kind, name) in [
        (MeasureType::MuscleMass, "muscle"),
        (MeasureType::Hydration, "hydration"),
        (MeasureType::BoneMass, "bone"),
    ] {
        let Some(mass) = reading(kind) else { continue };
        let mass_field = if kind == MeasureType::Hydration {
            "hydration".to_string()
        } else {
            format!("{}_mass", name)
        };
        put_mass(&mut fields, &mass_field, mass);
        if let Some(pct) = percent_of_weight(mass) {
            fields.insert(
                format!("{}_percentage", name),
                CompositionValue::Number(pct),
            );
        }
    }
    if let Some(visceral) = reading(MeasureType::VisceralFat) {
        fields.insert(
            "visceral_fat_index".to_string(),
            CompositionValue::Number(round_to(visceral, 1)),
        );
    }
    if let Some(age) = reading(MeasureType::MetabolicAge) {
        fields.insert(
            "metabolic_age".to_string(),
            CompositionValue::Integer(age.round() as i64),
        );
    }

    let newest = latest.values().map(|r| r.timestamp).max();

    CompositionRecord {
        fields,
        unit_system: unit,
        measurement_date: newest.map(epoch_to_rfc3339),
        measurement_timestamp: newest,
    }
}

/// Human-readable name for an attribution code.
pub fn attribution_label(attrib: i64) -> String {
    match attrib {
        0 => "Device Owner".to_string(),
        2 => "Manual Entry".to_string(),
        4 => "Auto Detection".to_string(),
        other => format!("User {}", other),
    }
}

/// Per-attribution counts, most recently measured first.
pub fn summarize_users(groups: &[MeasureGroup]) -> Vec<UserSummary> {
    let mut stats: HashMap<i64, (usize, i64)> = HashMap::new();
    for group in groups {
        let entry = stats.entry(group.attrib).or_insert((0, i64::MIN));
        entry.0 += 1;
        entry.1 = entry.1.max(group.date);
    }

    let mut users: Vec<UserSummary> = stats
        .into_iter()
        .map(|(attrib, (count, latest))| UserSummary {
            attrib,
            label: attribution_label(attrib),
            measurement_count: count,
            most_recent_date: epoch_to_rfc3339(latest),
            most_recent_timestamp: latest,
        })
        .collect();
    users.sort_by(|a, b| {
        b.most_recent_timestamp
            .cmp(&a.most_recent_timestamp)
            .then(a.attrib.cmp(&b.attrib))
    });
    users
}
