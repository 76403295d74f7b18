// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fixed-point decoding and metric/imperial mass conversion.

use crate::models::UnitSystem;

/// Pounds per kilogram.
pub const LB_PER_KG: f64 = 2.20462;

/// A converted mass with its unit label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Converted {
    pub value: f64,
    pub unit: &'static str,
}

/// Decode the vendor's `mantissa × 10^exponent` encoding. No rounding.
pub fn decode(raw_value: i64, exponent: i32) -> f64 {
    raw_value as f64 * 10f64.powi(exponent)
}

/// Convert a weight in kilograms into `unit`.
pub fn convert_weight(value_kg: f64, unit: UnitSystem) -> Converted {
    let value = match unit {
        UnitSystem::Imperial => value_kg * LB_PER_KG,
        UnitSystem::Metric => value_kg,
    };
    Converted {
        value,
        unit: unit.mass_label(),
    }
}

/// Fat, muscle, bone and hydration mass convert exactly like body weight.
pub fn convert_mass(value_kg: f64, unit: UnitSystem) -> Converted {
    convert_weight(value_kg, unit)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
