// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod composition;
pub mod measure;
pub mod tokens;

pub use composition::{
    CompositionRecord, CompositionValue, LatestWeight, UnitSystem, UserSettings, UserSummary,
};
pub use measure::{
    Measure, MeasureBody, MeasureGroup, MeasureQuery, MeasureType, MeasurementPage, Pagination,
};
pub use tokens::{CachedToken, PersistedTokens, TokenEnvelope, TokenGrant};
