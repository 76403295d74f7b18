// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credentials;
pub mod reducer;
pub mod token_store;
pub mod units;
pub mod withings;

pub use credentials::{AuthState, CredentialManager, CredentialStatus};
pub use token_store::{TokenStore, TokenStoreError};
pub use withings::{ApiOutcome, MeasurementFilter, WithingsClient, WithingsService};
