// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Withings-MCP: Withings scale data for tool-calling agents
//!
//! This crate wraps the Withings OAuth2 measurement API behind an MCP
//! (JSON-RPC over stdio) tool server, plus a one-shot HTTP server that
//! captures the OAuth callback.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
pub mod tools;

use config::Config;
use services::WithingsService;
use tokio::sync::Notify;

/// Shared state for the OAuth callback server.
pub struct AppState {
    pub config: Config,
    pub withings: WithingsService,
    /// Signalled once authorization completes.
    pub shutdown: Notify,
}
