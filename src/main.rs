// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Withings-MCP Server
//!
//! Serves Withings scale data to MCP clients over stdio. The `authorize`
//! subcommand runs the OAuth consent flow with a local callback server.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use withings_mcp::{
    config::Config,
    services::WithingsService,
    tools::{run_stdio, ToolServer},
    AppState,
};

#[derive(Parser)]
#[command(name = "withings-mcp", version, about = "MCP tool server for Withings scales")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve MCP over stdio (default)
    Serve,
    /// Authorize with Withings and save tokens, using a local callback server
    Authorize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured JSON logging on stderr; stdout carries the protocol
    init_logging();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Authorize => authorize().await,
    }
}

async fn serve() -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Withings MCP server");
    let server = ToolServer::from_config(Config::from_env());
    run_stdio(server).await
}

async fn authorize() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let withings = WithingsService::new(&config).context("Failed to initialize Withings client")?;

    let url = withings
        .credentials()
        .build_authorization_url()
        .await
        .context("Failed to build authorization URL")?;

    let state = Arc::new(AppState {
        config: config.clone(),
        withings,
        shutdown: Notify::new(),
    });
    let app = withings_mcp::routes::create_router(state.clone());

    let addr = format!("127.0.0.1:{}", config.callback_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind callback server on {}", addr))?;
    tracing::info!(address = %addr, redirect_uri = %config.redirect_uri, "Callback server listening");

    println!("Open this URL in a browser to authorize Withings access:\n\n{}\n", url);
    println!("Waiting for the redirect to {} ...", config.redirect_uri);

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_state.shutdown.notified().await })
        .await?;

    println!(
        "Authorization complete. Tokens saved to {}",
        config.token_path.display()
    );
    Ok(())
}

/// Initialize structured JSON logging on stderr.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("withings_mcp=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
