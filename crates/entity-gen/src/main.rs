//! One-shot entity snapshot generator.
//!
//! Connects to a Home Assistant WebSocket API, authenticates with a
//! long-lived token, requests a full state snapshot, and writes a generated
//! TypeScript entity-id listing for the dashboard to compile against.
//! Shares no runtime state with the relay.

mod api;
mod codegen;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "entity-gen",
    version,
    about = "Generate an entity-id type listing from a Home Assistant snapshot"
)]
struct Cli {
    /// Home Assistant host (host:port); falls back to the HA_URL
    /// environment variable
    #[arg(long)]
    host: Option<String>,

    /// Long-lived access token; falls back to the HA_TOKEN environment
    /// variable
    #[arg(long)]
    token: Option<String>,

    /// Output path for the generated TypeScript file
    #[arg(short, long, default_value = "entity-types.ts")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let host = cli
        .host
        .or_else(|| std::env::var("HA_URL").ok())
        .context("no Home Assistant host given (use --host or set HA_URL)")?;
    let token = cli
        .token
        .or_else(|| std::env::var("HA_TOKEN").ok())
        .context("no access token given (use --token or set HA_TOKEN)")?;

    let url = format!("ws://{host}/api/websocket");
    info!(%url, "requesting state snapshot");

    let entities = api::fetch_states(&url, &token).await?;
    info!(count = entities.len(), "entities received");

    let rendered = codegen::render_entity_types(&entities);
    tokio::fs::write(&cli.out, rendered)
        .await
        .with_context(|| format!("failed to write {}", cli.out.display()))?;

    info!(out = %cli.out.display(), "entity type listing generated");
    Ok(())
}
