//! Ribbon CLI - one-shot requests and topology watching.
//!
//! ```text
//! main() -> load config -> RibbonClient (subscribes to topology changes)
//!                               |
//!            get/post: wait for first topology -> request -> print JSON
//!            watch:    print every topology payload until Ctrl-C
//! ```
//!
//! The client is `Rc`-based, so everything runs on a current-thread runtime
//! inside a `LocalSet`. Logs go to stderr; stdout carries only JSON.

mod args;

use std::path::Path;
use std::time::Duration;
use std::io;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use ribbon_client::{RibbonClient, StaticToken};
use ribbon_config::RibbonConfig;
use ribbon_core::Deferred;
use ribbon_types::BearerToken;
use serde_json::Value;
use tokio::task::LocalSet;
use tokio::{signal, time};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::args::{Cli, Commands, post_target};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    LocalSet::new().run_until(run(cli)).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let client = build_client(&config)?;
    let wait = cli.wait();

    match cli.command {
        Commands::Get { service, path } => {
            wait_for_topology(&client, wait).await?;
            let value = client.get_json(&service, &path).await?;
            print_json(&value)
        }
        Commands::Post { service, args } => {
            let (path, body) = post_target(&args)?;
            wait_for_topology(&client, wait).await?;
            let value = client.post_json(&service, &path, &body).await?;
            print_json(&value)
        }
        Commands::Watch => watch(&client).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<RibbonConfig> {
    let config = match path {
        Some(path) => RibbonConfig::load_from(path)?,
        None => RibbonConfig::load()?.unwrap_or_default(),
    };
    tracing::debug!(origin = %config.client.origin, "Configuration loaded");
    Ok(config)
}

fn build_client(config: &RibbonConfig) -> Result<RibbonClient> {
    let mut builder = RibbonClient::builder(config.client.clone());
    if let Some(token) = config.auth.as_ref().and_then(|auth| auth.token()) {
        builder = builder.credentials(StaticToken::new(BearerToken::new(token)));
    }
    builder.build().context("failed to build HTTP client")
}

/// Resolve once the first topology-change event has been applied.
async fn wait_for_topology(client: &RibbonClient, wait: Duration) -> Result<()> {
    let first = Deferred::<(), String>::new();
    let arrived = first.clone();
    client.on_topology_change(move |_| arrived.resolve(()));

    time::timeout(wait, first.eventual())
        .await
        .map_err(|_| anyhow!("no topology received within {}s", wait.as_secs()))?
        .map_err(|cause| anyhow!(cause))?;

    tracing::debug!(services = client.topology().len(), "Topology received");
    Ok(())
}

async fn watch(client: &RibbonClient) -> Result<()> {
    client.on_topology_change(|payload| println!("{payload}"));
    tracing::info!("Watching topology changes; press Ctrl-C to stop");
    signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
