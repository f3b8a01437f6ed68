use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;

const DEFAULT_WAIT_SECS: u64 = 10;
const ROOT_PATH: &str = "/";

#[derive(Debug, Parser)]
#[command(name = "ribbon", version)]
#[command(about = "Send JSON requests to services routed by a pushed topology")]
pub(crate) struct Cli {
    /// Config file (default: ~/.ribbon/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,
    /// Seconds to wait for the first topology
    #[arg(long, global = true, value_name = "N", default_value_t = DEFAULT_WAIT_SECS)]
    pub(crate) wait_secs: u64,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub(crate) enum Commands {
    /// Request a service path and print the JSON response
    Get {
        /// Service name from the topology
        service: String,
        /// Request path
        #[arg(default_value = ROOT_PATH)]
        path: String,
    },
    /// Send a JSON body to a service path and print the JSON response
    Post {
        /// Service name from the topology
        service: String,
        /// `[PATH] BODY`; the path defaults to `/`
        #[arg(value_name = "ARGS", num_args = 1..=2, required = true)]
        args: Vec<String>,
    },
    /// Print every topology payload until Ctrl-C
    Watch,
}

impl Cli {
    pub(crate) fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }
}

/// Split `post` arguments into the request path and the parsed body.
pub(crate) fn post_target(args: &[String]) -> Result<(String, Value)> {
    let (path, body) = match args {
        [path, body] => (path.as_str(), body),
        [body] => (ROOT_PATH, body),
        _ => bail!("post takes `[PATH] BODY`"),
    };
    let body = serde_json::from_str(body).context("request body is not valid JSON")?;
    Ok((path.to_string(), body))
}
