// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! CLI entry point for the readiness gate demo.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ready_gate_demo::config::DemoConfig;
use ready_gate_demo::run;
use tokio::task::LocalSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Look up records before the database is ready")]
struct Args {
    /// Optional JSON config (records, failing keys, init delay)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured init delay, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
    /// Keys to look up. Defaults to every configured key.
    keys: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let mut config = DemoConfig::load(args.config.as_deref()).with_context(|| {
        format!(
            "failed to load config from {}",
            args.config
                .as_deref()
                .map_or_else(|| "<defaults>".into(), |p| p.display().to_string())
        )
    })?;
    if let Some(delay_ms) = args.delay_ms {
        config.init_delay_ms = delay_ms;
    }

    let keys = if args.keys.is_empty() {
        config.keys()
    } else {
        args.keys
    };
    info!(keys = keys.len(), delay_ms = config.init_delay_ms, "opening database");

    let outcomes = LocalSet::new().run_until(run(&config, &keys)).await;
    for outcome in outcomes {
        match outcome.result {
            Ok(value) => info!(key = %outcome.key, %value, "resolved"),
            Err(err) => warn!(key = %outcome.key, %err, "rejected"),
        }
    }
    Ok(())
}
