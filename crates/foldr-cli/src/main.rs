//! foldr: drive the virtual folder engine from a terminal.
//!
//! Logs go to stderr (filter with `RUST_LOG`); listings go to stdout.

mod cli;
mod commands;
mod config;

use std::io;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{CliArgs, Command};
use crate::commands::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = CliArgs::parse();
    let config = config::load(cli.config.as_deref())?;
    let engine = Engine::from_config(&config)?;
    let mut out = io::stdout().lock();

    match cli.command {
        Command::Ls {
            location,
            order,
            seed,
        } => {
            engine
                .ls(&location, order.map(Into::into), seed, &mut out)
                .await
        }
        Command::Search { dir, keyword } => engine.search(&dir, &keyword, &mut out).await,
        Command::Cruise {
            location,
            steps,
            prev,
            root,
        } => {
            engine
                .cruise(&location, steps, prev, root.as_deref(), &mut out)
                .await
        }
        Command::Watch { dir } => engine.watch(&dir, &mut out).await,
    }
}
