// Copyright 2026 damlog Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use damlog_runtime::audit::DiagnosticLog;
use damlog_runtime::cli;
use damlog_runtime::config::{Config, DEFAULT_LOG_CAPACITY};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "damlog",
    about = "damlog: sync a reservoir telemetry table into a spreadsheet",
    version,
    after_help = "Settings are read from DAMLOG_* environment variables; flags override them."
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "damlog=info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Page to read (overrides DAMLOG_TARGET_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger API
    Serve {
        /// Port to listen on (overrides DAMLOG_PORT / PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the pipeline once and print the report
    Run {
        /// Compute the batch without appending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Normalize a saved HTML page and print the result
    Normalize {
        /// Saved page to read
        file: PathBuf,
        /// Year for date cells (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },
}

fn init_tracing(cli: &Cli, log: &DiagnosticLog) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let fmt = if cli.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(log.layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env();
    let log = DiagnosticLog::new(
        config
            .as_ref()
            .map(|c| c.log_capacity)
            .unwrap_or(DEFAULT_LOG_CAPACITY),
    );
    init_tracing(&cli, &log);

    let result = async move {
        let mut config = config?;
        if let Some(url) = &cli.url {
            config.set_target_url(url)?;
        }

        match cli.command {
            Commands::Serve { port } => {
                if let Some(port) = port {
                    config.port = port;
                }
                cli::serve::run(config, log).await
            }
            Commands::Run { dry_run } => cli::run_cmd::run(config, dry_run).await,
            Commands::Normalize { file, year } => cli::normalize_cmd::run(&config, &file, year),
        }
    }
    .await;

    if let Err(e) = &result {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
    result
}
