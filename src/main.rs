// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! waterworks - Deployment pipeline orchestrator
//!
//! Validate, deploy and delete multi-phase delivery pipelines.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waterworks::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.debug { "waterworks=debug" } else { "waterworks=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Deploy { target, secrets } => {
            waterworks::cli::deploy::run(&cli.file, cli.state_dir, target, secrets).await
        }
        Commands::Check => waterworks::cli::check::run(&cli.file, cli.debug).await,
        Commands::Delete { target } => waterworks::cli::delete::run(&cli.file, cli.state_dir, target).await,
        Commands::ListRequiredSecrets { pipeline } => {
            waterworks::cli::secrets::run(&cli.file, pipeline).await
        }
        Commands::RedefinePath { path } => waterworks::cli::redefine_path::run(path).await,
    }
}
