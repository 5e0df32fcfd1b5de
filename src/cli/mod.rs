// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for waterworks.

pub mod check;
pub mod delete;
pub mod deploy;
pub mod redefine_path;
pub mod secrets;

use clap::{Args, Parser, Subcommand};
use miette::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::ConfigStore;
use crate::errors::WaterworksError;
use crate::pipeline::{AccountConfig, ValidationResult, WaterworksFile, DEFAULT_SPEC_FILE};
use crate::provider::{FilesystemProvider, FilesystemStore};
use crate::utils::{self, prompt};

/// Deployment pipeline orchestrator
///
/// Validate, deploy and delete multi-phase delivery pipelines described in
/// a Waterworks file.
#[derive(Parser, Debug)]
#[clap(
    name = "waterworks",
    version,
    about = "Deploy multi-phase delivery pipelines from a declarative file",
    long_about = None,
    after_help = "Examples:\n\
        waterworks check                              Validate waterworks.yml\n\
        waterworks deploy                             Deploy, prompting for anything missing\n\
        waterworks deploy --pipeline prd --account-name prd --secrets <BASE64>\n\
        waterworks list-required-secrets --pipeline prd\n\n\
        See 'waterworks <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[clap(short, long, global = true)]
    pub debug: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Waterworks file
    #[clap(short, long, global = true, default_value = DEFAULT_SPEC_FILE)]
    pub file: PathBuf,

    /// Directory holding provider state (default: .waterworks/state)
    #[clap(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a pipeline
    Deploy {
        #[clap(flatten)]
        target: TargetArgs,

        /// Base64-encoded JSON list of {phaseName, name, value} secrets
        #[clap(long)]
        secrets: Option<String>,
    },

    /// Validate the Waterworks file
    Check,

    /// Delete a deployed pipeline
    Delete {
        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Print the secrets a pipeline needs, as JSON
    ListRequiredSecrets {
        /// Pipeline to inspect
        #[clap(long)]
        pipeline: Option<String>,
    },

    /// Change where account configuration files are read from
    RedefinePath {
        /// Directory holding `<account_name>.yml` files
        path: Option<PathBuf>,
    },
}

/// Which pipeline to act on, and in which account
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Pipeline to act on
    #[clap(long)]
    pub pipeline: Option<String>,

    /// Account to deploy into
    #[clap(long, alias = "account_name")]
    pub account_name: Option<String>,

    /// Directory holding account configuration files (remembered)
    #[clap(long, value_name = "DIR")]
    pub account_configs_path: Option<PathBuf>,
}

/// Load the Waterworks file
pub fn load_spec(file: &Path) -> Result<WaterworksFile> {
    Ok(WaterworksFile::from_file(file)?)
}

/// Open the filesystem provider
pub fn open_provider(state_dir: Option<PathBuf>) -> Result<Arc<FilesystemProvider>> {
    let store = match state_dir {
        Some(dir) => FilesystemStore::new(dir)?,
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
            FilesystemStore::default_store(cwd)?
        }
    };
    debug!("Provider state in {}", store.state_dir().display());
    Ok(Arc::new(FilesystemProvider::new(store)))
}

/// Use the named pipeline, or ask for one
pub async fn select_pipeline(spec: &WaterworksFile, pipeline: Option<String>) -> Result<String> {
    if let Some(name) = pipeline {
        spec.pipeline(&name)?;
        return Ok(name);
    }

    let names = spec.pipeline_names();
    if names.is_empty() {
        return Err(WaterworksError::InvalidSpec {
            errors: vec!["You must specify at least one pipeline".into()],
        }
        .into());
    }
    Ok(prompt::choose("Which pipeline?", &names).await?)
}

/// Locate and load the target account's configuration
///
/// A configs path given on the command line is remembered for next time.
pub async fn resolve_account_config(target: &TargetArgs, interactive: bool) -> Result<AccountConfig> {
    let store = ConfigStore::default_location()?;

    let configs_path = match &target.account_configs_path {
        Some(path) => {
            store.set_account_configs_path(path).await?;
            path.clone()
        }
        None => match store.load().await?.account_configs_path {
            Some(path) => path,
            None if interactive => {
                let answer = prompt::ask("Where are your account configuration files?").await?;
                let path = PathBuf::from(answer);
                store.set_account_configs_path(&path).await?;
                path
            }
            None => {
                return Err(WaterworksError::Config {
                    message: "No account configuration directory is known".into(),
                    help: Some("Pass --account-configs-path or run 'waterworks redefine-path'".into()),
                }
                .into())
            }
        },
    };

    let account_name = match &target.account_name {
        Some(name) => name.clone(),
        None => {
            let accounts = account_names(&configs_path);
            let choices: Vec<&str> = accounts.iter().map(String::as_str).collect();
            if choices.is_empty() {
                prompt::ask("Which account?").await?
            } else {
                prompt::choose("Which account?", &choices).await?
            }
        }
    };

    Ok(AccountConfig::load(&configs_path, &account_name)?)
}

// Account names are the `.yml` file stems in the configs directory.
fn account_names(configs_path: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(configs_path) else {
        return vec![];
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("yml"))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    names.sort();
    names
}

/// Print a validation report, pipeline by pipeline
pub fn print_validation(result: &ValidationResult) {
    for (scope, errors) in &result.errors {
        if errors.is_empty() {
            utils::print_success(&format!("Pipeline '{}' is valid", scope));
            continue;
        }
        for error in errors {
            utils::print_error(&format!("{}: {}", scope, error));
        }
    }

    for warning in &result.warnings {
        utils::print_warning(warning);
    }
}
