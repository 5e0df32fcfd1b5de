// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Redefine-path command - change the account configs directory

use miette::Result;
use std::path::PathBuf;

use crate::config::ConfigStore;
use crate::utils::{self, prompt};

/// Run the redefine-path command
pub async fn run(path: Option<PathBuf>) -> Result<()> {
    let store = ConfigStore::default_location()?;

    let current = store.load().await?.account_configs_path;
    if let Some(current) = &current {
        utils::print_info(&format!("Current path: {}", current.display()));
    }

    let path = match path {
        Some(path) => path,
        None => PathBuf::from(prompt::ask("Where are your account configuration files?").await?),
    };

    if !path.is_dir() {
        utils::print_warning(&format!("{} is not a directory yet", path.display()));
    }

    store.set_account_configs_path(&path).await?;
    utils::print_success(&format!(
        "Account configs path set to {} in {}",
        path.display(),
        store.path().display()
    ));
    Ok(())
}
