// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Progress spinner for provider operations

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Run `task` behind a spinner, finishing it with ✓ or ✗
pub async fn with_spinner<T, E, F>(message: &str, task: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let pb = create_spinner(message);
    let result = task.await;
    match &result {
        Ok(_) => pb.finish_with_message(format!("{} {}", "✓".green(), message)),
        Err(_) => pb.finish_with_message(format!("{} {}", "✗".red(), message)),
    }
    result
}
