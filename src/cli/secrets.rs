// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! List-required-secrets command

use miette::Result;
use std::path::Path;
use std::sync::Arc;

use super::{load_spec, select_pipeline};
use crate::pipeline::Lifecycle;
use crate::provider::InMemoryProvider;

/// Print the pipeline's secret questions as JSON
pub async fn run(file: &Path, pipeline: Option<String>) -> Result<()> {
    let spec = load_spec(file)?;
    let pipeline = select_pipeline(&spec, pipeline).await?;

    let lifecycle = Lifecycle::with_defaults(Arc::new(InMemoryProvider::in_memory()));
    let questions = lifecycle.list_required_secrets(&spec, &pipeline)?;

    let json = serde_json::to_string_pretty(&questions)
        .map_err(|e| miette::miette!("Failed to serialize secrets: {}", e))?;
    println!("{}", json);
    Ok(())
}
