// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Deploy command - create or update a pipeline

use miette::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{load_spec, open_provider, print_validation, resolve_account_config, select_pipeline, TargetArgs};
use crate::pipeline::{Lifecycle, PipelineChange, PipelineContext};
use crate::utils::{self, with_spinner, TerminalPrompter};

/// Run the deploy command
pub async fn run(file: &Path, state_dir: Option<PathBuf>, target: TargetArgs, secrets: Option<String>) -> Result<()> {
    let spec = load_spec(file)?;
    let provider = open_provider(state_dir)?;
    let lifecycle = Lifecycle::with_defaults(provider);

    let report = lifecycle.check(&spec)?;
    if !report.is_valid() {
        print_validation(&report);
        return Err(report.into_error().into());
    }

    let interactive = target.pipeline.is_none() || target.account_name.is_none() || secrets.is_none();
    info!(interactive, "Starting deploy");

    let pipeline = select_pipeline(&spec, target.pipeline.clone()).await?;
    let account = resolve_account_config(&target, interactive).await?;

    let secrets = match secrets {
        Some(blob) => lifecycle.secrets_from_blob(&spec, &pipeline, &blob)?,
        None => lifecycle.collect_secrets(&spec, &pipeline, &TerminalPrompter).await?,
    };

    let ctx = PipelineContext::build(&spec, &pipeline, account, &secrets)?;

    utils::print_header(&format!(
        "Deploying pipeline '{}' ({} phases)",
        ctx.pipeline_resource_name(),
        ctx.phase_count()
    ));

    let change = with_spinner("Deploying phases and pipeline", lifecycle.deploy(&ctx)).await?;

    let verb = match change {
        PipelineChange::Created => "Created",
        PipelineChange::Updated => "Updated",
    };
    utils::print_success(&format!("{} pipeline '{}'", verb, ctx.pipeline_resource_name()));
    Ok(())
}
