// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Delete command - tear down a pipeline and its phases

use miette::Result;
use std::path::{Path, PathBuf};

use super::{load_spec, open_provider, resolve_account_config, select_pipeline, TargetArgs};
use crate::pipeline::{Lifecycle, PipelineContext, PipelineSecrets};
use crate::utils::{self, with_spinner};

/// Run the delete command
pub async fn run(file: &Path, state_dir: Option<PathBuf>, target: TargetArgs) -> Result<()> {
    let spec = load_spec(file)?;
    let provider = open_provider(state_dir)?;
    let lifecycle = Lifecycle::with_defaults(provider);

    let interactive = target.pipeline.is_none() || target.account_name.is_none();
    let pipeline = select_pipeline(&spec, target.pipeline.clone()).await?;
    let account = resolve_account_config(&target, interactive).await?;

    // Deleting needs no secrets.
    let ctx = PipelineContext::build(&spec, &pipeline, account, &PipelineSecrets::new())?;

    utils::print_header(&format!("Deleting pipeline '{}'", ctx.pipeline_resource_name()));

    with_spinner("Deleting webhooks, pipeline and phases", lifecycle.delete(&ctx)).await?;

    utils::print_success(&format!("Deleted pipeline '{}'", ctx.pipeline_resource_name()));
    Ok(())
}
