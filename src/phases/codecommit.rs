// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! CodeCommit source phase

use async_trait::async_trait;
use tracing::info;

use super::{ParamKind, ParamSchema, PhaseCapability, PhasePlugin};
use crate::errors::WaterworksResult;
use crate::pipeline::{Action, ActionCategory, ActionOwner, PhaseContext, PhaseDeclaration, StageDescription, SOURCE_OUTPUT};

const SCHEMA: ParamSchema = ParamSchema {
    label: "CodeCommit",
    required: &[("repo", ParamKind::String), ("branch", ParamKind::String)],
    optional: &[],
};

/// CodeCommit source phase
pub struct CodeCommitPhase;

#[async_trait]
impl PhasePlugin for CodeCommitPhase {
    fn phase_type(&self) -> &'static str {
        "codecommit"
    }

    fn capability(&self) -> PhaseCapability {
        PhaseCapability::Source
    }

    fn check(&self, decl: &PhaseDeclaration) -> Vec<String> {
        SCHEMA.check(decl)
    }

    async fn deploy_phase(&self, ctx: &PhaseContext) -> WaterworksResult<StageDescription> {
        info!("Creating source phase '{}'", ctx.phase_name);

        let action = Action::new(&ctx.phase_name, ActionCategory::Source, ActionOwner::Aws, "CodeCommit")
            .output(SOURCE_OUTPUT)
            .config("RepositoryName", ctx.params.param_str("repo").unwrap_or_default())
            .config("BranchName", ctx.params.param_str("branch").unwrap_or("master"));

        Ok(StageDescription::single(&ctx.phase_name, action))
    }

    async fn delete_phase(&self, ctx: &PhaseContext) -> WaterworksResult<bool> {
        info!("Nothing to delete for source phase '{}'", ctx.phase_name);
        Ok(true)
    }
}
