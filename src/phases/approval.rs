// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Manual approval phase

use async_trait::async_trait;
use tracing::info;

use super::{ParamSchema, PhasePlugin};
use crate::errors::WaterworksResult;
use crate::pipeline::{Action, ActionCategory, ActionOwner, PhaseContext, PhaseDeclaration, StageDescription};

const SCHEMA: ParamSchema = ParamSchema {
    label: "Approval",
    required: &[],
    optional: &[],
};

/// Manual approval phase
pub struct ApprovalPhase;

#[async_trait]
impl PhasePlugin for ApprovalPhase {
    fn phase_type(&self) -> &'static str {
        "approval"
    }

    fn check(&self, decl: &PhaseDeclaration) -> Vec<String> {
        SCHEMA.check(decl)
    }

    async fn deploy_phase(&self, ctx: &PhaseContext) -> WaterworksResult<StageDescription> {
        info!("Creating manual approval phase '{}'", ctx.phase_name);
        let action = Action::new(&ctx.phase_name, ActionCategory::Approval, ActionOwner::Aws, "Manual");
        Ok(StageDescription::single(&ctx.phase_name, action))
    }

    async fn delete_phase(&self, ctx: &PhaseContext) -> WaterworksResult<bool> {
        info!("Nothing to delete for approval phase '{}'", ctx.phase_name);
        Ok(true)
    }
}
