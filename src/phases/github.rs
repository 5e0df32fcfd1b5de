// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! GitHub source phase
//!
//! Pulls source from a GitHub repository and registers a push webhook so
//! the pipeline runs on every commit to the configured branch.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

use super::{ParamKind, ParamSchema, PhaseCapability, PhasePlugin};
use crate::errors::WaterworksResult;
use crate::pipeline::{
    Action, ActionCategory, ActionOwner, PhaseContext, PhaseDeclaration, SecretQuestion, StageDescription,
    SOURCE_OUTPUT,
};
use crate::provider::{Provider, Webhook, WebhookFilter};

const SCHEMA: ParamSchema = ParamSchema {
    label: "GitHub",
    required: &[("owner", ParamKind::String), ("repo", ParamKind::String)],
    optional: &[("branch", ParamKind::String)],
};

const TOKEN_SECRET: &str = "githubAccessToken";

/// GitHub source phase
pub struct GithubPhase {
    provider: Arc<dyn Provider>,
}

impl GithubPhase {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

/// `<app>-<pipeline>-webhook`
pub fn webhook_name(ctx: &PhaseContext) -> String {
    format!("{}-webhook", ctx.pipeline_resource_name())
}

// 32 random bytes, hex encoded, for the HMAC secret
fn webhook_secret_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl PhasePlugin for GithubPhase {
    fn phase_type(&self) -> &'static str {
        "github"
    }

    fn capability(&self) -> PhaseCapability {
        PhaseCapability::Source
    }

    fn check(&self, decl: &PhaseDeclaration) -> Vec<String> {
        SCHEMA.check(decl)
    }

    fn secret_questions(&self, decl: &PhaseDeclaration) -> Vec<SecretQuestion> {
        vec![SecretQuestion::new(
            &decl.name,
            TOKEN_SECRET,
            format!("'{}' phase - Please enter your GitHub access token", decl.name),
        )]
    }

    async fn deploy_phase(&self, ctx: &PhaseContext) -> WaterworksResult<StageDescription> {
        info!("Creating source phase '{}'", ctx.phase_name);
        let token = ctx.secret(TOKEN_SECRET)?;
        let branch = ctx.params.param_str("branch").unwrap_or("master");

        let action = Action::new(&ctx.phase_name, ActionCategory::Source, ActionOwner::ThirdParty, "GitHub")
            .output(SOURCE_OUTPUT)
            .config("Owner", ctx.params.param_str("owner").unwrap_or_default())
            .config("Repo", ctx.params.param_str("repo").unwrap_or_default())
            .config("Branch", branch)
            .config("OAuthToken", token)
            .config("PollForSourceChanges", "false");

        Ok(StageDescription::single(&ctx.phase_name, action))
    }

    async fn delete_phase(&self, ctx: &PhaseContext) -> WaterworksResult<bool> {
        info!("Nothing to delete for source phase '{}'", ctx.phase_name);
        Ok(true)
    }

    fn supports_webhooks(&self) -> bool {
        true
    }

    async fn add_webhook(&self, ctx: &PhaseContext) -> WaterworksResult<()> {
        let name = webhook_name(ctx);
        let exists = self.provider.list_webhooks().await?.iter().any(|w| w.name == name);
        if exists {
            info!("Webhook '{}' already exists", name);
            return Ok(());
        }

        info!("Creating webhook '{}'", name);
        let webhook = Webhook {
            name: name.clone(),
            target_pipeline: ctx.pipeline_resource_name(),
            target_action: ctx.phase_name.clone(),
            filters: vec![WebhookFilter {
                json_path: "$.ref".to_string(),
                match_equals: "refs/heads/{Branch}".to_string(),
            }],
            authentication: "GITHUB_HMAC".to_string(),
            secret_token: webhook_secret_token(),
            registered: false,
        };
        self.provider.put_webhook(webhook).await?;
        self.provider.register_webhook(&name).await
    }

    async fn remove_webhook(&self, ctx: &PhaseContext) -> WaterworksResult<()> {
        let name = webhook_name(ctx);
        let exists = self.provider.list_webhooks().await?.iter().any(|w| w.name == name);
        if !exists {
            return Ok(());
        }

        info!("Removing webhook '{}'", name);
        self.provider.deregister_webhook(&name).await?;
        self.provider.delete_webhook(&name).await?;
        Ok(())
    }
}
