// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Pipeline lifecycle
//!
//! Drives a pipeline through check, secrets, deploy and delete. Phase
//! deploys and deletes are issued as one concurrent batch on the current
//! task. The first failure rejects the batch and the remaining futures are
//! dropped; provider calls they already issued are not rolled back. Stage
//! descriptions always come back in declaration order.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument, Span};

use crate::errors::WaterworksResult;
use crate::phases::{PhasePlugin, PhaseRegistry};
use crate::pipeline::{
    check_artifact_chain, decode_supplied_secrets, pipeline_resource_name, redistribute_secrets, PhaseContext, PipelineContext,
    PipelineSecrets, PipelineValidator, SecretPrompter, SecretQuestion, StageDescription, ValidationResult,
    WaterworksFile,
};
use crate::provider::{role_arn, Bucket, PipelineDeclaration, Provider, Role};

/// What pipeline assembly did to the provider pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineChange {
    Created,
    Updated,
}

/// Name of the role the provider pipeline runs under
pub fn pipeline_role_name(app_name: &str, pipeline_name: &str) -> String {
    format!("{}-pipeline", pipeline_resource_name(app_name, pipeline_name))
}

/// Orchestrates phase plugins against one provider
pub struct Lifecycle {
    registry: Arc<PhaseRegistry>,
    provider: Arc<dyn Provider>,
    span: Span,
}

impl Lifecycle {
    pub fn new(registry: Arc<PhaseRegistry>, provider: Arc<dyn Provider>) -> Self {
        Self {
            registry,
            provider,
            span: info_span!("lifecycle"),
        }
    }

    /// Lifecycle over the built-in phase types
    pub fn with_defaults(provider: Arc<dyn Provider>) -> Self {
        let registry = Arc::new(PhaseRegistry::with_defaults(Arc::clone(&provider)));
        Self::new(registry, provider)
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    /// Validate the whole file, structure and phase parameters
    pub fn check(&self, spec: &WaterworksFile) -> WaterworksResult<ValidationResult> {
        let _guard = self.span.enter();
        let result = PipelineValidator::check(spec, &self.registry)?;
        debug!(errors = result.error_count(), "Checked Waterworks file");
        Ok(result)
    }

    fn plugins_for<'a>(
        &self,
        phases: impl Iterator<Item = &'a PhaseContext>,
    ) -> WaterworksResult<Vec<(Arc<dyn PhasePlugin>, &'a PhaseContext)>> {
        phases
            .map(|phase| Ok((self.registry.require(&phase.phase_type)?, phase)))
            .collect()
    }

    /// Ask for every phase's secrets, one phase at a time
    pub async fn collect_secrets(
        &self,
        spec: &WaterworksFile,
        pipeline_name: &str,
        prompter: &dyn SecretPrompter,
    ) -> WaterworksResult<PipelineSecrets> {
        let definition = spec.pipeline(pipeline_name)?;
        let mut secrets = PipelineSecrets::new();

        for decl in &definition.phases {
            let plugin = self.registry.require(&decl.phase_type)?;
            let answers = plugin.secrets_for_phase(decl, prompter).await?;
            secrets.insert(decl.name.clone(), answers);
        }

        Ok(secrets)
    }

    /// Secrets from a `--secrets` blob
    pub fn secrets_from_blob(
        &self,
        spec: &WaterworksFile,
        pipeline_name: &str,
        encoded: &str,
    ) -> WaterworksResult<PipelineSecrets> {
        let definition = spec.pipeline(pipeline_name)?;
        let supplied = decode_supplied_secrets(encoded)?;
        Ok(redistribute_secrets(&definition.phases, &supplied))
    }

    /// Every secret the pipeline's phases will ask for
    pub fn list_required_secrets(
        &self,
        spec: &WaterworksFile,
        pipeline_name: &str,
    ) -> WaterworksResult<Vec<SecretQuestion>> {
        let definition = spec.pipeline(pipeline_name)?;
        let mut questions = Vec::new();
        for decl in &definition.phases {
            let plugin = self.registry.require(&decl.phase_type)?;
            questions.extend(plugin.secret_questions(decl));
        }
        Ok(questions)
    }

    /// Create the artifact bucket unless it already exists
    pub async fn ensure_artifact_bucket(&self, ctx: &PipelineContext) -> WaterworksResult<bool> {
        let name = &ctx.bucket_name;
        if self.provider.get_bucket(name).instrument(self.span.clone()).await?.is_some() {
            debug!("Artifact bucket '{}' already exists", name);
            return Ok(false);
        }

        info!("Creating artifact bucket '{}'", name);
        let bucket = Bucket {
            name: name.clone(),
            region: ctx.account_config.region.clone(),
        };
        self.provider.create_bucket(bucket).instrument(self.span.clone()).await?;
        Ok(true)
    }

    /// Deploy every phase concurrently, returning stages in declaration order
    pub async fn deploy_phases(&self, ctx: &PipelineContext) -> WaterworksResult<Vec<StageDescription>> {
        let plugins = self.plugins_for(ctx.phases())?;
        info!("Deploying {} phases of '{}'", plugins.len(), ctx.pipeline_name);

        let deploys = plugins.iter().map(|(plugin, phase)| plugin.deploy_phase(phase));
        try_join_all(deploys).instrument(self.span.clone()).await
    }

    /// Create the provider pipeline, or replace its stages if it exists
    pub async fn deploy_pipeline(
        &self,
        ctx: &PipelineContext,
        stages: Vec<StageDescription>,
    ) -> WaterworksResult<PipelineChange> {
        self.assemble(ctx, stages).instrument(self.span.clone()).await
    }

    async fn assemble(&self, ctx: &PipelineContext, stages: Vec<StageDescription>) -> WaterworksResult<PipelineChange> {
        check_artifact_chain(&stages)?;
        let name = ctx.pipeline_resource_name();
        let role = self.ensure_pipeline_role(ctx).await?;

        let existing = self.provider.get_pipeline(&name).await?;
        let mut declaration = PipelineDeclaration {
            name: name.clone(),
            role_arn: role.arn,
            artifact_bucket: ctx.bucket_name.clone(),
            version: 1,
            stages,
        };

        match existing {
            Some(current) => {
                info!("Updating pipeline '{}'", name);
                declaration.version = current.version + 1;
                self.provider.update_pipeline(declaration).await?;
                Ok(PipelineChange::Updated)
            }
            None => {
                info!("Creating pipeline '{}'", name);
                self.provider.create_pipeline(declaration).await?;
                Ok(PipelineChange::Created)
            }
        }
    }

    async fn ensure_pipeline_role(&self, ctx: &PipelineContext) -> WaterworksResult<Role> {
        let name = pipeline_role_name(&ctx.app_name, &ctx.pipeline_name);
        let role = Role {
            arn: role_arn(&ctx.account_config.account_id, &name),
            name,
            trusted_services: vec!["codepipeline.amazonaws.com".to_string()],
            policy_arn: None,
            policy_document: serde_json::json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": ["s3:*", "codebuild:*", "lambda:InvokeFunction", "iam:PassRole"],
                    "Resource": "*"
                }]
            }),
        };
        self.provider.create_or_update_role(role).await
    }

    /// Register webhooks, in declaration order, for phases that support them
    pub async fn add_webhooks(&self, ctx: &PipelineContext) -> WaterworksResult<()> {
        for (plugin, phase) in self.plugins_for(ctx.phases())? {
            if !plugin.supports_webhooks() {
                continue;
            }
            plugin.add_webhook(phase).instrument(self.span.clone()).await?;
        }
        Ok(())
    }

    /// Remove webhooks, in declaration order
    pub async fn remove_webhooks(&self, ctx: &PipelineContext) -> WaterworksResult<()> {
        for (plugin, phase) in self.plugins_for(ctx.phases())? {
            if !plugin.supports_webhooks() {
                continue;
            }
            plugin.remove_webhook(phase).instrument(self.span.clone()).await?;
        }
        Ok(())
    }

    /// Delete the provider pipeline and its role; absent resources are fine
    pub async fn delete_pipeline(&self, app_name: &str, pipeline_name: &str) -> WaterworksResult<bool> {
        let name = pipeline_resource_name(app_name, pipeline_name);
        info!("Deleting pipeline '{}'", name);

        let existed = self.provider.delete_pipeline(&name).instrument(self.span.clone()).await?;
        if !existed {
            debug!("Pipeline '{}' was already gone", name);
        }
        self.provider
            .delete_role(&pipeline_role_name(app_name, pipeline_name))
            .await?;
        Ok(existed)
    }

    /// Delete every phase concurrently
    pub async fn delete_phases(&self, ctx: &PipelineContext) -> WaterworksResult<Vec<bool>> {
        let plugins = self.plugins_for(ctx.phases())?;
        let deletes = plugins.iter().map(|(plugin, phase)| plugin.delete_phase(phase));
        try_join_all(deletes).instrument(self.span.clone()).await
    }

    /// Deploy phases, assemble the pipeline, then register webhooks
    ///
    /// Every phase type is resolved before the artifact bucket is touched.
    pub async fn deploy(&self, ctx: &PipelineContext) -> WaterworksResult<PipelineChange> {
        self.plugins_for(ctx.phases())?;
        self.ensure_artifact_bucket(ctx).await?;
        let stages = self.deploy_phases(ctx).await?;
        let change = self.deploy_pipeline(ctx, stages).await?;
        self.add_webhooks(ctx).await?;
        Ok(change)
    }

    /// Remove webhooks, delete the pipeline, then delete phases
    pub async fn delete(&self, ctx: &PipelineContext) -> WaterworksResult<()> {
        self.remove_webhooks(ctx).await?;
        self.delete_pipeline(&ctx.app_name, &ctx.pipeline_name).await?;
        self.delete_phases(ctx).await?;
        Ok(())
    }
}
