// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! npm publish phase
//!
//! Publishes the build output to npm from a dedicated build project. The
//! npm token is kept in the parameter store as `<app>.<pipeline>.npmToken`
//! and read by the buildspec at run time.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ParamKind, ParamSchema, PhasePlugin};
use crate::errors::WaterworksResult;
use crate::pipeline::{
    Action, ActionCategory, ActionOwner, PhaseContext, PhaseDeclaration, SecretQuestion, StageDescription,
    BUILD_OUTPUT,
};
use crate::provider::{role_arn, BuildProject, Parameter, Provider, Role};

const SCHEMA: ParamSchema = ParamSchema {
    label: "NPM",
    required: &[],
    optional: &[("build_image", ParamKind::String)],
};

const TOKEN_SECRET: &str = "npmToken";

const DEFAULT_IMAGE: &str = "aws/codebuild/nodejs:6.3.1";

/// npm publish phase
pub struct NpmPhase {
    provider: Arc<dyn Provider>,
}

impl NpmPhase {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    async fn service_role(&self, ctx: &PhaseContext) -> WaterworksResult<Role> {
        let name = service_role_name(&ctx.app_name);
        let prefix = parameter_prefix(ctx);
        self.provider
            .create_or_update_role(Role {
                arn: role_arn(&ctx.account_config.account_id, &name),
                name,
                trusted_services: vec!["codebuild.amazonaws.com".to_string()],
                policy_arn: None,
                policy_document: serde_json::json!({
                    "Version": "2012-10-17",
                    "Statement": [
                        {
                            "Effect": "Allow",
                            "Action": ["logs:*", "s3:*"],
                            "Resource": "*"
                        },
                        {
                            "Effect": "Allow",
                            "Action": ["ssm:GetParameter", "ssm:GetParameters"],
                            "Resource": format!(
                                "arn:aws:ssm:{}:{}:parameter/{}.*",
                                ctx.account_config.region, ctx.account_config.account_id, prefix
                            )
                        }
                    ]
                }),
            })
            .await
    }
}

/// `<app>-WaterworksNPMPhase`
pub fn service_role_name(app_name: &str) -> String {
    format!("{}-WaterworksNPMPhase", app_name)
}

fn parameter_prefix(ctx: &PhaseContext) -> String {
    format!("{}.{}", ctx.app_name, ctx.pipeline_name)
}

fn token_parameter_name(ctx: &PhaseContext) -> String {
    format!("{}.{}", parameter_prefix(ctx), TOKEN_SECRET)
}

fn buildspec(ctx: &PhaseContext) -> String {
    format!(
        r#"version: 0.2
phases:
  build:
    commands:
      - NPM_TOKEN=$(aws ssm get-parameter --name {} --with-decryption --query Parameter.Value --output text)
      - echo "//registry.npmjs.org/:_authToken=$NPM_TOKEN" > ~/.npmrc
      - npm publish
"#,
        token_parameter_name(ctx)
    )
}

#[async_trait]
impl PhasePlugin for NpmPhase {
    fn phase_type(&self) -> &'static str {
        "npm"
    }

    fn check(&self, decl: &PhaseDeclaration) -> Vec<String> {
        SCHEMA.check(decl)
    }

    fn secret_questions(&self, decl: &PhaseDeclaration) -> Vec<SecretQuestion> {
        vec![SecretQuestion::new(
            &decl.name,
            TOKEN_SECRET,
            format!("'{}' phase - Please enter your NPM Token", decl.name),
        )]
    }

    async fn deploy_phase(&self, ctx: &PhaseContext) -> WaterworksResult<StageDescription> {
        info!("Creating npm phase '{}'", ctx.phase_name);
        let token = ctx.secret(TOKEN_SECRET)?.to_string();
        let role = self.service_role(ctx).await?;

        let project = BuildProject {
            name: ctx.resource_name(),
            app_name: ctx.app_name.clone(),
            pipeline_name: ctx.pipeline_name.clone(),
            phase_name: ctx.phase_name.clone(),
            image: ctx.params.param_str("build_image").unwrap_or(DEFAULT_IMAGE).to_string(),
            environment_variables: BTreeMap::new(),
            service_role_arn: role.arn,
            region: ctx.account_config.region.clone(),
            account_id: ctx.account_config.account_id.clone(),
            cache_location: None,
            buildspec: Some(buildspec(ctx)),
        };
        let project_name = project.name.clone();

        if self.provider.get_project(&project_name).await?.is_some() {
            debug!("Updating npm project '{}'", project_name);
            self.provider.update_project(project).await?;
        } else {
            debug!("Creating npm project '{}'", project_name);
            self.provider.create_project(project).await?;
        }

        self.provider
            .put_parameter(Parameter {
                name: token_parameter_name(ctx),
                kind: "SecureString".to_string(),
                value: token,
                description: "NPM token for pipeline".to_string(),
            })
            .await?;

        let action = Action::new(&ctx.phase_name, ActionCategory::Test, ActionOwner::Aws, "CodeBuild")
            .input(BUILD_OUTPUT)
            .config("ProjectName", &project_name);

        Ok(StageDescription::single(&ctx.phase_name, action))
    }

    async fn delete_phase(&self, ctx: &PhaseContext) -> WaterworksResult<bool> {
        let project_name = ctx.resource_name();
        info!("Deleting npm project '{}'", project_name);
        self.provider.delete_project(&project_name).await?;
        self.provider.delete_parameter(&token_parameter_name(ctx)).await?;

        // Shared by every pipeline of the app, like the build phase role.
        let role_name = service_role_name(&ctx.app_name);
        if !self.provider.delete_role(&role_name).await? {
            debug!("Service role '{}' was already gone", role_name);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{AccountConfig, PhaseSecrets};
    use crate::provider::{BuildProjectApi, InMemoryProvider, ParameterApi, RoleApi};

    fn context(params: PhaseDeclaration) -> PhaseContext {
        PhaseContext {
            app_name: "my-app".into(),
            phase_name: "Publish".into(),
            phase_type: "npm".into(),
            bucket_name: "bucket".into(),
            pipeline_name: "prd".into(),
            account_config: Arc::new(AccountConfig::new("111", "us-west-2")),
            params,
            secrets: PhaseSecrets::from([(TOKEN_SECRET.to_string(), "npm-t0k".to_string())]),
        }
    }

    #[test]
    fn test_check_build_image_type() {
        let phase = NpmPhase::new(Arc::new(InMemoryProvider::in_memory()));
        assert!(phase.check(&PhaseDeclaration::new("npm", "Publish")).is_empty());

        let errors = phase.check(&PhaseDeclaration::new("npm", "Publish").with_param("build_image", 6));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("NPM - Error at path '/build_image'"));
    }

    #[tokio::test]
    async fn test_deploy_stores_token_and_consumes_build_output() {
        let provider = Arc::new(InMemoryProvider::in_memory());
        let phase = NpmPhase::new(provider.clone());
        let ctx = context(PhaseDeclaration::new("npm", "Publish"));

        let stage = phase.deploy_phase(&ctx).await.unwrap();
        phase.deploy_phase(&ctx).await.unwrap();
        assert_eq!(provider.call_count("createProject").await, 1);
        assert_eq!(provider.call_count("updateProject").await, 1);
        assert_eq!(provider.call_count("putParameter").await, 2);

        let action = &stage.actions[0];
        assert_eq!(action.category(), ActionCategory::Test);
        assert_eq!(action.input_artifacts, vec![BUILD_OUTPUT.to_string()]);
        assert_eq!(action.configuration["ProjectName"], "my-app-prd-Publish");

        let project = provider.get_project("my-app-prd-Publish").await.unwrap().unwrap();
        assert_eq!(project.image, DEFAULT_IMAGE);
        assert!(project.buildspec.unwrap().contains("--name my-app.prd.npmToken"));
    }

    #[tokio::test]
    async fn test_delete_removes_project_parameter_and_role() {
        let provider = Arc::new(InMemoryProvider::in_memory());
        let phase = NpmPhase::new(provider.clone());
        let ctx = context(PhaseDeclaration::new("npm", "Publish"));

        phase.deploy_phase(&ctx).await.unwrap();
        assert!(phase.delete_phase(&ctx).await.unwrap());

        assert!(provider.get_project("my-app-prd-Publish").await.unwrap().is_none());
        assert!(provider.get_role("my-app-WaterworksNPMPhase").await.unwrap().is_none());
        assert!(!provider.delete_parameter("my-app.prd.npmToken").await.unwrap());

        assert!(phase.delete_phase(&ctx).await.unwrap());
    }
}
