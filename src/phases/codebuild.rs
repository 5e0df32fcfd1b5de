// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! CodeBuild build phase
//!
//! Each phase owns one build project named `<app>-<pipeline>-<phase>`.
//! Unless the phase names an existing `build_role`, projects run under a
//! service role shared by the app.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ParamKind, ParamSchema, PhaseCapability, PhasePlugin};
use crate::errors::{WaterworksError, WaterworksResult};
use crate::pipeline::{
    Action, ActionCategory, ActionOwner, PhaseContext, PhaseDeclaration, StageDescription, BUILD_OUTPUT,
    SOURCE_OUTPUT,
};
use crate::provider::{role_arn, BuildProject, Provider, Role};

const SCHEMA: ParamSchema = ParamSchema {
    label: "CodeBuild",
    required: &[("build_image", ParamKind::String)],
    optional: &[
        ("environment_variables", ParamKind::Map),
        ("build_role", ParamKind::String),
        ("cache", ParamKind::OneOf(CACHE_TYPES)),
    ],
};

const CACHE_TYPES: &[&str] = &["s3", "no-cache"];

/// Placeholder in `build_image` for the account's container registry
const ACCOUNT_PLACEHOLDER: &str = "<account>";

/// CodeBuild build phase
pub struct CodeBuildPhase {
    provider: Arc<dyn Provider>,
}

impl CodeBuildPhase {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Resolve the role the project runs under
    async fn service_role(&self, ctx: &PhaseContext) -> WaterworksResult<Role> {
        if let Some(name) = ctx.params.param_str("build_role") {
            return self.provider.get_role(name).await?.ok_or_else(|| WaterworksError::InvalidPhaseParams {
                phase: ctx.phase_name.clone(),
                reason: format!("build_role '{}' does not exist", name),
            });
        }

        let name = service_role_name(&ctx.app_name);
        if let Some(role) = self.provider.get_role(&name).await? {
            return Ok(role);
        }

        info!("Creating build service role '{}'", name);
        self.provider
            .create_or_update_role(Role {
                arn: role_arn(&ctx.account_config.account_id, &name),
                name,
                trusted_services: vec!["codebuild.amazonaws.com".to_string()],
                policy_arn: None,
                policy_document: serde_json::json!({
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": ["logs:*", "s3:*", "ecr:*"],
                        "Resource": "*"
                    }]
                }),
            })
            .await
    }

    fn project(&self, ctx: &PhaseContext, role: &Role) -> BuildProject {
        let cache_location = match ctx.params.param_str("cache") {
            Some("s3") => Some(cache_location(ctx)),
            _ => None,
        };

        BuildProject {
            name: ctx.resource_name(),
            app_name: ctx.app_name.clone(),
            pipeline_name: ctx.pipeline_name.clone(),
            phase_name: ctx.phase_name.clone(),
            image: expand_image(
                ctx.params.param_str("build_image").unwrap_or_default(),
                &ctx.account_config.ecr_registry(),
            ),
            environment_variables: environment_variables(&ctx.params),
            service_role_arn: role.arn.clone(),
            region: ctx.account_config.region.clone(),
            account_id: ctx.account_config.account_id.clone(),
            cache_location,
            buildspec: None,
        }
    }
}

/// `<app>-WaterworksBuildPhase`
pub fn service_role_name(app_name: &str) -> String {
    format!("{}-WaterworksBuildPhase", app_name)
}

fn cache_location(ctx: &PhaseContext) -> String {
    format!(
        "{}/caches/{}/{}/{}/codeBuildCache",
        ctx.bucket_name, ctx.app_name, ctx.pipeline_name, ctx.phase_name
    )
}

fn expand_image(image: &str, registry: &str) -> String {
    match image.strip_prefix(ACCOUNT_PLACEHOLDER) {
        Some(rest) => format!("{}{}", registry, rest),
        None => image.to_string(),
    }
}

fn environment_variables(decl: &PhaseDeclaration) -> BTreeMap<String, String> {
    let Some(serde_yaml::Value::Mapping(map)) = decl.param("environment_variables") else {
        return BTreeMap::new();
    };

    map.iter()
        .filter_map(|(k, v)| {
            let key = k.as_str()?.to_string();
            let value = match v {
                serde_yaml::Value::String(s) => s.clone(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key, value))
        })
        .collect()
}

#[async_trait]
impl PhasePlugin for CodeBuildPhase {
    fn phase_type(&self) -> &'static str {
        "codebuild"
    }

    fn capability(&self) -> PhaseCapability {
        PhaseCapability::Build
    }

    fn check(&self, decl: &PhaseDeclaration) -> Vec<String> {
        SCHEMA.check(decl)
    }

    async fn deploy_phase(&self, ctx: &PhaseContext) -> WaterworksResult<StageDescription> {
        info!("Creating build phase '{}'", ctx.phase_name);
        let role = self.service_role(ctx).await?;
        let project = self.project(ctx, &role);
        let project_name = project.name.clone();

        if self.provider.get_project(&project_name).await?.is_some() {
            debug!("Updating build project '{}'", project_name);
            self.provider.update_project(project).await?;
        } else {
            debug!("Creating build project '{}'", project_name);
            self.provider.create_project(project).await?;
        }

        let action = Action::new(&ctx.phase_name, ActionCategory::Build, ActionOwner::Aws, "CodeBuild")
            .input(SOURCE_OUTPUT)
            .output(BUILD_OUTPUT)
            .config("ProjectName", &project_name);

        Ok(StageDescription::single(&ctx.phase_name, action))
    }

    async fn delete_phase(&self, ctx: &PhaseContext) -> WaterworksResult<bool> {
        let project_name = ctx.resource_name();
        info!("Deleting build project '{}'", project_name);
        if !self.provider.delete_project(&project_name).await? {
            debug!("Build project '{}' was already gone", project_name);
        }

        // The service role is shared by every pipeline of the app; deleting
        // one pipeline's build phase removes it for the others too.
        if ctx.params.param_str("build_role").is_none() {
            let role_name = service_role_name(&ctx.app_name);
            if !self.provider.delete_role(&role_name).await? {
                debug!("Service role '{}' was already gone", role_name);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{AccountConfig, PhaseSecrets};
    use crate::provider::{BuildProjectApi, InMemoryProvider, RoleApi};

    fn decl() -> PhaseDeclaration {
        PhaseDeclaration::new("codebuild", "Build").with_param("build_image", "<account>/my-image:latest")
    }

    fn cached_decl() -> PhaseDeclaration {
        decl().with_param("cache", "s3")
    }

    fn context(params: PhaseDeclaration) -> PhaseContext {
        PhaseContext {
            app_name: "my-app".into(),
            phase_name: "Build".into(),
            phase_type: "codebuild".into(),
            bucket_name: "codepipeline-us-west-2-111".into(),
            pipeline_name: "prd".into(),
            account_config: Arc::new(AccountConfig::new("111", "us-west-2")),
            params,
            secrets: PhaseSecrets::new(),
        }
    }

    #[test]
    fn test_check_cache_values() {
        let phase = CodeBuildPhase::new(Arc::new(InMemoryProvider::in_memory()));
        assert!(phase.check(&decl()).is_empty());
        assert!(phase.check(&decl().with_param("cache", "no-cache")).is_empty());

        let errors = phase.check(&decl().with_param("cache", "local"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("CodeBuild - Error at path '/cache'"));

        let errors = phase.check(&decl().with_param("environment_variables", "STAGE=prd"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("CodeBuild - Error at path '/environment_variables'"));

        let errors = phase.check(&decl().with_param("build_role", 42));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("CodeBuild - Error at path '/build_role'"));

        let errors = phase.check(&PhaseDeclaration::new("codebuild", "Build"));
        assert_eq!(errors, vec!["CodeBuild - The 'build_image' parameter is required".to_string()]);
    }

    #[test]
    fn test_expand_account_image() {
        assert_eq!(
            expand_image("<account>/img:1", "111.dkr.ecr.us-west-2.amazonaws.com"),
            "111.dkr.ecr.us-west-2.amazonaws.com/img:1"
        );
        assert_eq!(expand_image("aws/codebuild/standard:7.0", "x"), "aws/codebuild/standard:7.0");
    }

    #[tokio::test]
    async fn test_deploy_creates_then_updates_project() {
        let provider = Arc::new(InMemoryProvider::in_memory());
        let phase = CodeBuildPhase::new(provider.clone());
        let ctx = context(cached_decl());

        let stage = phase.deploy_phase(&ctx).await.unwrap();
        phase.deploy_phase(&ctx).await.unwrap();

        assert_eq!(provider.call_count("createProject").await, 1);
        assert_eq!(provider.call_count("updateProject").await, 1);

        let action = &stage.actions[0];
        assert_eq!(action.input_artifacts, vec![SOURCE_OUTPUT.to_string()]);
        assert_eq!(action.output_artifacts, vec![BUILD_OUTPUT.to_string()]);
        assert_eq!(action.configuration["ProjectName"], "my-app-prd-Build");

        let project = provider.get_project("my-app-prd-Build").await.unwrap().unwrap();
        assert_eq!(project.image, "111.dkr.ecr.us-west-2.amazonaws.com/my-image:latest");
        assert_eq!(
            project.cache_location.as_deref(),
            Some("codepipeline-us-west-2-111/caches/my-app/prd/Build/codeBuildCache")
        );
        assert!(provider.get_role("my-app-WaterworksBuildPhase").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cache_is_off_unless_s3() {
        let provider = Arc::new(InMemoryProvider::in_memory());
        let phase = CodeBuildPhase::new(provider.clone());

        phase.deploy_phase(&context(decl())).await.unwrap();
        let project = provider.get_project("my-app-prd-Build").await.unwrap().unwrap();
        assert_eq!(project.cache_location, None);

        phase
            .deploy_phase(&context(decl().with_param("cache", "no-cache")))
            .await
            .unwrap();
        let project = provider.get_project("my-app-prd-Build").await.unwrap().unwrap();
        assert_eq!(project.cache_location, None);
    }

    #[tokio::test]
    async fn test_deploy_with_missing_build_role_fails() {
        let provider = Arc::new(InMemoryProvider::in_memory());
        let phase = CodeBuildPhase::new(provider.clone());

        let err = phase
            .deploy_phase(&context(decl().with_param("build_role", "nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, WaterworksError::InvalidPhaseParams { .. }));
        assert_eq!(provider.call_count("createProject").await, 0);
    }

    #[tokio::test]
    async fn test_environment_variables_are_passed() {
        let yaml = "type: codebuild\nname: Build\nbuild_image: img\nenvironment_variables:\n  STAGE: prd\n  RETRIES: 3\n";
        let params: PhaseDeclaration = serde_yaml::from_str(yaml).unwrap();
        let provider = Arc::new(InMemoryProvider::in_memory());
        let phase = CodeBuildPhase::new(provider.clone());

        phase.deploy_phase(&context(params)).await.unwrap();
        let project = provider.get_project("my-app-prd-Build").await.unwrap().unwrap();
        assert_eq!(project.environment_variables["STAGE"], "prd");
        assert_eq!(project.environment_variables["RETRIES"], "3");
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_resources() {
        let provider = Arc::new(InMemoryProvider::in_memory());
        let phase = CodeBuildPhase::new(provider.clone());
        let ctx = context(decl());

        assert!(phase.delete_phase(&ctx).await.unwrap());

        phase.deploy_phase(&ctx).await.unwrap();
        assert!(phase.delete_phase(&ctx).await.unwrap());
        assert!(provider.get_project("my-app-prd-Build").await.unwrap().is_none());
    }
}
