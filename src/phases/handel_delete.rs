// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Handel delete phase
//!
//! Tears down the listed Handel environments from a build project. The
//! project receives the environments and the base64-encoded account config
//! through its environment.

use async_trait::async_trait;
use base64::Engine;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ParamKind, ParamSchema, PhasePlugin};
use crate::errors::WaterworksResult;
use crate::pipeline::{
    Action, ActionCategory, ActionOwner, PhaseContext, PhaseDeclaration, StageDescription, BUILD_OUTPUT,
};
use crate::provider::{role_arn, BuildProject, Provider, Role};

const SCHEMA: ParamSchema = ParamSchema {
    label: "Handel Delete",
    required: &[("environments_to_delete", ParamKind::StringList)],
    optional: &[],
};

/// Account-wide role the delete projects run under
pub const DELETE_ROLE_NAME: &str = "WaterworksDeletePhaseServiceRole";

const IMAGE: &str = "aws/codebuild/nodejs:6.3.1";

const BUILDSPEC: &str = r#"version: 0.2
phases:
  install:
    commands:
      - npm install -g handel
  build:
    commands:
      - echo "$HANDEL_ACCOUNT_CONFIG" | base64 -d > account-config.yml
      - for env in $(echo "$ENVS_TO_DELETE" | tr ',' ' '); do handel delete -c account-config.yml -e "$env" -y; done
"#;

/// Handel delete phase
pub struct HandelDeletePhase {
    provider: Arc<dyn Provider>,
}

impl HandelDeletePhase {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    async fn service_role(&self, ctx: &PhaseContext) -> WaterworksResult<Role> {
        self.provider
            .create_or_update_role(Role {
                arn: role_arn(&ctx.account_config.account_id, DELETE_ROLE_NAME),
                name: DELETE_ROLE_NAME.to_string(),
                trusted_services: vec!["codebuild.amazonaws.com".to_string()],
                policy_arn: None,
                policy_document: serde_json::json!({
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": "*",
                        "Resource": "*"
                    }]
                }),
            })
            .await
    }
}

fn environment_variables(ctx: &PhaseContext) -> WaterworksResult<BTreeMap<String, String>> {
    let environments: Vec<&str> = match ctx.params.param("environments_to_delete") {
        Some(serde_yaml::Value::Sequence(items)) => items.iter().filter_map(serde_yaml::Value::as_str).collect(),
        _ => vec![],
    };
    let account_config = serde_json::to_vec(ctx.account_config.as_ref())?;

    Ok(BTreeMap::from([
        ("ENVS_TO_DELETE".to_string(), environments.join(",")),
        (
            "HANDEL_ACCOUNT_CONFIG".to_string(),
            base64::engine::general_purpose::STANDARD.encode(account_config),
        ),
    ]))
}

#[async_trait]
impl PhasePlugin for HandelDeletePhase {
    fn phase_type(&self) -> &'static str {
        "handel_delete"
    }

    fn check(&self, decl: &PhaseDeclaration) -> Vec<String> {
        SCHEMA.check(decl)
    }

    async fn deploy_phase(&self, ctx: &PhaseContext) -> WaterworksResult<StageDescription> {
        info!("Creating Handel delete phase '{}'", ctx.phase_name);
        let role = self.service_role(ctx).await?;

        let project = BuildProject {
            name: ctx.resource_name(),
            app_name: ctx.app_name.clone(),
            pipeline_name: ctx.pipeline_name.clone(),
            phase_name: ctx.phase_name.clone(),
            image: IMAGE.to_string(),
            environment_variables: environment_variables(ctx)?,
            service_role_arn: role.arn,
            region: ctx.account_config.region.clone(),
            account_id: ctx.account_config.account_id.clone(),
            cache_location: None,
            buildspec: Some(BUILDSPEC.to_string()),
        };
        let project_name = project.name.clone();

        if self.provider.get_project(&project_name).await?.is_some() {
            debug!("Updating Handel delete project '{}'", project_name);
            self.provider.update_project(project).await?;
        } else {
            debug!("Creating Handel delete project '{}'", project_name);
            self.provider.create_project(project).await?;
        }

        let action = Action::new(&ctx.phase_name, ActionCategory::Test, ActionOwner::Aws, "CodeBuild")
            .input(BUILD_OUTPUT)
            .config("ProjectName", &project_name);

        Ok(StageDescription::single(&ctx.phase_name, action))
    }

    // The role is account-wide and stays.
    async fn delete_phase(&self, ctx: &PhaseContext) -> WaterworksResult<bool> {
        let project_name = ctx.resource_name();
        info!("Deleting Handel delete project '{}'", project_name);
        self.provider.delete_project(&project_name).await?;
        Ok(true)
    }
}
