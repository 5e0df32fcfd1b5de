// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Runscope test phase
//!
//! Triggers a Runscope test run through a function shared by every
//! pipeline in the account.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::PhasePlugin;
use crate::errors::WaterworksResult;
use crate::pipeline::{
    Action, ActionCategory, ActionOwner, PhaseContext, PhaseDeclaration, SecretQuestion, StageDescription,
};
use crate::provider::{role_arn, Provider, Role, Stack};

const TRIGGER_URL_SECRET: &str = "runscopeTriggerUrl";
const ACCESS_TOKEN_SECRET: &str = "runscopeAccessToken";

/// Name of the shared Runscope function stack
pub const RUNSCOPE_STACK_NAME: &str = "WaterworksRunscopeLambda";

const FUNCTION_ROLE_NAME: &str = "WaterworksRunscopeLambdaRole";

/// Runscope test phase
pub struct RunscopePhase {
    provider: Arc<dyn Provider>,
}

impl RunscopePhase {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    async fn ensure_function_stack(&self, ctx: &PhaseContext) -> WaterworksResult<Stack> {
        if let Some(stack) = self.provider.get_stack(RUNSCOPE_STACK_NAME).await? {
            debug!("Runscope stack '{}' already exists", RUNSCOPE_STACK_NAME);
            return Ok(stack);
        }

        info!("Creating function for Runscope tests");
        let role = self
            .provider
            .create_or_update_role(Role {
                arn: role_arn(&ctx.account_config.account_id, FUNCTION_ROLE_NAME),
                name: FUNCTION_ROLE_NAME.to_string(),
                trusted_services: vec!["lambda.amazonaws.com".to_string()],
                policy_arn: None,
                policy_document: serde_json::json!({
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": ["logs:*", "codepipeline:PutJobSuccessResult", "codepipeline:PutJobFailureResult"],
                        "Resource": "*"
                    }]
                }),
            })
            .await?;

        let parameters = BTreeMap::from([
            ("Description", "Function for the Runscope phase in Waterworks"),
            ("FunctionName", RUNSCOPE_STACK_NAME),
            ("Handler", "runscope.run_tests"),
            ("MemorySize", "128"),
            ("Timeout", "300"),
        ]);
        let mut parameters: BTreeMap<String, String> =
            parameters.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        parameters.insert("RoleArn".to_string(), role.arn);

        self.provider
            .create_stack(Stack {
                name: RUNSCOPE_STACK_NAME.to_string(),
                template: "runscope-function".to_string(),
                parameters,
                outputs: BTreeMap::from([("FunctionName".to_string(), RUNSCOPE_STACK_NAME.to_string())]),
            })
            .await
    }
}

#[async_trait]
impl PhasePlugin for RunscopePhase {
    fn phase_type(&self) -> &'static str {
        "runscope"
    }

    // Runscope takes no parameters of its own.
    fn check(&self, _decl: &PhaseDeclaration) -> Vec<String> {
        vec![]
    }

    fn secret_questions(&self, decl: &PhaseDeclaration) -> Vec<SecretQuestion> {
        vec![
            SecretQuestion::new(
                &decl.name,
                TRIGGER_URL_SECRET,
                format!("'{}' phase - Please enter your Runscope Trigger URL", decl.name),
            ),
            SecretQuestion::new(
                &decl.name,
                ACCESS_TOKEN_SECRET,
                format!("'{}' phase - Please enter your Runscope Access Token", decl.name),
            ),
        ]
    }

    async fn deploy_phase(&self, ctx: &PhaseContext) -> WaterworksResult<StageDescription> {
        info!("Creating runscope phase '{}'", ctx.phase_name);
        let user_parameters = serde_json::json!({
            "runscopeTriggerUrl": ctx.secret(TRIGGER_URL_SECRET)?,
            "runscopeAccessToken": ctx.secret(ACCESS_TOKEN_SECRET)?,
        });

        let stack = self.ensure_function_stack(ctx).await?;
        let action = Action::new(&ctx.phase_name, ActionCategory::Invoke, ActionOwner::Aws, "Lambda")
            .config("FunctionName", stack.output("FunctionName")?)
            .config("UserParameters", serde_json::to_string(&user_parameters)?);

        Ok(StageDescription::single(&ctx.phase_name, action))
    }

    async fn delete_phase(&self, ctx: &PhaseContext) -> WaterworksResult<bool> {
        // The function stack is shared with other pipelines and stays.
        info!("Nothing to delete for runscope phase '{}'", ctx.phase_name);
        Ok(true)
    }
}
