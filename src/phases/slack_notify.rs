// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Slack notification phase
//!
//! Invokes a notify function shared by every pipeline in the account. The
//! function's stack is created the first time any pipeline needs it.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ParamKind, ParamSchema, PhasePlugin};
use crate::errors::WaterworksResult;
use crate::pipeline::{Action, ActionCategory, ActionOwner, PhaseContext, PhaseDeclaration, SecretQuestion, StageDescription};
use crate::provider::{Provider, Stack};

const SCHEMA: ParamSchema = ParamSchema {
    label: "Slack Notify",
    required: &[("channel", ParamKind::String), ("message", ParamKind::String)],
    optional: &[],
};

const URL_SECRET: &str = "slackUrl";

/// Name of the shared notify function stack
pub const NOTIFY_STACK_NAME: &str = "WaterworksSlackNotify";

const NOTIFY_FUNCTION_OUTPUT: &str = "FunctionName";

/// Slack notification phase
pub struct SlackNotifyPhase {
    provider: Arc<dyn Provider>,
}

impl SlackNotifyPhase {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    async fn ensure_notify_stack(&self) -> WaterworksResult<Stack> {
        if let Some(stack) = self.provider.get_stack(NOTIFY_STACK_NAME).await? {
            debug!("Notify stack '{}' already exists", NOTIFY_STACK_NAME);
            return Ok(stack);
        }

        info!("Creating shared notify stack '{}'", NOTIFY_STACK_NAME);
        self.provider
            .create_stack(Stack {
                name: NOTIFY_STACK_NAME.to_string(),
                template: "slack-notify-function".to_string(),
                parameters: BTreeMap::new(),
                outputs: BTreeMap::from([(
                    NOTIFY_FUNCTION_OUTPUT.to_string(),
                    format!("{}-Function", NOTIFY_STACK_NAME),
                )]),
            })
            .await
    }
}

#[async_trait]
impl PhasePlugin for SlackNotifyPhase {
    fn phase_type(&self) -> &'static str {
        "slack_notify"
    }

    fn check(&self, decl: &PhaseDeclaration) -> Vec<String> {
        SCHEMA.check(decl)
    }

    fn secret_questions(&self, decl: &PhaseDeclaration) -> Vec<SecretQuestion> {
        vec![SecretQuestion::new(
            &decl.name,
            URL_SECRET,
            format!("'{}' phase - Please enter the URL for Slack Notifications", decl.name),
        )]
    }

    async fn deploy_phase(&self, ctx: &PhaseContext) -> WaterworksResult<StageDescription> {
        info!("Creating notify phase '{}'", ctx.phase_name);
        let webhook = ctx.secret(URL_SECRET)?;
        let stack = self.ensure_notify_stack().await?;
        let function_name = stack.output(NOTIFY_FUNCTION_OUTPUT)?;

        let user_parameters = serde_json::json!({
            "webhook": webhook,
            "message": ctx.params.param_str("message").unwrap_or_default(),
            "username": "CodePipeline Notify",
            "channel": ctx.params.param_str("channel").unwrap_or_default(),
        });

        let action = Action::new(&ctx.phase_name, ActionCategory::Invoke, ActionOwner::Aws, "Lambda")
            .config("FunctionName", function_name)
            .config("UserParameters", serde_json::to_string(&user_parameters)?);

        Ok(StageDescription::single(&ctx.phase_name, action))
    }

    async fn delete_phase(&self, ctx: &PhaseContext) -> WaterworksResult<bool> {
        // The notify stack is shared with other pipelines and stays.
        info!("Nothing to delete for notify phase '{}'", ctx.phase_name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WaterworksError;
    use crate::pipeline::{AccountConfig, PhaseSecrets};
    use crate::provider::InMemoryProvider;

    fn context(secrets: PhaseSecrets) -> PhaseContext {
        PhaseContext {
            app_name: "my-app".into(),
            phase_name: "Notify".into(),
            phase_type: "slack_notify".into(),
            bucket_name: "bucket".into(),
            pipeline_name: "prd".into(),
            account_config: Arc::new(AccountConfig::new("111", "us-west-2")),
            params: PhaseDeclaration::new("slack_notify", "Notify")
                .with_param("channel", "#deploys")
                .with_param("message", "Deployed!"),
            secrets,
        }
    }

    fn url() -> PhaseSecrets {
        PhaseSecrets::from([(URL_SECRET.to_string(), "https://hooks.slack.test/x".to_string())])
    }

    #[tokio::test]
    async fn test_deploy_creates_shared_stack_once() {
        let provider = Arc::new(InMemoryProvider::in_memory());
        let phase = SlackNotifyPhase::new(provider.clone());

        let stage = phase.deploy_phase(&context(url())).await.unwrap();
        phase.deploy_phase(&context(url())).await.unwrap();
        assert_eq!(provider.call_count("createStack").await, 1);

        let action = &stage.actions[0];
        assert_eq!(action.category(), ActionCategory::Invoke);
        assert_eq!(action.configuration["FunctionName"], "WaterworksSlackNotify-Function");

        let params: serde_json::Value = serde_json::from_str(&action.configuration["UserParameters"]).unwrap();
        assert_eq!(params["channel"], "#deploys");
        assert_eq!(params["webhook"], "https://hooks.slack.test/x");
        assert_eq!(params["username"], "CodePipeline Notify");
    }

    #[tokio::test]
    async fn test_deploy_without_url_fails_before_stack() {
        let provider = Arc::new(InMemoryProvider::in_memory());
        let phase = SlackNotifyPhase::new(provider.clone());

        let err = phase.deploy_phase(&context(PhaseSecrets::new())).await.unwrap_err();
        assert!(matches!(err, WaterworksError::MissingSecret { .. }));
        assert_eq!(provider.call_count("getStack").await, 0);
    }

    #[test]
    fn test_check_and_questions() {
        let phase = SlackNotifyPhase::new(Arc::new(InMemoryProvider::in_memory()));
        let errors = phase.check(&PhaseDeclaration::new("slack_notify", "Notify"));
        assert_eq!(errors.len(), 2);

        let questions = phase.secret_questions(&PhaseDeclaration::new("slack_notify", "Notify"));
        assert_eq!(questions[0].name, "slackUrl");
        assert_eq!(questions[0].message, "'Notify' phase - Please enter the URL for Slack Notifications");
    }
}
