// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Provider resources
//!
//! The calls phase plugins and the pipeline assembler make against the
//! hosting provider. [`StoreProvider`] implements all of them on top of a
//! [`DocumentStore`]; the filesystem store backs the CLI and the memory
//! store backs tests.

mod filesystem;
mod memory;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{WaterworksError, WaterworksResult};
use crate::pipeline::StageDescription;

/// Provider backed by JSON documents on disk
pub type FilesystemProvider = StoreProvider<FilesystemStore>;

/// Provider backed by process memory
pub type InMemoryProvider = StoreProvider<MemoryStore>;

/// The provider pipeline resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDeclaration {
    pub name: String,
    pub role_arn: String,
    pub artifact_bucket: String,
    pub version: u32,
    pub stages: Vec<StageDescription>,
}

/// A build project backing a build or test phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProject {
    pub name: String,
    pub app_name: String,
    pub pipeline_name: String,
    pub phase_name: String,
    pub image: String,
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    pub service_role_arn: String,
    pub region: String,
    pub account_id: String,
    #[serde(default)]
    pub cache_location: Option<String>,
    /// Inline buildspec; `None` uses the one in the source artifact
    #[serde(default)]
    pub buildspec: Option<String>,
}

/// An IAM-style role with one attached policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub arn: String,
    pub trusted_services: Vec<String>,
    #[serde(default)]
    pub policy_arn: Option<String>,
    #[serde(default)]
    pub policy_document: serde_json::Value,
}

/// Webhook filter rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookFilter {
    pub json_path: String,
    pub match_equals: String,
}

/// A source webhook that triggers a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub name: String,
    pub target_pipeline: String,
    pub target_action: String,
    pub filters: Vec<WebhookFilter>,
    pub authentication: String,
    pub secret_token: String,
    #[serde(default)]
    pub registered: bool,
}

/// A template stack, used for shared helper functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// An artifact bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    pub region: String,
}

/// A stored configuration parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    /// e.g. `SecureString`
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
}

/// ARN for a role created by this tool
pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{}:role/waterworks/{}", account_id, role_name)
}

impl Stack {
    /// Get a stack output
    pub fn output(&self, key: &str) -> WaterworksResult<&str> {
        self.outputs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| WaterworksError::provider("getOutput", format!("stack '{}' has no output '{}'", self.name, key)))
    }
}

/// Pipeline and webhook calls
#[async_trait]
pub trait PipelineApi: Send + Sync {
    async fn get_pipeline(&self, name: &str) -> WaterworksResult<Option<PipelineDeclaration>>;
    async fn create_pipeline(&self, pipeline: PipelineDeclaration) -> WaterworksResult<PipelineDeclaration>;
    async fn update_pipeline(&self, pipeline: PipelineDeclaration) -> WaterworksResult<PipelineDeclaration>;
    /// Returns false when the pipeline did not exist
    async fn delete_pipeline(&self, name: &str) -> WaterworksResult<bool>;

    async fn list_webhooks(&self) -> WaterworksResult<Vec<Webhook>>;
    async fn put_webhook(&self, webhook: Webhook) -> WaterworksResult<Webhook>;
    async fn register_webhook(&self, name: &str) -> WaterworksResult<()>;
    async fn deregister_webhook(&self, name: &str) -> WaterworksResult<()>;
    async fn delete_webhook(&self, name: &str) -> WaterworksResult<bool>;
}

/// Build project calls
#[async_trait]
pub trait BuildProjectApi: Send + Sync {
    async fn get_project(&self, name: &str) -> WaterworksResult<Option<BuildProject>>;
    async fn create_project(&self, project: BuildProject) -> WaterworksResult<BuildProject>;
    async fn update_project(&self, project: BuildProject) -> WaterworksResult<BuildProject>;
    /// Returns false when the project did not exist
    async fn delete_project(&self, name: &str) -> WaterworksResult<bool>;
}

/// Role calls
#[async_trait]
pub trait RoleApi: Send + Sync {
    async fn get_role(&self, name: &str) -> WaterworksResult<Option<Role>>;
    async fn create_or_update_role(&self, role: Role) -> WaterworksResult<Role>;
    /// Returns false when the role did not exist
    async fn delete_role(&self, name: &str) -> WaterworksResult<bool>;
}

/// Stack calls
#[async_trait]
pub trait StackApi: Send + Sync {
    async fn get_stack(&self, name: &str) -> WaterworksResult<Option<Stack>>;
    async fn create_stack(&self, stack: Stack) -> WaterworksResult<Stack>;
}

/// Bucket calls
#[async_trait]
pub trait BucketApi: Send + Sync {
    async fn get_bucket(&self, name: &str) -> WaterworksResult<Option<Bucket>>;
    async fn create_bucket(&self, bucket: Bucket) -> WaterworksResult<Bucket>;
}

/// Parameter store calls
#[async_trait]
pub trait ParameterApi: Send + Sync {
    /// Create the parameter, overwriting any previous value
    async fn put_parameter(&self, parameter: Parameter) -> WaterworksResult<()>;
    /// Returns false when the parameter did not exist
    async fn delete_parameter(&self, name: &str) -> WaterworksResult<bool>;
}

/// Everything a run needs from the provider
pub trait Provider: PipelineApi + BuildProjectApi + RoleApi + StackApi + BucketApi + ParameterApi {}

impl<T> Provider for T where T: PipelineApi + BuildProjectApi + RoleApi + StackApi + BucketApi + ParameterApi {}

/// Kinds of stored resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pipeline,
    BuildProject,
    Role,
    Webhook,
    Stack,
    Bucket,
    Parameter,
}

impl ResourceKind {
    /// Directory name used by the filesystem store
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Pipeline => "pipelines",
            Self::BuildProject => "build-projects",
            Self::Role => "roles",
            Self::Webhook => "webhooks",
            Self::Stack => "stacks",
            Self::Bucket => "buckets",
            Self::Parameter => "parameters",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pipeline => write!(f, "Pipeline"),
            Self::BuildProject => write!(f, "Build project"),
            Self::Role => write!(f, "Role"),
            Self::Webhook => write!(f, "Webhook"),
            Self::Stack => write!(f, "Stack"),
            Self::Bucket => write!(f, "Bucket"),
            Self::Parameter => write!(f, "Parameter"),
        }
    }
}

/// Storage for resource documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, kind: ResourceKind, name: &str) -> WaterworksResult<Option<serde_json::Value>>;
    async fn save(&self, kind: ResourceKind, name: &str, doc: serde_json::Value) -> WaterworksResult<()>;
    /// Returns false when nothing was stored under `name`
    async fn remove(&self, kind: ResourceKind, name: &str) -> WaterworksResult<bool>;
    async fn list(&self, kind: ResourceKind) -> WaterworksResult<Vec<serde_json::Value>>;
}

/// Provider implemented over a document store
///
/// Every call is recorded by operation name so callers can inspect what
/// a run did.
pub struct StoreProvider<S> {
    store: S,
    calls: Mutex<Vec<String>>,
}

impl<S: DocumentStore> StoreProvider<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Operation names in call order
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// How many times an operation was called
    pub async fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().await.iter().filter(|c| *c == operation).count()
    }

    async fn record(&self, operation: &str, name: &str) {
        debug!(operation, name, "Provider call");
        self.calls.lock().await.push(operation.to_string());
    }

    async fn get<T: DeserializeOwned>(&self, kind: ResourceKind, name: &str) -> WaterworksResult<Option<T>> {
        match self.store.load(kind, name).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    async fn put<T: Serialize>(&self, kind: ResourceKind, name: &str, resource: &T) -> WaterworksResult<()> {
        self.store.save(kind, name, serde_json::to_value(resource)?).await
    }

    async fn insert_new<T: Serialize>(&self, kind: ResourceKind, name: &str, resource: &T) -> WaterworksResult<()> {
        if self.store.load(kind, name).await?.is_some() {
            return Err(WaterworksError::provider(
                "create",
                format!("{} '{}' already exists", kind, name),
            ));
        }
        self.put(kind, name, resource).await
    }

    async fn replace_existing<T: Serialize>(&self, kind: ResourceKind, name: &str, resource: &T) -> WaterworksResult<()> {
        if self.store.load(kind, name).await?.is_none() {
            return Err(WaterworksError::ResourceNotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            });
        }
        self.put(kind, name, resource).await
    }

    async fn set_registered(&self, name: &str, registered: bool) -> WaterworksResult<()> {
        let mut webhook: Webhook = self
            .get(ResourceKind::Webhook, name)
            .await?
            .ok_or_else(|| WaterworksError::ResourceNotFound {
                kind: ResourceKind::Webhook.to_string(),
                name: name.to_string(),
            })?;
        webhook.registered = registered;
        self.put(ResourceKind::Webhook, name, &webhook).await
    }
}

#[async_trait]
impl<S: DocumentStore> PipelineApi for StoreProvider<S> {
    async fn get_pipeline(&self, name: &str) -> WaterworksResult<Option<PipelineDeclaration>> {
        self.record("getPipeline", name).await;
        self.get(ResourceKind::Pipeline, name).await
    }

    async fn create_pipeline(&self, pipeline: PipelineDeclaration) -> WaterworksResult<PipelineDeclaration> {
        self.record("createPipeline", &pipeline.name).await;
        self.insert_new(ResourceKind::Pipeline, &pipeline.name, &pipeline).await?;
        Ok(pipeline)
    }

    async fn update_pipeline(&self, pipeline: PipelineDeclaration) -> WaterworksResult<PipelineDeclaration> {
        self.record("updatePipeline", &pipeline.name).await;
        self.replace_existing(ResourceKind::Pipeline, &pipeline.name, &pipeline).await?;
        Ok(pipeline)
    }

    async fn delete_pipeline(&self, name: &str) -> WaterworksResult<bool> {
        self.record("deletePipeline", name).await;
        self.store.remove(ResourceKind::Pipeline, name).await
    }

    async fn list_webhooks(&self) -> WaterworksResult<Vec<Webhook>> {
        self.record("listWebhooks", "").await;
        self.store
            .list(ResourceKind::Webhook)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .collect()
    }

    async fn put_webhook(&self, webhook: Webhook) -> WaterworksResult<Webhook> {
        self.record("putWebhook", &webhook.name).await;
        self.put(ResourceKind::Webhook, &webhook.name, &webhook).await?;
        Ok(webhook)
    }

    async fn register_webhook(&self, name: &str) -> WaterworksResult<()> {
        self.record("registerWebhook", name).await;
        self.set_registered(name, true).await
    }

    async fn deregister_webhook(&self, name: &str) -> WaterworksResult<()> {
        self.record("deregisterWebhook", name).await;
        self.set_registered(name, false).await
    }

    async fn delete_webhook(&self, name: &str) -> WaterworksResult<bool> {
        self.record("deleteWebhook", name).await;
        self.store.remove(ResourceKind::Webhook, name).await
    }
}

#[async_trait]
impl<S: DocumentStore> BuildProjectApi for StoreProvider<S> {
    async fn get_project(&self, name: &str) -> WaterworksResult<Option<BuildProject>> {
        self.record("getProject", name).await;
        self.get(ResourceKind::BuildProject, name).await
    }

    async fn create_project(&self, project: BuildProject) -> WaterworksResult<BuildProject> {
        self.record("createProject", &project.name).await;
        self.insert_new(ResourceKind::BuildProject, &project.name, &project).await?;
        Ok(project)
    }

    async fn update_project(&self, project: BuildProject) -> WaterworksResult<BuildProject> {
        self.record("updateProject", &project.name).await;
        self.replace_existing(ResourceKind::BuildProject, &project.name, &project).await?;
        Ok(project)
    }

    async fn delete_project(&self, name: &str) -> WaterworksResult<bool> {
        self.record("deleteProject", name).await;
        self.store.remove(ResourceKind::BuildProject, name).await
    }
}

#[async_trait]
impl<S: DocumentStore> RoleApi for StoreProvider<S> {
    async fn get_role(&self, name: &str) -> WaterworksResult<Option<Role>> {
        self.record("getRole", name).await;
        self.get(ResourceKind::Role, name).await
    }

    async fn create_or_update_role(&self, role: Role) -> WaterworksResult<Role> {
        self.record("createOrUpdateRole", &role.name).await;
        self.put(ResourceKind::Role, &role.name, &role).await?;
        Ok(role)
    }

    async fn delete_role(&self, name: &str) -> WaterworksResult<bool> {
        self.record("deleteRole", name).await;
        self.store.remove(ResourceKind::Role, name).await
    }
}

#[async_trait]
impl<S: DocumentStore> StackApi for StoreProvider<S> {
    async fn get_stack(&self, name: &str) -> WaterworksResult<Option<Stack>> {
        self.record("getStack", name).await;
        self.get(ResourceKind::Stack, name).await
    }

    async fn create_stack(&self, stack: Stack) -> WaterworksResult<Stack> {
        self.record("createStack", &stack.name).await;
        self.insert_new(ResourceKind::Stack, &stack.name, &stack).await?;
        Ok(stack)
    }
}

#[async_trait]
impl<S: DocumentStore> BucketApi for StoreProvider<S> {
    async fn get_bucket(&self, name: &str) -> WaterworksResult<Option<Bucket>> {
        self.record("getBucket", name).await;
        self.get(ResourceKind::Bucket, name).await
    }

    async fn create_bucket(&self, bucket: Bucket) -> WaterworksResult<Bucket> {
        self.record("createBucket", &bucket.name).await;
        self.insert_new(ResourceKind::Bucket, &bucket.name, &bucket).await?;
        Ok(bucket)
    }
}

#[async_trait]
impl<S: DocumentStore> ParameterApi for StoreProvider<S> {
    async fn put_parameter(&self, parameter: Parameter) -> WaterworksResult<()> {
        self.record("putParameter", &parameter.name).await;
        self.put(ResourceKind::Parameter, &parameter.name, &parameter).await
    }

    async fn delete_parameter(&self, name: &str) -> WaterworksResult<bool> {
        self.record("deleteParameter", name).await;
        self.store.remove(ResourceKind::Parameter, name).await
    }
}

impl InMemoryProvider {
    /// Provider with empty in-memory state
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(name: &str) -> PipelineDeclaration {
        PipelineDeclaration {
            name: name.into(),
            role_arn: "arn:role".into(),
            artifact_bucket: "bucket".into(),
            version: 1,
            stages: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_then_update_pipeline() {
        let provider = InMemoryProvider::in_memory();
        assert!(provider.get_pipeline("app-prd").await.unwrap().is_none());

        provider.create_pipeline(pipeline("app-prd")).await.unwrap();
        assert!(provider.create_pipeline(pipeline("app-prd")).await.is_err());

        let mut updated = pipeline("app-prd");
        updated.version = 2;
        provider.update_pipeline(updated).await.unwrap();
        assert_eq!(provider.get_pipeline("app-prd").await.unwrap().unwrap().version, 2);

        assert_eq!(provider.call_count("createPipeline").await, 2);
        assert_eq!(provider.call_count("updatePipeline").await, 1);
    }

    #[tokio::test]
    async fn test_update_missing_project_is_not_found() {
        let provider = InMemoryProvider::in_memory();
        let project = BuildProject {
            name: "p".into(),
            app_name: "a".into(),
            pipeline_name: "b".into(),
            phase_name: "c".into(),
            image: "img".into(),
            environment_variables: BTreeMap::new(),
            service_role_arn: "arn".into(),
            region: "us-west-2".into(),
            account_id: "1".into(),
            cache_location: None,
            buildspec: None,
        };
        let err = provider.update_project(project).await.unwrap_err();
        assert!(matches!(err, WaterworksError::ResourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_deleting_absent_resources_reports_false() {
        let provider = InMemoryProvider::in_memory();
        assert!(!provider.delete_pipeline("nope").await.unwrap());
        assert!(!provider.delete_project("nope").await.unwrap());
        assert!(!provider.delete_role("nope").await.unwrap());
        assert!(!provider.delete_webhook("nope").await.unwrap());
        assert!(!provider.delete_parameter("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_webhook_registration_flag() {
        let provider = InMemoryProvider::in_memory();
        provider
            .put_webhook(Webhook {
                name: "hook".into(),
                target_pipeline: "app-prd".into(),
                target_action: "Source".into(),
                filters: vec![],
                authentication: "GITHUB_HMAC".into(),
                secret_token: "s".into(),
                registered: false,
            })
            .await
            .unwrap();

        provider.register_webhook("hook").await.unwrap();
        let hooks = provider.list_webhooks().await.unwrap();
        assert_eq!(hooks.len(), 1);
        assert!(hooks[0].registered);

        assert!(matches!(
            provider.register_webhook("missing").await.unwrap_err(),
            WaterworksError::ResourceNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_bucket_created_once() {
        let provider = InMemoryProvider::in_memory();
        let bucket = Bucket {
            name: "codepipeline-us-west-2-111".into(),
            region: "us-west-2".into(),
        };

        assert!(provider.get_bucket(&bucket.name).await.unwrap().is_none());
        provider.create_bucket(bucket.clone()).await.unwrap();
        assert!(provider.create_bucket(bucket.clone()).await.is_err());
        assert_eq!(provider.get_bucket(&bucket.name).await.unwrap(), Some(bucket));
    }

    #[tokio::test]
    async fn test_put_parameter_overwrites() {
        let provider = InMemoryProvider::in_memory();
        for value in ["one", "two"] {
            provider
                .put_parameter(Parameter {
                    name: "app.prd.npmToken".into(),
                    kind: "SecureString".into(),
                    value: value.into(),
                    description: String::new(),
                })
                .await
                .unwrap();
        }
        assert_eq!(provider.call_count("putParameter").await, 2);
        assert!(provider.delete_parameter("app.prd.npmToken").await.unwrap());
    }
}
