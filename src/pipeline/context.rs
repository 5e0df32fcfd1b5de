// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Pipeline and phase contexts
//!
//! A [`PipelineContext`] is built once per run and owns one
//! [`PhaseContext`] per declared phase. The account configuration is shared
//! read-only between all of them.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::errors::{WaterworksError, WaterworksResult};
use crate::pipeline::{PhaseDeclaration, PhaseSecrets, PipelineSecrets, WaterworksFile};

/// Target account configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(deserialize_with = "string_or_number")]
    pub account_id: String,

    pub region: String,

    #[serde(default)]
    pub vpc: Option<String>,

    #[serde(default)]
    pub public_subnets: Vec<String>,

    #[serde(default)]
    pub private_subnets: Vec<String>,

    #[serde(default)]
    pub data_subnets: Vec<String>,

    /// Keys this crate does not interpret, preserved as loaded
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

// Account ids are commonly written unquoted in YAML.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number for account_id, got {:?}",
            other
        ))),
    }
}

impl AccountConfig {
    pub fn new(account_id: &str, region: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            region: region.to_string(),
            vpc: None,
            public_subnets: vec![],
            private_subnets: vec![],
            data_subnets: vec![],
            extra: IndexMap::new(),
        }
    }

    /// Load `<configs_dir>/<account_name>.yml`
    pub fn load(configs_dir: &Path, account_name: &str) -> WaterworksResult<Self> {
        let path = configs_dir.join(format!("{}.yml", account_name));
        if !path.exists() {
            return Err(WaterworksError::AccountConfigNotFound { path });
        }

        let content = std::fs::read_to_string(&path).map_err(|e| WaterworksError::FileReadError {
            path: path.clone(),
            error: e.to_string(),
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Bucket that stores pipeline artifacts for this account and region
    pub fn output_bucket_name(&self) -> String {
        format!("codepipeline-{}-{}", self.region, self.account_id)
    }

    /// ECR registry host for this account and region
    pub fn ecr_registry(&self) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", self.account_id, self.region)
    }
}

/// Everything one phase plugin invocation needs
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub app_name: String,
    pub phase_name: String,
    pub phase_type: String,
    pub bucket_name: String,
    pub pipeline_name: String,
    pub account_config: Arc<AccountConfig>,
    pub params: PhaseDeclaration,
    pub secrets: PhaseSecrets,
}

impl PhaseContext {
    /// Attach resolved secrets
    pub fn with_secrets(mut self, secrets: PhaseSecrets) -> Self {
        self.secrets = secrets;
        self
    }

    /// Look up a secret, failing the phase when it was not supplied
    pub fn secret(&self, name: &str) -> WaterworksResult<&str> {
        self.secrets
            .get(name)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WaterworksError::missing_secret(&self.phase_name, name))
    }

    /// `<app>-<pipeline>-<phase>`, the name of phase-owned resources
    pub fn resource_name(&self) -> String {
        format!("{}-{}-{}", self.app_name, self.pipeline_name, self.phase_name)
    }

    /// Name of the provider pipeline this phase belongs to
    pub fn pipeline_resource_name(&self) -> String {
        pipeline_resource_name(&self.app_name, &self.pipeline_name)
    }
}

/// `<app>-<pipeline>`, the name of the provider pipeline
pub fn pipeline_resource_name(app_name: &str, pipeline_name: &str) -> String {
    format!("{}-{}", app_name, pipeline_name)
}

/// Aggregate root for one deployment run
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub version: u32,
    pub app_name: String,
    pub pipeline_name: String,
    pub account_config: Arc<AccountConfig>,
    pub bucket_name: String,
    phases: IndexMap<String, PhaseContext>,
}

impl PipelineContext {
    /// Build the context for one pipeline of a specification
    ///
    /// Phases missing from `secrets` get an empty secrets map.
    pub fn build(
        spec: &WaterworksFile,
        pipeline_name: &str,
        account_config: AccountConfig,
        secrets: &PipelineSecrets,
    ) -> WaterworksResult<Self> {
        let definition = spec.pipeline(pipeline_name)?;
        let account_config = Arc::new(account_config);
        let bucket_name = account_config.output_bucket_name();

        let mut phases = IndexMap::with_capacity(definition.phases.len());
        for decl in &definition.phases {
            let phase = PhaseContext {
                app_name: spec.name.clone(),
                phase_name: decl.name.clone(),
                phase_type: decl.phase_type.clone(),
                bucket_name: bucket_name.clone(),
                pipeline_name: pipeline_name.to_string(),
                account_config: Arc::clone(&account_config),
                params: decl.clone(),
                secrets: PhaseSecrets::new(),
            };
            let phase_secrets = secrets.get(&decl.name).cloned().unwrap_or_default();
            phases.insert(decl.name.clone(), phase.with_secrets(phase_secrets));
        }

        Ok(Self {
            version: spec.version,
            app_name: spec.name.clone(),
            pipeline_name: pipeline_name.to_string(),
            account_config,
            bucket_name,
            phases,
        })
    }

    /// Phase contexts in declaration order
    pub fn phases(&self) -> impl Iterator<Item = &PhaseContext> {
        self.phases.values()
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseContext> {
        self.phases.get(name)
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// Name of the provider pipeline
    pub fn pipeline_resource_name(&self) -> String {
        pipeline_resource_name(&self.app_name, &self.pipeline_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
version: 1
name: my-app
pipelines:
  prd:
    phases:
      - type: github
        name: Source
        owner: me
        repo: my-app
      - type: codebuild
        name: Build
        build_image: aws/codebuild/standard:7.0
"#;

    #[test]
    fn test_account_id_accepts_numbers() {
        let yaml = "account_id: 123456789012\nregion: us-west-2\nsome_extra: true\n";
        let config: AccountConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.account_id, "123456789012");
        assert_eq!(config.output_bucket_name(), "codepipeline-us-west-2-123456789012");
        assert!(config.extra.contains_key("some_extra"));
    }

    #[test]
    fn test_build_context_shares_account_config() {
        let spec = WaterworksFile::from_yaml(SPEC).unwrap();
        let mut secrets = PipelineSecrets::new();
        secrets.insert(
            "Source".into(),
            PhaseSecrets::from([("githubAccessToken".to_string(), "abc".to_string())]),
        );

        let ctx = PipelineContext::build(&spec, "prd", AccountConfig::new("111", "us-east-1"), &secrets).unwrap();
        assert_eq!(ctx.phase_count(), 2);
        assert_eq!(ctx.pipeline_resource_name(), "my-app-prd");

        let names: Vec<_> = ctx.phases().map(|p| p.phase_name.as_str()).collect();
        assert_eq!(names, vec!["Source", "Build"]);

        let source = ctx.phase("Source").unwrap();
        let build = ctx.phase("Build").unwrap();
        assert!(Arc::ptr_eq(&source.account_config, &build.account_config));
        assert_eq!(source.secret("githubAccessToken").unwrap(), "abc");
        assert!(build.secrets.is_empty());
        assert_eq!(build.bucket_name, "codepipeline-us-east-1-111");
        assert_eq!(build.resource_name(), "my-app-prd-Build");
    }

    #[test]
    fn test_missing_secret_names_the_phase() {
        let spec = WaterworksFile::from_yaml(SPEC).unwrap();
        let ctx = PipelineContext::build(&spec, "prd", AccountConfig::new("111", "us-east-1"), &PipelineSecrets::new())
            .unwrap();

        match ctx.phase("Source").unwrap().secret("githubAccessToken") {
            Err(WaterworksError::MissingSecret { phase, name }) => {
                assert_eq!(phase, "Source");
                assert_eq!(name, "githubAccessToken");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_load_account_config_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dev.yml"), "account_id: '222'\nregion: us-west-2\n").unwrap();

        let config = AccountConfig::load(dir.path(), "dev").unwrap();
        assert_eq!(config.account_id, "222");

        assert!(matches!(
            AccountConfig::load(dir.path(), "prd"),
            Err(WaterworksError::AccountConfigNotFound { .. })
        ));
    }
}
