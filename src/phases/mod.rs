// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Phase plugins
//!
//! This module provides the phase plugin trait, the registry that maps a
//! phase `type` to its plugin, and the built-in phase types.

mod approval;
mod codebuild;
mod codecommit;
mod github;
mod handel_delete;
mod npm;
mod runscope;
mod slack_notify;

pub use approval::ApprovalPhase;
pub use codebuild::CodeBuildPhase;
pub use codecommit::CodeCommitPhase;
pub use github::GithubPhase;
pub use handel_delete::HandelDeletePhase;
pub use npm::NpmPhase;
pub use runscope::RunscopePhase;
pub use slack_notify::SlackNotifyPhase;

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{WaterworksError, WaterworksResult};
use crate::pipeline::{PhaseContext, PhaseDeclaration, PhaseSecrets, SecretPrompter, SecretQuestion, StageDescription};
use crate::provider::Provider;

/// Where a phase type may appear in a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseCapability {
    /// May be the first phase
    Source,
    /// May be the second phase
    Build,
    /// Anywhere after the build phase
    Other,
}

/// Trait for phase plugins
#[async_trait]
pub trait PhasePlugin: Send + Sync {
    /// The `type` value this plugin handles
    fn phase_type(&self) -> &'static str;

    fn capability(&self) -> PhaseCapability {
        PhaseCapability::Other
    }

    /// Validate the phase's own parameters, returning every problem found
    fn check(&self, decl: &PhaseDeclaration) -> Vec<String>;

    /// Secrets this phase will ask for
    fn secret_questions(&self, _decl: &PhaseDeclaration) -> Vec<SecretQuestion> {
        vec![]
    }

    /// Collect this phase's secrets interactively
    async fn secrets_for_phase(
        &self,
        decl: &PhaseDeclaration,
        prompter: &dyn SecretPrompter,
    ) -> WaterworksResult<PhaseSecrets> {
        let questions = self.secret_questions(decl);
        if questions.is_empty() {
            return Ok(PhaseSecrets::new());
        }
        prompter.prompt(&questions).await
    }

    /// Create or update whatever backs this phase and describe its stage
    async fn deploy_phase(&self, ctx: &PhaseContext) -> WaterworksResult<StageDescription>;

    /// Remove whatever backs this phase; absent resources count as deleted
    async fn delete_phase(&self, ctx: &PhaseContext) -> WaterworksResult<bool>;

    fn supports_webhooks(&self) -> bool {
        false
    }

    async fn add_webhook(&self, _ctx: &PhaseContext) -> WaterworksResult<()> {
        Ok(())
    }

    async fn remove_webhook(&self, _ctx: &PhaseContext) -> WaterworksResult<()> {
        Ok(())
    }
}

/// Accepted shape of one phase parameter
#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    String,
    /// Map of names to strings, numbers or booleans
    Map,
    StringList,
    /// A string from a fixed set
    OneOf(&'static [&'static str]),
}

impl ParamKind {
    /// JSON schema for a value of this kind
    fn json_schema(&self) -> serde_json::Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Map => json!({
                "type": "object",
                "additionalProperties": { "type": ["string", "number", "boolean"] }
            }),
            Self::StringList => json!({ "type": "array", "items": { "type": "string" } }),
            Self::OneOf(values) => json!({ "type": "string", "enum": values }),
        }
    }
}

/// Declarative parameter rules shared by the built-in phases
///
/// Required parameters must be present and non-empty. Every present
/// parameter is validated against the JSON schema of its kind, and
/// parameters the phase does not know are rejected.
pub struct ParamSchema {
    /// Prefix for error messages, e.g. "CodeBuild"
    pub label: &'static str,
    pub required: &'static [(&'static str, ParamKind)],
    pub optional: &'static [(&'static str, ParamKind)],
}

impl ParamSchema {
    fn kind_of(&self, key: &str) -> Option<ParamKind> {
        self.required
            .iter()
            .chain(self.optional)
            .find(|(name, _)| *name == key)
            .map(|(_, kind)| *kind)
    }

    pub fn check(&self, decl: &PhaseDeclaration) -> Vec<String> {
        let mut errors = Vec::new();

        for (key, _) in self.required {
            let empty = match decl.param(key) {
                None | Some(serde_yaml::Value::Null) => true,
                Some(value) => value.as_str().map(str::is_empty).unwrap_or(false),
            };
            if empty {
                errors.push(format!("{} - The '{}' parameter is required", self.label, key));
            }
        }

        for (key, value) in &decl.params {
            match self.kind_of(key) {
                Some(kind) => errors.extend(self.check_value(key, kind, value)),
                None => errors.push(format!(
                    "{} - Invalid property '/{}' specified. Make sure to check your spelling!",
                    self.label, key
                )),
            }
        }

        errors
    }

    fn check_value(&self, key: &str, kind: ParamKind, value: &serde_yaml::Value) -> Vec<String> {
        if value.is_null() {
            return vec![];
        }

        let instance = match serde_json::to_value(value) {
            Ok(instance) => instance,
            Err(e) => return vec![format!("{} - Error at path '/{}': {}", self.label, key, e)],
        };
        let validator = match jsonschema::validator_for(&kind.json_schema()) {
            Ok(validator) => validator,
            Err(e) => return vec![format!("{} - Invalid schema for '/{}': {}", self.label, key, e)],
        };

        validator
            .iter_errors(&instance)
            .map(|e| format!("{} - Error at path '/{}': {}", self.label, key, e))
            .collect()
    }
}

/// Name-keyed table of phase plugins
#[derive(Default)]
pub struct PhaseRegistry {
    plugins: HashMap<String, Arc<dyn PhasePlugin>>,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in phase type
    pub fn with_defaults(provider: Arc<dyn Provider>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GithubPhase::new(Arc::clone(&provider))));
        registry.register(Arc::new(CodeCommitPhase));
        registry.register(Arc::new(CodeBuildPhase::new(Arc::clone(&provider))));
        registry.register(Arc::new(ApprovalPhase));
        registry.register(Arc::new(RunscopePhase::new(Arc::clone(&provider))));
        registry.register(Arc::new(NpmPhase::new(Arc::clone(&provider))));
        registry.register(Arc::new(HandelDeletePhase::new(Arc::clone(&provider))));
        registry.register(Arc::new(SlackNotifyPhase::new(provider)));
        registry
    }

    /// Register a plugin under its phase type, replacing any previous one
    pub fn register(&mut self, plugin: Arc<dyn PhasePlugin>) {
        self.plugins.insert(plugin.phase_type().to_string(), plugin);
    }

    pub fn resolve(&self, phase_type: &str) -> Option<Arc<dyn PhasePlugin>> {
        self.plugins.get(phase_type).cloned()
    }

    /// Resolve, failing with an unsupported phase type error
    pub fn require(&self, phase_type: &str) -> WaterworksResult<Arc<dyn PhasePlugin>> {
        self.resolve(phase_type)
            .ok_or_else(|| WaterworksError::UnsupportedPhaseType {
                phase_type: phase_type.to_string(),
                supported: self.phase_types().join(", "),
            })
    }

    /// Registered phase types, sorted
    pub fn phase_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.plugins.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Registered phase types with the given capability, sorted
    pub fn types_with(&self, capability: PhaseCapability) -> Vec<&str> {
        let mut types: Vec<_> = self
            .plugins
            .iter()
            .filter(|(_, p)| p.capability() == capability)
            .map(|(t, _)| t.as_str())
            .collect();
        types.sort_unstable();
        types
    }

    pub fn capability(&self, phase_type: &str) -> Option<PhaseCapability> {
        self.plugins.get(phase_type).map(|p| p.capability())
    }
}
