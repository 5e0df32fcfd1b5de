// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Stage descriptions
//!
//! A phase deploy returns one provider-facing stage. Stages run in
//! declaration order; actions within a stage run by ascending `run_order`.
//! Adjacent phases are chained by artifact name: source phases emit
//! [`SOURCE_OUTPUT`], build phases consume it and emit [`BUILD_OUTPUT`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::errors::{WaterworksError, WaterworksResult};

/// Artifact emitted by source phases
pub const SOURCE_OUTPUT: &str = "Output_Source";

/// Artifact emitted by build phases
pub const BUILD_OUTPUT: &str = "Output_Build";

/// One pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDescription {
    pub name: String,
    pub actions: Vec<Action>,
}

impl StageDescription {
    /// A stage holding a single action
    pub fn single(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            actions: vec![action],
        }
    }

    /// Artifacts this stage consumes
    pub fn input_artifacts(&self) -> impl Iterator<Item = &str> {
        self.actions
            .iter()
            .flat_map(|a| a.input_artifacts.iter().map(String::as_str))
    }

    /// Artifacts this stage produces
    pub fn output_artifacts(&self) -> impl Iterator<Item = &str> {
        self.actions
            .iter()
            .flat_map(|a| a.output_artifacts.iter().map(String::as_str))
    }
}

/// Fail when a stage consumes an artifact no earlier stage produced
pub fn check_artifact_chain(stages: &[StageDescription]) -> WaterworksResult<()> {
    let mut produced = HashSet::new();
    for stage in stages {
        if let Some(missing) = stage.input_artifacts().find(|a| !produced.contains(a)) {
            return Err(WaterworksError::BrokenArtifactChain {
                stage: stage.name.clone(),
                artifact: missing.to_string(),
            });
        }
        produced.extend(stage.output_artifacts());
    }
    Ok(())
}

/// Action category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionCategory {
    Source,
    Build,
    Test,
    Approval,
    Invoke,
    Deploy,
}

/// Who provides the action implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOwner {
    #[serde(rename = "AWS")]
    Aws,
    ThirdParty,
    Custom,
}

/// Provider action type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTypeId {
    pub category: ActionCategory,
    pub owner: ActionOwner,
    pub provider: String,
    pub version: String,
}

/// One action within a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,
    pub action_type_id: ActionTypeId,
    pub run_order: u32,
    #[serde(default)]
    pub input_artifacts: Vec<String>,
    #[serde(default)]
    pub output_artifacts: Vec<String>,
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
}

impl Action {
    /// Create an action with run order 1 and no artifacts
    pub fn new(name: impl Into<String>, category: ActionCategory, owner: ActionOwner, provider: &str) -> Self {
        Self {
            name: name.into(),
            action_type_id: ActionTypeId {
                category,
                owner,
                provider: provider.to_string(),
                version: "1".to_string(),
            },
            run_order: 1,
            input_artifacts: vec![],
            output_artifacts: vec![],
            configuration: BTreeMap::new(),
        }
    }

    pub fn input(mut self, artifact: &str) -> Self {
        self.input_artifacts.push(artifact.to_string());
        self
    }

    pub fn output(mut self, artifact: &str) -> Self {
        self.output_artifacts.push(artifact.to_string());
        self
    }

    pub fn config(mut self, key: &str, value: impl Into<String>) -> Self {
        self.configuration.insert(key.to_string(), value.into());
        self
    }

    pub fn category(&self) -> ActionCategory {
        self.action_type_id.category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_provider_shape() {
        let stage = StageDescription::single(
            "Build",
            Action::new("Build", ActionCategory::Build, ActionOwner::Aws, "CodeBuild")
                .input(SOURCE_OUTPUT)
                .output(BUILD_OUTPUT)
                .config("ProjectName", "app-prd-Build"),
        );

        let json = serde_json::to_value(&stage).unwrap();
        let action = &json["actions"][0];
        assert_eq!(action["actionTypeId"]["owner"], "AWS");
        assert_eq!(action["actionTypeId"]["category"], "Build");
        assert_eq!(action["runOrder"], 1);
        assert_eq!(action["inputArtifacts"][0], "Output_Source");
        assert_eq!(action["configuration"]["ProjectName"], "app-prd-Build");
    }

    fn source() -> StageDescription {
        StageDescription::single(
            "Source",
            Action::new("Source", ActionCategory::Source, ActionOwner::ThirdParty, "GitHub").output(SOURCE_OUTPUT),
        )
    }

    fn build() -> StageDescription {
        StageDescription::single(
            "Build",
            Action::new("Build", ActionCategory::Build, ActionOwner::Aws, "CodeBuild")
                .input(SOURCE_OUTPUT)
                .output(BUILD_OUTPUT),
        )
    }

    fn publish() -> StageDescription {
        StageDescription::single(
            "Publish",
            Action::new("Publish", ActionCategory::Test, ActionOwner::Aws, "CodeBuild").input(BUILD_OUTPUT),
        )
    }

    #[test]
    fn test_artifact_chain_in_order() {
        assert!(check_artifact_chain(&[source(), build(), publish()]).is_ok());
        assert!(check_artifact_chain(&[]).is_ok());
    }

    #[test]
    fn test_artifact_chain_rejects_unproduced_input() {
        match check_artifact_chain(&[source(), publish(), build()]) {
            Err(WaterworksError::BrokenArtifactChain { stage, artifact }) => {
                assert_eq!(stage, "Publish");
                assert_eq!(artifact, BUILD_OUTPUT);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
