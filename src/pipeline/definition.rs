// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Waterworks file structures
//!
//! Defines the schema for waterworks.yml files.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{WaterworksError, WaterworksResult};

/// Default file name looked up in the working directory
pub const DEFAULT_SPEC_FILE: &str = "waterworks.yml";

/// Highest file version this build understands
pub const CURRENT_SPEC_VERSION: u32 = 1;

/// Pipeline specification loaded from waterworks.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterworksFile {
    /// File format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Application name, used as the prefix of every provider resource
    #[serde(default)]
    pub name: String,

    /// Pipelines keyed by name, in file order
    #[serde(default)]
    pub pipelines: IndexMap<String, PipelineDefinition>,
}

fn default_version() -> u32 {
    CURRENT_SPEC_VERSION
}

impl WaterworksFile {
    /// Load a specification from a YAML file
    pub fn from_file(path: &Path) -> WaterworksResult<Self> {
        if !path.exists() {
            return Err(WaterworksError::SpecNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| WaterworksError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_yaml(&content)
    }

    /// Parse a specification from a YAML string
    pub fn from_yaml(yaml: &str) -> WaterworksResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Get a pipeline by name
    pub fn pipeline(&self, name: &str) -> WaterworksResult<&PipelineDefinition> {
        self.pipelines
            .get(name)
            .ok_or_else(|| WaterworksError::UnknownPipeline {
                pipeline: name.to_string(),
                available: self.pipeline_names().join(", "),
            })
    }

    /// All pipeline names in file order
    pub fn pipeline_names(&self) -> Vec<&str> {
        self.pipelines.keys().map(String::as_str).collect()
    }
}

/// One pipeline: an ordered list of phases
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub phases: Vec<PhaseDeclaration>,
}

/// A single phase declaration
///
/// `type` and `name` are left empty when absent so that validation can
/// report them instead of failing the parse. Everything else lands in
/// `params` and is only interpreted by the phase plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseDeclaration {
    #[serde(rename = "type", default)]
    pub phase_type: String,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub params: IndexMap<String, serde_yaml::Value>,
}

impl PhaseDeclaration {
    /// Create a declaration with no extra parameters
    pub fn new(phase_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            phase_type: phase_type.into(),
            name: name.into(),
            params: IndexMap::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: &str, value: impl Into<serde_yaml::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Get a string parameter, treating empty strings as absent
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(serde_yaml::Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Get a raw parameter value
    pub fn param(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.params.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_spec() {
        let yaml = r#"
version: 1
name: my-app
pipelines:
  dev:
    phases:
      - type: github
        name: Source
        owner: byu-oit
        repo: my-app
        branch: master
      - type: codebuild
        name: Build
        build_image: aws/codebuild/standard:7.0
"#;

        let spec = WaterworksFile::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "my-app");
        assert_eq!(spec.version, 1);

        let dev = spec.pipeline("dev").unwrap();
        assert_eq!(dev.phases.len(), 2);
        assert_eq!(dev.phases[0].phase_type, "github");
        assert_eq!(dev.phases[0].param_str("owner"), Some("byu-oit"));
        assert_eq!(dev.phases[1].param_str("build_image"), Some("aws/codebuild/standard:7.0"));
        assert!(dev.phases[1].param("type").is_none());
    }

    #[test]
    fn test_missing_fields_parse_as_empty() {
        let yaml = r#"
pipelines:
  dev:
    phases:
      - name: Source
      - type: codebuild
"#;

        let spec = WaterworksFile::from_yaml(yaml).unwrap();
        assert!(spec.name.is_empty());
        let dev = spec.pipeline("dev").unwrap();
        assert!(dev.phases[0].phase_type.is_empty());
        assert!(dev.phases[1].name.is_empty());
    }

    #[test]
    fn test_pipelines_keep_file_order() {
        let yaml = r#"
name: app
pipelines:
  zeta:
    phases: []
  alpha:
    phases: []
"#;
        let spec = WaterworksFile::from_yaml(yaml).unwrap();
        assert_eq!(spec.pipeline_names(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_unknown_pipeline_lists_available() {
        let spec = WaterworksFile::from_yaml("name: app\npipelines:\n  prd:\n    phases: []\n").unwrap();
        let err = spec.pipeline("dev").unwrap_err();
        match err {
            WaterworksError::UnknownPipeline { pipeline, available } => {
                assert_eq!(pipeline, "dev");
                assert_eq!(available, "prd");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_string_param_is_absent() {
        let decl = PhaseDeclaration::new("github", "Source").with_param("owner", "");
        assert_eq!(decl.param_str("owner"), None);
    }
}
