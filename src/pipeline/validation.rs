// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Pipeline validation
//!
//! Validates a Waterworks file before anything is deployed. Errors are
//! accumulated per pipeline rather than failing on the first one.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::errors::{WaterworksError, WaterworksResult};
use crate::phases::{PhaseCapability, PhaseRegistry};
use crate::pipeline::{PipelineDefinition, WaterworksFile, CURRENT_SPEC_VERSION};

/// Validation errors keyed by pipeline name, in file order
pub type PipelineCheckErrors = IndexMap<String, Vec<String>>;

/// Provider limit on stage names
const STAGE_NAME_PATTERN: &str = r"^[A-Za-z0-9.@_-]{1,100}$";

/// Key for errors that concern the file rather than one pipeline
const TOP_LEVEL: &str = "top-level";

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Structural validation of a Waterworks file
    pub fn validate(spec: &WaterworksFile, registry: &PhaseRegistry) -> WaterworksResult<ValidationResult> {
        let stage_name = regex::Regex::new(STAGE_NAME_PATTERN).map_err(|e| WaterworksError::Config {
            message: format!("Invalid stage name pattern: {}", e),
            help: None,
        })?;

        let mut result = ValidationResult::new();
        let top_level = if spec.name.is_empty() { TOP_LEVEL } else { spec.name.as_str() };

        if spec.name.trim().is_empty() {
            result.add_error(top_level, "The top-level name field is required in your Waterworks file");
        }

        if spec.version != CURRENT_SPEC_VERSION {
            result.add_warning(&format!(
                "Waterworks file version {} is not known, treating it as version {}",
                spec.version, CURRENT_SPEC_VERSION
            ));
        }

        if spec.pipelines.is_empty() {
            result.add_error(top_level, "You must specify at least one pipeline");
        }

        for (name, pipeline) in &spec.pipelines {
            result.touch(name);
            Self::validate_pipeline(name, pipeline, registry, &stage_name, &mut result);
        }

        Ok(result)
    }

    fn validate_pipeline(
        name: &str,
        pipeline: &PipelineDefinition,
        registry: &PhaseRegistry,
        stage_name: &regex::Regex,
        result: &mut ValidationResult,
    ) {
        if pipeline.phases.len() < 2 {
            result.add_error(
                name,
                &format!("You must specify at least two phases in the '{}' pipeline", name),
            );
        }

        Self::validate_position(name, pipeline, 0, PhaseCapability::Source, "first", registry, result);
        Self::validate_position(name, pipeline, 1, PhaseCapability::Build, "second", registry, result);

        let mut seen = HashSet::new();
        for (index, phase) in pipeline.phases.iter().enumerate() {
            if phase.phase_type.trim().is_empty() {
                result.add_error(
                    name,
                    &format!("Phase {} in the '{}' pipeline is missing its 'type' field", index + 1, name),
                );
            }

            if phase.name.trim().is_empty() {
                result.add_error(
                    name,
                    &format!("Phase {} in the '{}' pipeline is missing its 'name' field", index + 1, name),
                );
                continue;
            }

            if !stage_name.is_match(&phase.name) {
                result.add_error(
                    name,
                    &format!(
                        "Phase name '{}' may only contain letters, digits and the characters . @ _ - (at most 100)",
                        phase.name
                    ),
                );
            }

            if !seen.insert(phase.name.as_str()) {
                result.add_error(
                    name,
                    &format!("Duplicate phase name '{}' in the '{}' pipeline", phase.name, name),
                );
            }
        }
    }

    // Unknown and missing types fail the position rule as well.
    fn validate_position(
        name: &str,
        pipeline: &PipelineDefinition,
        index: usize,
        capability: PhaseCapability,
        ordinal: &str,
        registry: &PhaseRegistry,
        result: &mut ValidationResult,
    ) {
        let Some(phase) = pipeline.phases.get(index) else {
            return;
        };
        if registry.capability(&phase.phase_type) != Some(capability) {
            let allowed: Vec<String> = registry
                .types_with(capability)
                .iter()
                .map(|t| format!("'{}'", t))
                .collect();
            result.add_error(
                name,
                &format!(
                    "The {} phase in the '{}' pipeline must be a {} phase",
                    ordinal,
                    name,
                    allowed.join(" or ")
                ),
            );
        }
    }

    /// Run every phase's own parameter check
    pub fn check_phases(spec: &WaterworksFile, registry: &PhaseRegistry) -> PipelineCheckErrors {
        let mut errors = PipelineCheckErrors::new();

        for (name, pipeline) in &spec.pipelines {
            let pipeline_errors = errors.entry(name.clone()).or_default();
            for phase in &pipeline.phases {
                if phase.phase_type.trim().is_empty() {
                    continue;
                }
                match registry.resolve(&phase.phase_type) {
                    Some(plugin) => pipeline_errors.extend(plugin.check(phase)),
                    None => pipeline_errors.push(format!(
                        "You specified an invalid phase type: '{}'",
                        phase.phase_type
                    )),
                }
            }
        }

        errors
    }

    /// Structural validation merged with every phase check
    pub fn check(spec: &WaterworksFile, registry: &PhaseRegistry) -> WaterworksResult<ValidationResult> {
        let mut result = Self::validate(spec, registry)?;
        for (pipeline, errors) in Self::check_phases(spec, registry) {
            result.touch(&pipeline);
            for error in errors {
                result.add_error(&pipeline, &error);
            }
        }
        Ok(result)
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: PipelineCheckErrors,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, scope: &str, message: &str) {
        self.errors.entry(scope.to_string()).or_default().push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    // Keeps clean pipelines in the report
    fn touch(&mut self, scope: &str) {
        self.errors.entry(scope.to_string()).or_default();
    }

    pub fn is_valid(&self) -> bool {
        self.errors.values().all(Vec::is_empty)
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Errors as the message list of an invalid spec error
    pub fn into_error(self) -> WaterworksError {
        let errors = self
            .errors
            .into_iter()
            .flat_map(|(scope, errors)| errors.into_iter().map(move |e| format!("{}: {}", scope, e)))
            .collect();
        WaterworksError::InvalidSpec { errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryProvider;
    use std::sync::Arc;

    fn registry() -> PhaseRegistry {
        PhaseRegistry::with_defaults(Arc::new(InMemoryProvider::in_memory()))
    }

    fn spec(yaml: &str) -> WaterworksFile {
        WaterworksFile::from_yaml(yaml).unwrap()
    }

    const VALID: &str = r#"
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
      - type: approval
        name: Approve
"#;

    #[test]
    fn test_valid_spec() {
        let result = PipelineValidator::check(&spec(VALID), &registry()).unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
        assert_eq!(result.errors.keys().collect::<Vec<_>>(), vec!["prd"]);
    }

    #[test]
    fn test_missing_name_is_single_error() {
        let yaml = VALID.replace("name: my-app\n", "");
        let result = PipelineValidator::validate(&spec(&yaml), &registry()).unwrap();
        assert_eq!(result.error_count(), 1);
        assert!(result.errors[TOP_LEVEL][0].contains("name field is required"));
    }

    #[test]
    fn test_phase_order_rules() {
        let yaml = r#"
name: my-app
pipelines:
  short:
    phases:
      - type: codecommit
        name: Source
        repo: r
        branch: main
  swapped:
    phases:
      - type: codebuild
        name: Build
        build_image: img
      - type: github
        name: Source
        owner: me
        repo: r
"#;
        let result = PipelineValidator::validate(&spec(yaml), &registry()).unwrap();
        assert!(result.errors["short"][0].contains("at least two phases"));

        let swapped = &result.errors["swapped"];
        assert_eq!(swapped.len(), 2);
        assert!(swapped[0].contains("must be a 'codecommit' or 'github' phase"));
        assert!(swapped[1].contains("must be a 'codebuild' phase"));
    }

    #[test]
    fn test_duplicate_names_only_within_pipeline() {
        let yaml = r#"
name: my-app
pipelines:
  dev:
    phases:
      - type: github
        name: Source
        owner: me
        repo: r
      - type: codebuild
        name: Source
        build_image: img
  prd:
    phases:
      - type: github
        name: Source
        owner: me
        repo: r
      - type: codebuild
        name: Build
        build_image: img
"#;
        let result = PipelineValidator::validate(&spec(yaml), &registry()).unwrap();
        assert!(result.errors["dev"].iter().any(|e| e.contains("Duplicate")));
        assert!(result.errors["prd"].is_empty());
    }

    #[test]
    fn test_unknown_type_is_one_error() {
        let yaml = VALID.replace("type: approval", "type: jenkins");
        let result = PipelineValidator::check(&spec(&yaml), &registry()).unwrap();
        assert_eq!(
            result.errors["prd"],
            vec!["You specified an invalid phase type: 'jenkins'".to_string()]
        );
    }

    #[test]
    fn test_unknown_first_phase_fails_position_rule() {
        let yaml = VALID.replace("type: github", "type: jenkins");
        let result = PipelineValidator::check(&spec(&yaml), &registry()).unwrap();
        let errors = &result.errors["prd"];
        assert!(errors
            .iter()
            .any(|e| e.contains("The first phase in the 'prd' pipeline must be a 'codecommit' or 'github' phase")));
        assert!(errors.contains(&"You specified an invalid phase type: 'jenkins'".to_string()));
    }

    #[test]
    fn test_untyped_second_phase_fails_position_rule() {
        let yaml = VALID.replace("type: codebuild", "type: ''");
        let result = PipelineValidator::validate(&spec(&yaml), &registry()).unwrap();
        let errors = &result.errors["prd"];
        assert!(errors.iter().any(|e| e.contains("second phase in the 'prd' pipeline must be a 'codebuild' phase")));
        assert!(errors.iter().any(|e| e.contains("missing its 'type' field")));
    }

    #[test]
    fn test_plugin_errors_accumulate() {
        let yaml = VALID.replace("        owner: me\n", "").replace("        build_image: aws/codebuild/standard:7.0\n", "");
        let errors = PipelineValidator::check_phases(&spec(&yaml), &registry());
        assert_eq!(errors["prd"].len(), 2);
        assert!(errors["prd"][0].starts_with("GitHub"));
        assert!(errors["prd"][1].starts_with("CodeBuild"));
    }

    #[test]
    fn test_invalid_stage_name() {
        let yaml = VALID.replace("name: Approve", "name: Approve me!");
        let result = PipelineValidator::validate(&spec(&yaml), &registry()).unwrap();
        assert_eq!(result.error_count(), 1);
    }

    #[test]
    fn test_check_is_idempotent() {
        let yaml = VALID.replace("type: approval", "type: jenkins");
        let spec = spec(&yaml);
        let registry = registry();
        let first = PipelineValidator::check(&spec, &registry).unwrap();
        let second = PipelineValidator::check(&spec, &registry).unwrap();
        assert_eq!(first.errors, second.errors);
    }
}
