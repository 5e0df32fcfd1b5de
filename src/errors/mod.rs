// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Error types
//!
//! Specification and plugin validation problems are collected as plain
//! strings (see [`crate::pipeline::PipelineCheckErrors`]); everything that
//! stops a run is a [`WaterworksError`].

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for waterworks operations
pub type WaterworksResult<T> = Result<T, WaterworksError>;

/// Main error type for waterworks
#[derive(Error, Debug, Diagnostic)]
pub enum WaterworksError {
    // ─────────────────────────────────────────────────────────────────────────
    // Specification Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Waterworks file not found: {path}")]
    #[diagnostic(
        code(waterworks::spec_not_found),
        help("Run waterworks in the directory containing your waterworks.yml, or pass --file")
    )]
    SpecNotFound { path: PathBuf },

    #[error("Errors were found while validating your Waterworks file:\n{}", errors.join("\n"))]
    #[diagnostic(code(waterworks::invalid_spec))]
    InvalidSpec { errors: Vec<String> },

    #[error("The pipeline '{pipeline}' you specified doesn't exist in your Waterworks file")]
    #[diagnostic(
        code(waterworks::unknown_pipeline),
        help("Available pipelines: {available}")
    )]
    UnknownPipeline { pipeline: String, available: String },

    #[error("Invalid or unsupported pipeline phase type '{phase_type}'")]
    #[diagnostic(
        code(waterworks::unsupported_phase_type),
        help("Supported phase types: {supported}")
    )]
    UnsupportedPhaseType { phase_type: String, supported: String },

    #[error("Stage '{stage}' consumes the artifact '{artifact}', but no earlier stage produces it")]
    #[diagnostic(
        code(waterworks::broken_artifact_chain),
        help("A source phase must come first and a build phase second")
    )]
    BrokenArtifactChain { stage: String, artifact: String },

    #[error("Phase '{phase}' has invalid parameters: {reason}")]
    #[diagnostic(code(waterworks::invalid_phase_params))]
    InvalidPhaseParams { phase: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Secret Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Phase '{phase}' requires the secret '{name}', but it was not supplied")]
    #[diagnostic(
        code(waterworks::missing_secret),
        help("Run 'waterworks list-required-secrets --pipeline <name>' to see every secret a pipeline needs")
    )]
    MissingSecret { phase: String, name: String },

    #[error("Could not decode the --secrets value: {message}")]
    #[diagnostic(
        code(waterworks::secrets_decode),
        help("--secrets must be base64-encoded JSON: [{{\"phaseName\": ..., \"name\": ..., \"value\": ...}}]")
    )]
    SecretsDecode { message: String },

    #[error("Prompt failed: {message}")]
    #[diagnostic(code(waterworks::prompt_failed))]
    Prompt { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Expected account config file at {path}")]
    #[diagnostic(
        code(waterworks::account_config_not_found),
        help("If this is not the directory you want, run 'waterworks redefine-path'")
    )]
    AccountConfigNotFound { path: PathBuf },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(waterworks::config_error))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Provider Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Provider call '{operation}' failed: {message}")]
    #[diagnostic(code(waterworks::provider_error))]
    Provider { operation: String, message: String },

    #[error("{kind} '{name}' does not exist")]
    #[diagnostic(code(waterworks::resource_not_found))]
    ResourceNotFound { kind: String, name: String },

    #[error("Phase '{phase}' failed: {message}")]
    #[diagnostic(code(waterworks::phase_failed))]
    PhaseFailed { phase: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(waterworks::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(waterworks::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(waterworks::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(
        code(waterworks::yaml_error),
        help("Make sure the file is properly formatted YAML; a missing space is the usual culprit")
    )]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(waterworks::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for WaterworksError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for WaterworksError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for WaterworksError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl WaterworksError {
    /// Create a provider error for the given operation
    pub fn provider(operation: &str, message: impl Into<String>) -> Self {
        Self::Provider {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Create a missing secret error
    pub fn missing_secret(phase: &str, name: &str) -> Self {
        Self::MissingSecret {
            phase: phase.to_string(),
            name: name.to_string(),
        }
    }
}
