// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Phase secrets
//!
//! Secrets are either asked for interactively through a [`SecretPrompter`]
//! or supplied up front as a base64-encoded JSON list and redistributed to
//! the phases they name.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::errors::{WaterworksError, WaterworksResult};
use crate::pipeline::PhaseDeclaration;

/// Secrets for one phase, keyed by secret name
pub type PhaseSecrets = BTreeMap<String, String>;

/// Secrets for every phase of a pipeline, keyed by phase name
pub type PipelineSecrets = HashMap<String, PhaseSecrets>;

/// A secret a phase needs before it can deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretQuestion {
    pub phase_name: String,
    pub name: String,
    pub message: String,
}

impl SecretQuestion {
    pub fn new(phase_name: &str, name: &str, message: impl Into<String>) -> Self {
        Self {
            phase_name: phase_name.to_string(),
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// A secret supplied on the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuppliedSecret {
    pub phase_name: String,
    pub name: String,
    pub value: String,
}

/// Asks a human for secret values
#[async_trait]
pub trait SecretPrompter: Send + Sync {
    /// Ask every question, returning answers keyed by question name
    async fn prompt(&self, questions: &[SecretQuestion]) -> WaterworksResult<PhaseSecrets>;
}

/// Prompter that answers from a fixed table, for non-terminal use and tests
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    answers: HashMap<(String, String), String>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the answer for a phase's secret
    pub fn answer(mut self, phase_name: &str, name: &str, value: &str) -> Self {
        self.answers
            .insert((phase_name.to_string(), name.to_string()), value.to_string());
        self
    }
}

#[async_trait]
impl SecretPrompter for ScriptedPrompter {
    async fn prompt(&self, questions: &[SecretQuestion]) -> WaterworksResult<PhaseSecrets> {
        questions
            .iter()
            .map(|q| {
                self.answers
                    .get(&(q.phase_name.clone(), q.name.clone()))
                    .map(|v| (q.name.clone(), v.clone()))
                    .ok_or_else(|| WaterworksError::Prompt {
                        message: format!("no scripted answer for '{}' in phase '{}'", q.name, q.phase_name),
                    })
            })
            .collect()
    }
}

/// Decode the `--secrets` argument: base64 of a JSON list of secrets
pub fn decode_supplied_secrets(encoded: &str) -> WaterworksResult<Vec<SuppliedSecret>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| WaterworksError::SecretsDecode { message: e.to_string() })?;

    serde_json::from_slice(&bytes).map_err(|e| WaterworksError::SecretsDecode { message: e.to_string() })
}

/// Encode secrets the way `--secrets` expects them
pub fn encode_supplied_secrets(secrets: &[SuppliedSecret]) -> WaterworksResult<String> {
    let json = serde_json::to_vec(secrets)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Distribute supplied secrets to the phases they name
///
/// Every phase gets an entry, empty when nothing was supplied for it.
/// Secrets naming an unknown phase are ignored. Nothing is defaulted: a
/// phase that needs a secret it did not get fails when it deploys.
pub fn redistribute_secrets(phases: &[PhaseDeclaration], supplied: &[SuppliedSecret]) -> PipelineSecrets {
    let mut result: PipelineSecrets = phases
        .iter()
        .map(|p| (p.name.clone(), PhaseSecrets::new()))
        .collect();

    for secret in supplied {
        match result.get_mut(&secret.phase_name) {
            Some(phase_secrets) => {
                phase_secrets.insert(secret.name.clone(), secret.value.clone());
            }
            None => debug!(
                phase = %secret.phase_name,
                name = %secret.name,
                "Ignoring secret for a phase not in this pipeline"
            ),
        }
    }

    result
}
