// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! # waterworks - Deployment Pipeline Orchestrator
//!
//! `waterworks` turns a declarative file of multi-phase pipelines into
//! provider pipelines. Each phase type is a plugin that validates its own
//! parameters, asks for its own secrets and creates whatever resources back
//! it; the orchestrator deploys phases concurrently and assembles their
//! stages into one pipeline.
//!
//! ## Quick Start
//!
//! ```bash
//! # Validate waterworks.yml
//! waterworks check
//!
//! # Deploy, prompting for the pipeline, account and secrets
//! waterworks deploy
//!
//! # Deploy from CI
//! waterworks deploy --pipeline prd --account-name prd --secrets <BASE64>
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod phases;
pub mod pipeline;
pub mod provider;
pub mod utils;

// Re-export commonly used types
pub use errors::{WaterworksError, WaterworksResult};
pub use phases::{PhasePlugin, PhaseRegistry};
pub use pipeline::{Lifecycle, PipelineContext, WaterworksFile};
pub use provider::{FilesystemProvider, InMemoryProvider, Provider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
