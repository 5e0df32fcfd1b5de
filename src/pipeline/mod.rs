// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Pipeline definitions and lifecycle
//!
//! This module defines the Waterworks file model, the per-run contexts,
//! stage descriptions and secrets, plus the validator and the lifecycle
//! that deploys and deletes pipelines.

mod context;
mod definition;
mod lifecycle;
mod secrets;
mod stage;
mod validation;

pub use context::{pipeline_resource_name, AccountConfig, PhaseContext, PipelineContext};
pub use definition::*;
pub use lifecycle::{pipeline_role_name, Lifecycle, PipelineChange};
pub use secrets::*;
pub use stage::*;
pub use validation::{PipelineCheckErrors, PipelineValidator, ValidationResult};
