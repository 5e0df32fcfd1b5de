// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Check command - validate the Waterworks file

use colored::Colorize;
use miette::Result;
use std::path::Path;
use std::sync::Arc;

use super::{load_spec, print_validation};
use crate::phases::PhaseRegistry;
use crate::pipeline::PipelineValidator;
use crate::provider::InMemoryProvider;
use crate::utils;

/// Run the check command
pub async fn run(file: &Path, verbose: bool) -> Result<()> {
    utils::print_header("Checking Waterworks file...");

    let spec = load_spec(file)?;

    // Checking never touches the provider.
    let registry = PhaseRegistry::with_defaults(Arc::new(InMemoryProvider::in_memory()));
    let result = PipelineValidator::check(&spec, &registry)?;

    print_validation(&result);

    if verbose {
        println!();
        println!("{}:", "Summary".bold());
        println!("  Name: {}", spec.name);
        for name in spec.pipeline_names() {
            let phases = spec.pipeline(name)?.phases.len();
            println!("  Pipeline '{}': {} phases", name, phases);
        }
    }

    if !result.is_valid() {
        println!();
        return Err(result.into_error().into());
    }

    println!();
    println!("{}", "Waterworks file is valid".green().bold());
    Ok(())
}
