// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Utility modules
//!
//! Terminal output and prompting for the waterworks CLI.

pub mod colors;
pub mod prompt;
pub mod spinner;

pub use colors::*;
pub use prompt::TerminalPrompter;
pub use spinner::*;
