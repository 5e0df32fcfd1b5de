// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Interactive terminal prompts

use async_trait::async_trait;
use colored::Colorize;
use console::Term;

use crate::errors::{WaterworksError, WaterworksResult};
use crate::pipeline::{PhaseSecrets, SecretPrompter, SecretQuestion};

fn prompt_error(e: impl std::fmt::Display) -> WaterworksError {
    WaterworksError::Prompt { message: e.to_string() }
}

async fn read_from_terminal(message: String, secure: bool) -> WaterworksResult<String> {
    tokio::task::spawn_blocking(move || {
        let term = Term::stderr();
        term.write_str(&format!("{} {} ", "?".cyan().bold(), message.bold()))?;
        if secure {
            term.read_secure_line()
        } else {
            term.read_line()
        }
    })
    .await
    .map_err(prompt_error)?
    .map(|line| line.trim().to_string())
    .map_err(prompt_error)
}

/// Ask for a plain value, re-asking until it is non-empty
pub async fn ask(message: &str) -> WaterworksResult<String> {
    loop {
        let answer = read_from_terminal(message.to_string(), false).await?;
        if !answer.is_empty() {
            return Ok(answer);
        }
    }
}

/// Ask the user to pick one of `choices`
pub async fn choose(message: &str, choices: &[&str]) -> WaterworksResult<String> {
    if let [only] = choices {
        return Ok(only.to_string());
    }

    let full = format!("{} ({})", message, choices.join(", "));
    loop {
        let answer = ask(&full).await?;
        if choices.contains(&answer.as_str()) {
            return Ok(answer);
        }
        eprintln!("  {} '{}' is not one of: {}", "✗".red(), answer, choices.join(", "));
    }
}

/// Prompts for secrets on the terminal without echoing them
#[derive(Debug, Default)]
pub struct TerminalPrompter;

#[async_trait]
impl SecretPrompter for TerminalPrompter {
    async fn prompt(&self, questions: &[SecretQuestion]) -> WaterworksResult<PhaseSecrets> {
        let mut answers = PhaseSecrets::new();
        for question in questions {
            let value = read_from_terminal(question.message.clone(), true).await?;
            answers.insert(question.name.clone(), value);
        }
        Ok(answers)
    }
}
