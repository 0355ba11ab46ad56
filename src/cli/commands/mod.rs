//! CLI command implementations.

pub mod cache;
pub mod confirm;
pub mod download;
pub mod list;
pub mod upload;

use anyhow::Result;

/// Ask a yes/no question, defaulting to no.
pub(crate) fn ask(prompt: &str) -> Result<bool> {
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Ask for a line of text, which may be empty.
pub(crate) fn input(prompt: &str) -> Result<String> {
    let text: String = dialoguer::Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(text.trim().to_string())
}
