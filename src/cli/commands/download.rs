//! Subtitle download command.

use crate::core::cache::CacheStore;
use crate::core::subtitles;
use crate::services::SubtitleService;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

/// Download subtitles in `language` for the selected files.
pub async fn download(
    files: &[PathBuf],
    cache: &CacheStore,
    service: &dyn SubtitleService,
    language: &str,
) -> Result<()> {
    let written = subtitles::download_subtitles(files, cache, service, language)
        .await
        .context("Failed to write subtitles")?;

    if written == 0 {
        println!("{}", "No subtitle downloaded.".yellow());
    } else {
        println!("{}", format!("{} subtitles downloaded", written).green());
    }
    Ok(())
}
