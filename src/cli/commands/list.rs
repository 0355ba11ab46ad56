//! Listing of the selected movies.

use crate::cli::args::Cli;
use crate::cli::render;
use crate::core::cache::CacheStore;
use crate::core::filter::{apply_filter, sort_files};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

/// Apply the user filter and sort order.
pub fn select_files(files: Vec<PathBuf>, cache: &CacheStore, cli: &Cli) -> Vec<PathBuf> {
    let mut files = match cli.filter.as_deref() {
        Some(expression) => apply_filter(files, expression, cache),
        None => files,
    };
    sort_files(&mut files, cache, cli.sort_mode(), cli.reverse);
    files
}

/// Print the listing, or write the HTML summary with `--show`.
pub fn show(files: &[PathBuf], cache: &CacheStore, cli: &Cli) -> Result<()> {
    if cli.show {
        let path = render::write_html_summary(files, cache).context("Failed to write HTML summary")?;
        println!("{} {}", "HTML summary:".bold(), path.display());
        return Ok(());
    }

    render::print_listing(files, cache, cli.detail(), cli.outline);
    Ok(())
}
