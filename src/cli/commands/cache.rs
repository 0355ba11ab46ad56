//! Cache maintenance commands.

use super::ask;
use crate::core::cache::CacheStore;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Delete every cache file after confirmation.
pub fn reset(cache_dir: &Path) -> Result<()> {
    if !ask(&format!("Delete every cache file in {}?", cache_dir.display()))? {
        println!("Operation cancelled");
        return Ok(());
    }
    CacheStore::reset(cache_dir).context("Failed to reset cache")?;
    println!("{}", "Cache reset".green());
    Ok(())
}

/// Remove the given files from the cache after confirmation.
pub fn delete(files: &[PathBuf], cache: &mut CacheStore) -> Result<()> {
    let cached = cache.cached_paths(files);
    if cached.is_empty() {
        println!("{}", "None of these files is cached.".yellow());
        return Ok(());
    }

    for path in &cached {
        println!("  {}", path.display());
    }
    if !ask(&format!("Remove these {} files from the cache?", cached.len()))? {
        println!("Operation cancelled");
        return Ok(());
    }

    let removed = cache.delete(&cached).context("Failed to update cache")?;
    println!("{}", format!("{} entries removed", removed).green());
    Ok(())
}
