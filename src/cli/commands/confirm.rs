//! Manual confirmation of the movie stored for each file.

use super::{ask, input};
use crate::cli::args::Detail;
use crate::cli::render;
use crate::core::cache::CacheStore;
use crate::core::resolver::{apply_confirmed, MetadataResolver};
use crate::models::movie::MovieInfo;
use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Attempts per file before giving up.
const MAX_ATTEMPTS: usize = 5;

/// Walk the user through every file. Returns the number of files updated.
pub async fn confirm(
    files: &[PathBuf],
    cache: &mut CacheStore,
    resolver: &MetadataResolver<'_>,
    detail: Detail,
) -> Result<usize> {
    let mut updated = 0;
    for path in files {
        println!("\n{}", "***************".bold());
        println!("{}", "File to confirm".bold());
        println!("{}", "***************".bold());
        println!("absolute path : {}", path.display());
        println!(
            "basename      : {}\n",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        if confirm_file(path, cache, resolver, detail).await? {
            updated += 1;
        }
        println!("\n{} movies updated", updated);
    }
    Ok(updated)
}

/// Confirm one file, asking again after a miss up to [`MAX_ATTEMPTS`] times.
async fn confirm_file(
    path: &Path,
    cache: &mut CacheStore,
    resolver: &MetadataResolver<'_>,
    detail: Detail,
) -> Result<bool> {
    let Some(hash) = cache.fingerprint_for_path(path).map(str::to_string) else {
        println!("{}", "No fingerprint for this file, skipping.".yellow());
        return Ok(false);
    };

    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 && !ask("Try again for this movie?")? {
            return Ok(false);
        }

        if let Some(record) = cache.hashes.get(&hash) {
            if !record.is_not_found() {
                if let Some(entry) = render::format_entry(path, record, detail, false) {
                    print!("{}", entry);
                    if ask("Do you confirm stored info?")? {
                        if let Some(record) = cache.hashes.get_mut(&hash) {
                            record.guess.unsure = false;
                        }
                        cache.save()?;
                        return Ok(true);
                    }
                }
            }
        }

        let found = match lookup(resolver).await? {
            Ok(found) => found,
            Err(e) => {
                println!("{} {}", "Connection error:".red(), e);
                continue;
            }
        };

        match found {
            Some(movie) => {
                println!("--> movie found title: {}", movie.title);
                println!(
                    "--> movie found  year: {}",
                    movie.year.map(|y| y.to_string()).unwrap_or_default()
                );
                if ask("Confirm this result?")? {
                    apply_confirmed(cache, &hash, &movie)?;
                    println!("{}", "movie saved".green());
                    return Ok(true);
                }
            }
            None => println!("{}", "--> nothing found!".yellow()),
        }
    }

    println!("Giving up after {} attempts", MAX_ATTEMPTS);
    Ok(false)
}

/// Ask for an identifier or a title and look it up.
///
/// The outer result carries prompt failures, the inner one provider errors.
async fn lookup(resolver: &MetadataResolver<'_>) -> Result<crate::Result<Option<MovieInfo>>> {
    if ask("Will you provide an IMDb id?")? {
        let id = input("please enter the IMDb id for this movie")?;
        return Ok(resolver.lookup_id(&id).await);
    }

    let title = input("please enter movie title")?;
    let year = input("please enter year, leave blank if unknown")?;
    let year = year.parse::<u16>().ok();
    Ok(resolver
        .search_best(&title, year)
        .await
        .map(|found| found.map(|m| m.movie)))
}
