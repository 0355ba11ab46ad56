//! Upload of manually identified fingerprints to the hash lookup service.

use super::ask;
use crate::cli::args::Detail;
use crate::cli::render;
use crate::core::cache::CacheStore;
use crate::models::movie::HashSubmission;
use crate::services::HashLookup;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

/// Files the hash lookup service does not know but we have identified.
pub fn upload_candidates(files: &[PathBuf], cache: &CacheStore) -> Vec<(PathBuf, HashSubmission)> {
    let mut seen = std::collections::HashSet::new();
    files
        .iter()
        .filter_map(|path| {
            let fingerprint = cache.fingerprint_for_path(path)?;
            let record = cache.hashes.get(fingerprint)?;
            if record.origin.remote_id.is_some() || record.is_not_found() {
                return None;
            }
            let movie_id = record
                .metadata
                .id
                .as_deref()
                .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))?;
            if !seen.insert(fingerprint.to_string()) {
                return None;
            }
            Some((
                path.clone(),
                HashSubmission {
                    fingerprint: fingerprint.to_string(),
                    byte_size: record.byte_size.unwrap_or(0),
                    movie_id: movie_id.to_string(),
                },
            ))
        })
        .collect()
}

/// Forget the last lookup time of uploaded fingerprints so they get checked again.
pub fn mark_uploaded(cache: &mut CacheStore, submissions: &[HashSubmission]) {
    for submission in submissions {
        if let Some(record) = cache.hashes.get_mut(&submission.fingerprint) {
            record.origin.checked_at = None;
        }
    }
}

/// Offer each candidate for upload and send the accepted ones.
pub async fn upload(
    files: &[PathBuf],
    cache: &mut CacheStore,
    lookup: &dyn HashLookup,
    detail: Detail,
) -> Result<usize> {
    let mut accepted = Vec::new();
    for (path, submission) in upload_candidates(files, cache) {
        if let Some(record) = cache.hashes.get(&submission.fingerprint) {
            if let Some(entry) = render::format_entry(&path, record, detail, false) {
                print!("{}", entry);
            }
        }
        if ask("Do you want to send hash info to OpenSubtitles?")? {
            accepted.push(submission);
        }
    }

    if accepted.is_empty() {
        return Ok(0);
    }

    if let Err(e) = lookup.insert_hashes(&accepted).await {
        println!("{} {}", "!!! Error when uploading hash to OpenSubtitles:".red(), e);
        return Ok(0);
    }

    mark_uploaded(cache, &accepted);
    cache.save()?;
    println!("{}", format!("{} hashes uploaded", accepted.len()).green());
    Ok(accepted.len())
}
