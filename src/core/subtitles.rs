//! Subtitle download for cached movies.
//!
//! Subtitles are written next to the movie as `<stem>_<LANG>_LM<n>.srt`;
//! a movie that already has one for the language is skipped.

use crate::core::cache::CacheStore;
use crate::services::{SubtitleHit, SubtitleQuery, SubtitleService};
use crate::Result;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Subtitles kept per movie.
pub const MAX_SUBTITLES_PER_MOVIE: usize = 3;

/// A movie file subtitles are searched for.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleRequest {
    pub path: PathBuf,
    pub fingerprint: String,
    pub movie_id: String,
    /// Subtitle file ids chosen for this movie, best first.
    pub keep: Vec<String>,
}

/// Path of the `index`-th (1-based) subtitle of a movie.
pub fn subtitle_path(movie: &Path, language: &str, index: usize) -> PathBuf {
    let mut name = movie.file_stem().unwrap_or_default().to_os_string();
    name.push(format!("_{}_LM{}.srt", language.to_uppercase(), index));
    movie.with_file_name(name)
}

/// Whether a subtitle of this language was already downloaded for a movie.
pub fn has_subtitles(movie: &Path, language: &str) -> bool {
    let stem = movie
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let pattern = format!(
        r"^{}_{}_LM\d+\.srt$",
        regex::escape(&stem),
        regex::escape(&language.to_uppercase())
    );
    let Ok(re) = Regex::new(&pattern) else {
        return false;
    };
    let Some(dir) = movie.parent() else {
        return false;
    };

    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| re.is_match(&e.file_name().to_string_lossy()))
        })
        .unwrap_or(false)
}

/// Requests and queries for the files needing subtitles.
///
/// A file needs subtitles when its record has a metadata identifier and no
/// subtitle exists yet. Each gets an identifier query, preceded by a
/// fingerprint query when the hash lookup service knows its fingerprint.
pub fn build_queries(
    files: &[PathBuf],
    cache: &CacheStore,
    language: &str,
) -> (Vec<SubtitleRequest>, Vec<SubtitleQuery>) {
    let mut requests = Vec::new();
    let mut queries = Vec::new();

    for path in files {
        let Some(fingerprint) = cache.fingerprint_for_path(path) else {
            continue;
        };
        let Some(record) = cache.hashes.get(fingerprint) else {
            continue;
        };
        let Some(movie_id) = record.metadata.id.clone().filter(|id| !id.is_empty()) else {
            continue;
        };
        if record.is_not_found() || has_subtitles(path, language) {
            continue;
        }

        if record.origin.remote_id.is_some() {
            queries.push(SubtitleQuery::Hash {
                language: language.to_string(),
                fingerprint: fingerprint.to_string(),
                byte_size: record.byte_size.unwrap_or(0),
            });
        }
        queries.push(SubtitleQuery::Movie {
            language: language.to_string(),
            movie_id: movie_id.clone(),
        });

        requests.push(SubtitleRequest {
            path: path.clone(),
            fingerprint: fingerprint.to_string(),
            movie_id,
            keep: Vec::new(),
        });
    }

    (requests, queries)
}

/// Best subtitle file ids for a request: hits made for the same file if
/// any, else hits for the same movie, most downloaded first.
pub fn select_subtitles(request: &SubtitleRequest, hits: &[SubtitleHit]) -> Vec<String> {
    let mut keep: Vec<&SubtitleHit> = hits
        .iter()
        .filter(|h| h.movie_hash.as_deref() == Some(request.fingerprint.as_str()))
        .collect();

    if keep.is_empty() {
        let wanted = numeric_id(&request.movie_id);
        keep = hits
            .iter()
            .filter(|h| wanted.is_some() && h.movie_id.as_deref().and_then(numeric_id) == wanted)
            .collect();
    }

    keep.sort_by(|a, b| b.downloads.cmp(&a.downloads));
    keep.into_iter()
        .take(MAX_SUBTITLES_PER_MOVIE)
        .map(|h| h.file_id.clone())
        .collect()
}

fn numeric_id(id: &str) -> Option<u64> {
    id.trim().trim_start_matches("tt").parse().ok()
}

/// Write downloaded subtitles next to their movies. Returns files written.
pub fn write_subtitles(
    requests: &[SubtitleRequest],
    subtitles: &HashMap<String, Vec<u8>>,
    language: &str,
) -> Result<usize> {
    let mut written = 0;
    for request in requests {
        for (i, file_id) in request.keep.iter().enumerate() {
            let Some(content) = subtitles.get(file_id) else {
                tracing::warn!("Subtitle {} was not downloaded", file_id);
                continue;
            };
            let target = subtitle_path(&request.path, language, i + 1);
            fs::write(&target, content)?;
            tracing::info!("Subtitle written: {}", target.display());
            written += 1;
        }
    }
    Ok(written)
}

/// Search, download and write subtitles for the given files.
///
/// Service failures are logged and end the download without writing.
pub async fn download_subtitles(
    files: &[PathBuf],
    cache: &CacheStore,
    service: &dyn SubtitleService,
    language: &str,
) -> Result<usize> {
    let (mut requests, queries) = build_queries(files, cache, language);
    if queries.is_empty() {
        tracing::info!("All subtitles already downloaded");
        return Ok(0);
    }
    tracing::debug!("Subtitle queries: {:?}", queries);

    let hits = match service.search_subtitles(&queries).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::error!("Subtitle search failed: {}", e);
            return Ok(0);
        }
    };

    let mut ids = BTreeSet::new();
    for request in &mut requests {
        request.keep = select_subtitles(request, &hits);
        ids.extend(request.keep.iter().cloned());
    }
    if ids.is_empty() {
        tracing::info!("No subtitles found");
        return Ok(0);
    }

    let ids: Vec<String> = ids.into_iter().collect();
    let subtitles = match service.download_subtitles(&ids).await {
        Ok(subtitles) => subtitles,
        Err(e) => {
            tracing::error!("Subtitle download failed: {}", e);
            return Ok(0);
        }
    };

    write_subtitles(&requests, &subtitles, language)
}
