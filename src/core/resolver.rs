//! Metadata resolution pipeline.
//!
//! Two passes run over the HashStore. The origin pass asks the hash lookup
//! service which movie each unknown fingerprint is, retrying unknown ones
//! only after a backoff. The metadata pass then fills the canonical metadata,
//! by identifier when the origin is known and by guessing the title from a
//! filename otherwise.

use crate::core::cache::CacheStore;
use crate::core::guesser::guess;
use crate::core::matcher::FuzzyMatcher;
use crate::models::cache::MovieRecord;
use crate::models::config::ResolverConfig;
use crate::models::movie::MovieInfo;
use crate::services::{HashLookup, MetadataProvider};
use crate::{Error, Result};
use chrono::{Duration, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;

/// A completed search match.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub movie: MovieInfo,
    pub unsure: bool,
}

/// Fills MovieRecords from the remote services.
pub struct MetadataResolver<'a> {
    provider: &'a dyn MetadataProvider,
    lookup: &'a dyn HashLookup,
    config: ResolverConfig,
    matcher: FuzzyMatcher,
    show_progress: bool,
}

impl<'a> MetadataResolver<'a> {
    /// Create a resolver over the two services.
    pub fn new(
        provider: &'a dyn MetadataProvider,
        lookup: &'a dyn HashLookup,
        config: ResolverConfig,
    ) -> Self {
        let matcher = FuzzyMatcher::new(config.unsure_threshold);
        Self {
            provider,
            lookup,
            config,
            matcher,
            show_progress: false,
        }
    }

    /// Show a progress bar during the metadata pass.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run both passes.
    pub async fn run(&self, cache: &mut CacheStore) -> Result<()> {
        self.update_origin_info(cache).await?;
        self.update_metadata(cache).await?;
        Ok(())
    }

    /// Fingerprints the hash lookup service should be asked about.
    pub fn hashes_needing_origin(&self, cache: &CacheStore) -> Vec<String> {
        let retry_before = Utc::now() - Duration::hours(self.config.lookup_retry_hours);
        cache
            .hashes
            .iter()
            .filter(|(_, record)| !record.has_origin())
            .filter(|(_, record)| match record.origin.checked_at {
                Some(checked_at) => checked_at < retry_before,
                None => true,
            })
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    /// Ask the hash lookup service about unknown fingerprints.
    ///
    /// Service failures are logged and count as "no data": the check time
    /// is updated either way. Returns the number of matched fingerprints.
    pub async fn update_origin_info(&self, cache: &mut CacheStore) -> Result<usize> {
        let hashes = self.hashes_needing_origin(cache);
        if hashes.is_empty() {
            return Ok(0);
        }

        let found = match self
            .lookup
            .check_hashes(&hashes, self.config.lookup_batch_size)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Hash lookup failed, continuing without it: {}", e);
                HashMap::new()
            }
        };

        let now = Utc::now();
        let mut matched = 0;
        for hash in &hashes {
            let Some(record) = cache.hashes.get_mut(hash) else {
                continue;
            };
            record.origin.checked_at = Some(now);

            if let Some(Some(origin)) = found.get(hash) {
                tracing::debug!("Origin for {}: {} ({})", hash, origin.remote_title, origin.remote_id);
                record.origin.remote_id = Some(origin.remote_id.clone());
                record.origin.remote_title = Some(origin.remote_title.clone());
                record.origin.remote_year = origin.remote_year;
                record.origin.updated_at = Some(now);
                matched += 1;
            }
        }

        tracing::info!("{} of {} hashes matched by lookup", matched, hashes.len());
        cache.save()?;
        Ok(matched)
    }

    /// Fingerprints whose metadata must be (re)fetched.
    ///
    /// A fingerprint qualifies when an existing file points to it and its
    /// metadata was never fetched, its origin changed since, or, without an
    /// origin, its file was re-indexed since.
    pub fn hashes_needing_metadata(&self, cache: &CacheStore) -> Vec<String> {
        cache
            .hashes
            .iter()
            .filter(|(hash, record)| {
                let Some((_, file)) = cache.latest_path_for(hash) else {
                    return false;
                };
                match record.metadata.last_update {
                    None => true,
                    Some(last_update) => {
                        let origin_newer = record
                            .origin
                            .updated_at
                            .is_some_and(|updated| updated > last_update);
                        let reindexed = !record.has_origin() && file.last_indexed_at > last_update;
                        origin_newer || reindexed
                    }
                }
            })
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    /// Fill metadata for every fingerprint that needs it.
    ///
    /// Both stores are saved every `checkpoint_every` fingerprints. A
    /// provider failure saves the progress and aborts the whole pass with
    /// [`Error::RemoteConnection`]. Returns the number of fingerprints
    /// processed.
    pub async fn update_metadata(&self, cache: &mut CacheStore) -> Result<usize> {
        let hashes = self.hashes_needing_metadata(cache);
        if hashes.is_empty() {
            return Ok(0);
        }

        let pb = if self.show_progress {
            ProgressBar::new(hashes.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Getting metadata [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );

        let checkpoint_every = self.config.checkpoint_every.max(1);
        for (index, hash) in hashes.iter().enumerate() {
            tracing::info!("Getting metadata for hash {}", hash);
            pb.set_message(hash.clone());

            if let Err(e) = self.resolve_one(cache, hash).await {
                pb.abandon();
                if let Err(save_error) = cache.save() {
                    tracing::error!("Cannot save progress: {}", save_error);
                }
                return Err(e);
            }
            if let Some(record) = cache.hashes.get_mut(hash) {
                record.metadata_checked_at = Some(Utc::now());
            }
            pb.inc(1);

            if (index + 1) % checkpoint_every == 0 {
                tracing::debug!("Checkpoint after {} hashes", index + 1);
                cache.save()?;
            }
        }

        pb.finish_and_clear();
        cache.save()?;
        Ok(hashes.len())
    }

    /// Resolve one fingerprint.
    async fn resolve_one(&self, cache: &mut CacheStore, hash: &str) -> Result<()> {
        let Some(mut record) = cache.hashes.get(hash).cloned() else {
            return Ok(());
        };
        let now = Utc::now();

        if let Some(remote_id) = record.origin.remote_id.clone() {
            tracing::info!("Identifier {} known from hash lookup", remote_id);
            let found = self
                .provider
                .get_by_id(&remote_id)
                .await
                .map_err(|e| connection_error(&remote_id, e))?;
            // without an identifier the movie can never be listed
            match found.filter(|movie| !movie.id.is_empty()) {
                Some(movie) => record.fill_metadata(&movie, now),
                None => {
                    tracing::warn!("Provider knows nothing about {}", remote_id);
                    record.fill_not_found(now);
                    record.guess.unsure = true;
                }
            }
        } else {
            let filename = cache
                .latest_path_for(hash)
                .and_then(|(path, _)| path.file_name())
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let guessed = guess(&filename);
            tracing::debug!("Guessed {:?} from {}", guessed, filename);
            record.guess.title = Some(guessed.title.clone());
            record.guess.year = guessed.year;

            let found = self
                .search_best(&guessed.title, guessed.year)
                .await
                .map_err(|e| connection_error(&guessed.title, e))?;
            match found.filter(|best| !best.movie.id.is_empty()) {
                Some(best) => {
                    record.fill_metadata(&best.movie, now);
                    record.guess.unsure = best.unsure;
                }
                None => {
                    tracing::info!("No result for [{}], storing not found", guessed.title);
                    record.fill_not_found(now);
                    record.guess.unsure = true;
                }
            }
        }

        cache.hashes.insert(hash.to_string(), record);
        Ok(())
    }

    /// Search a title and complete the best candidate.
    pub async fn search_best(&self, title: &str, year: Option<u16>) -> Result<Option<SearchMatch>> {
        if title.trim().is_empty() {
            return Ok(None);
        }

        let candidates = self.provider.search_by_title(title).await?;
        let outcome = self.matcher.best_match(title, year, &candidates);
        let Some(best) = outcome.best else {
            return Ok(None);
        };

        tracing::debug!("Best result for [{}]: {} ({:.3})", title, best.title, outcome.ratio);
        let movie = self.provider.complete(best).await?;
        Ok(Some(SearchMatch {
            movie,
            unsure: outcome.unsure,
        }))
    }

    /// Full metadata by identifier.
    pub async fn lookup_id(&self, id: &str) -> Result<Option<MovieInfo>> {
        self.provider.get_by_id(id).await
    }
}

/// Store a user-confirmed match for a fingerprint and persist.
pub fn apply_confirmed(cache: &mut CacheStore, hash: &str, found: &MovieInfo) -> Result<()> {
    let record = cache
        .hashes
        .entry(hash.to_string())
        .or_insert_with(MovieRecord::default);
    record.confirm(found, Utc::now());
    cache.save()
}

fn connection_error(movie: &str, error: Error) -> Error {
    Error::RemoteConnection {
        movie: movie.to_string(),
        message: error.to_string(),
    }
}
