//! Persistent two-level cache: path → fingerprint, fingerprint → movie record.
//!
//! Both maps are stored as JSON files in the cache directory and always saved
//! together after a synchronization pass, so that every cached path with a
//! fingerprint points to an existing record and every record is referenced by
//! at least one path.
//!
//! There is no locking: two processes sharing a cache directory race and the
//! last writer wins.

use crate::core::fingerprint::fingerprint;
use crate::models::cache::{MediaFile, MovieRecord};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// PathIndex file name.
pub const PATH_CACHE_FILE: &str = "cache_path.json";

/// HashStore file name.
pub const HASH_CACHE_FILE: &str = "cache_hash.json";

/// HTML summary file name.
pub const HTML_SUMMARY_FILE: &str = "html_sumup.html";

/// Absolute path → file entry.
pub type PathIndex = BTreeMap<PathBuf, MediaFile>;

/// Fingerprint → movie record.
pub type HashStore = BTreeMap<String, MovieRecord>;

/// Outcome of a path update pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateSummary {
    /// Paths whose fingerprint was (re)computed.
    pub hashed: usize,
    /// Paths reusing their cached fingerprint.
    pub reused: usize,
    /// Paths that could not be fingerprinted.
    pub failed: usize,
    /// Records created for new fingerprints.
    pub new_records: usize,
}

/// Outcome of a synchronization pass.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SyncReport {
    pub removed_paths: usize,
    pub removed_hashes: usize,
}

/// Both caches, loaded in memory.
#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
    /// PathIndex.
    pub paths: PathIndex,
    /// HashStore.
    pub hashes: HashStore,
}

impl CacheStore {
    /// Open the caches in `dir`, creating the directory if needed.
    ///
    /// Missing or unreadable store files start empty.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let paths: PathIndex = load_store(&dir.join(PATH_CACHE_FILE));
        let hashes: HashStore = load_store(&dir.join(HASH_CACHE_FILE));

        tracing::info!(
            "Caches loaded: {} paths, {} hashes",
            paths.len(),
            hashes.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            paths,
            hashes,
        })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Update the PathIndex with a list of absolute paths and persist.
    ///
    /// A cached path is re-hashed only if the file was modified at or after
    /// its last indexing time.
    pub fn update_paths(&mut self, paths: &[PathBuf]) -> Result<UpdateSummary> {
        let mut summary = UpdateSummary::default();

        for path in paths {
            let modified = modified_at(path);
            let stale = match (self.paths.get(path), modified) {
                (Some(entry), Some(mtime)) => mtime >= entry.last_indexed_at,
                _ => true,
            };

            if !stale {
                summary.reused += 1;
                continue;
            }

            tracing::info!("Adding path to cache: {}", path.display());
            let hash = match fingerprint(path) {
                Ok(hash) => {
                    summary.hashed += 1;
                    Some(hash)
                }
                Err(e) if e.is_fingerprint_failure() => {
                    tracing::debug!("No fingerprint for {}: {}", path.display(), e);
                    summary.failed += 1;
                    None
                }
                Err(e) => return Err(e),
            };

            if let Some(ref hash) = hash {
                if !self.hashes.contains_key(hash) {
                    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                    tracing::debug!("Adding hash entry {} for {}", hash, path.display());
                    self.hashes.insert(hash.clone(), MovieRecord::new(size));
                    summary.new_records += 1;
                }
            }

            self.paths.insert(
                path.clone(),
                MediaFile {
                    fingerprint: hash,
                    last_indexed_at: Utc::now(),
                },
            );
        }

        self.save()?;
        Ok(summary)
    }

    /// Restore referential integrity between the two maps.
    ///
    /// Drops paths pointing to a missing record, then records no path
    /// points to. Paths without a fingerprint stay tracked.
    pub fn sync(&mut self) -> SyncReport {
        let hashes = &self.hashes;
        let before = self.paths.len();
        self.paths.retain(|_, entry| match entry.fingerprint {
            Some(ref hash) => hashes.contains_key(hash),
            None => true,
        });
        let removed_paths = before - self.paths.len();

        let referenced: HashSet<&String> = self
            .paths
            .values()
            .filter_map(|entry| entry.fingerprint.as_ref())
            .collect();
        let before = self.hashes.len();
        self.hashes.retain(|hash, _| referenced.contains(hash));
        let removed_hashes = before - self.hashes.len();

        if removed_paths + removed_hashes > 0 {
            tracing::info!(
                "Cache sync removed {} paths and {} hashes",
                removed_paths,
                removed_hashes
            );
        }

        SyncReport {
            removed_paths,
            removed_hashes,
        }
    }

    /// Synchronize and persist both stores.
    pub fn save(&mut self) -> Result<()> {
        self.sync();
        save_store(&self.dir.join(PATH_CACHE_FILE), &self.paths)?;
        save_store(&self.dir.join(HASH_CACHE_FILE), &self.hashes)?;
        tracing::debug!("Caches saved to {}", self.dir.display());
        Ok(())
    }

    /// Paths among `candidates` that are present in the PathIndex.
    pub fn cached_paths(&self, candidates: &[PathBuf]) -> Vec<PathBuf> {
        candidates
            .iter()
            .filter(|p| self.paths.contains_key(*p))
            .cloned()
            .collect()
    }

    /// Remove paths from the cache and persist. Orphaned records go with them.
    pub fn delete(&mut self, paths: &[PathBuf]) -> Result<usize> {
        let removed = paths
            .iter()
            .filter(|p| self.paths.remove(*p).is_some())
            .count();
        tracing::info!("Deleted {} entries from path cache", removed);
        self.save()?;
        Ok(removed)
    }

    /// Record of the fingerprint a path points to.
    pub fn record_for_path(&self, path: &Path) -> Option<&MovieRecord> {
        let hash = self.paths.get(path)?.fingerprint.as_ref()?;
        self.hashes.get(hash)
    }

    /// Fingerprint cached for a path.
    pub fn fingerprint_for_path(&self, path: &Path) -> Option<&str> {
        self.paths.get(path)?.fingerprint.as_deref()
    }

    /// Most recently indexed existing file pointing to a fingerprint.
    pub fn latest_path_for(&self, hash: &str) -> Option<(&PathBuf, &MediaFile)> {
        self.paths
            .iter()
            .filter(|(path, entry)| entry.fingerprint.as_deref() == Some(hash) && path.exists())
            .max_by_key(|(_, entry)| entry.last_indexed_at)
    }

    /// Delete every cache file in `dir`.
    pub fn reset(dir: &Path) -> Result<()> {
        for name in [PATH_CACHE_FILE, HASH_CACHE_FILE, HTML_SUMMARY_FILE] {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_file(&path)?;
                tracing::info!("Removed {}", path.display());
            }
        }
        Ok(())
    }
}

/// File modification time, if readable.
fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Load a JSON store, falling back to an empty map.
fn load_store<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("{} not loaded ({}), empty initialization", path.display(), e);
            return T::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("{} is corrupted ({}), empty initialization", path.display(), e);
            T::default()
        }
    }
}

/// Write a JSON store through a temporary file and an atomic rename.
fn save_store<T: Serialize>(path: &Path, store: &T) -> Result<()> {
    let content = serde_json::to_string(store)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
