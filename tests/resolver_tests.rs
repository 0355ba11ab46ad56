//! Integration tests for the metadata resolution pipeline.
//!
//! The remote services are replaced by in-memory fakes.

use async_trait::async_trait;
use list_movies::core::cache::CacheStore;
use list_movies::core::fingerprint::{fingerprint, MIN_FILE_SIZE};
use list_movies::core::resolver::MetadataResolver;
use list_movies::models::cache::NOT_FOUND_ID;
use list_movies::models::config::ResolverConfig;
use list_movies::models::movie::{HashSubmission, MovieInfo, OriginMatch};
use list_movies::services::{HashLookup, MetadataProvider};
use list_movies::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Default)]
struct FakeProvider {
    by_id: HashMap<String, MovieInfo>,
    search_results: HashMap<String, Vec<MovieInfo>>,
    complete_results: HashMap<String, MovieInfo>,
    failing: bool,
    /// Fail the n-th search, after counting the movies resolved on disk.
    fail_on_search: Option<usize>,
    cache_dir: Option<PathBuf>,
    resolved_on_disk: Mutex<Option<usize>>,
    searches: Mutex<Vec<String>>,
    id_lookups: Mutex<Vec<String>>,
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    async fn get_by_id(&self, id: &str) -> Result<Option<MovieInfo>> {
        self.id_lookups.lock().unwrap().push(id.to_string());
        if self.failing {
            return Err(Error::RemoteProtocol("connection reset".to_string()));
        }
        Ok(self.by_id.get(id).cloned())
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<MovieInfo>> {
        let count = {
            let mut searches = self.searches.lock().unwrap();
            searches.push(title.to_string());
            searches.len()
        };
        if self.fail_on_search == Some(count) {
            if let Some(dir) = &self.cache_dir {
                let on_disk = CacheStore::open(dir).unwrap();
                *self.resolved_on_disk.lock().unwrap() = Some(resolved(&on_disk));
            }
            return Err(Error::RemoteProtocol("connection reset".to_string()));
        }
        if self.failing {
            return Err(Error::RemoteProtocol("connection reset".to_string()));
        }
        Ok(self.search_results.get(title).cloned().unwrap_or_default())
    }

    async fn complete(&self, candidate: &MovieInfo) -> Result<MovieInfo> {
        Ok(self
            .complete_results
            .get(&candidate.title)
            .cloned()
            .unwrap_or_else(|| candidate.clone()))
    }
}

#[derive(Default)]
struct FakeLookup {
    known: HashMap<String, OriginMatch>,
    failing: bool,
    calls: Mutex<Vec<(Vec<String>, usize)>>,
}

#[async_trait]
impl HashLookup for FakeLookup {
    async fn check_hashes(
        &self,
        hashes: &[String],
        batch_size: usize,
    ) -> Result<HashMap<String, Option<OriginMatch>>> {
        self.calls.lock().unwrap().push((hashes.to_vec(), batch_size));
        if self.failing {
            return Err(Error::RemoteProtocol("503 Service Unavailable".to_string()));
        }
        Ok(hashes
            .iter()
            .map(|h| (h.clone(), self.known.get(h).cloned()))
            .collect())
    }

    async fn insert_hashes(&self, _submissions: &[HashSubmission]) -> Result<()> {
        Ok(())
    }
}

fn write_movie(dir: &Path, name: &str, seed: u8) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![seed; MIN_FILE_SIZE as usize * 2]).unwrap();
    path
}

/// Records whose metadata was written, found or not.
fn resolved(cache: &CacheStore) -> usize {
    cache
        .hashes
        .values()
        .filter(|record| record.metadata.last_update.is_some())
        .count()
}

fn heat() -> MovieInfo {
    MovieInfo {
        id: "0113277".to_string(),
        title: "Heat".to_string(),
        year: Some(1995),
        genres: vec!["Crime".to_string(), "Drama".to_string()],
        directors: vec!["Michael Mann".to_string()],
        rating: Some(8.3),
        ..Default::default()
    }
}

fn heat_search_hit() -> MovieInfo {
    MovieInfo {
        source_key: Some("949".to_string()),
        title: "Heat".to_string(),
        year: Some(1995),
        ..Default::default()
    }
}

fn indexed_store(cache_dir: &Path, files: &[PathBuf]) -> CacheStore {
    let mut cache = CacheStore::open(cache_dir).unwrap();
    cache.update_paths(files).unwrap();
    cache
}

#[tokio::test]
async fn test_origin_lookup_is_batched_and_timestamped() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let file = write_movie(movies.path(), "unknown.avi", 1);
    let mut cache = indexed_store(cache_dir.path(), &[file.clone()]);
    let hash = fingerprint(&file).unwrap();

    let provider = FakeProvider::default();
    let lookup = FakeLookup::default();
    let resolver = MetadataResolver::new(&provider, &lookup, ResolverConfig::default());

    let matched = resolver.update_origin_info(&mut cache).await.unwrap();
    assert_eq!(matched, 0);

    let calls = lookup.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![(vec![hash.clone()], 150)]);

    let record = &cache.hashes[&hash];
    assert!(record.origin.checked_at.is_some());
    assert!(record.origin.remote_id.is_none());

    // recently checked fingerprints wait for the retry delay
    assert!(resolver.hashes_needing_origin(&cache).is_empty());
}

#[tokio::test]
async fn test_known_origin_resolves_by_identifier() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let file = write_movie(movies.path(), "cd1_final_v2.avi", 2);
    let mut cache = indexed_store(cache_dir.path(), &[file.clone()]);
    let hash = fingerprint(&file).unwrap();

    let provider = FakeProvider {
        by_id: HashMap::from([("0113277".to_string(), heat())]),
        ..Default::default()
    };
    let lookup = FakeLookup {
        known: HashMap::from([(
            hash.clone(),
            OriginMatch {
                remote_id: "0113277".to_string(),
                remote_title: "Heat".to_string(),
                remote_year: Some(1995),
            },
        )]),
        ..Default::default()
    };
    let resolver = MetadataResolver::new(&provider, &lookup, ResolverConfig::default());

    resolver.run(&mut cache).await.unwrap();

    let record = &cache.hashes[&hash];
    assert_eq!(record.origin.remote_id.as_deref(), Some("0113277"));
    assert!(record.origin.updated_at.is_some());
    assert_eq!(record.metadata.title.as_deref(), Some("Heat"));
    assert_eq!(record.metadata.directors, vec!["Michael Mann".to_string()]);
    assert!(!record.guess.unsure);
    assert!(record.metadata_checked_at.is_some());

    assert_eq!(provider.id_lookups.lock().unwrap().clone(), vec!["0113277"]);
    assert!(provider.searches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_origin_resolves_by_guessed_title() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let file = write_movie(movies.path(), "Heat.1995.DVDRip.avi", 3);
    let mut cache = indexed_store(cache_dir.path(), &[file.clone()]);
    let hash = fingerprint(&file).unwrap();

    let provider = FakeProvider {
        search_results: HashMap::from([("heat".to_string(), vec![heat_search_hit()])]),
        complete_results: HashMap::from([("Heat".to_string(), heat())]),
        ..Default::default()
    };
    let lookup = FakeLookup::default();
    let resolver = MetadataResolver::new(&provider, &lookup, ResolverConfig::default());

    resolver.run(&mut cache).await.unwrap();

    let record = &cache.hashes[&hash];
    assert_eq!(record.guess.title.as_deref(), Some("heat"));
    assert_eq!(record.guess.year, Some(1995));
    assert!(!record.guess.unsure);
    assert_eq!(record.metadata.id.as_deref(), Some("0113277"));
    assert_eq!(record.metadata.rating, Some(8.3));

    // nothing changed, so a second run fetches nothing
    resolver.run(&mut cache).await.unwrap();
    assert_eq!(provider.searches.lock().unwrap().len(), 1);

    let reloaded = CacheStore::open(cache_dir.path()).unwrap();
    assert_eq!(reloaded.hashes[&hash], cache.hashes[&hash]);
}

#[tokio::test]
async fn test_no_candidates_stores_not_found() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let file = write_movie(movies.path(), "Holiday.Video.2003.avi", 4);
    let mut cache = indexed_store(cache_dir.path(), &[file.clone()]);
    let hash = fingerprint(&file).unwrap();

    let provider = FakeProvider::default();
    let lookup = FakeLookup::default();
    let resolver = MetadataResolver::new(&provider, &lookup, ResolverConfig::default());

    resolver.run(&mut cache).await.unwrap();

    let record = &cache.hashes[&hash];
    assert_eq!(record.metadata.id.as_deref(), Some(NOT_FOUND_ID));
    assert!(record.is_not_found());
    assert!(record.guess.unsure);
}

#[tokio::test]
async fn test_unknown_identifier_stores_not_found() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let file = write_movie(movies.path(), "movie.avi", 5);
    let mut cache = indexed_store(cache_dir.path(), &[file.clone()]);
    let hash = fingerprint(&file).unwrap();

    let provider = FakeProvider::default();
    let lookup = FakeLookup {
        known: HashMap::from([(
            hash.clone(),
            OriginMatch {
                remote_id: "9999999".to_string(),
                remote_title: "Lost Movie".to_string(),
                remote_year: None,
            },
        )]),
        ..Default::default()
    };
    let resolver = MetadataResolver::new(&provider, &lookup, ResolverConfig::default());

    resolver.run(&mut cache).await.unwrap();

    let record = &cache.hashes[&hash];
    assert!(record.is_not_found());
    assert!(record.guess.unsure);
}

#[tokio::test]
async fn test_lookup_failure_counts_as_no_data() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let file = write_movie(movies.path(), "Heat.1995.avi", 6);
    let mut cache = indexed_store(cache_dir.path(), &[file.clone()]);
    let hash = fingerprint(&file).unwrap();

    let provider = FakeProvider {
        search_results: HashMap::from([("heat".to_string(), vec![heat_search_hit()])]),
        complete_results: HashMap::from([("Heat".to_string(), heat())]),
        ..Default::default()
    };
    let lookup = FakeLookup {
        failing: true,
        ..Default::default()
    };
    let resolver = MetadataResolver::new(&provider, &lookup, ResolverConfig::default());

    resolver.run(&mut cache).await.unwrap();

    let record = &cache.hashes[&hash];
    assert!(record.origin.checked_at.is_some());
    assert!(!record.has_origin());
    assert_eq!(record.metadata.title.as_deref(), Some("Heat"));
}

#[tokio::test]
async fn test_provider_failure_aborts_and_keeps_progress() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let first = write_movie(movies.path(), "Heat.1995.avi", 7);

    // first run resolves one movie
    let mut cache = indexed_store(cache_dir.path(), &[first.clone()]);
    let working = FakeProvider {
        search_results: HashMap::from([("heat".to_string(), vec![heat_search_hit()])]),
        complete_results: HashMap::from([("Heat".to_string(), heat())]),
        ..Default::default()
    };
    let lookup = FakeLookup::default();
    MetadataResolver::new(&working, &lookup, ResolverConfig::default())
        .run(&mut cache)
        .await
        .unwrap();

    // second run meets a broken provider
    let second = write_movie(movies.path(), "Alien.1979.avi", 8);
    cache.update_paths(&[first.clone(), second.clone()]).unwrap();
    let broken = FakeProvider {
        failing: true,
        ..Default::default()
    };
    let config = ResolverConfig {
        checkpoint_every: 1,
        ..Default::default()
    };
    let err = MetadataResolver::new(&broken, &lookup, config)
        .run(&mut cache)
        .await
        .unwrap_err();

    match err {
        Error::RemoteConnection { movie, .. } => assert_eq!(movie, "alien"),
        other => panic!("unexpected error: {other:?}"),
    }

    let reloaded = CacheStore::open(cache_dir.path()).unwrap();
    let first_hash = fingerprint(&first).unwrap();
    let second_hash = fingerprint(&second).unwrap();
    assert_eq!(reloaded.hashes[&first_hash].metadata.title.as_deref(), Some("Heat"));
    assert!(reloaded.hashes[&second_hash].metadata.id.is_none());
    assert!(reloaded.hashes[&second_hash].origin.checked_at.is_some());
}

#[tokio::test]
async fn test_missing_files_are_not_resolved() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let file = write_movie(movies.path(), "Heat.1995.avi", 9);
    let mut cache = indexed_store(cache_dir.path(), &[file.clone()]);
    fs::remove_file(&file).unwrap();

    let provider = FakeProvider::default();
    let lookup = FakeLookup::default();
    let resolver = MetadataResolver::new(&provider, &lookup, ResolverConfig::default());

    assert!(resolver.hashes_needing_metadata(&cache).is_empty());
    assert_eq!(resolver.update_metadata(&mut cache).await.unwrap(), 0);
    assert!(provider.searches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_progress_is_saved_every_ten_movies() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let files: Vec<PathBuf> = (1..=12u8)
        .map(|i| write_movie(movies.path(), &format!("Home.Video.{:02}.avi", i), 20 + i))
        .collect();
    let mut cache = indexed_store(cache_dir.path(), &files);
    assert_eq!(cache.hashes.len(), 12);

    let provider = FakeProvider {
        fail_on_search: Some(12),
        cache_dir: Some(cache_dir.path().to_path_buf()),
        ..Default::default()
    };
    let lookup = FakeLookup::default();
    let resolver = MetadataResolver::new(&provider, &lookup, ResolverConfig::default());

    let err = resolver.run(&mut cache).await.unwrap_err();
    assert!(matches!(err, Error::RemoteConnection { .. }));

    // the tenth movie triggered a save, the eleventh was only in memory
    assert_eq!(*provider.resolved_on_disk.lock().unwrap(), Some(10));

    let reloaded = CacheStore::open(cache_dir.path()).unwrap();
    assert_eq!(resolved(&reloaded), 11);
}

#[tokio::test]
async fn test_match_without_identifier_stores_not_found() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let file = write_movie(movies.path(), "Heat.1995.avi", 40);
    let mut cache = indexed_store(cache_dir.path(), &[file.clone()]);
    let hash = fingerprint(&file).unwrap();

    // completing the hit adds nothing, so it has no IMDb identifier
    let provider = FakeProvider {
        search_results: HashMap::from([("heat".to_string(), vec![heat_search_hit()])]),
        ..Default::default()
    };
    let lookup = FakeLookup::default();
    let resolver = MetadataResolver::new(&provider, &lookup, ResolverConfig::default());

    resolver.run(&mut cache).await.unwrap();

    let record = &cache.hashes[&hash];
    assert!(record.is_not_found());
    assert!(record.guess.unsure);
    assert_eq!(record.guess.title.as_deref(), Some("heat"));
}
