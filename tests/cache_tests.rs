//! Integration tests for fingerprinting and the persistent caches.
//!
//! Tests cover:
//! - Fingerprint determinism and the size limit
//! - Path updates, reuse of cached fingerprints and null fingerprints
//! - Persist-then-reload round trips
//! - Referential integrity after deletion

use list_movies::core::cache::{CacheStore, HASH_CACHE_FILE, PATH_CACHE_FILE};
use list_movies::core::fingerprint::{fingerprint, MIN_FILE_SIZE};
use list_movies::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a fingerprintable file filled with `seed`.
fn write_movie(dir: &Path, name: &str, seed: u8) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![seed; MIN_FILE_SIZE as usize + 1024]).unwrap();
    path
}

#[test]
fn test_fingerprint_is_deterministic() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_movie(temp_dir.path(), "movie.mkv", 3);

    let first = fingerprint(&path).unwrap();
    let second = fingerprint(&path).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 16);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_small_files_never_fingerprint() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tiny.avi");
    fs::write(&path, vec![1u8; 1000]).unwrap();

    let err = fingerprint(&path).unwrap_err();
    assert!(matches!(err, Error::FileTooSmall { size: 1000, .. }));
    assert!(err.is_fingerprint_failure());
}

#[test]
fn test_same_head_and_tail_share_fingerprint() {
    let temp_dir = TempDir::new().unwrap();
    let size = MIN_FILE_SIZE as usize * 3;
    let mut a = vec![9u8; size];
    let mut b = vec![9u8; size];
    a[size / 2] = 0;
    b[size / 2] = 255;
    fs::write(temp_dir.path().join("a.mkv"), &a).unwrap();
    fs::write(temp_dir.path().join("b.mkv"), &b).unwrap();

    assert_eq!(
        fingerprint(&temp_dir.path().join("a.mkv")).unwrap(),
        fingerprint(&temp_dir.path().join("b.mkv")).unwrap()
    );
}

#[test]
fn test_update_paths_creates_records() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let movie = write_movie(movies.path(), "movie.mkv", 1);
    let tiny = movies.path().join("tiny.mkv");
    fs::write(&tiny, b"too small").unwrap();

    let mut cache = CacheStore::open(cache_dir.path()).unwrap();
    let summary = cache.update_paths(&[movie.clone(), tiny.clone()]).unwrap();

    assert_eq!(summary.hashed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.new_records, 1);

    let hash = cache.fingerprint_for_path(&movie).unwrap().to_string();
    let record = &cache.hashes[&hash];
    assert_eq!(record.byte_size, Some(MIN_FILE_SIZE + 1024));
    assert!(record.metadata.id.is_none());

    // tracked but unresolvable
    assert!(cache.paths.contains_key(&tiny));
    assert!(cache.fingerprint_for_path(&tiny).is_none());

    assert!(cache_dir.path().join(PATH_CACHE_FILE).exists());
    assert!(cache_dir.path().join(HASH_CACHE_FILE).exists());
}

#[test]
fn test_unmodified_files_reuse_fingerprint() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let movie = write_movie(movies.path(), "movie.mkv", 1);

    let mut cache = CacheStore::open(cache_dir.path()).unwrap();
    cache.update_paths(&[movie.clone()]).unwrap();
    let summary = cache.update_paths(&[movie]).unwrap();

    assert_eq!(summary.reused, 1);
    assert_eq!(summary.hashed, 0);
}

#[test]
fn test_two_paths_one_record() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let a = write_movie(movies.path(), "a.mkv", 5);
    let b = write_movie(movies.path(), "copy of a.avi", 5);

    let mut cache = CacheStore::open(cache_dir.path()).unwrap();
    let summary = cache.update_paths(&[a.clone(), b.clone()]).unwrap();

    assert_eq!(summary.new_records, 1);
    assert_eq!(cache.hashes.len(), 1);
    assert_eq!(cache.fingerprint_for_path(&a), cache.fingerprint_for_path(&b));
}

#[test]
fn test_persist_then_reload_round_trips() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let movie = write_movie(movies.path(), "movie.mkv", 7);

    let mut cache = CacheStore::open(cache_dir.path()).unwrap();
    cache.update_paths(&[movie.clone()]).unwrap();
    let hash = cache.fingerprint_for_path(&movie).unwrap().to_string();
    {
        let record = cache.hashes.get_mut(&hash).unwrap();
        record.metadata.title = Some("Heat".to_string());
        record.metadata.rating = Some(8.3);
        record.metadata.genres = vec!["Crime".to_string()];
        record.guess.unsure = true;
    }
    cache.save().unwrap();

    let reloaded = CacheStore::open(cache_dir.path()).unwrap();
    assert_eq!(reloaded.paths, cache.paths);
    assert_eq!(reloaded.hashes, cache.hashes);
}

#[test]
fn test_delete_prunes_unreferenced_records() {
    let movies = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let a = write_movie(movies.path(), "a.mkv", 1);
    let b = write_movie(movies.path(), "b.mkv", 2);

    let mut cache = CacheStore::open(cache_dir.path()).unwrap();
    cache.update_paths(&[a.clone(), b.clone()]).unwrap();
    let hash_a = cache.fingerprint_for_path(&a).unwrap().to_string();

    let removed = cache.delete(&[a.clone()]).unwrap();
    assert_eq!(removed, 1);
    assert!(!cache.hashes.contains_key(&hash_a));
    assert_eq!(cache.hashes.len(), 1);

    // every remaining fingerprint points to a record
    for entry in cache.paths.values() {
        if let Some(hash) = &entry.fingerprint {
            assert!(cache.hashes.contains_key(hash));
        }
    }

    let reloaded = CacheStore::open(cache_dir.path()).unwrap();
    assert!(!reloaded.paths.contains_key(&a));
    assert!(reloaded.paths.contains_key(&b));
}

#[test]
fn test_reset_removes_store_files() {
    let cache_dir = TempDir::new().unwrap();
    let mut cache = CacheStore::open(cache_dir.path()).unwrap();
    cache.save().unwrap();

    CacheStore::reset(cache_dir.path()).unwrap();
    assert!(!cache_dir.path().join(PATH_CACHE_FILE).exists());
    assert!(!cache_dir.path().join(HASH_CACHE_FILE).exists());
}
