//! Records held by the two persistent caches.
//!
//! Every field has a serde default so stores written by older versions (or
//! missing keys) load without error.

use super::movie::MovieInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a confirmed "not found" metadata lookup.
pub const NOT_FOUND_ID: &str = "000000";

/// Title stored for a confirmed "not found" metadata lookup.
pub const NOT_FOUND_TITLE: &str = "___NOTFOUND___";

/// PathIndex entry: what we know about one absolute path.
///
/// The default `last_indexed_at` is the Unix epoch, so a defaulted entry is
/// always considered stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaFile {
    /// Content fingerprint, `None` when the file could not be hashed.
    pub fingerprint: Option<String>,
    /// When the path was last (re)hashed.
    pub last_indexed_at: DateTime<Utc>,
}

/// HashStore entry: everything resolved for one fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieRecord {
    /// File size in bytes.
    pub byte_size: Option<u64>,
    /// Last time the metadata provider was asked about this fingerprint.
    pub metadata_checked_at: Option<DateTime<Utc>>,
    /// Canonical metadata.
    pub metadata: MovieMetadata,
    /// What the hash lookup service knows.
    pub origin: OriginInfo,
    /// What was guessed from the filename.
    pub guess: GuessInfo,
}

/// Canonical metadata block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub canonical_title: Option<String>,
    pub rating: Option<f32>,
    pub year: Option<u16>,
    pub genres: Vec<String>,
    pub countries: Vec<String>,
    pub directors: Vec<String>,
    pub short_summary: Option<String>,
    pub summary: Option<String>,
    pub cast: Vec<String>,
    pub votes: Option<u32>,
    pub cover_url: Option<String>,
    /// Last time this block was written.
    pub last_update: Option<DateTime<Utc>>,
}

/// Origin-service block, filled by the hash lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginInfo {
    pub remote_id: Option<String>,
    pub remote_title: Option<String>,
    pub remote_year: Option<u16>,
    /// Last time the service was asked, match or not.
    pub checked_at: Option<DateTime<Utc>>,
    /// Last time the service returned data for this fingerprint.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Guess block, filled from the filename and the fuzzy match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuessInfo {
    pub title: Option<String>,
    pub year: Option<u16>,
    pub unsure: bool,
}

impl MovieRecord {
    /// Fresh record for a newly seen fingerprint.
    pub fn new(byte_size: u64) -> Self {
        Self {
            byte_size: Some(byte_size),
            ..Default::default()
        }
    }

    /// Whether the metadata provider confirmed it knows nothing about this file.
    pub fn is_not_found(&self) -> bool {
        self.metadata.id.as_deref() == Some(NOT_FOUND_ID)
    }

    /// Whether the hash lookup service matched this fingerprint.
    pub fn has_origin(&self) -> bool {
        self.origin.remote_title.is_some()
    }

    /// Size in megabytes, if known.
    pub fn size_mb(&self) -> Option<f64> {
        self.byte_size.map(|b| b as f64 / (1024.0 * 1024.0))
    }

    /// Overwrite the metadata block with a provider result.
    pub fn fill_metadata(&mut self, found: &MovieInfo, now: DateTime<Utc>) {
        self.metadata = MovieMetadata {
            id: Some(found.id.clone()),
            title: Some(found.title.clone()),
            canonical_title: Some(found.smart_canonical_title()),
            rating: found.rating,
            year: found.year,
            genres: found.genres.clone(),
            countries: found.countries.clone(),
            directors: found.directors.clone(),
            short_summary: found.plot_outline.clone(),
            summary: found.plot.clone(),
            cast: found.cast.clone(),
            votes: found.votes,
            cover_url: found.cover_url.clone(),
            last_update: Some(now),
        };
    }

    /// Store a match chosen by the user: the guess becomes the movie itself.
    pub fn confirm(&mut self, found: &MovieInfo, now: DateTime<Utc>) {
        self.fill_metadata(found, now);
        self.guess = GuessInfo {
            title: Some(found.title.clone()),
            year: found.year,
            unsure: false,
        };
    }

    /// Overwrite the metadata block with the "not found" placeholder.
    pub fn fill_not_found(&mut self, now: DateTime<Utc>) {
        self.metadata = MovieMetadata {
            id: Some(NOT_FOUND_ID.to_string()),
            title: Some(NOT_FOUND_TITLE.to_string()),
            canonical_title: Some(NOT_FOUND_TITLE.to_string()),
            rating: Some(0.0),
            year: Some(1900),
            genres: Vec::new(),
            countries: Vec::new(),
            directors: Vec::new(),
            short_summary: Some(".".repeat(20)),
            summary: Some(".".repeat(20)),
            cast: Vec::new(),
            votes: Some(0),
            cover_url: None,
            last_update: Some(now),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_only_has_size() {
        let record = MovieRecord::new(42);
        assert_eq!(record.byte_size, Some(42));
        assert!(record.metadata.id.is_none());
        assert!(record.origin.checked_at.is_none());
        assert!(!record.guess.unsure);
    }

    #[test]
    fn test_missing_keys_load_with_defaults() {
        let record: MovieRecord =
            serde_json::from_str(r#"{"byte_size": 10, "metadata": {"title": "Alien"}}"#).unwrap();
        assert_eq!(record.byte_size, Some(10));
        assert_eq!(record.metadata.title.as_deref(), Some("Alien"));
        assert!(record.metadata.genres.is_empty());
        assert!(record.origin.remote_id.is_none());

        let file: MediaFile = serde_json::from_str("{}").unwrap();
        assert_eq!(file, MediaFile::default());
    }

    #[test]
    fn test_fill_not_found() {
        let mut record = MovieRecord::new(1);
        record.fill_not_found(Utc::now());
        assert!(record.is_not_found());
        assert_eq!(record.metadata.rating, Some(0.0));
        assert!(record.metadata.last_update.is_some());
    }

    #[test]
    fn test_fill_metadata_derives_canonical_title() {
        let mut record = MovieRecord::new(1);
        let info = MovieInfo {
            id: "0133093".to_string(),
            title: "The Matrix".to_string(),
            genres: vec!["Action".to_string()],
            rating: Some(8.7),
            ..Default::default()
        };
        record.fill_metadata(&info, Utc::now());
        assert_eq!(record.metadata.id.as_deref(), Some("0133093"));
        assert_eq!(record.metadata.canonical_title.as_deref(), Some("Matrix, The"));
        assert_eq!(record.metadata.genres, vec!["Action".to_string()]);
    }

    #[test]
    fn test_confirm_clears_unsure() {
        let mut record = MovieRecord::new(1);
        record.guess.unsure = true;
        let info = MovieInfo {
            id: "0110413".to_string(),
            title: "Léon".to_string(),
            year: Some(1994),
            ..Default::default()
        };
        record.confirm(&info, Utc::now());
        assert!(!record.guess.unsure);
        assert_eq!(record.guess.title.as_deref(), Some("Léon"));
        assert_eq!(record.guess.year, Some(1994));
        assert_eq!(record.metadata.id.as_deref(), Some("0110413"));
    }
}
