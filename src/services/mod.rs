//! Remote services: movie metadata, fingerprint lookup and subtitles.
//!
//! The resolver and the CLI only see the traits below, so tests can swap
//! the network clients for in-memory fakes.

pub mod opensubtitles;
pub mod tmdb;
pub mod xmlrpc;

use crate::models::movie::{HashSubmission, MovieInfo, OriginMatch};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Title and identifier based movie metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Full metadata for an IMDb-style identifier, `None` if unknown.
    async fn get_by_id(&self, id: &str) -> Result<Option<MovieInfo>>;

    /// Candidates for a free-text title, in provider relevance order.
    ///
    /// Candidates may be partial; see [`MetadataProvider::complete`].
    async fn search_by_title(&self, title: &str) -> Result<Vec<MovieInfo>>;

    /// Fill a search candidate with the full metadata.
    async fn complete(&self, candidate: &MovieInfo) -> Result<MovieInfo>;
}

/// Batched fingerprint to movie lookup.
#[async_trait]
pub trait HashLookup: Send + Sync {
    /// Look fingerprints up, at most `batch_size` per remote call.
    ///
    /// Every requested fingerprint is present in the result, with `None`
    /// when the service knows nothing about it.
    async fn check_hashes(
        &self,
        hashes: &[String],
        batch_size: usize,
    ) -> Result<HashMap<String, Option<OriginMatch>>>;

    /// Teach the service which movie a fingerprint belongs to.
    async fn insert_hashes(&self, submissions: &[HashSubmission]) -> Result<()>;
}

/// One subtitle search query.
#[derive(Debug, Clone, PartialEq)]
pub enum SubtitleQuery {
    /// By file fingerprint and size.
    Hash {
        language: String,
        fingerprint: String,
        byte_size: u64,
    },
    /// By IMDb-style identifier.
    Movie { language: String, movie_id: String },
}

/// A subtitle search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleHit {
    /// Subtitle file identifier, used for download.
    pub file_id: String,
    /// Fingerprint of the movie file the subtitle was made for.
    pub movie_hash: Option<String>,
    /// IMDb-style identifier of the movie.
    pub movie_id: Option<String>,
    /// How many times it was downloaded.
    pub downloads: u64,
}

/// Subtitle search and download.
#[async_trait]
pub trait SubtitleService: Send + Sync {
    /// Run every query and return all hits.
    async fn search_subtitles(&self, queries: &[SubtitleQuery]) -> Result<Vec<SubtitleHit>>;

    /// Download subtitle files by id, as decoded text bytes.
    async fn download_subtitles(&self, file_ids: &[String]) -> Result<HashMap<String, Vec<u8>>>;
}
