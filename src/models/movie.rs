//! Movie data returned by the remote services.

use serde::{Deserialize, Serialize};

/// Leading articles moved to the end of a canonical title.
const ARTICLES: &[&str] = &["the", "a", "an"];

/// Movie metadata as returned by a metadata provider.
///
/// Search hits only carry the fields the provider search returns (title,
/// year, alternate titles and the provider key); a full lookup fills the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieInfo {
    /// IMDb-style identifier, without the `tt` prefix. Empty for search hits.
    pub id: String,
    /// Provider-specific key used to complete a search hit.
    pub source_key: Option<String>,
    /// Display title.
    pub title: String,
    /// Provider canonical title, when it has one.
    pub canonical_title: Option<String>,
    /// Release year.
    pub year: Option<u16>,
    /// Other known titles (original title, AKAs).
    pub alternate_titles: Vec<String>,
    /// Genres.
    pub genres: Vec<String>,
    /// Production countries.
    pub countries: Vec<String>,
    /// Directors.
    pub directors: Vec<String>,
    /// Main cast.
    pub cast: Vec<String>,
    /// Short plot outline.
    pub plot_outline: Option<String>,
    /// Long plot summary.
    pub plot: Option<String>,
    /// User rating (0-10).
    pub rating: Option<f32>,
    /// Vote count.
    pub votes: Option<u32>,
    /// Cover image URL.
    pub cover_url: Option<String>,
}

impl MovieInfo {
    /// All titles a filename may have been derived from, primary title last.
    pub fn title_variants(&self) -> impl Iterator<Item = &str> {
        self.alternate_titles
            .iter()
            .map(|t| t.as_str())
            .chain(std::iter::once(self.title.as_str()))
    }

    /// Canonical title, derived from the title when the provider has none.
    pub fn smart_canonical_title(&self) -> String {
        self.canonical_title
            .clone()
            .unwrap_or_else(|| canonical_title(&self.title))
    }
}

/// Build a sortable title: `The Matrix` becomes `Matrix, The`.
pub fn canonical_title(title: &str) -> String {
    let title = title.trim();
    if let Some((first, rest)) = title.split_once(' ') {
        if ARTICLES.contains(&first.to_lowercase().as_str()) && !rest.trim().is_empty() {
            return format!("{}, {}", rest.trim(), first);
        }
    }
    title.to_string()
}

/// Origin data a hash lookup service knows about a fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginMatch {
    /// IMDb-style identifier.
    pub remote_id: String,
    /// Movie title as known by the service.
    pub remote_title: String,
    /// Release year as known by the service.
    pub remote_year: Option<u16>,
}

/// A `(fingerprint, size, identifier)` triple sent back to the hash service.
#[derive(Debug, Clone, PartialEq)]
pub struct HashSubmission {
    pub fingerprint: String,
    pub byte_size: u64,
    pub movie_id: String,
}
