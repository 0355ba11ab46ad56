//! TMDB API client.
//!
//! Movies are identified by their IMDb number everywhere else in the crate,
//! so lookups by identifier go through TMDB's `find` endpoint and completed
//! movies carry the IMDb number (without `tt`) as their id.

use super::MetadataProvider;
use crate::models::config::TmdbConfig;
use crate::models::movie::MovieInfo;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Poster size used for cover URLs.
const POSTER_SIZE: &str = "w342";

/// Cast members kept per movie.
const MAX_CAST: usize = 15;

/// TMDB API client.
pub struct TmdbClient {
    api_key: String,
    language: String,
    /// Whether to use Bearer token authentication (API v4 style)
    use_bearer: bool,
    client: reqwest::Client,
}

/// Movie search result.
#[derive(Debug, Deserialize)]
pub struct MovieSearchResult {
    pub results: Vec<MovieSearchItem>,
}

/// Result of a lookup by external identifier.
#[derive(Debug, Deserialize)]
pub struct FindResult {
    #[serde(default)]
    pub movie_results: Vec<MovieSearchItem>,
}

/// Movie search item.
#[derive(Debug, Deserialize)]
pub struct MovieSearchItem {
    pub id: u64,
    pub title: String,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub vote_count: Option<u32>,
    pub vote_average: Option<f32>,
}

/// Movie details.
#[derive(Debug, Deserialize)]
pub struct MovieDetails {
    pub id: u64,
    pub imdb_id: Option<String>,
    pub title: String,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    pub overview: Option<String>,
    pub tagline: Option<String>,
    pub vote_average: Option<f32>,
    pub vote_count: Option<u32>,
    pub poster_path: Option<String>,
    pub genres: Option<Vec<Genre>>,
    pub production_countries: Option<Vec<ProductionCountry>>,
    pub credits: Option<Credits>,
    pub alternative_titles: Option<AlternativeTitles>,
}

/// Genre.
#[derive(Debug, Deserialize)]
pub struct Genre {
    pub name: String,
}

/// Production country.
#[derive(Debug, Deserialize)]
pub struct ProductionCountry {
    pub iso_3166_1: String,
    pub name: String,
}

/// Titles a movie is known under in other countries.
#[derive(Debug, Deserialize)]
pub struct AlternativeTitles {
    #[serde(default)]
    pub titles: Vec<AlternativeTitle>,
}

/// One alternative title.
#[derive(Debug, Deserialize)]
pub struct AlternativeTitle {
    pub iso_3166_1: String,
    pub title: String,
}

/// Movie credits.
#[derive(Debug, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

/// Cast member.
#[derive(Debug, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub order: Option<u32>,
}

/// Crew member.
#[derive(Debug, Deserialize)]
pub struct CrewMember {
    pub name: String,
    pub job: String,
}

impl TmdbClient {
    /// Create a new TMDB client.
    /// Supports both API key (v3) and Bearer token (v4) formats.
    pub fn new(config: &TmdbConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or(Error::TmdbApiKeyMissing)?;

        // Bearer tokens start with "eyJ" (base64 encoded JWT header)
        let use_bearer = api_key.starts_with("eyJ");

        Ok(Self {
            api_key,
            language: config.language.clone(),
            use_bearer,
            client: reqwest::Client::new(),
        })
    }

    /// Build a request with proper authentication.
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        if self.use_bearer {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        } else {
            request
        }
    }

    /// Build URL with optional api_key parameter (only for v3 style).
    fn build_url(&self, path: &str, extra_params: &str) -> String {
        if self.use_bearer {
            format!(
                "{}/{}?language={}{}",
                TMDB_BASE_URL, path, self.language, extra_params
            )
        } else {
            format!(
                "{}/{}?api_key={}&language={}{}",
                TMDB_BASE_URL, path, self.api_key, self.language, extra_params
            )
        }
    }

    /// Search for movies.
    pub async fn search_movie(&self, query: &str) -> Result<Vec<MovieSearchItem>> {
        let url = self.build_url(
            "search/movie",
            &format!("&query={}", urlencoding::encode(query)),
        );
        let resp: MovieSearchResult = self
            .build_request(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.results)
    }

    /// Find movies by IMDb identifier (`tt` prefixed).
    pub async fn find_by_imdb_id(&self, imdb_id: &str) -> Result<Vec<MovieSearchItem>> {
        let url = self.build_url(&format!("find/{}", imdb_id), "&external_source=imdb_id");
        let resp: FindResult = self
            .build_request(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.movie_results)
    }

    /// Get movie details with credits and alternative titles.
    pub async fn get_movie_details(&self, movie_id: u64) -> Result<MovieDetails> {
        let url = self.build_url(
            &format!("movie/{}", movie_id),
            "&append_to_response=credits,alternative_titles",
        );
        let resp = self
            .build_request(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    async fn get_by_id(&self, id: &str) -> Result<Option<MovieInfo>> {
        let imdb_id = imdb_tag(id);
        tracing::debug!("TMDB lookup for {}", imdb_id);

        match self.find_by_imdb_id(&imdb_id).await?.first() {
            Some(item) => Ok(Some(self.get_movie_details(item.id).await?.into())),
            None => Ok(None),
        }
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<MovieInfo>> {
        tracing::debug!("TMDB search for [{}]", title);
        let results = self.search_movie(title).await?;
        Ok(results.into_iter().map(MovieInfo::from).collect())
    }

    async fn complete(&self, candidate: &MovieInfo) -> Result<MovieInfo> {
        if let Some(tmdb_id) = candidate.source_key.as_deref().and_then(|k| k.parse().ok()) {
            return Ok(self.get_movie_details(tmdb_id).await?.into());
        }
        if !candidate.id.is_empty() {
            if let Some(found) = self.get_by_id(&candidate.id).await? {
                return Ok(found);
            }
        }
        Ok(candidate.clone())
    }
}

/// `133093` or `tt0133093` to `tt0133093`.
pub fn imdb_tag(id: &str) -> String {
    format!("tt{:0>7}", id.trim().trim_start_matches("tt"))
}

/// Year of a `YYYY-MM-DD` date.
fn year_of(date: Option<&str>) -> Option<u16> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn poster_url(poster_path: Option<&str>) -> Option<String> {
    poster_path.map(|p| format!("https://image.tmdb.org/t/p/{}{}", POSTER_SIZE, p))
}

/// Original title, when it differs from the display title.
fn original_title_variant(title: &str, original: Option<&str>) -> Option<String> {
    original.filter(|o| *o != title).map(str::to_string)
}

impl From<MovieSearchItem> for MovieInfo {
    fn from(item: MovieSearchItem) -> Self {
        MovieInfo {
            id: String::new(),
            source_key: Some(item.id.to_string()),
            year: year_of(item.release_date.as_deref()),
            alternate_titles: original_title_variant(&item.title, item.original_title.as_deref())
                .into_iter()
                .collect(),
            plot_outline: item.overview,
            rating: item.vote_average,
            votes: item.vote_count,
            cover_url: poster_url(item.poster_path.as_deref()),
            title: item.title,
            ..Default::default()
        }
    }
}

impl From<MovieDetails> for MovieInfo {
    fn from(details: MovieDetails) -> Self {
        let id = match details.imdb_id.as_deref() {
            Some(imdb) => imdb.trim_start_matches("tt").to_string(),
            None => {
                tracing::warn!("TMDB movie {} has no IMDb id", details.id);
                String::new()
            }
        };

        let mut alternate_titles: Vec<String> =
            original_title_variant(&details.title, details.original_title.as_deref())
                .into_iter()
                .collect();
        if let Some(alternatives) = details.alternative_titles {
            alternate_titles.extend(
                alternatives
                    .titles
                    .into_iter()
                    .map(|t| format!("{}::{}", t.title, t.iso_3166_1)),
            );
        }

        let (directors, mut cast) = match details.credits {
            Some(credits) => (
                credits
                    .crew
                    .into_iter()
                    .filter(|c| c.job == "Director")
                    .map(|c| c.name)
                    .collect(),
                credits.cast,
            ),
            None => (Vec::new(), Vec::new()),
        };
        cast.sort_by_key(|c| c.order.unwrap_or(u32::MAX));

        MovieInfo {
            id,
            source_key: Some(details.id.to_string()),
            canonical_title: None,
            year: year_of(details.release_date.as_deref()),
            alternate_titles,
            genres: details
                .genres
                .unwrap_or_default()
                .into_iter()
                .map(|g| g.name)
                .collect(),
            countries: details
                .production_countries
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.name)
                .collect(),
            directors,
            cast: cast.into_iter().take(MAX_CAST).map(|c| c.name).collect(),
            plot_outline: details
                .tagline
                .filter(|t| !t.is_empty())
                .or_else(|| details.overview.clone()),
            plot: details.overview,
            rating: details.vote_average,
            votes: details.vote_count,
            cover_url: poster_url(details.poster_path.as_deref()),
            title: details.title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imdb_tag_pads() {
        assert_eq!(imdb_tag("133093"), "tt0133093");
        assert_eq!(imdb_tag("tt0133093"), "tt0133093");
        assert_eq!(imdb_tag("10872600"), "tt10872600");
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let config = TmdbConfig {
            api_key: None,
            language: "en-US".to_string(),
        };
        assert!(matches!(TmdbClient::new(&config), Err(Error::TmdbApiKeyMissing)));
    }

    #[test]
    fn test_search_item_conversion() {
        let item: MovieSearchItem = serde_json::from_str(
            r#"{"id": 101, "title": "Leon: The Professional", "original_title": "Léon",
                "release_date": "1994-09-14", "vote_average": 8.3, "vote_count": 14000,
                "poster_path": "/p.jpg"}"#,
        )
        .unwrap();
        let info = MovieInfo::from(item);

        assert!(info.id.is_empty());
        assert_eq!(info.source_key.as_deref(), Some("101"));
        assert_eq!(info.year, Some(1994));
        assert_eq!(info.alternate_titles, vec!["Léon".to_string()]);
        assert_eq!(
            info.cover_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w342/p.jpg")
        );
    }

    #[test]
    fn test_details_conversion() {
        let details: MovieDetails = serde_json::from_str(
            r#"{
                "id": 603, "imdb_id": "tt0133093", "title": "The Matrix",
                "original_title": "The Matrix", "release_date": "1999-03-30",
                "overview": "A hacker learns the truth.", "tagline": "",
                "genres": [{"id": 28, "name": "Action"}],
                "production_countries": [{"iso_3166_1": "US", "name": "United States of America"}],
                "credits": {
                    "cast": [
                        {"id": 2, "name": "Laurence Fishburne", "order": 1},
                        {"id": 1, "name": "Keanu Reeves", "order": 0}
                    ],
                    "crew": [
                        {"id": 3, "name": "Lana Wachowski", "job": "Director", "department": "Directing"},
                        {"id": 4, "name": "Joel Silver", "job": "Producer", "department": "Production"}
                    ]
                },
                "alternative_titles": {"titles": [{"iso_3166_1": "FR", "title": "Matrix"}]}
            }"#,
        )
        .unwrap();
        let info = MovieInfo::from(details);

        assert_eq!(info.id, "0133093");
        assert_eq!(info.year, Some(1999));
        assert_eq!(info.directors, vec!["Lana Wachowski".to_string()]);
        assert_eq!(info.cast[0], "Keanu Reeves");
        assert_eq!(info.alternate_titles, vec!["Matrix::FR".to_string()]);
        assert_eq!(info.plot_outline.as_deref(), Some("A hacker learns the truth."));
        assert_eq!(info.smart_canonical_title(), "Matrix, The");
    }
}
