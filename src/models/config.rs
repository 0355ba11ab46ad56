//! Configuration model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the configuration file inside the cache directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding both caches, the log file and the HTML summary.
    pub cache_dir: PathBuf,
    /// TMDB configuration.
    pub tmdb: TmdbConfig,
    /// OpenSubtitles configuration.
    pub opensubtitles: OpenSubtitlesConfig,
    /// Metadata resolution settings.
    pub resolver: ResolverConfig,
}

/// TMDB configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    /// API key or v4 bearer token.
    pub api_key: Option<String>,
    /// Language for responses.
    pub language: String,
}

/// OpenSubtitles XML-RPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSubtitlesConfig {
    /// XML-RPC endpoint.
    pub endpoint: String,
    /// User agent registered with OpenSubtitles.
    pub user_agent: String,
    /// Account name (anonymous login when empty).
    pub username: String,
    /// Account password.
    pub password: String,
    /// Interface language sent at login.
    pub language: String,
}

/// Settings of the metadata resolution pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum fingerprints per hash lookup call.
    pub lookup_batch_size: usize,
    /// Hours to wait before asking again for an unknown fingerprint.
    pub lookup_retry_hours: i64,
    /// Persist both caches every N resolved fingerprints.
    pub checkpoint_every: usize,
    /// Similarity under which a match is flagged unsure.
    pub unsure_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            tmdb: TmdbConfig::default(),
            opensubtitles: OpenSubtitlesConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("TMDB_API_KEY").ok(),
            language: "en-US".to_string(),
        }
    }
}

impl Default for OpenSubtitlesConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://api.opensubtitles.org/xml-rpc".to_string(),
            // OpenSubtitles rejects unknown agents, keep it registered
            user_agent: "lm v2.0".to_string(),
            username: String::new(),
            password: String::new(),
            language: "en".to_string(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lookup_batch_size: 150,
            lookup_retry_hours: 6,
            checkpoint_every: 10,
            unsure_threshold: 0.7,
        }
    }
}

/// Get the cache directory path (`LM_CACHE_DIR` or `~/.lm`).
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LM_CACHE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lm")
}

/// Load configuration from file.
pub fn load_config() -> Config {
    let config_path = default_cache_dir().join(CONFIG_FILE_NAME);

    if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Ignoring invalid {}: {}", config_path.display(), e),
            },
            Err(e) => tracing::warn!("Cannot read {}: {}", config_path.display(), e),
        }
    }

    Config::default()
}
