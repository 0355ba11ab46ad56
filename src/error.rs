//! Error types for the movie lister.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the movie lister.
#[derive(Error, Debug)]
pub enum Error {
    // Fingerprint errors
    #[error("File too small to fingerprint ({size} bytes): {path}")]
    FileTooSmall { path: PathBuf, size: u64 },

    // Remote service errors
    #[error("TMDB API key not configured. Set TMDB_API_KEY environment variable")]
    TmdbApiKeyMissing,

    #[error("Login refused by remote service: {0}")]
    RemoteAuth(String),

    #[error("Connection error, current movie: [{movie}]: {message}")]
    RemoteConnection { movie: String, message: String },

    #[error("Unexpected answer from remote service: {0}")]
    RemoteProtocol(String),

    #[error("Malformed XML-RPC payload: {0}")]
    Xmlrpc(String),

    #[error("Subtitle decoding failed: {0}")]
    Subtitle(String),

    // Filter errors
    #[error("Invalid filter: {0}")]
    FilterParse(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error comes from a failed fingerprint computation.
    pub fn is_fingerprint_failure(&self) -> bool {
        matches!(self, Error::FileTooSmall { .. } | Error::Io(_))
    }
}
