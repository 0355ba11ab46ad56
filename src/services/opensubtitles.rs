//! OpenSubtitles XML-RPC client.
//!
//! Each operation opens its own session (`LogIn`), runs its calls and closes
//! it (`LogOut`), so no token outlives a command.

use super::xmlrpc::{self, Value};
use super::{HashLookup, SubtitleHit, SubtitleQuery, SubtitleService};
use crate::models::config::OpenSubtitlesConfig;
use crate::models::movie::{HashSubmission, OriginMatch};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, ZlibDecoder};
use std::collections::HashMap;
use std::future::Future;
use std::io::Read;

/// Status of every successful answer.
const STATUS_OK: &str = "200 OK";

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// OpenSubtitles client.
pub struct OpenSubtitlesClient {
    config: OpenSubtitlesConfig,
    client: reqwest::Client,
}

impl OpenSubtitlesClient {
    /// Create a new client.
    pub fn new(config: OpenSubtitlesConfig) -> Self {
        let client = reqwest::Client::new();
        Self { config, client }
    }

    /// Perform one XML-RPC call.
    async fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        tracing::debug!("OpenSubtitles call {}", method);
        let body = xmlrpc::method_call(method, params)?;
        let text = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        xmlrpc::parse_response(&text)
    }

    /// Open a session and return its token.
    async fn login(&self) -> Result<String> {
        let answer = self
            .call(
                "LogIn",
                &[
                    Value::from(self.config.username.as_str()),
                    Value::from(self.config.password.as_str()),
                    Value::from(self.config.language.as_str()),
                    Value::from(self.config.user_agent.as_str()),
                ],
            )
            .await?;

        if status_of(&answer) != Some(STATUS_OK) {
            return Err(Error::RemoteAuth(
                status_of(&answer).unwrap_or("no status").to_string(),
            ));
        }

        let token = answer
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::RemoteProtocol("login answer without token".to_string()))?;
        tracing::debug!("OpenSubtitles login OK");
        Ok(token.to_string())
    }

    /// Close a session; failures are only logged.
    async fn logout(&self, token: &str) {
        match self.call("LogOut", &[Value::from(token)]).await {
            Ok(_) => tracing::debug!("OpenSubtitles logout OK"),
            Err(e) => tracing::warn!("OpenSubtitles logout failed: {}", e),
        }
    }

    async fn check_batch(&self, token: &str, batch: Vec<String>) -> Result<HashMap<String, OriginMatch>> {
        let params = [
            Value::from(token),
            Value::Array(batch.into_iter().map(Value::from).collect()),
        ];
        let answer = self.call("CheckMovieHash", &params).await?;
        expect_ok(&answer)?;

        let mut matches = HashMap::new();
        if let Some(Value::Struct(data)) = answer.get("data") {
            for (hash, info) in data {
                // unknown hashes come back as an empty array
                if let Some(origin) = origin_from(info) {
                    matches.insert(hash.clone(), origin);
                }
            }
        }
        Ok(matches)
    }

    async fn insert(&self, token: &str, submissions: &[HashSubmission]) -> Result<()> {
        let entries = submissions
            .iter()
            .map(|s| {
                Value::structure([
                    ("moviehash", Value::from(s.fingerprint.as_str())),
                    ("moviebytesize", Value::from(s.byte_size.to_string())),
                    ("imdbid", Value::from(s.movie_id.as_str())),
                ])
            })
            .collect();
        let answer = self
            .call("InsertMovieHash", &[Value::from(token), Value::Array(entries)])
            .await?;
        expect_ok(&answer)?;
        tracing::info!("InsertMovieHash answer: {:?}", answer.get("data"));
        Ok(())
    }

    async fn search(&self, token: &str, queries: &[SubtitleQuery]) -> Result<Vec<SubtitleHit>> {
        let queries = queries.iter().map(query_value).collect();
        let answer = self
            .call("SearchSubtitles", &[Value::from(token), Value::Array(queries)])
            .await?;
        expect_ok(&answer)?;

        // "data" is false when nothing matches
        let hits = answer
            .get("data")
            .and_then(Value::as_array)
            .unwrap_or_default()
            .iter()
            .filter_map(hit_from)
            .collect();
        Ok(hits)
    }

    async fn download(&self, token: &str, file_ids: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let ids = file_ids.iter().map(|id| Value::from(id.as_str())).collect();
        let answer = self
            .call("DownloadSubtitles", &[Value::from(token), Value::Array(ids)])
            .await?;
        expect_ok(&answer)?;

        let mut subtitles = HashMap::new();
        for entry in answer.get("data").and_then(Value::as_array).unwrap_or_default() {
            let id = entry.get("idsubtitlefile").and_then(Value::to_text);
            let data = entry.get("data").and_then(Value::as_str);
            if let (Some(id), Some(data)) = (id, data) {
                subtitles.insert(id, decode_payload(data)?);
            }
        }
        Ok(subtitles)
    }
}

#[async_trait]
impl HashLookup for OpenSubtitlesClient {
    async fn check_hashes(
        &self,
        hashes: &[String],
        batch_size: usize,
    ) -> Result<HashMap<String, Option<OriginMatch>>> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }
        tracing::info!("Requesting OpenSubtitles info for {} hashes", hashes.len());

        let token = self.login().await?;
        let session = token.as_str();
        let found = check_in_batches(hashes, batch_size, move |batch| {
            self.check_batch(session, batch)
        })
        .await;
        self.logout(&token).await;
        Ok(found)
    }

    async fn insert_hashes(&self, submissions: &[HashSubmission]) -> Result<()> {
        let token = self.login().await?;
        let result = self.insert(&token, submissions).await;
        self.logout(&token).await;
        result
    }
}

#[async_trait]
impl SubtitleService for OpenSubtitlesClient {
    async fn search_subtitles(&self, queries: &[SubtitleQuery]) -> Result<Vec<SubtitleHit>> {
        let token = self.login().await?;
        let result = self.search(&token, queries).await;
        self.logout(&token).await;
        result
    }

    async fn download_subtitles(&self, file_ids: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let token = self.login().await?;
        let result = self.download(&token, file_ids).await;
        self.logout(&token).await;
        result
    }
}

/// Run `check` over `hashes` in chunks of at most `batch_size`.
///
/// A failing chunk ends the lookup; matches from the chunks before it are kept.
async fn check_in_batches<F, Fut>(
    hashes: &[String],
    batch_size: usize,
    mut check: F,
) -> HashMap<String, Option<OriginMatch>>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<HashMap<String, OriginMatch>>>,
{
    let mut found: HashMap<String, Option<OriginMatch>> =
        hashes.iter().map(|h| (h.clone(), None)).collect();

    for (index, batch) in hashes.chunks(batch_size.max(1)).enumerate() {
        match check(batch.to_vec()).await {
            Ok(matches) => {
                for (hash, origin) in matches {
                    found.insert(hash, Some(origin));
                }
            }
            Err(e) => {
                tracing::warn!("Hash lookup stopped at batch {}: {}", index + 1, e);
                break;
            }
        }
    }

    found
}

fn status_of(answer: &Value) -> Option<&str> {
    answer.get("status").and_then(Value::as_str)
}

fn expect_ok(answer: &Value) -> Result<()> {
    match status_of(answer) {
        Some(STATUS_OK) => Ok(()),
        Some(status) => Err(Error::RemoteProtocol(format!("OpenSubtitles status {}", status))),
        None => Err(Error::RemoteProtocol("OpenSubtitles answer without status".to_string())),
    }
}

fn origin_from(info: &Value) -> Option<OriginMatch> {
    let remote_id = info.get("MovieImdbID").and_then(Value::to_text)?;
    let remote_title = info.get("MovieName").and_then(Value::to_text)?;
    let remote_year = info
        .get("MovieYear")
        .and_then(Value::as_i64)
        .and_then(|y| u16::try_from(y).ok());
    Some(OriginMatch {
        remote_id,
        remote_title,
        remote_year,
    })
}

fn query_value(query: &SubtitleQuery) -> Value {
    match query {
        SubtitleQuery::Hash {
            language,
            fingerprint,
            byte_size,
        } => Value::structure([
            ("sublanguageid", Value::from(language.as_str())),
            ("moviehash", Value::from(fingerprint.as_str())),
            ("moviebytesize", Value::from(byte_size.to_string())),
        ]),
        SubtitleQuery::Movie { language, movie_id } => Value::structure([
            ("sublanguageid", Value::from(language.as_str())),
            ("imdbid", Value::from(movie_id.as_str())),
        ]),
    }
}

fn hit_from(entry: &Value) -> Option<SubtitleHit> {
    Some(SubtitleHit {
        file_id: entry.get("IDSubtitleFile").and_then(Value::to_text)?,
        movie_hash: entry.get("MovieHash").and_then(Value::to_text),
        movie_id: entry.get("IDMovieImdb").and_then(Value::to_text),
        downloads: entry
            .get("SubDownloadsCnt")
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
    })
}

/// Decode a subtitle payload: base64, then gzip or zlib depending on its header.
pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    let compressed = STANDARD
        .decode(compact)
        .map_err(|e| Error::Subtitle(format!("invalid base64: {}", e)))?;

    let mut text = Vec::new();
    let inflated = if compressed.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(compressed.as_slice()).read_to_end(&mut text)
    } else {
        ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut text)
    };
    inflated.map_err(|e| Error::Subtitle(format!("cannot inflate: {}", e)))?;
    Ok(text)
}
