//! Song catalog fetcher.
//!
//! The backend has grown several spellings for the same song fields, so
//! records are decoded leniently one at a time and folded into `Track`.
//! A broken record is dropped with a warning; it never fails the batch.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::{ApiError, CatalogError};
use crate::genre;
use crate::http::{build_client, send_json};
use crate::model::{Track, DEFAULT_ALBUM, PLACEHOLDER_COVER, UNKNOWN_ARTIST, UNKNOWN_TITLE};
use crate::stream_url::StreamUrlRewriter;

const DEFAULT_TRENDING_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRequest {
    Trending { limit: u32 },
    Search { query: String },
    All,
    ByGenre { category: String },
}

impl Default for CatalogRequest {
    fn default() -> Self {
        Self::Trending {
            limit: DEFAULT_TRENDING_LIMIT,
        }
    }
}

/// Song record as served by the catalog.  Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSong {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    album_name: Option<String>,
    #[serde(default)]
    cover_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    stream_url: Option<String>,
    #[serde(default)]
    file_url: Option<String>,
    #[serde(default)]
    genre: Option<GenreField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenreField {
    One(String),
    Many(Vec<String>),
}

pub struct CatalogClient {
    http: reqwest::Client,
    config: BackendConfig,
    rewriter: StreamUrlRewriter,
}

impl CatalogClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: build_client(config.request_timeout()),
            rewriter: StreamUrlRewriter::from_config(&config),
            config,
        }
    }

    pub fn rewriter(&self) -> &StreamUrlRewriter {
        &self.rewriter
    }

    pub async fn fetch(&self, request: &CatalogRequest) -> Result<Vec<Track>, CatalogError> {
        let tracks = match request {
            CatalogRequest::Trending { limit } => {
                let url = self.config.endpoint("/api/public/songs/trending");
                let req = self.http.get(&url).query(&[("limit", limit)]);
                self.fetch_list(req, &url).await?
            }
            CatalogRequest::Search { query } => {
                let query = query.trim();
                if query.is_empty() {
                    return Ok(Vec::new());
                }
                let url = self.config.endpoint("/api/public/search");
                let req = self.http.get(&url).query(&[("q", query)]);
                self.fetch_list(req, &url).await?
            }
            CatalogRequest::All => self.fetch_all().await?,
            CatalogRequest::ByGenre { category } => {
                let all = self.fetch_all().await?;
                let total = all.len();
                let filtered = genre::filter_by_category(all, category);
                debug!(
                    "catalog: genre {:?} kept {}/{} songs",
                    category,
                    filtered.len(),
                    total
                );
                filtered
            }
        };
        info!("catalog: {:?} -> {} tracks", request, tracks.len());
        Ok(tracks)
    }

    async fn fetch_all(&self) -> Result<Vec<Track>, ApiError> {
        let url = self.config.endpoint("/api/public/songs/all");
        let req = self.http.get(&url);
        self.fetch_list(req, &url).await
    }

    async fn fetch_list(
        &self,
        req: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Vec<Track>, ApiError> {
        let body: Value = send_json(req, url).await?;
        match body {
            Value::Array(records) => Ok(normalize_records(records, &self.rewriter)),
            other => Err(ApiError::Decode {
                url: url.to_string(),
                reason: format!("expected a JSON array, got {}", json_kind(&other)),
            }),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fold raw catalog records into tracks, skipping the ones that are not
/// objects at all.
pub fn normalize_records(records: Vec<Value>, rewriter: &StreamUrlRewriter) -> Vec<Track> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            if !record.is_object() {
                warn!("catalog: skipping record {} ({})", idx, json_kind(&record));
                return None;
            }
            match serde_json::from_value::<RawSong>(record) {
                Ok(raw) => Some(normalize(raw, idx, rewriter)),
                Err(e) => {
                    warn!("catalog: skipping malformed record {}: {}", idx, e);
                    None
                }
            }
        })
        .collect()
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn normalize(raw: RawSong, idx: usize, rewriter: &StreamUrlRewriter) -> Track {
    let id = match raw.id {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => idx.to_string(),
    };

    let stream_url = non_blank(raw.stream_url)
        .or_else(|| non_blank(raw.file_url))
        .map(|u| rewriter.rewrite(&u));

    let genres = match raw.genre {
        Some(GenreField::One(g)) => vec![g],
        Some(GenreField::Many(gs)) => gs,
        None => Vec::new(),
    };

    Track {
        id,
        title: non_blank(raw.title).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        artist: non_blank(raw.artist_name).unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        album: non_blank(raw.album_name).unwrap_or_else(|| DEFAULT_ALBUM.to_string()),
        cover_url: non_blank(raw.cover_url).unwrap_or_else(|| PLACEHOLDER_COVER.to_string()),
        stream_url,
        duration_secs: raw.duration.filter(|d| d.is_finite() && *d >= 0.0),
        genres,
    }
}
