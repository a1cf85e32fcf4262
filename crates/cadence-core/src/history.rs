//! Listening history kept by the backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::normalize_records;
use crate::config::BackendConfig;
use crate::error::ApiError;
use crate::http::{build_client, send_empty, send_json, USER_HEADER};
use crate::model::Track;
use crate::stream_url::StreamUrlRewriter;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHistoryItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    song_id: String,
    #[serde(default)]
    played_at: Option<String>,
    #[serde(default)]
    song_details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub song_id: String,
    pub played_at: Option<DateTime<Utc>>,
    pub track: Option<Track>,
}

pub struct HistoryClient {
    http: reqwest::Client,
    config: BackendConfig,
    rewriter: StreamUrlRewriter,
}

impl HistoryClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: build_client(config.request_timeout()),
            rewriter: StreamUrlRewriter::from_config(&config),
            config,
        }
    }

    pub async fn record_play(&self, song_id: &str) -> Result<(), ApiError> {
        let url = self.config.endpoint(&format!("/api/history/{}", song_id));
        let req = self
            .http
            .post(&url)
            .header(USER_HEADER, self.config.user_id.as_str())
            .json(&serde_json::json!({}));
        send_empty(req, &url).await
    }

    pub async fn list(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        let url = self.config.endpoint("/api/history/me");
        let req = self
            .http
            .get(&url)
            .header(USER_HEADER, self.config.user_id.as_str());
        let raw: Vec<RawHistoryItem> = send_json(req, &url).await?;
        Ok(raw
            .into_iter()
            .map(|item| self.entry_from(item))
            .collect())
    }

    pub async fn clear(&self) -> Result<(), ApiError> {
        let url = self.config.endpoint("/api/history/me");
        let req = self
            .http
            .delete(&url)
            .header(USER_HEADER, self.config.user_id.as_str());
        send_empty(req, &url).await
    }

    fn entry_from(&self, item: RawHistoryItem) -> HistoryEntry {
        let track = item
            .song_details
            .and_then(|v| normalize_records(vec![v], &self.rewriter).pop());
        HistoryEntry {
            id: item.id,
            song_id: item.song_id,
            played_at: item.played_at.as_deref().and_then(parse_played_at),
            track,
        }
    }
}

/// RFC 3339, or a zone-less ISO timestamp taken as UTC.
pub fn parse_played_at(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
