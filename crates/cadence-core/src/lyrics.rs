//! Lyrics lookup and LRC parsing.

use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::ApiError;
use crate::http::{build_client, send_json};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LyricsResponse {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub track_name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub plain_lyrics: Option<String>,
    #[serde(default)]
    pub synced_lyrics: Option<String>,
}

impl LyricsResponse {
    /// Timed lines, empty when the service only had plain lyrics.
    pub fn lines(&self) -> Vec<LyricLine> {
        self.synced_lyrics.as_deref().map(parse_lrc).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LyricLine {
    pub time_secs: f64,
    pub text: String,
}

pub struct LyricsClient {
    http: reqwest::Client,
    url: String,
}

impl LyricsClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            http: build_client(config.request_timeout()),
            url: config.endpoint("/api/v1/lyrics"),
        }
    }

    pub async fn fetch(
        &self,
        track: &str,
        artist: &str,
        duration_secs: Option<f64>,
    ) -> Result<LyricsResponse, ApiError> {
        let mut req = self
            .http
            .get(&self.url)
            .query(&[("track", track), ("artist", artist)]);
        if let Some(d) = duration_secs.filter(|d| *d > 0.0) {
            req = req.query(&[("duration", d.floor() as u64)]);
        }
        send_json(req, &self.url).await
    }
}

/// Parse `[mm:ss.xx] text` lines.  A line may carry several timestamps;
/// metadata tags like `[ar:...]` and untimed lines are skipped.  The result
/// is sorted by time.
pub fn parse_lrc(content: &str) -> Vec<LyricLine> {
    let mut lines = Vec::new();

    for raw in content.lines() {
        let mut rest = raw.trim();
        let mut stamps = Vec::new();
        while let Some(after) = rest.strip_prefix('[') {
            let Some(close) = after.find(']') else { break };
            match parse_timestamp(&after[..close]) {
                Some(t) => stamps.push(t),
                None => break,
            }
            rest = &after[close + 1..];
        }
        if stamps.is_empty() {
            continue;
        }
        let text = rest.trim().to_string();
        lines.extend(stamps.into_iter().map(|time_secs| LyricLine {
            time_secs,
            text: text.clone(),
        }));
    }

    lines.sort_by(|a, b| a.time_secs.total_cmp(&b.time_secs));
    lines
}

fn parse_timestamp(tag: &str) -> Option<f64> {
    let (min, sec) = tag.split_once(':')?;
    let min: u32 = min.trim().parse().ok()?;
    let sec: f64 = sec.trim().parse().ok()?;
    if !(0.0..60.0).contains(&sec) {
        return None;
    }
    Some(min as f64 * 60.0 + sec)
}

/// Index of the line being sung at `position_secs`.
pub fn line_at(lines: &[LyricLine], position_secs: f64) -> Option<usize> {
    let idx = lines.partition_point(|l| l.time_secs <= position_secs);
    idx.checked_sub(1)
}
