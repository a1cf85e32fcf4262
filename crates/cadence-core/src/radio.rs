//! Public internet-radio directory (radio-browser JSON API).

use serde::Deserialize;
use std::time::Duration;

use crate::config::RadioConfig;
use crate::error::ApiError;
use crate::http::{build_client, send_json};
use crate::model::Station;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
struct DirectoryStation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    url_resolved: String,
    /// Comma-separated.
    #[serde(default)]
    tags: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    codec: String,
    #[serde(default)]
    bitrate: u32,
}

impl From<DirectoryStation> for Station {
    fn from(s: DirectoryStation) -> Self {
        let url = if s.url_resolved.trim().is_empty() {
            s.url.trim().to_string()
        } else {
            s.url_resolved.trim().to_string()
        };
        let description = match (s.codec.is_empty(), s.bitrate) {
            (false, 0) => s.codec.clone(),
            (false, kbps) => format!("{} {}kbps", s.codec, kbps),
            (true, _) => s.language.clone(),
        };
        Station {
            name: s.name.trim().to_string(),
            url,
            description,
            network: String::new(),
            tags: s
                .tags
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            city: s.state,
            country: s.country,
        }
    }
}

pub struct RadioDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl RadioDirectory {
    pub fn new(config: &RadioConfig) -> Self {
        Self {
            http: build_client(REQUEST_TIMEOUT),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn top_voted(&self, limit: u32) -> Result<Vec<Station>, ApiError> {
        let url = format!("{}/stations/topvote/{}", self.base_url, limit);
        self.fetch(self.http.get(&url), &url).await
    }

    pub async fn by_tag(&self, tag: &str, limit: u32) -> Result<Vec<Station>, ApiError> {
        let url = format!("{}/stations/bytag/{}", self.base_url, tag.trim());
        let req = self.http.get(&url).query(&[("limit", limit)]);
        self.fetch(req, &url).await
    }

    pub async fn search(&self, name: &str, limit: u32) -> Result<Vec<Station>, ApiError> {
        let url = format!("{}/stations/search", self.base_url);
        let limit = limit.to_string();
        let req = self.http.get(&url).query(&[
            ("name", name.trim()),
            ("limit", limit.as_str()),
            ("hidebroken", "true"),
            ("order", "votes"),
            ("reverse", "true"),
        ]);
        self.fetch(req, &url).await
    }

    async fn fetch(
        &self,
        req: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Vec<Station>, ApiError> {
        let raw: Vec<DirectoryStation> = send_json(req, url).await?;
        Ok(raw
            .into_iter()
            .map(Station::from)
            .filter(|s| !s.url.is_empty())
            .collect())
    }
}
