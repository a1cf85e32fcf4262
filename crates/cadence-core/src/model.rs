use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const DEFAULT_ALBUM: &str = "Single";
pub const PLACEHOLDER_COVER: &str = "https://via.placeholder.com/150";

/// A playable song as the rest of the crate sees it.  Built once by the
/// catalog normalizer and never patched afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_url: String,
    /// Already host-corrected; `None` when the record carried no locator.
    pub stream_url: Option<String>,
    /// Nominal duration in seconds, if the catalog knows it.
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl Track {
    /// Nominal duration in milliseconds.
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_secs
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| (d * 1000.0).round() as u64)
    }

    /// `m:ss`, or `0:00` when unknown.
    pub fn display_duration(&self) -> String {
        let secs = match self.duration_secs {
            Some(d) if d.is_finite() && d > 0.0 => d as u64,
            _ => return "0:00".to_string(),
        };
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    #[default]
    User,
    Editorial,
    System,
}

/// Playlist as returned by the playlist service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub public_playlist: bool,
    #[serde(default, rename = "type")]
    pub kind: PlaylistKind,
    /// Track identifiers, in playlist order.
    #[serde(default)]
    pub tracks: Vec<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub song_count: Option<u32>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body for create/update calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: PlaylistKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<String>>,
}

impl PlaylistRequest {
    /// A new, public, empty user playlist.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PlaylistKind::User,
            is_public: Some(true),
            tracks: Some(Vec::new()),
            ..Self::default()
        }
    }
}

/// Internet radio station from the public directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Station {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    /// Parent network or brand
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}
