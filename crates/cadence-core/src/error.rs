use thiserror::Error;

/// Failure talking to one of the remote JSON services.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl ApiError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(#[from] ApiError),
}

/// Errors reported by a media provider or one of its handles.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MediaError {
    #[error("could not load {uri}: {reason}")]
    Load { uri: String, reason: String },

    #[error("transport command failed: {0}")]
    Transport(String),

    #[error("media backend unavailable")]
    Unavailable,
}

/// Failures surfaced by the playback session.  All of them are transient:
/// the session is back in a usable state when one is returned.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlaybackError {
    #[error("failed to load track {track_id}: {reason}")]
    MediaLoad { track_id: String, reason: String },

    #[error("track {track_id} has no stream url")]
    NoStream { track_id: String },

    #[error("no queue entry at index {0}")]
    NoSuchEntry(usize),

    #[error("load superseded by a newer request")]
    Superseded,
}
