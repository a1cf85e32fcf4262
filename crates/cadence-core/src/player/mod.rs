pub mod media;
pub mod queue;
pub mod session;

use serde::{Deserialize, Serialize};

use crate::model::Track;

pub use media::{MediaHandle, MediaProvider, ProgressEvent, ProgressSink, ProgressUpdate};
pub use queue::{Direction, Queue};
pub use session::{LoadOutcome, PendingLoad, PlaybackSession, TickOutcome};

/// Playback status of the session.
///
/// Transitions:
///   Idle -> Loading -> Playing <-> Paused
///   Playing/Paused -> Loading (track change) | Idle (stop)
///   Loading -> Idle (load failed)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

impl PlaybackStatus {
    /// A media resource is loaded and accepts transport commands.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// What happens when a track plays to its end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Advance; stop after the last track.
    #[default]
    Off,
    /// Advance, wrapping to the start.
    All,
    /// Replay the same track.
    One,
}

impl RepeatMode {
    /// off -> all -> one -> off
    pub fn cycle(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }
}

/// Everything a view needs to render the player.  `rev` increases on every
/// observable change so pollers can skip unchanged snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SessionSnapshot {
    pub rev: u64,
    pub generation: u64,
    pub status: PlaybackStatus,
    pub current_track: Option<Track>,
    /// Track being acquired while `status` is `Loading`.
    pub loading_track: Option<Track>,
    /// 0..=100
    pub progress: f64,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub cursor: Option<usize>,
    pub queue_len: usize,
    /// Last transient failure, cleared by the next successful load.
    pub last_error: Option<String>,
}
