use cadence_core::likes::LikedSongs;
use cadence_core::model::{PlaylistDto, Track};
use cadence_core::player::{RepeatMode, SessionSnapshot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// What survives a daemon restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersistentState {
    pub repeat: RepeatMode,
    pub shuffle: bool,
    pub liked: LikedSongs,
    pub volume: f32,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            repeat: RepeatMode::Off,
            shuffle: false,
            liked: LikedSongs::new(),
            volume: 0.5,
        }
    }
}

/// Read-only picture of the daemon published after every event.
#[derive(Debug, Clone, Serialize, Default)]
pub struct DaemonView {
    pub session: SessionSnapshot,
    pub queue: Vec<Track>,
    pub liked: LikedSongs,
    pub volume: f32,
    pub playlists: Vec<PlaylistDto>,
    /// Last catalog fetch failure, cleared by the next success.
    pub catalog_error: Option<String>,
    /// Last playlist refresh or edit failure, cleared by the next success.
    pub playlist_error: Option<String>,
}

/// Shared between the core (writer) and the HTTP API (reader).
pub struct StateManager {
    view: Arc<RwLock<DaemonView>>,
    state_file: PathBuf,
}

impl StateManager {
    pub fn new(state_file: PathBuf) -> Self {
        Self {
            view: Arc::new(RwLock::new(DaemonView::default())),
            state_file,
        }
    }

    pub async fn get_view(&self) -> DaemonView {
        self.view.read().await.clone()
    }

    pub async fn publish(&self, view: DaemonView) {
        *self.view.write().await = view;
    }

    /// Saved state, or defaults with `default_volume` on first run.
    pub fn load_persistent(&self, default_volume: f32) -> PersistentState {
        load_persistent(&self.state_file).unwrap_or_else(|| PersistentState {
            volume: default_volume,
            ..PersistentState::default()
        })
    }

    pub async fn save(&self, persistent: &PersistentState) -> anyhow::Result<()> {
        if let Some(parent) = self.state_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(persistent)?;
        tokio::fs::write(&self.state_file, json).await?;
        Ok(())
    }
}

fn load_persistent(state_file: &Path) -> Option<PersistentState> {
    let content = std::fs::read_to_string(state_file).ok()?;
    serde_json::from_str(&content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("cadence-state-test-{}", std::process::id()))
            .join(name)
    }

    #[tokio::test]
    async fn test_persistent_state_survives_restart() {
        let path = scratch_file("state.json");
        let manager = StateManager::new(path.clone());

        let mut state = PersistentState {
            repeat: RepeatMode::One,
            shuffle: true,
            volume: 0.8,
            ..PersistentState::default()
        };
        state.liked.toggle("s1");
        manager.save(&state).await.unwrap();

        let reloaded = StateManager::new(path.clone()).load_persistent(0.5);
        assert_eq!(reloaded, state);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_or_partial_file_uses_defaults() {
        let missing = StateManager::new(scratch_file("nope.json")).load_persistent(0.7);
        assert_eq!(missing.volume, 0.7);
        assert!(missing.liked.is_empty());

        let partial: PersistentState = serde_json::from_str(r#"{"shuffle": true}"#).unwrap();
        assert!(partial.shuffle);
        assert_eq!(partial.volume, 0.5);
        assert_eq!(partial.repeat, RepeatMode::Off);
    }
}
