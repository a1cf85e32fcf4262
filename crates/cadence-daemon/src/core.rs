/// DaemonCore: single-owner event loop for the playback session.
///
/// Every input (HTTP commands, mpv progress, settled loads, catalog
/// responses) arrives as a `DaemonEvent` on one channel.  DaemonCore owns
/// the `PlaybackSession` and the playlist store exclusively; no other task
/// touches them.  Slow work (media acquisition, catalog fetches) runs in
/// spawned tasks that report back through the same channel.
///
/// After each event the core publishes a fresh `DaemonView` for readers.
use std::collections::HashMap;
use std::sync::Arc;

use cadence_core::catalog::{CatalogClient, CatalogRequest};
use cadence_core::config::Config;
use cadence_core::error::{ApiError, CatalogError, PlaybackError};
use cadence_core::history::HistoryClient;
use cadence_core::model::{PlaylistRequest, Track};
use cadence_core::player::{
    Direction, LoadOutcome, PendingLoad, PlaybackSession, ProgressUpdate, TickOutcome,
};
use cadence_core::playlists::{Owner, PlaylistClient, PlaylistStore};
use cadence_core::stream_url::StreamUrlRewriter;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::mpv::{MpvMedia, MpvProvider};
use crate::state::{DaemonView, PersistentState, StateManager};

// ── DaemonEvent ───────────────────────────────────────────────────────────────

/// A request from the HTTP API.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlayIndex(usize),
    Pause,
    Resume,
    Next,
    Prev,
    Stop,
    /// Percentage of the current track; clamped by the session.
    Seek(f64),
    ToggleShuffle,
    CycleRepeat,
    ToggleLike(String),
    /// 0.0..=1.0
    SetVolume(f32),
    ReloadCatalog(CatalogRequest),
    RefreshPlaylists,
    /// Replace the queue with the playlist's tracks, in playlist order.
    QueuePlaylist(String),
    CreatePlaylist(PlaylistRequest),
    UpdatePlaylist {
        playlist_id: String,
        request: PlaylistRequest,
    },
    DeletePlaylist(String),
    AddToPlaylist {
        playlist_id: String,
        track_id: String,
    },
    RemoveFromPlaylist {
        playlist_id: String,
        track_id: String,
    },
}

/// All inputs into the DaemonCore loop.
#[derive(Debug)]
pub enum DaemonEvent {
    ClientCommand(Command),
    /// Forwarded from the session's progress channel.
    Progress(ProgressUpdate),
    /// A spawned acquisition finished.
    LoadSettled(LoadOutcome<MpvMedia>),
    /// A spawned catalog fetch finished.  `seq` orders fetches; only the
    /// newest one is applied.
    CatalogLoaded {
        seq: u64,
        request: CatalogRequest,
        result: Result<Vec<Track>, CatalogError>,
    },
    Shutdown,
}

// ── DaemonCore ────────────────────────────────────────────────────────────────

pub struct DaemonCore {
    state_manager: Arc<StateManager>,
    session: PlaybackSession<MpvProvider>,
    progress_rx: Option<mpsc::UnboundedReceiver<ProgressUpdate>>,
    /// Same mpv instance the session plays through; kept for volume/shutdown.
    provider: MpvProvider,
    catalog: Arc<CatalogClient>,
    history: Arc<HistoryClient>,
    playlists: PlaylistStore,
    /// Every track seen in a catalog response, for resolving playlist ids.
    library: HashMap<String, Track>,
    persistent: PersistentState,
    catalog_seq: u64,
    catalog_error: Option<String>,
    playlist_error: Option<String>,
    event_tx: mpsc::Sender<DaemonEvent>,
}

impl DaemonCore {
    pub fn new(
        config: &Config,
        state_manager: Arc<StateManager>,
        event_tx: mpsc::Sender<DaemonEvent>,
    ) -> Self {
        let persistent = state_manager.load_persistent(config.mpv.default_volume);
        let provider = MpvProvider::new(persistent.volume);
        let (mut session, progress_rx) = PlaybackSession::new(
            provider.clone(),
            StreamUrlRewriter::from_config(&config.backend),
        );
        session.set_repeat(persistent.repeat);
        session.set_shuffle(persistent.shuffle);

        let playlists = PlaylistStore::new(
            PlaylistClient::new(&config.backend),
            Owner::from_config(&config.backend),
        );

        Self {
            state_manager,
            session,
            progress_rx: Some(progress_rx),
            provider,
            catalog: Arc::new(CatalogClient::new(config.backend.clone())),
            history: Arc::new(HistoryClient::new(config.backend.clone())),
            playlists,
            library: HashMap::new(),
            persistent,
            catalog_seq: 0,
            catalog_error: None,
            playlist_error: None,
            event_tx,
        }
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received
    /// or every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<DaemonEvent>) -> anyhow::Result<()> {
        info!("DaemonCore: starting event loop");

        if let Some(mut progress_rx) = self.progress_rx.take() {
            let tx = self.event_tx.clone();
            tokio::spawn(async move {
                while let Some(update) = progress_rx.recv().await {
                    if tx.send(DaemonEvent::Progress(update)).await.is_err() {
                        break;
                    }
                }
            });
        }

        self.reload_catalog(CatalogRequest::default());
        self.refresh_playlists().await;
        self.publish().await;

        while let Some(evt) = event_rx.recv().await {
            match evt {
                DaemonEvent::Shutdown => {
                    info!("DaemonCore: shutdown requested");
                    break;
                }
                DaemonEvent::ClientCommand(cmd) => {
                    info!("DaemonCore: command {:?}", cmd);
                    if let Err(e) = self.handle_command(cmd).await {
                        error!("DaemonCore: command error: {}", e);
                    }
                }
                DaemonEvent::Progress(update) => self.handle_progress(update).await,
                DaemonEvent::LoadSettled(outcome) => self.handle_load_settled(outcome).await,
                DaemonEvent::CatalogLoaded {
                    seq,
                    request,
                    result,
                } => self.handle_catalog(seq, request, result),
            }
            self.publish().await;
        }

        self.cleanup().await;
        Ok(())
    }

    async fn publish(&self) {
        let view = DaemonView {
            session: self.session.snapshot(),
            queue: self.session.queue().tracks().to_vec(),
            liked: self.persistent.liked.clone(),
            volume: self.persistent.volume,
            playlists: self.playlists.playlists().to_vec(),
            catalog_error: self.catalog_error.clone(),
            playlist_error: self.playlist_error.clone(),
        };
        self.state_manager.publish(view).await;
    }

    async fn persist(&mut self) {
        self.persistent.repeat = self.session.repeat();
        self.persistent.shuffle = self.session.is_shuffled();
        if let Err(e) = self.state_manager.save(&self.persistent).await {
            warn!("DaemonCore: failed to save state: {}", e);
        }
    }

    // ── command handlers ──────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) -> anyhow::Result<()> {
        match cmd {
            Command::PlayIndex(idx) => {
                let pending = self.session.begin_play_index(idx).await?;
                self.spawn_load(pending);
            }
            Command::Next => self.advance(Direction::Next).await?,
            Command::Prev => self.advance(Direction::Previous).await?,
            Command::Pause => self.session.set_playing(false).await,
            Command::Resume => self.session.set_playing(true).await,
            Command::Stop => self.session.stop().await,
            Command::Seek(pct) => {
                if let Some(ms) = self.session.seek(pct).await {
                    debug!("DaemonCore: sought to {}ms", ms);
                }
            }
            Command::ToggleShuffle => {
                self.session.toggle_shuffle();
                self.persist().await;
            }
            Command::CycleRepeat => {
                self.session.cycle_repeat();
                self.persist().await;
            }
            Command::ToggleLike(track_id) => {
                let liked = self.persistent.liked.toggle(&track_id);
                info!("DaemonCore: {} liked={}", track_id, liked);
                self.persist().await;
            }
            Command::SetVolume(volume) => {
                let volume = volume.clamp(0.0, 1.0);
                self.provider.set_volume(volume).await?;
                self.persistent.volume = volume;
                self.persist().await;
            }
            Command::ReloadCatalog(request) => self.reload_catalog(request),
            Command::RefreshPlaylists => self.refresh_playlists().await,
            Command::QueuePlaylist(playlist_id) => self.queue_playlist(&playlist_id)?,
            Command::CreatePlaylist(request) => {
                let result = self.playlists.create(request).await.map(|_| ());
                self.note_playlist_result(result);
            }
            Command::UpdatePlaylist {
                playlist_id,
                request,
            } => {
                let result = self.playlists.update(&playlist_id, request).await.map(|_| ());
                self.note_playlist_result(result);
            }
            Command::DeletePlaylist(playlist_id) => {
                let result = self.playlists.delete(&playlist_id).await;
                self.note_playlist_result(result);
            }
            Command::AddToPlaylist {
                playlist_id,
                track_id,
            } => {
                let result = self
                    .playlists
                    .add_track(&playlist_id, &track_id)
                    .await
                    .map(|_| ());
                self.note_playlist_result(result);
            }
            Command::RemoveFromPlaylist {
                playlist_id,
                track_id,
            } => {
                let result = self
                    .playlists
                    .remove_track(&playlist_id, &track_id)
                    .await
                    .map(|_| ());
                self.note_playlist_result(result);
            }
        }
        Ok(())
    }

    async fn advance(&mut self, direction: Direction) -> Result<(), PlaybackError> {
        if let Some(pending) = self.session.begin_advance(direction).await? {
            self.spawn_load(pending);
        }
        Ok(())
    }

    /// Drive the acquisition off-loop; the outcome comes back as an event.
    fn spawn_load(&self, pending: PendingLoad<MpvMedia>) {
        debug!("DaemonCore: spawning {:?}", pending);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let outcome = pending.resolve().await;
            let _ = tx.send(DaemonEvent::LoadSettled(outcome)).await;
        });
    }

    fn queue_playlist(&mut self, playlist_id: &str) -> anyhow::Result<()> {
        let playlist = self
            .playlists
            .get(playlist_id)
            .ok_or_else(|| anyhow::anyhow!("unknown playlist {}", playlist_id))?;
        let tracks: Vec<Track> = playlist
            .tracks
            .iter()
            .filter_map(|id| self.library.get(id).cloned())
            .collect();
        if tracks.len() < playlist.tracks.len() {
            debug!(
                "DaemonCore: {} of {} tracks of {} not in the library",
                playlist.tracks.len() - tracks.len(),
                playlist.tracks.len(),
                playlist_id
            );
        }
        info!("DaemonCore: queued playlist {} ({} tracks)", playlist.name, tracks.len());
        self.session.set_queue(tracks);
        Ok(())
    }

    // ── catalog & playlists ───────────────────────────────────────────────────

    fn reload_catalog(&mut self, request: CatalogRequest) {
        self.catalog_seq += 1;
        let seq = self.catalog_seq;
        let catalog = Arc::clone(&self.catalog);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = catalog.fetch(&request).await;
            let _ = tx
                .send(DaemonEvent::CatalogLoaded {
                    seq,
                    request,
                    result,
                })
                .await;
        });
    }

    fn handle_catalog(
        &mut self,
        seq: u64,
        request: CatalogRequest,
        result: Result<Vec<Track>, CatalogError>,
    ) {
        if seq != self.catalog_seq {
            debug!("DaemonCore: dropping stale catalog response {:?}", request);
            return;
        }
        match result {
            Ok(tracks) => {
                for t in &tracks {
                    self.library.insert(t.id.clone(), t.clone());
                }
                self.catalog_error = None;
                self.session.set_queue(tracks);
            }
            Err(e) => {
                warn!("DaemonCore: {}", e);
                self.catalog_error = Some(e.to_string());
            }
        }
    }

    async fn refresh_playlists(&mut self) {
        let result = self.playlists.refresh().await.map(|_| ());
        self.note_playlist_result(result);
    }

    /// The store logs failures and keeps its previous list; the view only
    /// carries the latest outcome.
    fn note_playlist_result(&mut self, result: Result<(), ApiError>) {
        self.playlist_error = result.err().map(|e| e.to_string());
    }

    // ── session events ────────────────────────────────────────────────────────

    async fn handle_progress(&mut self, update: ProgressUpdate) {
        match self.session.tick(update).await {
            TickOutcome::Load(pending) => self.spawn_load(pending),
            TickOutcome::Stopped => info!("DaemonCore: playback finished"),
            TickOutcome::Failed(e) => warn!("DaemonCore: could not continue: {}", e),
            TickOutcome::Ignored | TickOutcome::Progress => {}
        }
    }

    async fn handle_load_settled(&mut self, outcome: LoadOutcome<MpvMedia>) {
        let track_id = outcome.track_id.clone();
        // Failures are logged by the session and exposed as last_error.
        if self.session.finish_load(outcome).await.is_ok() {
            let history = Arc::clone(&self.history);
            tokio::spawn(async move {
                if let Err(e) = history.record_play(&track_id).await {
                    debug!("DaemonCore: history not recorded for {}: {}", track_id, e);
                }
            });
        }
    }

    async fn cleanup(&mut self) {
        info!("DaemonCore: cleaning up");
        self.session.stop().await;
        self.persist().await;
        self.provider.shutdown().await;
    }
}
