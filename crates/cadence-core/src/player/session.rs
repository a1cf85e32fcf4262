//! The playback session: the one place that owns a media resource.
//!
//! Loads are split in two halves so a caller can let them run concurrently:
//! `begin_*` tears down the previous resource, bumps the generation and
//! returns a `PendingLoad`; whoever drives that future hands the outcome back
//! to `finish_load`.  An outcome whose generation is no longer current is
//! dropped (and its resource unloaded), so the most recent request always
//! wins no matter which acquisition resolves first.
//!
//! Progress reports carry the generation of the load that produced them and
//! are filtered the same way.

use futures_util::future::BoxFuture;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::media::{MediaHandle, MediaProvider, ProgressSink, ProgressUpdate};
use super::queue::{Direction, Queue};
use super::{PlaybackStatus, RepeatMode, SessionSnapshot};
use crate::error::{MediaError, PlaybackError};
use crate::model::Track;
use crate::stream_url::StreamUrlRewriter;

/// An acquisition that has been started but not yet applied.
pub struct PendingLoad<H> {
    generation: u64,
    track: Track,
    load: BoxFuture<'static, Result<H, MediaError>>,
}

impl<H> PendingLoad<H> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Drive the acquisition to completion.  Does not touch the session.
    pub async fn resolve(self) -> LoadOutcome<H> {
        let result = self.load.await;
        LoadOutcome {
            generation: self.generation,
            track_id: self.track.id,
            result,
        }
    }
}

impl<H> fmt::Debug for PendingLoad<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLoad")
            .field("generation", &self.generation)
            .field("track", &self.track.id)
            .finish()
    }
}

/// Result of a `PendingLoad`, to be applied with `finish_load`.
pub struct LoadOutcome<H> {
    pub generation: u64,
    pub track_id: String,
    pub result: Result<H, MediaError>,
}

impl<H> fmt::Debug for LoadOutcome<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOutcome")
            .field("generation", &self.generation)
            .field("track_id", &self.track_id)
            .field("ok", &self.result.is_ok())
            .finish()
    }
}

/// What a progress report led to.
#[derive(Debug)]
pub enum TickOutcome<H> {
    /// Stale generation or nothing loaded.
    Ignored,
    /// Progress updated.
    Progress,
    /// The track finished and the next one is being acquired.
    Load(PendingLoad<H>),
    /// The track finished and playback stopped.
    Stopped,
    /// The track finished and the follow-up could not even be started.
    Failed(PlaybackError),
}

struct InFlight {
    generation: u64,
    track: Track,
    queue_index: Option<usize>,
}

pub struct PlaybackSession<P: MediaProvider> {
    provider: P,
    rewriter: StreamUrlRewriter,
    progress_tx: mpsc::UnboundedSender<ProgressUpdate>,
    queue: Queue,
    status: PlaybackStatus,
    current: Option<Track>,
    in_flight: Option<InFlight>,
    media: Option<P::Handle>,
    generation: u64,
    rev: u64,
    progress: f64,
    position_ms: u64,
    duration_ms: Option<u64>,
    repeat: RepeatMode,
    last_error: Option<PlaybackError>,
}

impl<P: MediaProvider> PlaybackSession<P> {
    /// Returns the session and the receiving end of its progress channel.
    /// Whoever owns the session feeds what arrives there into `tick`.
    pub fn new(
        provider: P,
        rewriter: StreamUrlRewriter,
    ) -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let session = Self {
            provider,
            rewriter,
            progress_tx,
            queue: Queue::default(),
            status: PlaybackStatus::Idle,
            current: None,
            in_flight: None,
            media: None,
            generation: 0,
            rev: 1,
            progress: 0.0,
            position_ms: 0,
            duration_ms: None,
            repeat: RepeatMode::Off,
            last_error: None,
        };
        (session, progress_rx)
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn is_shuffled(&self) -> bool {
        self.queue.is_shuffled()
    }

    pub fn last_error(&self) -> Option<&PlaybackError> {
        self.last_error.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            rev: self.rev,
            generation: self.generation,
            status: self.status,
            current_track: self.current.clone(),
            loading_track: self.in_flight.as_ref().map(|f| f.track.clone()),
            progress: self.progress,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            shuffle: self.queue.is_shuffled(),
            repeat: self.repeat,
            cursor: self.queue.cursor(),
            queue_len: self.queue.len(),
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
        }
    }

    fn bump(&mut self) {
        self.rev += 1;
    }

    // ── queue & policies ──────────────────────────────────────────────────────

    /// Replace the queue, keeping the cursor on the current track if present.
    pub fn set_queue(&mut self, tracks: Vec<Track>) {
        let keep = self.current.as_ref().map(|t| t.id.clone());
        self.queue.set_tracks(tracks, keep.as_deref());
        self.bump();
    }

    pub fn set_shuffle(&mut self, on: bool) {
        self.queue.set_shuffle(on);
        self.bump();
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        let on = !self.queue.is_shuffled();
        self.set_shuffle(on);
        on
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
        self.bump();
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.set_repeat(self.repeat.cycle());
        self.repeat
    }

    // ── loading ───────────────────────────────────────────────────────────────

    pub async fn begin_play(
        &mut self,
        track: Track,
    ) -> Result<PendingLoad<P::Handle>, PlaybackError> {
        let idx = self.queue.position_of(&track.id);
        self.begin_load(track, idx).await
    }

    pub async fn begin_play_index(
        &mut self,
        idx: usize,
    ) -> Result<PendingLoad<P::Handle>, PlaybackError> {
        let track = self
            .queue
            .get(idx)
            .cloned()
            .ok_or(PlaybackError::NoSuchEntry(idx))?;
        self.begin_load(track, Some(idx)).await
    }

    /// Start loading the neighbour of the current entry.  Steps from the
    /// entry being loaded when a load is already in flight.  `None` on an
    /// empty queue.
    pub async fn begin_advance(
        &mut self,
        direction: Direction,
    ) -> Result<Option<PendingLoad<P::Handle>>, PlaybackError> {
        let target = match self.in_flight.as_ref().and_then(|f| f.queue_index) {
            Some(pending) => self.queue.peek_from(pending, direction),
            None => self.queue.peek(direction),
        };
        let Some(target) = target else {
            debug!("player: advance {:?} on empty queue", direction);
            return Ok(None);
        };
        self.begin_play_index(target).await.map(Some)
    }

    async fn begin_load(
        &mut self,
        track: Track,
        queue_index: Option<usize>,
    ) -> Result<PendingLoad<P::Handle>, PlaybackError> {
        self.generation += 1;
        let generation = self.generation;
        if let Some(stale) = self.in_flight.take() {
            debug!(
                "player: superseding load of {} (gen {})",
                stale.track.id, stale.generation
            );
        }
        self.teardown().await;
        self.progress = 0.0;
        self.position_ms = 0;

        let uri = match track.stream_url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => self.rewriter.rewrite(u),
            _ => {
                let err = PlaybackError::NoStream {
                    track_id: track.id.clone(),
                };
                warn!("player: {}", err);
                self.status = PlaybackStatus::Idle;
                self.last_error = Some(err.clone());
                self.bump();
                return Err(err);
            }
        };

        info!(
            "player: loading {:?} [{}] gen={} uri={}",
            track.title, track.id, generation, uri
        );
        let sink = ProgressSink::new(generation, self.progress_tx.clone());
        let load = self.provider.load(&uri, sink);

        self.status = PlaybackStatus::Loading;
        self.in_flight = Some(InFlight {
            generation,
            track: track.clone(),
            queue_index,
        });
        self.bump();

        Ok(PendingLoad {
            generation,
            track,
            load,
        })
    }

    /// Apply a settled acquisition.  Stale outcomes are discarded and any
    /// resource they acquired is released.
    pub async fn finish_load(
        &mut self,
        outcome: LoadOutcome<P::Handle>,
    ) -> Result<(), PlaybackError> {
        let current_gen = self.in_flight.as_ref().map(|f| f.generation);
        if current_gen != Some(outcome.generation) {
            debug!(
                "player: discarding stale load of {} (gen {}, now {})",
                outcome.track_id, outcome.generation, self.generation
            );
            if let Ok(handle) = outcome.result {
                release(handle).await;
            }
            return Err(PlaybackError::Superseded);
        }
        let Some(flight) = self.in_flight.take() else {
            return Err(PlaybackError::Superseded);
        };

        match outcome.result {
            Ok(handle) => {
                self.media = Some(handle);
                if let Some(idx) = flight.queue_index {
                    self.queue.set_cursor(idx);
                }
                info!("player: playing {} gen={}", flight.track.id, flight.generation);
                self.duration_ms = flight.track.duration_ms();
                self.current = Some(flight.track);
                self.status = PlaybackStatus::Playing;
                self.progress = 0.0;
                self.position_ms = 0;
                self.last_error = None;
                self.bump();
                Ok(())
            }
            Err(e) => {
                let err = PlaybackError::MediaLoad {
                    track_id: flight.track.id,
                    reason: e.to_string(),
                };
                warn!("player: {}", err);
                self.status = PlaybackStatus::Idle;
                self.last_error = Some(err.clone());
                self.bump();
                Err(err)
            }
        }
    }

    /// Resolve a pending load in place and apply it.
    pub async fn settle(&mut self, pending: PendingLoad<P::Handle>) -> Result<(), PlaybackError> {
        let outcome = pending.resolve().await;
        self.finish_load(outcome).await
    }

    pub async fn play_track(&mut self, track: Track) -> Result<(), PlaybackError> {
        let pending = self.begin_play(track).await?;
        self.settle(pending).await
    }

    pub async fn play_index(&mut self, idx: usize) -> Result<(), PlaybackError> {
        let pending = self.begin_play_index(idx).await?;
        self.settle(pending).await
    }

    pub async fn advance(&mut self, direction: Direction) -> Result<(), PlaybackError> {
        match self.begin_advance(direction).await? {
            Some(pending) => self.settle(pending).await,
            None => Ok(()),
        }
    }

    // ── transport ─────────────────────────────────────────────────────────────

    /// Play or pause.  The status flips before the resource confirms.
    pub async fn set_playing(&mut self, playing: bool) {
        if !self.status.is_ready() {
            debug!("player: set_playing({}) ignored in {:?}", playing, self.status);
            return;
        }
        let Some(handle) = self.media.as_ref() else {
            return;
        };
        let command = if playing { handle.play() } else { handle.pause() };
        self.status = if playing {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Paused
        };
        self.bump();
        if let Err(e) = command.await {
            warn!("player: transport command failed: {}", e);
        }
    }

    /// Jump to `percentage` of the track, clamped to 0..=100.  Returns the
    /// absolute target in ms, or `None` when nothing was sought.
    pub async fn seek(&mut self, percentage: f64) -> Option<u64> {
        if !self.status.is_ready() {
            return None;
        }
        let duration = self
            .duration_ms
            .or_else(|| self.current.as_ref().and_then(Track::duration_ms))
            .filter(|d| *d > 0)?;
        let handle = self.media.as_ref()?;

        let pct = if percentage.is_nan() {
            0.0
        } else {
            percentage.clamp(0.0, 100.0)
        };
        let target = (pct / 100.0 * duration as f64).round() as u64;

        match handle.seek_to(target).await {
            Ok(()) => {
                self.progress = pct;
                self.position_ms = target;
                self.bump();
                Some(target)
            }
            Err(e) => {
                debug!("player: seek to {}ms ignored: {}", target, e);
                None
            }
        }
    }

    /// Release the resource and go idle.  The last track stays visible.
    pub async fn stop(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.teardown().await;
        self.status = PlaybackStatus::Idle;
        self.progress = 0.0;
        self.position_ms = 0;
        self.bump();
    }

    async fn teardown(&mut self) {
        if let Some(handle) = self.media.take() {
            release(handle).await;
        }
    }

    // ── progress ──────────────────────────────────────────────────────────────

    pub async fn tick(&mut self, update: ProgressUpdate) -> TickOutcome<P::Handle> {
        if update.generation != self.generation || self.media.is_none() {
            return TickOutcome::Ignored;
        }
        let event = update.event;
        if let Some(d) = event.duration_ms.filter(|d| *d > 0) {
            self.duration_ms = Some(d);
        }
        self.position_ms = event.position_ms;
        if let Some(d) = self.duration_ms.filter(|d| *d > 0) {
            self.progress = (event.position_ms as f64 / d as f64 * 100.0).clamp(0.0, 100.0);
        }
        self.bump();

        if !event.did_finish {
            return TickOutcome::Progress;
        }
        self.handle_completion().await
    }

    /// Every branch bumps the generation, so a repeated completion report
    /// for the same load is ignored by `tick`.
    async fn handle_completion(&mut self) -> TickOutcome<P::Handle> {
        let next = match self.repeat {
            RepeatMode::One => {
                let Some(track) = self.current.clone() else {
                    self.stop().await;
                    return TickOutcome::Stopped;
                };
                info!("player: repeating {}", track.id);
                let idx = self.queue.position_of(&track.id);
                self.begin_load(track, idx).await.map(Some)
            }
            RepeatMode::Off if self.queue.is_at_end() => {
                info!("player: reached end of queue");
                self.stop().await;
                return TickOutcome::Stopped;
            }
            RepeatMode::Off | RepeatMode::All => self.begin_advance(Direction::Next).await,
        };

        match next {
            Ok(Some(pending)) => TickOutcome::Load(pending),
            Ok(None) => {
                self.stop().await;
                TickOutcome::Stopped
            }
            Err(e) => TickOutcome::Failed(e),
        }
    }
}

async fn release<H: MediaHandle>(handle: H) {
    if let Err(e) = handle.unload().await {
        warn!("player: unload failed: {}", e);
    }
}
