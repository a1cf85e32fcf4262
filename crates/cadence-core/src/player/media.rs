//! The seam between the playback session and whatever actually decodes
//! audio.  The daemon plugs mpv in here; tests plug in a scripted fake.

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::MediaError;

/// One report from a media resource's progress channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    /// The stream played through to its natural end.
    pub did_finish: bool,
}

impl ProgressEvent {
    pub fn at(position_ms: u64, duration_ms: u64) -> Self {
        Self {
            position_ms,
            duration_ms: Some(duration_ms),
            did_finish: false,
        }
    }

    pub fn finished(duration_ms: u64) -> Self {
        Self {
            position_ms: duration_ms,
            duration_ms: Some(duration_ms),
            did_finish: true,
        }
    }
}

/// A progress event tagged with the load generation that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub generation: u64,
    pub event: ProgressEvent,
}

/// Handed to a provider on every load.  Events reported through it carry the
/// generation of that load, so the session can drop reports from resources
/// it has already replaced.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    generation: u64,
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ProgressSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once nobody is listening any more.
    pub fn report(&self, event: ProgressEvent) -> bool {
        self.tx
            .send(ProgressUpdate {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// A loaded, playing media resource.
pub trait MediaHandle: Send + 'static {
    fn play(&self) -> BoxFuture<'static, Result<(), MediaError>>;

    fn pause(&self) -> BoxFuture<'static, Result<(), MediaError>>;

    fn seek_to(&self, position_ms: u64) -> BoxFuture<'static, Result<(), MediaError>>;

    /// Release the resource.  The handle is dropped right after.
    fn unload(&self) -> BoxFuture<'static, Result<(), MediaError>>;
}

/// Platform audio capability.  `load` resolves once the stream is playing.
pub trait MediaProvider: Send + Sync + 'static {
    type Handle: MediaHandle;

    fn load(
        &self,
        uri: &str,
        progress: ProgressSink,
    ) -> BoxFuture<'static, Result<Self::Handle, MediaError>>;
}
