//! Shared fixtures: a scripted media provider and a throwaway HTTP backend.
#![allow(dead_code)]

use cadence_core::error::MediaError;
use cadence_core::model::Track;
use cadence_core::player::{MediaHandle, MediaProvider, ProgressSink};
use futures_util::future::{self, BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub const TRACK_SECS: f64 = 200.0;

pub fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {}", id),
        artist: "Artist".to_string(),
        album: "Single".to_string(),
        cover_url: "https://via.placeholder.com/150".to_string(),
        stream_url: Some(format!("https://cdn.test/{}.mp3", id)),
        duration_secs: Some(TRACK_SECS),
        genres: vec![],
    }
}

pub fn uri(id: &str) -> String {
    format!("https://cdn.test/{}.mp3", id)
}

#[derive(Default)]
struct FakeState {
    log: Vec<String>,
    failing: HashSet<String>,
    gates: HashMap<String, oneshot::Receiver<()>>,
    seek_fails: bool,
    sinks: Vec<ProgressSink>,
}

/// Media provider whose loads succeed immediately unless told otherwise.
/// Every call is appended to a log the tests assert on.
#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, uri: &str) {
        self.state.lock().unwrap().failing.insert(uri.to_string());
    }

    /// The next load of `uri` waits until the returned sender fires.
    pub fn gate(&self, uri: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().unwrap().gates.insert(uri.to_string(), rx);
        tx
    }

    pub fn fail_seeks(&self) {
        self.state.lock().unwrap().seek_fails = true;
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.log().iter().filter(|e| *e == entry).count()
    }

    pub fn last_sink(&self) -> Option<ProgressSink> {
        self.state.lock().unwrap().sinks.last().cloned()
    }
}

impl MediaProvider for FakeProvider {
    type Handle = FakeHandle;

    fn load(
        &self,
        uri: &str,
        progress: ProgressSink,
    ) -> BoxFuture<'static, Result<FakeHandle, MediaError>> {
        let uri = uri.to_string();
        let (gate, fails) = {
            let mut st = self.state.lock().unwrap();
            st.log.push(format!("load {}", uri));
            st.sinks.push(progress);
            (st.gates.remove(&uri), st.failing.contains(&uri))
        };
        let state = self.state.clone();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if fails {
                return Err(MediaError::Load {
                    uri,
                    reason: "404 Not Found".to_string(),
                });
            }
            state.lock().unwrap().log.push(format!("ready {}", uri));
            Ok(FakeHandle { uri, state })
        }
        .boxed()
    }
}

pub struct FakeHandle {
    uri: String,
    state: Arc<Mutex<FakeState>>,
}

impl std::fmt::Debug for FakeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeHandle").field("uri", &self.uri).finish()
    }
}

impl FakeHandle {
    fn record(&self, what: &str) -> BoxFuture<'static, Result<(), MediaError>> {
        self.state
            .lock()
            .unwrap()
            .log
            .push(format!("{} {}", what, self.uri));
        future::ready(Ok(())).boxed()
    }
}

impl MediaHandle for FakeHandle {
    fn play(&self) -> BoxFuture<'static, Result<(), MediaError>> {
        self.record("play")
    }

    fn pause(&self) -> BoxFuture<'static, Result<(), MediaError>> {
        self.record("pause")
    }

    fn seek_to(&self, position_ms: u64) -> BoxFuture<'static, Result<(), MediaError>> {
        let fails = self.state.lock().unwrap().seek_fails;
        if fails {
            return future::ready(Err(MediaError::Transport("not seekable".into()))).boxed();
        }
        self.record(&format!("seek {}", position_ms))
    }

    fn unload(&self) -> BoxFuture<'static, Result<(), MediaError>> {
        self.record("unload")
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
