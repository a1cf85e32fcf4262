/// mpv-backed media provider.
///
/// Architecture:
///
/// ```text
///   MpvProvider::load(uri, sink)
///         │  (lazily spawns mpv and connects)
///         ├── writer_task   ← receives PendingRequest via mpsc, serialises → socket
///         ├── reader_task   ← reads JSON lines from socket
///         │                      ├── response (has request_id) → matched oneshot::Sender
///         │                      └── event / property-change   → router
///         └── route_events  ← time-pos / duration / file-loaded / end-file
///                                └── ProgressSink of the active load
/// ```
///
/// mpv plays one file at a time, so at most one `MpvMedia` is *active*.
/// Transport calls on a handle that is no longer active are no-ops; in
/// particular unloading a superseded handle never stops the track that
/// replaced it.
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use cadence_core::error::MediaError;
use cadence_core::player::{MediaHandle, MediaProvider, ProgressEvent, ProgressSink};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const OBS_TIME_POS: u64 = 1;
const OBS_DURATION: u64 = 2;

const IPC_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a `loadfile` may take before the load counts as failed.
const LOAD_TIMEOUT: Duration = Duration::from_secs(20);

type ReplyMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

// ── IPC connection ────────────────────────────────────────────────────────────

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.event_name()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.raw.get(key)?.as_str()
    }
}

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvIpc {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvIpc {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(IPC_TIMEOUT, reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    async fn command(&self, command: Value) -> Result<(), MediaError> {
        self.send(command)
            .await
            .map(|_| ())
            .map_err(|e| MediaError::Transport(e.to_string()))
    }

    pub async fn observe_properties(&self) {
        for (id, name) in [(OBS_TIME_POS, "time-pos"), (OBS_DURATION, "duration")] {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

// ── process driver ────────────────────────────────────────────────────────────

/// Owns the mpv child process.
struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
    volume: f32,
}

impl MpvDriver {
    fn new(volume: f32) -> Self {
        Self {
            socket_name: cadence_core::platform::mpv_socket_name(),
            process: None,
            volume,
        }
    }

    fn process_alive(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => child.try_wait().ok().flatten().is_none(),
            None => false,
        }
    }

    async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn spawn_process(&mut self) -> anyhow::Result<()> {
        info!("mpv: spawning new process");
        let mpv_binary = cadence_core::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let child = tokio::process::Command::new(mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(cadence_core::platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(format!("--volume={}", volume_pct(self.volume)))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvIpc> {
        self.kill().await;
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        self.spawn_process()?;

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx))
    }

    #[cfg(windows)]
    async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvIpc> {
        self.kill().await;
        self.spawn_process()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn volume_pct(volume: f32) -> i64 {
    (volume * 100.0).clamp(0.0, 100.0).round() as i64
}

fn start_io_tasks<R, W>(
    reader: BufReader<R>,
    writer: W,
    event_tx: mpsc::Sender<MpvEvent>,
) -> MpvIpc
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel.  Writer inserts, reader resolves.
    let pending: ReplyMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(writer, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, event_tx));

    MpvIpc { tx: cmd_tx }
}

async fn fail_all(pending: &ReplyMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: ReplyMap,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    match map.remove(&req_id) {
                        Some(tx) => {
                            let result = if val["error"].as_str() == Some("success") {
                                Ok(val)
                            } else {
                                let err = val["error"].as_str().unwrap_or("unknown error");
                                debug!("mpv reader: response req={} err={}", req_id, err);
                                Err(anyhow::anyhow!("mpv error: {}", err))
                            };
                            let _ = tx.send(result);
                        }
                        None => debug!("mpv reader: response for unknown req={}", req_id),
                    }
                } else if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, &format!("mpv IPC read error: {}", e)).await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: ReplyMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── provider ──────────────────────────────────────────────────────────────────

/// The load mpv is currently playing (or about to).
struct Active {
    id: u64,
    uri: String,
    sink: ProgressSink,
    /// Resolved on `file-loaded` or a failing `end-file`.
    loaded: Option<oneshot::Sender<Result<(), MediaError>>>,
    position_ms: u64,
    duration_ms: Option<u64>,
}

struct Connection {
    driver: MpvDriver,
    ipc: Option<MpvIpc>,
}

struct Inner {
    conn: Mutex<Connection>,
    active: Mutex<Option<Active>>,
    /// Id of the newest `load` call.  Older calls that have not reached mpv
    /// yet give up instead of overriding it.
    latest: AtomicU64,
}

#[derive(Clone)]
pub struct MpvProvider {
    inner: Arc<Inner>,
}

impl MpvProvider {
    pub fn new(volume: f32) -> Self {
        Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(Connection {
                    driver: MpvDriver::new(volume),
                    ipc: None,
                }),
                active: Mutex::new(None),
                latest: AtomicU64::new(0),
            }),
        }
    }

    pub async fn set_volume(&self, volume: f32) -> anyhow::Result<()> {
        let mut conn = self.inner.conn.lock().await;
        conn.driver.volume = volume;
        if let Some(ipc) = conn.ipc.as_ref() {
            ipc.send(json!(["set_property", "volume", volume_pct(volume)]))
                .await?;
        }
        Ok(())
    }

    pub async fn shutdown(&self) {
        let mut conn = self.inner.conn.lock().await;
        if let Some(ipc) = conn.ipc.take() {
            let _ = ipc.send(json!(["quit"])).await;
        }
        conn.driver.kill().await;
    }
}

impl Inner {
    /// Live IPC handle, spawning mpv when it is not running.
    async fn connection(self: &Arc<Self>, conn: &mut Connection) -> Result<MpvIpc, MediaError> {
        if conn.ipc.is_some() && !conn.driver.process_alive() {
            warn!("mpv: process died, dropping connection");
            conn.ipc = None;
        }
        if let Some(ipc) = conn.ipc.clone() {
            return Ok(ipc);
        }

        let (event_tx, event_rx) = mpsc::channel::<MpvEvent>(256);
        let ipc = conn.driver.spawn_and_connect(event_tx).await.map_err(|e| {
            warn!("mpv: failed to start: {}", e);
            MediaError::Unavailable
        })?;
        tokio::spawn(route_events(event_rx, Arc::clone(self)));
        ipc.observe_properties().await;
        conn.ipc = Some(ipc.clone());
        Ok(ipc)
    }

    /// Send `command` only while load `id` is the active one; `release`
    /// also clears it.  The connection lock is held from the check through
    /// the send, the same order `load` takes, so a newer `loadfile` cannot
    /// land in between.
    async fn command_if_active(
        &self,
        id: u64,
        ipc: &MpvIpc,
        command: Value,
        release: bool,
    ) -> Result<(), MediaError> {
        let _conn = self.conn.lock().await;
        {
            let mut active = self.active.lock().await;
            if active.as_ref().map(|a| a.id) != Some(id) {
                debug!("mpv: ignoring {} for inactive load {}", command, id);
                return Ok(());
            }
            if release {
                active.take();
            }
        }
        ipc.command(command).await
    }

    async fn on_event(&self, evt: &MpvEvent) {
        let mut guard = self.active.lock().await;
        let Some(active) = guard.as_mut() else {
            return;
        };

        if let Some((obs_id, data)) = evt.as_property_change() {
            let secs = data.as_f64().filter(|s| s.is_finite() && *s >= 0.0);
            match obs_id {
                OBS_TIME_POS => {
                    let Some(secs) = secs else { return };
                    let ms = (secs * 1000.0) as u64;
                    // mpv pushes time-pos every frame; report whole seconds.
                    let changed = ms / 1000 != active.position_ms / 1000;
                    active.position_ms = ms;
                    if changed && active.loaded.is_none() {
                        active.sink.report(ProgressEvent {
                            position_ms: ms,
                            duration_ms: active.duration_ms,
                            did_finish: false,
                        });
                    }
                }
                OBS_DURATION => {
                    active.duration_ms = secs.map(|s| (s * 1000.0).round() as u64);
                }
                _ => {}
            }
            return;
        }

        match evt.event_name() {
            Some("file-loaded") => {
                if let Some(tx) = active.loaded.take() {
                    debug!("mpv: file-loaded {}", active.uri);
                    let _ = tx.send(Ok(()));
                }
            }
            Some("end-file") => {
                let reason = evt.str_field("reason").unwrap_or("unknown");
                debug!("mpv: end-file reason={} active={}", reason, active.uri);
                match reason {
                    // The end of the previous file arrives before the new
                    // one is loaded; only a loaded file can finish.
                    "eof" if active.loaded.is_none() => {
                        let end = active.duration_ms.unwrap_or(active.position_ms);
                        active.sink.report(ProgressEvent {
                            position_ms: end,
                            duration_ms: active.duration_ms,
                            did_finish: true,
                        });
                    }
                    "error" => {
                        let detail = evt.str_field("file_error").unwrap_or("playback error");
                        match active.loaded.take() {
                            Some(tx) => {
                                let _ = tx.send(Err(MediaError::Load {
                                    uri: active.uri.clone(),
                                    reason: detail.to_string(),
                                }));
                            }
                            None => warn!("mpv: {} stopped with error: {}", active.uri, detail),
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    async fn on_disconnect(&self) {
        warn!("mpv: event stream closed");
        // Dropping a pending `loaded` sender fails that load.
        self.active.lock().await.take();
        self.conn.lock().await.ipc = None;
    }
}

async fn route_events(mut rx: mpsc::Receiver<MpvEvent>, inner: Arc<Inner>) {
    while let Some(evt) = rx.recv().await {
        inner.on_event(&evt).await;
    }
    inner.on_disconnect().await;
}

impl MediaProvider for MpvProvider {
    type Handle = MpvMedia;

    fn load(
        &self,
        uri: &str,
        progress: ProgressSink,
    ) -> BoxFuture<'static, Result<MpvMedia, MediaError>> {
        let inner = Arc::clone(&self.inner);
        let uri = uri.to_string();
        let id = inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            let superseded = || MediaError::Load {
                uri: uri.clone(),
                reason: "superseded by a newer load".to_string(),
            };

            let (loaded_tx, loaded_rx) = oneshot::channel();
            let ipc = {
                // Held until loadfile is sent so concurrent loads reach mpv in order.
                let mut conn = inner.conn.lock().await;
                if inner.latest.load(Ordering::SeqCst) != id {
                    return Err(superseded());
                }
                let ipc = inner.connection(&mut conn).await?;
                *inner.active.lock().await = Some(Active {
                    id,
                    uri: uri.clone(),
                    sink: progress,
                    loaded: Some(loaded_tx),
                    position_ms: 0,
                    duration_ms: None,
                });
                ipc.command(json!(["loadfile", uri.as_str(), "replace"])).await?;
                ipc.command(json!(["set_property", "pause", false])).await?;
                ipc
            };
            info!("mpv: loading {}", uri);

            match tokio::time::timeout(LOAD_TIMEOUT, loaded_rx).await {
                Ok(Ok(Ok(()))) => Ok(MpvMedia { id, ipc, inner }),
                Ok(Ok(Err(e))) => Err(e),
                Ok(Err(_)) => Err(superseded()),
                Err(_) => {
                    let _ = inner
                        .command_if_active(id, &ipc, json!(["stop"]), true)
                        .await;
                    Err(MediaError::Load {
                        uri,
                        reason: format!("no playback after {}s", LOAD_TIMEOUT.as_secs()),
                    })
                }
            }
        }
        .boxed()
    }
}

/// One loaded file.  Commands only reach mpv while this is the active load.
pub struct MpvMedia {
    id: u64,
    ipc: MpvIpc,
    inner: Arc<Inner>,
}

impl MpvMedia {
    fn when_active(&self, command: Value) -> BoxFuture<'static, Result<(), MediaError>> {
        let (id, ipc, inner) = (self.id, self.ipc.clone(), Arc::clone(&self.inner));
        async move { inner.command_if_active(id, &ipc, command, false).await }.boxed()
    }
}

impl MediaHandle for MpvMedia {
    fn play(&self) -> BoxFuture<'static, Result<(), MediaError>> {
        self.when_active(json!(["set_property", "pause", false]))
    }

    fn pause(&self) -> BoxFuture<'static, Result<(), MediaError>> {
        self.when_active(json!(["set_property", "pause", true]))
    }

    fn seek_to(&self, position_ms: u64) -> BoxFuture<'static, Result<(), MediaError>> {
        self.when_active(json!(["set_property", "time-pos", position_ms as f64 / 1000.0]))
    }

    fn unload(&self) -> BoxFuture<'static, Result<(), MediaError>> {
        let (id, ipc, inner) = (self.id, self.ipc.clone(), Arc::clone(&self.inner));
        async move { inner.command_if_active(id, &ipc, json!(["stop"]), true).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::player::ProgressUpdate;

    #[test]
    fn test_property_change_parsing() {
        let evt = MpvEvent {
            raw: json!({ "event": "property-change", "id": 1, "name": "time-pos", "data": 12.5 }),
        };
        let (id, data) = evt.as_property_change().unwrap();
        assert_eq!(id, OBS_TIME_POS);
        assert_eq!(data.as_f64(), Some(12.5));

        let end = MpvEvent {
            raw: json!({ "event": "end-file", "reason": "eof" }),
        };
        assert!(end.as_property_change().is_none());
        assert_eq!(end.event_name(), Some("end-file"));
        assert_eq!(end.str_field("reason"), Some("eof"));
    }

    #[test]
    fn test_volume_pct_clamps() {
        assert_eq!(volume_pct(0.5), 50);
        assert_eq!(volume_pct(1.7), 100);
        assert_eq!(volume_pct(-1.0), 0);
    }

    async fn active_id(provider: &MpvProvider) -> Option<u64> {
        provider.inner.active.lock().await.as_ref().map(|a| a.id)
    }

    type LoadedRx = oneshot::Receiver<Result<(), MediaError>>;

    fn active_load(
        id: u64,
        sink: ProgressSink,
        loaded: Option<oneshot::Sender<Result<(), MediaError>>>,
    ) -> Active {
        Active {
            id,
            uri: "https://cdn.test/a.mp3".into(),
            sink,
            loaded,
            position_ms: 0,
            duration_ms: None,
        }
    }

    async fn provider_with_active(
        id: u64,
    ) -> (MpvProvider, mpsc::UnboundedReceiver<ProgressUpdate>, LoadedRx) {
        let provider = MpvProvider::new(0.5);
        let (tx, rx) = mpsc::unbounded_channel();
        let (loaded_tx, loaded_rx) = oneshot::channel();
        *provider.inner.active.lock().await =
            Some(active_load(id, ProgressSink::new(7, tx), Some(loaded_tx)));
        (provider, rx, loaded_rx)
    }

    fn event(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[tokio::test]
    async fn test_eof_before_file_loaded_is_not_a_finish() {
        let (provider, mut rx, loaded_rx) = provider_with_active(1).await;
        let inner = &provider.inner;

        // tail of the previous file
        inner.on_event(&event(json!({ "event": "end-file", "reason": "eof" }))).await;
        inner.on_event(&event(json!({ "event": "file-loaded" }))).await;
        assert_eq!(loaded_rx.await.unwrap(), Ok(()));
        assert!(rx.try_recv().is_err());

        inner
            .on_event(&event(json!({ "event": "property-change", "id": 2, "data": 180.0 })))
            .await;
        inner
            .on_event(&event(json!({ "event": "property-change", "id": 1, "data": 3.2 })))
            .await;
        let update = rx.try_recv().unwrap();
        assert_eq!(update.generation, 7);
        assert_eq!(update.event, ProgressEvent::at(3_200, 180_000));

        inner.on_event(&event(json!({ "event": "end-file", "reason": "eof" }))).await;
        let done = rx.try_recv().unwrap();
        assert_eq!(done.event, ProgressEvent::finished(180_000));
    }

    #[tokio::test]
    async fn test_error_end_file_fails_pending_load() {
        let (provider, _rx, loaded_rx) = provider_with_active(1).await;

        provider
            .inner
            .on_event(&event(json!({
                "event": "end-file",
                "reason": "error",
                "file_error": "loading failed"
            })))
            .await;

        let err = loaded_rx.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            MediaError::Load {
                uri: "https://cdn.test/a.mp3".into(),
                reason: "loading failed".into()
            }
        );
    }

    #[tokio::test]
    async fn test_inactive_handle_does_not_stop_playback() {
        let (provider, _rx, _loaded) = provider_with_active(2).await;
        // nothing is listening on the other end
        let (tx, _cmd_rx) = mpsc::channel(1);
        let stale = MpvMedia {
            id: 1,
            ipc: MpvIpc { tx },
            inner: Arc::clone(&provider.inner),
        };

        assert_eq!(stale.unload().await, Ok(()));
        assert_eq!(stale.pause().await, Ok(()));
        assert_eq!(active_id(&provider).await, Some(2));
    }

    #[tokio::test]
    async fn test_stale_unload_waits_for_newer_load_and_leaves_it_playing() {
        let (provider, _rx, _loaded) = provider_with_active(1).await;
        let (tx, mut cmd_rx) = mpsc::channel(8);
        let stale = MpvMedia {
            id: 1,
            ipc: MpvIpc { tx },
            inner: Arc::clone(&provider.inner),
        };

        // A newer load holds the connection while it switches files.
        let conn = provider.inner.conn.lock().await;
        let unload = tokio::spawn(stale.unload());
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let (sink_tx, _sink_rx) = mpsc::unbounded_channel();
        *provider.inner.active.lock().await =
            Some(active_load(2, ProgressSink::new(8, sink_tx), None));
        drop(conn);

        assert_eq!(unload.await.unwrap(), Ok(()));
        assert_eq!(active_id(&provider).await, Some(2));
        assert!(cmd_rx.try_recv().is_err());
    }
}
