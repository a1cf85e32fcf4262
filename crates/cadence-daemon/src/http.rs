use crate::core::{Command, DaemonEvent};
use crate::state::{DaemonView, StateManager};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use cadence_core::catalog::CatalogRequest;
use cadence_core::history::{HistoryClient, HistoryEntry};
use cadence_core::lyrics::{LyricLine, LyricsClient};
use cadence_core::model::{PlaylistDto, PlaylistKind, PlaylistRequest, Station};
use cadence_core::radio::RadioDirectory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

const DEFAULT_RADIO_LIMIT: u32 = 30;

/// Read-only clients the API queries directly, outside the core loop.
pub struct Lookups {
    pub lyrics: LyricsClient,
    pub history: HistoryClient,
    pub radio: RadioDirectory,
}

#[derive(Clone)]
pub struct HttpState {
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<DaemonEvent>,
    lookups: Arc<Lookups>,
}

impl HttpState {
    pub fn new(
        state_manager: Arc<StateManager>,
        event_tx: mpsc::Sender<DaemonEvent>,
        lookups: Lookups,
    ) -> Self {
        Self {
            state_manager,
            event_tx,
            lookups: Arc::new(lookups),
        }
    }
}

#[derive(Serialize)]
struct LyricsView {
    track_id: String,
    synced: bool,
    plain: Option<String>,
    lines: Vec<LyricLine>,
    /// Index into `lines` for the current playback position.
    active_line: Option<usize>,
}

/// `POST /api/catalog/reload?kind=search&q=...`
#[derive(Debug, Default, Deserialize)]
struct CatalogQuery {
    kind: Option<String>,
    limit: Option<u32>,
    q: Option<String>,
    category: Option<String>,
}

impl CatalogQuery {
    fn into_request(self) -> Option<CatalogRequest> {
        match self.kind.as_deref().unwrap_or("trending") {
            "trending" => Some(match self.limit {
                Some(limit) => CatalogRequest::Trending { limit },
                None => CatalogRequest::default(),
            }),
            "all" => Some(CatalogRequest::All),
            "search" => Some(CatalogRequest::Search {
                query: self.q.unwrap_or_default(),
            }),
            "genre" => self
                .category
                .map(|category| CatalogRequest::ByGenre { category }),
            _ => None,
        }
    }
}

/// Body of `POST /api/playlists` and `PUT /api/playlists/:id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_public: Option<bool>,
}

impl PlaylistBody {
    fn into_create(self) -> PlaylistRequest {
        PlaylistRequest {
            description: self.description,
            is_public: self.is_public.or(Some(true)),
            ..PlaylistRequest::named(self.name.trim())
        }
    }

    /// Leaves `tracks` out so the server keeps the current list.
    fn into_update(self) -> PlaylistRequest {
        PlaylistRequest {
            name: self.name.trim().to_string(),
            description: self.description,
            kind: PlaylistKind::User,
            is_public: self.is_public,
            tracks: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RadioQuery {
    tag: Option<String>,
    q: Option<String>,
    limit: Option<u32>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/play/:idx", post(play_index))
        .route("/api/pause", post(pause))
        .route("/api/resume", post(resume))
        .route("/api/next", post(next))
        .route("/api/prev", post(prev))
        .route("/api/stop", post(stop))
        .route("/api/seek/:pct", post(seek))
        .route("/api/shuffle", post(shuffle))
        .route("/api/repeat", post(repeat))
        .route("/api/like/:id", post(like))
        .route("/api/volume/:volume", post(set_volume))
        .route("/api/catalog/reload", post(reload_catalog))
        .route("/api/playlists", get(list_playlists).post(create_playlist))
        .route("/api/playlists/refresh", post(refresh_playlists))
        .route(
            "/api/playlists/:id",
            put(update_playlist).delete(delete_playlist),
        )
        .route("/api/playlists/:id/queue", post(queue_playlist))
        .route(
            "/api/playlists/:id/tracks/:track",
            post(add_to_playlist).delete(remove_from_playlist),
        )
        .route("/api/lyrics", get(current_lyrics))
        .route("/api/history", get(history))
        .route("/api/radio", get(radio))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state: HttpState,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn send(state: &HttpState, cmd: Command) -> StatusCode {
    info!("HTTP API: {:?}", cmd);
    if state
        .event_tx
        .send(DaemonEvent::ClientCommand(cmd))
        .await
        .is_err()
    {
        error!("HTTP API: core is gone");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

async fn get_state(State(state): State<HttpState>) -> Json<DaemonView> {
    Json(state.state_manager.get_view().await)
}

async fn play_index(State(state): State<HttpState>, Path(idx): Path<usize>) -> StatusCode {
    send(&state, Command::PlayIndex(idx)).await
}

async fn pause(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::Pause).await
}

async fn resume(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::Resume).await
}

async fn next(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::Next).await
}

async fn prev(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::Prev).await
}

async fn stop(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::Stop).await
}

async fn seek(State(state): State<HttpState>, Path(pct): Path<f64>) -> StatusCode {
    send(&state, Command::Seek(pct)).await
}

async fn shuffle(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::ToggleShuffle).await
}

async fn repeat(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::CycleRepeat).await
}

async fn like(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    send(&state, Command::ToggleLike(id)).await
}

async fn set_volume(State(state): State<HttpState>, Path(volume): Path<i32>) -> StatusCode {
    let vol = (volume as f32 / 100.0).clamp(0.0, 1.0);
    send(&state, Command::SetVolume(vol)).await
}

async fn reload_catalog(
    State(state): State<HttpState>,
    Query(query): Query<CatalogQuery>,
) -> StatusCode {
    match query.into_request() {
        Some(request) => send(&state, Command::ReloadCatalog(request)).await,
        None => StatusCode::BAD_REQUEST,
    }
}

async fn list_playlists(State(state): State<HttpState>) -> Json<Vec<PlaylistDto>> {
    Json(state.state_manager.get_view().await.playlists)
}

async fn refresh_playlists(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::RefreshPlaylists).await
}

async fn knows_playlist(state: &HttpState, id: &str) -> bool {
    state
        .state_manager
        .get_view()
        .await
        .playlists
        .iter()
        .any(|p| p.id == id)
}

async fn queue_playlist(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    if !knows_playlist(&state, &id).await {
        return StatusCode::NOT_FOUND;
    }
    send(&state, Command::QueuePlaylist(id)).await
}

async fn create_playlist(
    State(state): State<HttpState>,
    Json(body): Json<PlaylistBody>,
) -> StatusCode {
    if body.name.trim().is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    send(&state, Command::CreatePlaylist(body.into_create())).await
}

async fn update_playlist(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(body): Json<PlaylistBody>,
) -> StatusCode {
    if body.name.trim().is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    if !knows_playlist(&state, &id).await {
        return StatusCode::NOT_FOUND;
    }
    let cmd = Command::UpdatePlaylist {
        playlist_id: id,
        request: body.into_update(),
    };
    send(&state, cmd).await
}

async fn delete_playlist(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    if !knows_playlist(&state, &id).await {
        return StatusCode::NOT_FOUND;
    }
    send(&state, Command::DeletePlaylist(id)).await
}

async fn add_to_playlist(
    State(state): State<HttpState>,
    Path((playlist_id, track_id)): Path<(String, String)>,
) -> StatusCode {
    if !knows_playlist(&state, &playlist_id).await {
        return StatusCode::NOT_FOUND;
    }
    send(
        &state,
        Command::AddToPlaylist {
            playlist_id,
            track_id,
        },
    )
    .await
}

async fn remove_from_playlist(
    State(state): State<HttpState>,
    Path((playlist_id, track_id)): Path<(String, String)>,
) -> StatusCode {
    if !knows_playlist(&state, &playlist_id).await {
        return StatusCode::NOT_FOUND;
    }
    send(
        &state,
        Command::RemoveFromPlaylist {
            playlist_id,
            track_id,
        },
    )
    .await
}

async fn current_lyrics(State(state): State<HttpState>) -> Result<Json<LyricsView>, StatusCode> {
    let view = state.state_manager.get_view().await;
    let track = view.session.current_track.ok_or(StatusCode::NOT_FOUND)?;
    let lyrics = state
        .lookups
        .lyrics
        .fetch(&track.title, &track.artist, track.duration_secs)
        .await
        .map_err(|e| {
            warn!("HTTP API: lyrics for {}: {}", track.id, e);
            match e.status() {
                Some(404) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            }
        })?;

    let lines = lyrics.lines();
    let position_secs = view.session.position_ms as f64 / 1000.0;
    Ok(Json(LyricsView {
        track_id: track.id,
        synced: !lines.is_empty(),
        active_line: cadence_core::lyrics::line_at(&lines, position_secs),
        plain: lyrics.plain_lyrics,
        lines,
    }))
}

async fn history(State(state): State<HttpState>) -> Result<Json<Vec<HistoryEntry>>, StatusCode> {
    state.lookups.history.list().await.map(Json).map_err(|e| {
        warn!("HTTP API: history: {}", e);
        StatusCode::BAD_GATEWAY
    })
}

async fn radio(
    State(state): State<HttpState>,
    Query(query): Query<RadioQuery>,
) -> Result<Json<Vec<Station>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_RADIO_LIMIT);
    let directory = &state.lookups.radio;
    let result = match (query.tag.as_deref(), query.q.as_deref()) {
        (_, Some(name)) if !name.trim().is_empty() => directory.search(name, limit).await,
        (Some(tag), _) if !tag.trim().is_empty() => directory.by_tag(tag, limit).await,
        _ => directory.top_voted(limit).await,
    };
    result.map(Json).map_err(|e| {
        warn!("HTTP API: radio directory: {}", e);
        StatusCode::BAD_GATEWAY
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use cadence_core::config::Config;
    use cadence_core::model::Track;
    use tower::ServiceExt;

    fn harness() -> (Router, Arc<StateManager>, mpsc::Receiver<DaemonEvent>) {
        let config = Config::default();
        let state_manager = Arc::new(StateManager::new(std::env::temp_dir().join("unused.json")));
        let (tx, rx) = mpsc::channel(8);
        let lookups = Lookups {
            lyrics: LyricsClient::new(&config.backend),
            history: HistoryClient::new(config.backend.clone()),
            radio: RadioDirectory::new(&config.radio),
        };
        let app = router(HttpState::new(state_manager.clone(), tx, lookups));
        (app, state_manager, rx)
    }

    fn post_req(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn next_command(rx: &mut mpsc::Receiver<DaemonEvent>) -> Command {
        match rx.try_recv() {
            Ok(DaemonEvent::ClientCommand(cmd)) => cmd,
            other => panic!("expected a command, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_routes_forward_commands() {
        let (app, _, mut rx) = harness();
        let cases = [
            ("/api/play/2", Command::PlayIndex(2)),
            ("/api/pause", Command::Pause),
            ("/api/resume", Command::Resume),
            ("/api/next", Command::Next),
            ("/api/prev", Command::Prev),
            ("/api/stop", Command::Stop),
            ("/api/seek/42.5", Command::Seek(42.5)),
            ("/api/shuffle", Command::ToggleShuffle),
            ("/api/repeat", Command::CycleRepeat),
            ("/api/like/s1", Command::ToggleLike("s1".into())),
            ("/api/volume/150", Command::SetVolume(1.0)),
        ];
        for (uri, expected) in cases {
            let resp = app.clone().oneshot(post_req(uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::ACCEPTED, "{}", uri);
            assert_eq!(next_command(&mut rx).await, expected);
        }
    }

    #[tokio::test]
    async fn test_catalog_reload_query() {
        let (app, _, mut rx) = harness();

        let resp = app
            .clone()
            .oneshot(post_req("/api/catalog/reload?kind=genre&category=edm"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(
            next_command(&mut rx).await,
            Command::ReloadCatalog(CatalogRequest::ByGenre {
                category: "edm".into()
            })
        );

        let resp = app
            .clone()
            .oneshot(post_req("/api/catalog/reload"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(
            next_command(&mut rx).await,
            Command::ReloadCatalog(CatalogRequest::default())
        );

        let resp = app
            .oneshot(post_req("/api/catalog/reload?kind=podcasts"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_state_returns_published_view() {
        let (app, state_manager, _rx) = harness();
        let mut view = DaemonView::default();
        view.volume = 0.3;
        view.queue.push(Track {
            id: "s1".into(),
            title: "Song".into(),
            artist: "Artist".into(),
            album: "Single".into(),
            cover_url: String::new(),
            stream_url: None,
            duration_secs: None,
            genres: vec![],
        });
        state_manager.publish(view).await;

        let resp = app.oneshot(get_req("/api/state")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!((json["volume"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(json["queue"][0]["id"], "s1");
        assert_eq!(json["session"]["status"], "idle");
    }

    fn json_req(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_req(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn publish_playlist(state_manager: &StateManager, id: &str) {
        let mut view = DaemonView::default();
        view.playlists.push(PlaylistDto {
            id: id.into(),
            name: "Mix".into(),
            description: None,
            owner_id: "me".into(),
            owner_name: None,
            public_playlist: false,
            kind: PlaylistKind::User,
            tracks: vec![],
            cover_image: None,
            song_count: None,
            updated_at: None,
        });
        state_manager.publish(view).await;
    }

    #[tokio::test]
    async fn test_create_playlist_forwards_request() {
        let (app, _, mut rx) = harness();

        let body = serde_json::json!({ "name": " Road trip ", "description": "long drive" });
        let resp = app
            .clone()
            .oneshot(json_req("POST", "/api/playlists", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let Command::CreatePlaylist(request) = next_command(&mut rx).await else {
            panic!("expected a create");
        };
        assert_eq!(request.name, "Road trip");
        assert_eq!(request.description.as_deref(), Some("long drive"));
        assert_eq!(request.is_public, Some(true));
        assert_eq!(request.tracks, Some(vec![]));

        let blank = serde_json::json!({ "name": "  " });
        let resp = app
            .oneshot(json_req("POST", "/api/playlists", blank))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete_playlist() {
        let (app, state_manager, mut rx) = harness();
        publish_playlist(&state_manager, "p1").await;

        let body = serde_json::json!({ "name": "Renamed", "isPublic": false });
        let resp = app
            .clone()
            .oneshot(json_req("PUT", "/api/playlists/p1", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let Command::UpdatePlaylist {
            playlist_id,
            request,
        } = next_command(&mut rx).await
        else {
            panic!("expected an update");
        };
        assert_eq!(playlist_id, "p1");
        assert_eq!(request.name, "Renamed");
        assert_eq!(request.is_public, Some(false));
        assert_eq!(request.tracks, None);

        let resp = app
            .clone()
            .oneshot(empty_req("DELETE", "/api/playlists/p1"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(next_command(&mut rx).await, Command::DeletePlaylist("p1".into()));

        let resp = app
            .oneshot(empty_req("DELETE", "/api/playlists/p9"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_playlist_track_edits() {
        let (app, state_manager, mut rx) = harness();
        publish_playlist(&state_manager, "p1").await;

        let resp = app
            .clone()
            .oneshot(empty_req("POST", "/api/playlists/p1/tracks/s7"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(
            next_command(&mut rx).await,
            Command::AddToPlaylist {
                playlist_id: "p1".into(),
                track_id: "s7".into()
            }
        );

        let resp = app
            .clone()
            .oneshot(empty_req("DELETE", "/api/playlists/p1/tracks/s7"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(
            next_command(&mut rx).await,
            Command::RemoveFromPlaylist {
                playlist_id: "p1".into(),
                track_id: "s7".into()
            }
        );

        let resp = app
            .oneshot(empty_req("POST", "/api/playlists/p9/tracks/s7"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_queue_unknown_playlist_is_not_found() {
        let (app, state_manager, mut rx) = harness();
        publish_playlist(&state_manager, "p1").await;

        let resp = app
            .clone()
            .oneshot(post_req("/api/playlists/p9/queue"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app.oneshot(post_req("/api/playlists/p1/queue")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(next_command(&mut rx).await, Command::QueuePlaylist("p1".into()));
    }

    #[tokio::test]
    async fn test_lyrics_without_track_is_not_found() {
        let (app, _, _rx) = harness();
        let resp = app.oneshot(get_req("/api/lyrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
