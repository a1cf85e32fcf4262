mod common;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use cadence_core::catalog::{CatalogClient, CatalogRequest};
use cadence_core::config::BackendConfig;
use cadence_core::error::{ApiError, CatalogError};
use cadence_core::model::{UNKNOWN_ARTIST, UNKNOWN_TITLE};
use serde_json::{json, Value};
use std::collections::HashMap;

fn songs() -> Value {
    json!([
        {
            "id": "s1",
            "title": "Night Drive",
            "artistName": "Kavinsky",
            "duration": 240,
            "streamUrl": "https://backend-jfn4.onrender.com/stream/s1.mp3",
            "genre": ["House", "Electronic"]
        },
        { "id": 7, "fileUrl": "https://cdn.test/7.mp3", "genre": "Pop" },
        "not a record",
        { "id": "s3", "title": "Blue", "genre": ["Jazz"], "streamUrl": "https://cdn.test/s3.mp3" },
        { "id": "s4", "title": ["broken"] }
    ])
}

fn client(base_url: &str) -> CatalogClient {
    CatalogClient::new(BackendConfig {
        base_url: base_url.to_string(),
        ..BackendConfig::default()
    })
}

async fn backend() -> String {
    let app = Router::new()
        .route("/api/public/songs/all", get(|| async { Json(songs()) }))
        .route(
            "/api/public/songs/trending",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let limit: usize = q.get("limit").and_then(|l| l.parse().ok()).unwrap_or(0);
                let list: Vec<Value> = (0..limit)
                    .map(|i| json!({ "id": format!("t{}", i), "streamUrl": "https://cdn.test/t.mp3" }))
                    .collect();
                Json(Value::Array(list))
            }),
        )
        .route(
            "/api/public/search",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let query = q.get("q").cloned().unwrap_or_default();
                Json(json!([{ "id": "hit", "title": query }]))
            }),
        );
    common::serve(app).await
}

#[tokio::test]
async fn all_songs_are_normalized_and_bad_records_skipped() {
    let base = backend().await;
    let tracks = client(&base).fetch(&CatalogRequest::All).await.unwrap();

    let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "7", "s3"]);

    let first = &tracks[0];
    assert_eq!(first.artist, "Kavinsky");
    assert_eq!(first.duration_ms(), Some(240_000));
    let host = base.trim_start_matches("http://");
    assert_eq!(
        first.stream_url.as_deref(),
        Some(format!("https://{}/stream/s1.mp3", host).as_str())
    );

    let second = &tracks[1];
    assert_eq!(second.title, UNKNOWN_TITLE);
    assert_eq!(second.artist, UNKNOWN_ARTIST);
    assert_eq!(second.stream_url.as_deref(), Some("https://cdn.test/7.mp3"));
    assert_eq!(second.genres, vec!["Pop"]);
}

#[tokio::test]
async fn trending_passes_limit() {
    let base = backend().await;
    let tracks = client(&base)
        .fetch(&CatalogRequest::Trending { limit: 3 })
        .await
        .unwrap();
    assert_eq!(tracks.len(), 3);
    assert_eq!(tracks[2].id, "t2");
}

#[tokio::test]
async fn search_sends_query_and_blank_query_skips_network() {
    let base = backend().await;
    let c = client(&base);

    let hits = c
        .fetch(&CatalogRequest::Search {
            query: "  daft punk ".into(),
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "daft punk");

    // nothing listens here; a request would fail
    let offline = client("http://127.0.0.1:1");
    let none = offline
        .fetch(&CatalogRequest::Search { query: "   ".into() })
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn genre_filters_on_aliases() {
    let base = backend().await;
    let c = client(&base);

    let edm = c
        .fetch(&CatalogRequest::ByGenre {
            category: "edm".into(),
        })
        .await
        .unwrap();
    assert_eq!(edm.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["s1"]);

    let metal = c
        .fetch(&CatalogRequest::ByGenre {
            category: "metal".into(),
        })
        .await
        .unwrap();
    assert!(metal.is_empty());
}

#[tokio::test]
async fn server_error_surfaces_as_unavailable() {
    let app = Router::new().route(
        "/api/public/songs/all",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = common::serve(app).await;

    let err = client(&base).fetch(&CatalogRequest::All).await.unwrap_err();

    let CatalogError::Unavailable(api) = err;
    assert_eq!(api.status(), Some(500));
}

#[tokio::test]
async fn non_array_body_is_a_decode_error() {
    let app = Router::new().route(
        "/api/public/songs/all",
        get(|| async { Json(json!({ "songs": [] })) }),
    );
    let base = common::serve(app).await;

    let err = client(&base).fetch(&CatalogRequest::All).await.unwrap_err();

    assert!(matches!(
        err,
        CatalogError::Unavailable(ApiError::Decode { .. })
    ));
}
