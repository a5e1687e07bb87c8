//! Coordinator behavior against a canned catalog server: season fanout,
//! dedup against live and durable state, and failure handling.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path as AxPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use finvault::clients::JellyfinClient;
use finvault::config::DownloadsConfig;
use finvault::db::Store;
use finvault::downloader::{
    CoordinatorError, DownloadCoordinator, DownloadEngine, DownloadRequest, StartupQueue,
};
use finvault::models::DownloadStatus;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
struct CatalogState {
    items: Arc<HashMap<String, Value>>,
    episodes: Arc<HashMap<String, Value>>,
}

fn episode(id: &str, name: &str, index: i32) -> Value {
    json!({
        "Id": id,
        "Name": name,
        "Type": "Episode",
        "SeriesId": "series-1",
        "SeriesName": "Some Show",
        "IndexNumber": index,
        "MediaSources": [{
            "Id": format!("src-{id}"),
            "Container": "mkv",
            "Size": 4,
            "MediaStreams": [
                {"Type": "Video", "Codec": "h264", "Index": 0},
                {"Type": "Audio", "Codec": "aac", "Language": "eng", "Index": 1}
            ]
        }]
    })
}

fn catalog() -> CatalogState {
    let mut items = HashMap::new();
    items.insert(
        "movie-1".to_string(),
        json!({
            "Id": "movie-1",
            "Name": "A Movie",
            "Type": "Movie",
            "MediaSources": [{
                "Id": "src-movie-1",
                "Container": "mkv",
                "Size": 4,
                "MediaStreams": [{"Type": "Video", "Codec": "h264", "Index": 0}]
            }]
        }),
    );
    items.insert(
        "season-1".to_string(),
        json!({
            "Id": "season-1",
            "Name": "Season 1",
            "Type": "Season",
            "SeriesId": "series-1",
            "SeriesName": "Some Show"
        }),
    );
    items.insert(
        "season-bad".to_string(),
        json!({
            "Id": "season-bad",
            "Name": "Season 2",
            "Type": "Season",
            "SeriesId": "series-1",
            "SeriesName": "Some Show"
        }),
    );

    let mut episodes = HashMap::new();
    episodes.insert(
        "season-1".to_string(),
        json!({
            "Items": [
                episode("e1", "One", 1),
                episode("e2", "Two", 2),
                episode("e3", "Three", 3),
            ]
        }),
    );

    CatalogState {
        items: Arc::new(items),
        episodes: Arc::new(episodes),
    }
}

async fn item_handler(
    State(state): State<CatalogState>,
    AxPath((_user, id)): AxPath<(String, String)>,
) -> Response {
    match state.items.get(&id) {
        Some(value) => Json(value.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn episodes_handler(
    State(state): State<CatalogState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let season_id = params.get("SeasonId").cloned().unwrap_or_default();
    match state.episodes.get(&season_id) {
        Some(value) => Json(value.clone()).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn image_handler() -> Bytes {
    Bytes::from_static(b"image-bytes")
}

async fn video_handler() -> Bytes {
    Bytes::from_static(b"AAAA")
}

async fn spawn_catalog_server() -> String {
    let app = Router::new()
        .route("/Users/{user}/Items/{id}", get(item_handler))
        .route("/Shows/{series}/Episodes", get(episodes_handler))
        .route("/Items/{id}/Images/{kind}", get(image_handler))
        .route("/Videos/{id}/{file}", get(video_handler))
        .with_state(catalog());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server");
    });
    format!("http://{addr}")
}

struct Fixture {
    store: Store,
    engine: DownloadEngine,
    coordinator: DownloadCoordinator,
    root: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    let base = spawn_catalog_server().await;
    let db_path = std::env::temp_dir().join(format!(
        "finvault-coordinator-test-{}.db",
        uuid::Uuid::new_v4()
    ));
    let store = Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to create store");
    let root = tempfile::tempdir().expect("tempdir");
    let engine = DownloadEngine::new(store.clone(), 2, 64);

    let defaults = DownloadsConfig {
        download_root: root.path().to_string_lossy().to_string(),
        ..DownloadsConfig::default()
    };
    let client = JellyfinClient::new(&base, "test-token");
    let coordinator = DownloadCoordinator::new(
        client,
        engine.clone(),
        store.clone(),
        "user-1".to_string(),
        defaults,
    );

    Fixture {
        store,
        engine,
        coordinator,
        root,
    }
}

async fn wait_all_settled(engine: &DownloadEngine) {
    for _ in 0..400 {
        let snapshot = engine.snapshot().await;
        if !snapshot.is_empty() && snapshot.values().all(|r| r.status.is_terminal()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for downloads to settle");
}

#[tokio::test]
async fn movie_download_completes_and_saves_assets() {
    let fx = fixture().await;

    let admitted = fx
        .coordinator
        .start_download(&DownloadRequest::new("movie-1"))
        .await
        .expect("start download");
    assert_eq!(admitted, 1);

    wait_all_settled(&fx.engine).await;
    let snapshot = fx.engine.snapshot().await;
    let record = &snapshot["src-movie-1"];
    assert_eq!(record.status, DownloadStatus::Completed);
    assert!(record.request_uri.contains("mediaSourceId=src-movie-1"));
    assert!(record.streams.video.is_some());

    let item_dir = fx.root.path().join("src-movie-1");
    assert_eq!(
        std::fs::read(item_dir.join("src-movie-1.mkv")).expect("media file"),
        b"AAAA"
    );
    assert!(item_dir.join("poster.jpg").exists());
    assert!(item_dir.join("logo.png").exists());
    assert!(item_dir.join("src-movie-1.json").exists());

    let row = fx
        .store
        .get_download("src-movie-1")
        .await
        .expect("store query")
        .expect("row");
    assert_eq!(row.status, DownloadStatus::Completed);
}

#[tokio::test]
async fn repeat_request_admits_nothing() {
    let fx = fixture().await;

    let first = fx
        .coordinator
        .start_download(&DownloadRequest::new("movie-1"))
        .await
        .expect("start download");
    assert_eq!(first, 1);

    let second = fx
        .coordinator
        .start_download(&DownloadRequest::new("movie-1"))
        .await
        .expect("start download");
    assert_eq!(second, 0);
    assert_eq!(fx.engine.snapshot().await.len(), 1);
}

#[tokio::test]
async fn season_expands_to_episodes_and_skips_already_downloaded() {
    let fx = fixture().await;

    // e2 was downloaded in an earlier session and only survives durably.
    let existing = finvault::models::DownloadRecord {
        source_id: "src-e2".to_string(),
        media_id: "e2".to_string(),
        title: "Some Show - 02 - Two".to_string(),
        item_kind: finvault::models::ItemKind::Episode,
        request_uri: String::new(),
        file_path: fx.root.path().join("src-e2").join("src-e2.mkv"),
        status: DownloadStatus::Completed,
        progress: 1.0,
        downloaded_bytes: Some(4),
        total_bytes: Some(4),
        priority: 0,
        added_at: chrono::Utc::now().timestamp_millis(),
        server_url: String::new(),
        access_token: String::new(),
        quality: None,
        streams: finvault::models::StreamSelection::default(),
    };
    fx.store.upsert_download(&existing).await.expect("seed row");

    let admitted = fx
        .coordinator
        .start_download(&DownloadRequest::new("season-1"))
        .await
        .expect("start download");
    assert_eq!(admitted, 2);

    let snapshot = fx.engine.snapshot().await;
    assert!(snapshot.contains_key("src-e1"));
    assert!(snapshot.contains_key("src-e3"));
    assert!(!snapshot.contains_key("src-e2"));

    // Series order is preserved through priorities.
    assert!(snapshot["src-e1"].priority < snapshot["src-e3"].priority);
    assert_eq!(snapshot["src-e1"].title, "Some Show - 01 - One");

    wait_all_settled(&fx.engine).await;
}

#[tokio::test]
async fn catalog_failure_during_expansion_enqueues_nothing() {
    let fx = fixture().await;

    let result = fx
        .coordinator
        .start_download(&DownloadRequest::new("season-bad"))
        .await;
    assert!(result.is_err());
    assert!(fx.engine.snapshot().await.is_empty());
    assert!(
        fx.store
            .list_downloads()
            .await
            .expect("store query")
            .is_empty()
    );
}

#[tokio::test]
async fn unknown_item_is_reported_as_not_found() {
    let fx = fixture().await;

    let result = fx
        .coordinator
        .start_download(&DownloadRequest::new("ghost"))
        .await;
    match result {
        Err(CoordinatorError::ItemNotFound(id)) => assert_eq!(id, "ghost"),
        other => panic!("expected ItemNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn startup_queue_replays_buffered_requests_in_order() {
    let fx = fixture().await;

    let queue = StartupQueue::new(8);
    assert!(queue.push(DownloadRequest::new("movie-1")));
    // The duplicate is buffered but deduped at drain time.
    assert!(queue.push(DownloadRequest::new("movie-1")));
    assert!(queue.push(DownloadRequest::new("ghost")));
    assert_eq!(queue.len(), 3);

    let admitted = queue.drain(&fx.coordinator).await;
    assert_eq!(admitted, 1);
    assert!(queue.is_empty());
    assert!(fx.engine.snapshot().await.contains_key("src-movie-1"));

    wait_all_settled(&fx.engine).await;
}
