//! Full pipeline: catalog lookup, transcoded stream URL, a 10MB transfer
//! with observable progress, and the durable record at the end.

use axum::Router;
use axum::body::Bytes;
use axum::extract::RawQuery;
use axum::response::Json;
use axum::routing::get;
use finvault::clients::JellyfinClient;
use finvault::config::DownloadsConfig;
use finvault::db::Store;
use finvault::downloader::{DownloadCoordinator, DownloadEngine, DownloadEvent, DownloadRequest};
use finvault::models::{DownloadStatus, TranscodeRequest};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TOTAL_BYTES: usize = 10_000_000;

async fn spawn_server(seen_queries: Arc<Mutex<Vec<String>>>) -> String {
    let item: Value = json!({
        "Id": "movie-big",
        "Name": "Big Movie",
        "Type": "Movie",
        "MediaSources": [{
            "Id": "src-big",
            "Container": "mkv",
            "Size": TOTAL_BYTES,
            "MediaStreams": [
                {"Type": "Video", "Codec": "h264", "Index": 0},
                {"Type": "Audio", "Codec": "aac", "Language": "eng", "Index": 1},
                {"Type": "Subtitle", "Codec": "srt", "Language": "eng", "Index": 2}
            ]
        }]
    });

    let app = Router::new()
        .route(
            "/Users/{user}/Items/{id}",
            get(move || {
                let item = item.clone();
                async move { Json(item) }
            }),
        )
        .route(
            "/Items/{id}/Images/{kind}",
            get(|| async { Bytes::from_static(b"img") }),
        )
        .route(
            "/Videos/{id}/{file}",
            get(move |RawQuery(query): RawQuery| {
                let seen = seen_queries.clone();
                async move {
                    seen.lock().expect("query log").push(query.unwrap_or_default());
                    Bytes::from(vec![0xABu8; TOTAL_BYTES])
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn ten_megabyte_transcoded_download_reports_progress_and_completes() {
    let seen_queries = Arc::new(Mutex::new(Vec::new()));
    let base = spawn_server(seen_queries.clone()).await;

    let db_path =
        std::env::temp_dir().join(format!("finvault-e2e-test-{}.db", uuid::Uuid::new_v4()));
    let store = Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to create store");
    let root = tempfile::tempdir().expect("tempdir");

    let engine = DownloadEngine::new(store.clone(), 2, 512);
    let mut events = engine.events();

    let client = JellyfinClient::new(&base, "test-token");
    let coordinator = DownloadCoordinator::new(
        client,
        engine.clone(),
        store.clone(),
        "user-1".to_string(),
        DownloadsConfig {
            download_root: root.path().to_string_lossy().to_string(),
            ..DownloadsConfig::default()
        },
    );

    let request = DownloadRequest {
        item_id: "movie-big".to_string(),
        media_source_id: None,
        transcode: Some(TranscodeRequest {
            static_stream: false,
            container: "mp4".to_string(),
            max_width: Some(1920),
            quality_label: Some("1080p".to_string()),
            ..TranscodeRequest::default()
        }),
    };
    let admitted = coordinator.start_download(&request).await.expect("start");
    assert_eq!(admitted, 1);

    // Drain events until the terminal one arrives.
    let mut progress_points: Vec<f64> = Vec::new();
    let mut last_bytes = 0;
    let mut completed = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    while tokio::time::Instant::now() < deadline {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("event stream stalled")
            .expect("event bus closed");
        match event {
            DownloadEvent::Progress {
                source_id,
                progress,
                downloaded_bytes,
                total_bytes,
            } => {
                assert_eq!(source_id, "src-big");
                assert_eq!(total_bytes, Some(TOTAL_BYTES as i64));
                assert!(downloaded_bytes >= last_bytes, "progress went backwards");
                last_bytes = downloaded_bytes;
                progress_points.push(progress);
            }
            DownloadEvent::Completed { source_id } => {
                assert_eq!(source_id, "src-big");
                completed = true;
                break;
            }
            DownloadEvent::Failed { error, .. } => panic!("download failed: {error}"),
            _ => {}
        }
    }
    assert!(completed, "download never completed");

    // Progress moved through the middle of the transfer, monotonically.
    assert!(progress_points.len() >= 3, "too few progress events");
    assert!(progress_points.windows(2).all(|w| w[0] <= w[1]));
    assert!(progress_points.iter().any(|p| *p > 0.2 && *p < 0.8));

    let snapshot = engine.snapshot().await;
    let record = &snapshot["src-big"];
    assert_eq!(record.status, DownloadStatus::Completed);
    assert_eq!(record.downloaded_bytes, Some(TOTAL_BYTES as i64));
    assert_eq!(record.total_bytes, Some(TOTAL_BYTES as i64));
    assert_eq!(record.quality.as_deref(), Some("1080p"));

    // The transcode parameters made it onto the wire.
    let query = seen_queries.lock().expect("query log").join("&");
    assert!(query.contains("static=false"));
    assert!(query.contains("MaxWidth=1920"));
    assert!(query.contains("mediaSourceId=src-big"));

    let media = root.path().join("src-big").join("src-big.mp4");
    let written = std::fs::metadata(&media).expect("media file").len();
    assert_eq!(written, TOTAL_BYTES as u64);
    assert!(!root.path().join("src-big").join("src-big.mp4.tmp").exists());

    let row = store
        .get_download("src-big")
        .await
        .expect("store query")
        .expect("row");
    assert_eq!(row.status, DownloadStatus::Completed);
    assert!((row.progress - 1.0).abs() < f64::EPSILON);
    assert!(row.streams.subtitle.is_some());
}
