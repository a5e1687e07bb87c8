use crate::clients::JellyfinClient;
use crate::config::Config;
use crate::db::Store;
use crate::downloader::{
    DownloadCoordinator, DownloadEngine, DownloadEvent, DownloadRequest, sweep,
};
use crate::models::{DownloadStatus, TranscodeRequest};
use std::path::Path;

pub struct DownloadArgs {
    pub item_id: String,
    pub source: Option<String>,
    pub transcode: bool,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub max_bitrate: Option<u64>,
}

pub async fn cmd_download(config: &Config, args: DownloadArgs) -> anyhow::Result<()> {
    if config.server.access_token.is_empty() {
        println!("No access token configured.");
        println!("Set server.access_token in config.toml first.");
        return Ok(());
    }

    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let removed = sweep::sweep_orphaned_temp_files(Path::new(&config.downloads.download_root));
    if removed > 0 {
        println!("Cleaned up {removed} orphaned temp file(s)");
    }

    let engine = DownloadEngine::new(
        store.clone(),
        config.downloads.max_concurrent,
        config.general.event_bus_buffer_size,
    );
    let mut events = engine.events();
    engine.restore().await?;

    let client = JellyfinClient::new(&config.server.url, &config.server.access_token);
    let coordinator = DownloadCoordinator::new(
        client,
        engine.clone(),
        store,
        config.server.user_id.clone(),
        config.downloads.clone(),
    );

    let transcode = args.transcode.then(|| TranscodeRequest {
        static_stream: false,
        container: "mp4".to_string(),
        max_width: args.max_width,
        max_height: args.max_height,
        max_bitrate: args.max_bitrate,
        ..TranscodeRequest::default()
    });

    let request = DownloadRequest {
        item_id: args.item_id,
        media_source_id: args.source,
        transcode,
    };

    let admitted = coordinator.start_download(&request).await?;
    if admitted == 0 {
        println!("Nothing new to download.");
        return Ok(());
    }
    println!("Queued {admitted} download(s)");

    // Stay alive until every tracked download has settled.
    let mut snapshot_rx = engine.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(DownloadEvent::Progress { source_id, progress, .. }) => {
                        println!("  {source_id}: {:.0}%", progress * 100.0);
                    }
                    Ok(DownloadEvent::Completed { source_id }) => {
                        println!("✓ Completed: {source_id}");
                    }
                    Ok(DownloadEvent::Failed { source_id, error }) => {
                        println!("✗ Failed: {source_id} ({error})");
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let settled = snapshot_rx.borrow().values().all(|r| {
            r.status.is_terminal() || r.status == DownloadStatus::Paused
        });
        if settled {
            break;
        }
    }

    let snapshot = engine.snapshot().await;
    let completed = snapshot
        .values()
        .filter(|r| r.status == DownloadStatus::Completed)
        .count();
    println!("Done. {completed}/{} download(s) completed.", snapshot.len());

    Ok(())
}
