use crate::config::Config;
use crate::db::Store;
use crate::models::DownloadStatus;

/// One-shot toggle on the durable record. A running engine reacts to the
/// stored state on its next restore; in-process control goes through the
/// engine's command channel instead.
pub async fn cmd_pause(config: &Config, id: &str) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let Some(record) = store.find_download_by_key(id).await? else {
        println!("No download with id {id}.");
        println!("Use 'finvault list' to see downloads.");
        return Ok(());
    };

    let next = match record.status {
        DownloadStatus::Queued | DownloadStatus::Downloading => DownloadStatus::Paused,
        DownloadStatus::Paused | DownloadStatus::Failed => DownloadStatus::Queued,
        DownloadStatus::Completed => {
            println!("{} is already completed, nothing to pause.", record.title);
            return Ok(());
        }
    };

    store
        .update_download_transition(
            &record.source_id,
            &record.media_id,
            next,
            record.progress,
            record.downloaded_bytes,
            record.total_bytes,
        )
        .await?;

    println!("✓ {} is now {next}", record.title);
    Ok(())
}
