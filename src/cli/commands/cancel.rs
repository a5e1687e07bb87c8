use crate::config::Config;
use crate::db::Store;

pub async fn cmd_cancel(config: &Config, id: &str) -> anyhow::Result<()> {
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

    if let Some(dir) = record.file_path.parent() {
        tokio::fs::remove_dir_all(dir).await.ok();
    }
    store.delete_download(&record.source_id).await?;

    println!("✓ Cancelled {} and removed its files", record.title);
    Ok(())
}
