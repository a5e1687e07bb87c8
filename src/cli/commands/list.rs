use crate::config::Config;
use crate::db::Store;

pub async fn cmd_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let records = store.list_downloads().await?;

    if records.is_empty() {
        println!("No downloads.");
        println!("Use 'finvault download <item_id>' to start one.");
        return Ok(());
    }

    println!("Downloads ({}):", records.len());
    for record in records {
        let pct = (record.progress * 100.0).round();
        println!(
            "  [{:>11}] {:>3}%  {}  ({})",
            record.status, pct, record.title, record.source_id
        );
    }

    Ok(())
}
