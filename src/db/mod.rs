use crate::models::{DownloadRecord, DownloadStatus};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") && !db_url.contains("mode=memory") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn download_repo(&self) -> repositories::download::DownloadRepository {
        repositories::download::DownloadRepository::new(self.conn.clone())
    }

    pub async fn upsert_download(&self, record: &DownloadRecord) -> Result<()> {
        self.download_repo().upsert(record).await
    }

    pub async fn get_download(&self, source_id: &str) -> Result<Option<DownloadRecord>> {
        self.download_repo().get(source_id).await
    }

    /// Lookup by source id or owning media id, the two keys the dedup paths
    /// use.
    pub async fn find_download_by_key(&self, key: &str) -> Result<Option<DownloadRecord>> {
        self.download_repo().find_by_key(key).await
    }

    pub async fn list_downloads(&self) -> Result<Vec<DownloadRecord>> {
        self.download_repo().list().await
    }

    pub async fn delete_download(&self, source_id: &str) -> Result<bool> {
        self.download_repo().delete(source_id).await
    }

    pub async fn update_download_transition(
        &self,
        source_id: &str,
        media_id: &str,
        status: DownloadStatus,
        progress: f64,
        downloaded_bytes: Option<i64>,
        total_bytes: Option<i64>,
    ) -> Result<()> {
        self.download_repo()
            .update_transition(
                source_id,
                media_id,
                status,
                progress,
                downloaded_bytes,
                total_bytes,
            )
            .await
    }
}
