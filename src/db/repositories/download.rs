use crate::entities::{download_record, prelude::*};
use crate::models::{DownloadRecord, DownloadStatus, ItemKind, StreamSelection};
use anyhow::Result;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::path::PathBuf;

pub struct DownloadRepository {
    conn: DatabaseConnection,
}

impl DownloadRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: download_record::Model) -> DownloadRecord {
        DownloadRecord {
            source_id: m.source_id,
            media_id: m.media_id,
            title: m.title,
            item_kind: ItemKind::from_server(&m.item_kind),
            request_uri: m.request_uri,
            file_path: PathBuf::from(m.file_path),
            // Unknown strings from older schema revisions degrade to FAILED
            // rather than poisoning the whole listing.
            status: m.status.parse().unwrap_or(DownloadStatus::Failed),
            progress: m.progress,
            downloaded_bytes: m.downloaded_bytes,
            total_bytes: m.total_bytes,
            priority: m.priority,
            added_at: m.added_at,
            server_url: m.server_url,
            access_token: m.access_token,
            quality: m.quality,
            streams: StreamSelection {
                video: m.video_stream.and_then(|s| serde_json::from_str(&s).ok()),
                audio: m.audio_stream.and_then(|s| serde_json::from_str(&s).ok()),
                subtitle: m
                    .subtitle_stream
                    .and_then(|s| serde_json::from_str(&s).ok()),
            },
        }
    }

    fn to_active_model(record: &DownloadRecord) -> download_record::ActiveModel {
        let stream_json =
            |s: &Option<crate::models::MediaStream>| s.as_ref().and_then(|v| serde_json::to_string(v).ok());

        download_record::ActiveModel {
            source_id: Set(record.source_id.clone()),
            media_id: Set(record.media_id.clone()),
            title: Set(record.title.clone()),
            item_kind: Set(record.item_kind.as_str().to_string()),
            request_uri: Set(record.request_uri.clone()),
            file_path: Set(record.file_path.to_string_lossy().to_string()),
            status: Set(record.status.as_str().to_string()),
            progress: Set(record.progress),
            downloaded_bytes: Set(record.downloaded_bytes),
            total_bytes: Set(record.total_bytes),
            priority: Set(record.priority),
            added_at: Set(record.added_at),
            server_url: Set(record.server_url.clone()),
            access_token: Set(record.access_token.clone()),
            quality: Set(record.quality.clone()),
            video_stream: Set(stream_json(&record.streams.video)),
            audio_stream: Set(stream_json(&record.streams.audio)),
            subtitle_stream: Set(stream_json(&record.streams.subtitle)),
        }
    }

    pub async fn upsert(&self, record: &DownloadRecord) -> Result<()> {
        let active_model = Self::to_active_model(record);

        DownloadRecords::insert(active_model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(download_record::Column::SourceId)
                    .update_columns([
                        download_record::Column::MediaId,
                        download_record::Column::Title,
                        download_record::Column::ItemKind,
                        download_record::Column::RequestUri,
                        download_record::Column::FilePath,
                        download_record::Column::Status,
                        download_record::Column::Progress,
                        download_record::Column::DownloadedBytes,
                        download_record::Column::TotalBytes,
                        download_record::Column::Priority,
                        download_record::Column::ServerUrl,
                        download_record::Column::AccessToken,
                        download_record::Column::Quality,
                        download_record::Column::VideoStream,
                        download_record::Column::AudioStream,
                        download_record::Column::SubtitleStream,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(())
    }

    pub async fn get(&self, source_id: &str) -> Result<Option<DownloadRecord>> {
        let result = DownloadRecords::find_by_id(source_id.to_string())
            .one(&self.conn)
            .await?;

        Ok(result.map(Self::map_model))
    }

    /// Lookup by either key the system uses: exact source id or owning
    /// media item id.
    pub async fn find_by_key(&self, key: &str) -> Result<Option<DownloadRecord>> {
        let result = DownloadRecords::find()
            .filter(
                Condition::any()
                    .add(download_record::Column::SourceId.eq(key))
                    .add(download_record::Column::MediaId.eq(key)),
            )
            .one(&self.conn)
            .await?;

        Ok(result.map(Self::map_model))
    }

    pub async fn list(&self) -> Result<Vec<DownloadRecord>> {
        let rows = DownloadRecords::find()
            .order_by_asc(download_record::Column::Priority)
            .order_by_asc(download_record::Column::AddedAt)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn delete(&self, source_id: &str) -> Result<bool> {
        let result = DownloadRecords::delete_by_id(source_id.to_string())
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Persists one status/progress transition. Keys by source id first and
    /// falls back to the owning media id when no exact row exists.
    pub async fn update_transition(
        &self,
        source_id: &str,
        media_id: &str,
        status: DownloadStatus,
        progress: f64,
        downloaded_bytes: Option<i64>,
        total_bytes: Option<i64>,
    ) -> Result<()> {
        use sea_orm::sea_query::Expr;

        let apply = |filter: sea_orm::sea_query::SimpleExpr| {
            DownloadRecords::update_many()
                .col_expr(
                    download_record::Column::Status,
                    Expr::value(status.as_str()),
                )
                .col_expr(download_record::Column::Progress, Expr::value(progress))
                .col_expr(
                    download_record::Column::DownloadedBytes,
                    Expr::value(downloaded_bytes),
                )
                .col_expr(
                    download_record::Column::TotalBytes,
                    Expr::value(total_bytes),
                )
                .filter(filter)
        };

        let result = apply(download_record::Column::SourceId.eq(source_id).into())
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            apply(download_record::Column::MediaId.eq(media_id).into())
                .exec(&self.conn)
                .await?;
        }

        Ok(())
    }
}
