use sea_orm::entity::prelude::*;

/// Durable form of a download. One row per media source; the engine's live
/// map is authoritative while the process is resident.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "download_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_id: String,
    pub media_id: String,
    pub title: String,
    pub item_kind: String,
    pub request_uri: String,
    pub file_path: String,
    pub status: String,
    pub progress: f64,
    pub downloaded_bytes: Option<i64>,
    pub total_bytes: Option<i64>,
    pub priority: i32,
    pub added_at: i64,
    pub server_url: String,
    pub access_token: String,
    pub quality: Option<String>,
    /// JSON-serialized default stream descriptors.
    pub video_stream: Option<String>,
    pub audio_stream: Option<String>,
    pub subtitle_stream: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
