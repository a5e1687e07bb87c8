use crate::clients::JellyfinClient;
use crate::config::DownloadsConfig;
use crate::db::Store;
use crate::downloader::assets;
use crate::downloader::engine::DownloadEngine;
use crate::models::{
    DownloadRecord, DownloadStatus, ItemKind, MediaItem, StreamKind, StreamSelection,
    TranscodeRequest,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Item not found in catalog: {0}")]
    ItemNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One user-facing download intent, before the catalog has been consulted.
/// A season intent fans out into one record per episode.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub item_id: String,
    /// Specific rendition to fetch; defaults to the server's first source.
    pub media_source_id: Option<String>,
    pub transcode: Option<TranscodeRequest>,
}

impl DownloadRequest {
    #[must_use]
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            media_source_id: None,
            transcode: None,
        }
    }
}

/// Resolves catalog items into download records and hands them to the
/// engine. Owns season expansion, dedup and priority assignment.
pub struct DownloadCoordinator {
    client: JellyfinClient,
    engine: DownloadEngine,
    store: Store,
    user_id: String,
    download_root: PathBuf,
    defaults: DownloadsConfig,
    priority_counter: AtomicI32,
}

impl DownloadCoordinator {
    #[must_use]
    pub fn new(
        client: JellyfinClient,
        engine: DownloadEngine,
        store: Store,
        user_id: String,
        defaults: DownloadsConfig,
    ) -> Self {
        Self {
            client,
            engine,
            store,
            user_id,
            download_root: PathBuf::from(&defaults.download_root),
            defaults,
            priority_counter: AtomicI32::new(0),
        }
    }

    /// Starts the downloads a request describes. Returns the number of
    /// records actually admitted, after dedup.
    ///
    /// A catalog failure aborts the whole request before anything is
    /// enqueued, so a half-expanded season never enters the queue.
    pub async fn start_download(&self, request: &DownloadRequest) -> Result<usize, CoordinatorError> {
        let item = self
            .client
            .get_item(&self.user_id, &request.item_id)
            .await?
            .ok_or_else(|| CoordinatorError::ItemNotFound(request.item_id.clone()))?;

        if item.kind == ItemKind::Season {
            return self.start_season(&item, request).await;
        }

        let admitted = self.enqueue_item(&item, request, self.next_priority()).await?;
        Ok(usize::from(admitted))
    }

    async fn start_season(
        &self,
        season: &MediaItem,
        request: &DownloadRequest,
    ) -> Result<usize, CoordinatorError> {
        let series_id = season.series_id.as_deref().unwrap_or(&season.id);
        let episodes = self
            .client
            .get_season_episodes(series_id, &season.id, &self.user_id)
            .await?;

        if episodes.is_empty() {
            warn!(season_id = %season.id, "Season has no episodes, nothing to download");
            return Ok(0);
        }

        info!(
            season_id = %season.id,
            episodes = episodes.len(),
            "Expanding season download"
        );

        let base_priority = self.next_priority();
        let mut admitted = 0;
        for (offset, episode) in episodes.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let priority = base_priority + offset as i32;
            // The explicit source hint only applies to a single-item
            // request; episodes resolve their own sources.
            let episode_request = DownloadRequest {
                item_id: episode.id.clone(),
                media_source_id: None,
                transcode: request.transcode.clone(),
            };
            if self.enqueue_item(episode, &episode_request, priority).await? {
                admitted += 1;
            }
        }

        Ok(admitted)
    }

    async fn enqueue_item(
        &self,
        item: &MediaItem,
        request: &DownloadRequest,
        priority: i32,
    ) -> Result<bool, CoordinatorError> {
        let source_id = item.resolve_source_id(request.media_source_id.as_deref());

        if self.is_already_tracked(&source_id, &item.id).await? {
            info!(
                source_id = %source_id,
                media_id = %item.id,
                title = %item.name,
                "Already downloaded or in flight, skipping"
            );
            return Ok(false);
        }

        let source = item
            .media_sources
            .iter()
            .find(|s| s.id == source_id)
            .or_else(|| item.default_source());

        let transcode = request
            .transcode
            .clone()
            .unwrap_or_else(|| self.default_transcode(source.and_then(|s| s.container.as_deref())));

        let request_uri =
            transcode.stream_url(self.client.server_url(), &item.id, &source_id);

        let file_path = self
            .download_root
            .join(&source_id)
            .join(format!("{}.{}", source_id, transcode.container));

        let streams = source.map_or_else(StreamSelection::default, |s| StreamSelection {
            video: s.default_stream(StreamKind::Video).cloned(),
            audio: s.default_stream(StreamKind::Audio).cloned(),
            subtitle: s.default_stream(StreamKind::Subtitle).cloned(),
        });

        let record = DownloadRecord {
            source_id: source_id.clone(),
            media_id: item.id.clone(),
            title: display_title(item),
            item_kind: item.kind,
            request_uri,
            file_path,
            status: DownloadStatus::Queued,
            progress: 0.0,
            downloaded_bytes: None,
            total_bytes: source.and_then(|s| s.size).filter(|s| *s > 0),
            priority,
            added_at: chrono::Utc::now().timestamp_millis(),
            server_url: self.client.server_url().to_string(),
            access_token: self.client.access_token().to_string(),
            quality: transcode.quality_label.clone(),
            streams,
        };

        if !self.engine.enqueue(record).await {
            return Ok(false);
        }

        let item_dir = self.download_root.join(&source_id);
        if let Err(e) = assets::save_item_assets(&self.client, item, &item_dir, &source_id).await {
            warn!(
                source_id = %source_id,
                error = %e,
                "Failed to save offline assets, download continues"
            );
        }

        Ok(true)
    }

    /// Dedup by either key the system uses, against live state first and
    /// the durable store second.
    async fn is_already_tracked(
        &self,
        source_id: &str,
        media_id: &str,
    ) -> Result<bool, CoordinatorError> {
        let snapshot = self.engine.snapshot().await;
        if snapshot.contains_key(source_id)
            || snapshot.values().any(|r| r.media_id == media_id)
        {
            return Ok(true);
        }

        if self
            .store
            .find_download_by_key(source_id)
            .await
            .map_err(CoordinatorError::Other)?
            .is_some()
        {
            return Ok(true);
        }
        if self
            .store
            .find_download_by_key(media_id)
            .await
            .map_err(CoordinatorError::Other)?
            .is_some()
        {
            return Ok(true);
        }

        Ok(false)
    }

    fn default_transcode(&self, container: Option<&str>) -> TranscodeRequest {
        if self.defaults.transcode {
            TranscodeRequest {
                static_stream: false,
                container: "mp4".to_string(),
                max_width: self.defaults.max_width,
                max_height: self.defaults.max_height,
                max_bitrate: self.defaults.max_bitrate,
                video_codec: self
                    .defaults
                    .video_codec
                    .clone()
                    .unwrap_or_else(|| "h264".to_string()),
                audio_codec: self.defaults.audio_codec.clone(),
                ..TranscodeRequest::default()
            }
        } else {
            TranscodeRequest {
                container: container.unwrap_or("mkv").to_string(),
                ..TranscodeRequest::default()
            }
        }
    }

    fn next_priority(&self) -> i32 {
        self.priority_counter.fetch_add(1000, Ordering::SeqCst)
    }
}

/// Episodes get a "Series - 01 - Name" style title, everything else keeps
/// its own name.
fn display_title(item: &MediaItem) -> String {
    if item.kind == ItemKind::Episode {
        if let Some(series) = &item.series_name {
            return match item.index_number {
                Some(n) => format!("{series} - {n:02} - {}", item.name),
                None => format!("{series} - {}", item.name),
            };
        }
    }
    item.name.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_display_title() {
        let item = MediaItem {
            id: "e1".to_string(),
            name: "Pilot".to_string(),
            kind: ItemKind::Episode,
            series_id: Some("s1".to_string()),
            series_name: Some("Some Show".to_string()),
            index_number: Some(3),
            media_sources: vec![],
        };
        assert_eq!(display_title(&item), "Some Show - 03 - Pilot");
    }

    #[test]
    fn test_movie_display_title() {
        let item = MediaItem {
            id: "m1".to_string(),
            name: "A Movie".to_string(),
            kind: ItemKind::Movie,
            series_id: None,
            series_name: None,
            index_number: None,
            media_sources: vec![],
        };
        assert_eq!(display_title(&item), "A Movie");
    }
}
