use crate::models::{ItemKind, MediaItem, MediaSource, MediaStream, StreamKind};
use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;

const TOKEN_HEADER: &str = "X-Emby-Token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    items: Vec<ItemDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemDto {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "Type")]
    pub item_type: Option<String>,
    pub series_id: Option<String>,
    pub series_name: Option<String>,
    pub index_number: Option<i32>,
    pub media_sources: Option<Vec<MediaSourceDto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSourceDto {
    pub id: String,
    pub container: Option<String>,
    pub size: Option<i64>,
    pub media_streams: Option<Vec<MediaStreamDto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStreamDto {
    #[serde(rename = "Type")]
    pub stream_type: Option<String>,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub display_title: Option<String>,
    #[serde(default)]
    pub index: i32,
}

impl From<ItemDto> for MediaItem {
    fn from(dto: ItemDto) -> Self {
        Self {
            name: dto.name.unwrap_or_default(),
            kind: dto
                .item_type
                .as_deref()
                .map_or(ItemKind::Other, ItemKind::from_server),
            series_id: dto.series_id,
            series_name: dto.series_name,
            index_number: dto.index_number,
            media_sources: dto
                .media_sources
                .unwrap_or_default()
                .into_iter()
                .map(MediaSource::from)
                .collect(),
            id: dto.id,
        }
    }
}

impl From<MediaSourceDto> for MediaSource {
    fn from(dto: MediaSourceDto) -> Self {
        Self {
            id: dto.id,
            container: dto.container,
            size: dto.size,
            media_streams: dto
                .media_streams
                .unwrap_or_default()
                .into_iter()
                .map(MediaStream::from)
                .collect(),
        }
    }
}

impl From<MediaStreamDto> for MediaStream {
    fn from(dto: MediaStreamDto) -> Self {
        Self {
            kind: match dto.stream_type.as_deref() {
                Some("Video") => StreamKind::Video,
                Some("Audio") => StreamKind::Audio,
                Some("Subtitle") => StreamKind::Subtitle,
                _ => StreamKind::Other,
            },
            codec: dto.codec,
            language: dto.language,
            display_title: dto.display_title,
            index: dto.index,
        }
    }
}

/// Client for the remote media catalog API.
#[derive(Clone)]
pub struct JellyfinClient {
    base_url: String,
    access_token: String,
    client: Client,
}

impl JellyfinClient {
    #[must_use]
    pub fn new(server_url: &str, access_token: &str) -> Self {
        Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            client: Client::new(),
        }
    }

    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub async fn get_item(&self, user_id: &str, item_id: &str) -> Result<Option<MediaItem>> {
        let url = format!(
            "{}/Users/{}/Items/{}?Fields=MediaSources",
            self.base_url, user_id, item_id
        );
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.access_token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Catalog API error: {} - {}", status, body));
        }

        let dto: ItemDto = response.json().await?;

        Ok(Some(dto.into()))
    }

    /// Episodes of one season, in series order.
    pub async fn get_season_episodes(
        &self,
        series_id: &str,
        season_id: &str,
        user_id: &str,
    ) -> Result<Vec<MediaItem>> {
        let url = format!(
            "{}/Shows/{}/Episodes?SeasonId={}&UserId={}&Fields=MediaSources",
            self.base_url, series_id, season_id, user_id
        );
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Catalog API error: {} - {}", status, body));
        }

        let response: ItemsResponse = response.json().await?;

        Ok(response.items.into_iter().map(MediaItem::from).collect())
    }

    pub async fn fetch_primary_image(&self, item_id: &str) -> Result<Vec<u8>> {
        self.fetch_image(item_id, "Primary").await
    }

    pub async fn fetch_logo_image(&self, item_id: &str) -> Result<Vec<u8>> {
        self.fetch_image(item_id, "Logo").await
    }

    async fn fetch_image(&self, item_id: &str, image_type: &str) -> Result<Vec<u8>> {
        let url = format!("{}/Items/{}/Images/{}", self.base_url, item_id, image_type);
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.access_token)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }
}
