use crate::clients::JellyfinClient;
use crate::models::MediaItem;
use anyhow::Result;
use std::path::Path;
use tracing::{debug, warn};

/// Saves the offline companions of a download next to the media file:
/// `poster.jpg`, `logo.png` and the item metadata as JSON.
///
/// Images are best-effort. Missing artwork on the server must never block
/// a download, so fetch failures are logged and swallowed. Only a metadata
/// write failure is reported to the caller.
pub async fn save_item_assets(
    client: &JellyfinClient,
    item: &MediaItem,
    item_dir: &Path,
    source_id: &str,
) -> Result<()> {
    tokio::fs::create_dir_all(item_dir).await?;

    // Episodes carry no artwork of their own; use the series images.
    let image_item_id = item.series_id.as_deref().unwrap_or(&item.id);

    match client.fetch_primary_image(image_item_id).await {
        Ok(bytes) => {
            if let Err(e) = tokio::fs::write(item_dir.join("poster.jpg"), bytes).await {
                warn!(item_id = %item.id, error = %e, "Failed to write poster image");
            }
        }
        Err(e) => debug!(item_id = %item.id, error = %e, "No poster image available"),
    }

    match client.fetch_logo_image(image_item_id).await {
        Ok(bytes) => {
            if let Err(e) = tokio::fs::write(item_dir.join("logo.png"), bytes).await {
                warn!(item_id = %item.id, error = %e, "Failed to write logo image");
            }
        }
        Err(e) => debug!(item_id = %item.id, error = %e, "No logo image available"),
    }

    let metadata = serde_json::to_vec_pretty(item)?;
    tokio::fs::write(item_dir.join(format!("{source_id}.json")), metadata).await?;

    Ok(())
}
