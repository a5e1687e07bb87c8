use crate::downloader::engine::DownloadEngine;
use crate::models::DownloadRecord;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server returned an empty body")]
    EmptyBody,
}

/// In-progress data lands next to the final file so a completed rename is
/// atomic on the same filesystem.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Streams the request URI into the record's file path. Progress is
/// reported back to the engine only when it advances by at least one
/// percentage point, and only when the server declares a length.
///
/// Returns the number of bytes written.
pub(crate) async fn run_transfer(
    engine: &DownloadEngine,
    record: &DownloadRecord,
) -> Result<i64, TransferError> {
    if let Some(parent) = record.file_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(&record.file_path);

    let client = reqwest::Client::new();
    let response = client
        .get(&record.request_uri)
        .header("X-Emby-Token", &record.access_token)
        .send()
        .await?
        .error_for_status()?;

    let total_bytes = response
        .content_length()
        .and_then(|len| i64::try_from(len).ok())
        .filter(|len| *len > 0)
        .or(record.total_bytes);

    let mut file = tokio::fs::File::create(&tmp).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: i64 = 0;
    let mut last_reported_pct: i64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                tokio::fs::remove_file(&tmp).await.ok();
                return Err(e.into());
            }
        };

        if let Err(e) = file.write_all(&chunk).await {
            drop(file);
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(e.into());
        }
        downloaded += chunk.len() as i64;

        if let Some(total) = total_bytes {
            let pct = downloaded * 100 / total.max(1);
            if pct > last_reported_pct {
                last_reported_pct = pct;
                #[allow(clippy::cast_precision_loss)]
                let progress = (downloaded as f64 / total.max(1) as f64).min(1.0);
                engine
                    .update_progress(&record.source_id, downloaded, Some(total), progress)
                    .await;
            }
        }
    }

    file.flush().await?;
    drop(file);

    // A 200 with no payload means the server had nothing to serve.
    if downloaded == 0 {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(TransferError::EmptyBody);
    }

    tokio::fs::rename(&tmp, &record.file_path).await?;
    debug!(
        source_id = %record.source_id,
        path = %record.file_path.display(),
        bytes = downloaded,
        "Transfer finished"
    );

    Ok(downloaded)
}
