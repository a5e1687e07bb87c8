use crate::models::item::{ItemKind, MediaStream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lifecycle of a download record.
///
/// This is the closed set consumers switch over; the durable store persists
/// the `as_str` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DownloadStatus {
    Queued,
    Downloading,
    Paused,
    Completed,
    Failed,
}

impl DownloadStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Downloading => "DOWNLOADING",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Completed records never leave their state except via cancel.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(Self::Queued),
            "DOWNLOADING" => Ok(Self::Downloading),
            "PAUSED" => Ok(Self::Paused),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown download status: {other}")),
        }
    }
}

/// Default stream selection captured at enqueue time, kept with the record so
/// offline playback can pick tracks without the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamSelection {
    pub video: Option<MediaStream>,
    pub audio: Option<MediaStream>,
    pub subtitle: Option<MediaStream>,
}

/// The unit the engine tracks: one playable rendition being transferred to
/// local storage. Keyed by `source_id` across the whole system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub source_id: String,
    pub media_id: String,
    pub title: String,
    pub item_kind: ItemKind,
    /// Fully resolved transfer URL including transcode parameters.
    pub request_uri: String,
    pub file_path: PathBuf,
    pub status: DownloadStatus,
    /// Completed fraction in `0.0..=1.0`; rendered as a percentage at the
    /// display edges.
    pub progress: f64,
    pub downloaded_bytes: Option<i64>,
    pub total_bytes: Option<i64>,
    pub priority: i32,
    pub added_at: i64,
    pub server_url: String,
    pub access_token: String,
    pub quality: Option<String>,
    pub streams: StreamSelection,
}

/// Transcode/quality parameters for one transfer. Immutable once enqueued;
/// the engine renders them into the record's `request_uri` and never consults
/// them again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeRequest {
    /// Direct play: ask the server for the original file, no transcode.
    pub static_stream: bool,
    /// Container extension of the produced file (`mkv`, `mp4`, ...).
    pub container: String,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub max_bitrate: Option<u64>,
    pub video_bitrate: Option<u64>,
    pub audio_bitrate: Option<u64>,
    pub enable_auto_stream_copy: bool,
    pub allow_video_stream_copy: bool,
    pub allow_audio_stream_copy: bool,
    pub video_codec: String,
    pub video_profile: Option<String>,
    pub audio_codec: Option<String>,
    /// Embed subtitles into the produced container.
    pub copy_subtitles: bool,
    pub subtitles_in_manifest: bool,
    /// Human label shown for this download ("1080p", "Original", ...).
    pub quality_label: Option<String>,
}

impl Default for TranscodeRequest {
    fn default() -> Self {
        Self {
            static_stream: true,
            container: "mkv".to_string(),
            max_width: None,
            max_height: None,
            max_bitrate: None,
            video_bitrate: None,
            audio_bitrate: None,
            enable_auto_stream_copy: true,
            allow_video_stream_copy: true,
            allow_audio_stream_copy: true,
            video_codec: "h264".to_string(),
            video_profile: None,
            audio_codec: None,
            copy_subtitles: false,
            subtitles_in_manifest: false,
            quality_label: None,
        }
    }
}

impl TranscodeRequest {
    /// Renders the transfer URL for one item/source pair.
    #[must_use]
    pub fn stream_url(&self, server_url: &str, item_id: &str, source_id: &str) -> String {
        let base = server_url.trim_end_matches('/');
        let mut url = format!(
            "{base}/Videos/{item_id}/stream.{ext}?static={is_static}&mediaSourceId={source}",
            ext = self.container,
            is_static = self.static_stream,
            source = urlencoding::encode(source_id),
        );

        if let Some(w) = self.max_width {
            url.push_str(&format!("&MaxWidth={w}"));
        }
        if let Some(h) = self.max_height {
            url.push_str(&format!("&MaxHeight={h}"));
        }
        if let Some(b) = self.max_bitrate {
            url.push_str(&format!("&MaxBitrate={b}"));
        }
        if let Some(b) = self.video_bitrate {
            url.push_str(&format!("&VideoBitrate={b}"));
        }
        if let Some(b) = self.audio_bitrate {
            url.push_str(&format!("&AudioBitrate={b}"));
        }

        url.push_str(&format!(
            "&EnableAutoStreamCopy={}&AllowVideoStreamCopy={}&AllowAudioStreamCopy={}",
            self.enable_auto_stream_copy,
            self.allow_video_stream_copy,
            self.allow_audio_stream_copy,
        ));

        url.push_str(&format!("&VideoCodec={}", self.video_codec));
        if let Some(profile) = &self.video_profile {
            url.push_str(&format!("&Profile={}", urlencoding::encode(profile)));
        }
        if let Some(codec) = &self.audio_codec {
            url.push_str(&format!("&AudioCodec={codec}"));
        }

        if self.copy_subtitles {
            url.push_str("&CopySubtitles=true&SubtitleMethod=Embed");
        }
        if self.subtitles_in_manifest {
            url.push_str("&EnableSubtitlesInManifest=true&CopyTimestamps=true");
        }

        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_store_form() {
        for status in [
            DownloadStatus::Queued,
            DownloadStatus::Downloading,
            DownloadStatus::Paused,
            DownloadStatus::Completed,
            DownloadStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<DownloadStatus>(), Ok(status));
        }
        assert!("GONE".parse::<DownloadStatus>().is_err());
    }

    #[test]
    fn stream_url_renders_direct_play() {
        let request = TranscodeRequest::default();
        let url = request.stream_url("http://media.local:8096/", "abc", "src1");
        assert_eq!(
            url,
            "http://media.local:8096/Videos/abc/stream.mkv?static=true&mediaSourceId=src1\
             &EnableAutoStreamCopy=true&AllowVideoStreamCopy=true&AllowAudioStreamCopy=true\
             &VideoCodec=h264"
        );
    }

    #[test]
    fn stream_url_renders_transcode_parameters() {
        let request = TranscodeRequest {
            static_stream: false,
            container: "mp4".to_string(),
            max_width: Some(1920),
            max_height: Some(1080),
            max_bitrate: Some(8_000_000),
            video_codec: "hevc".to_string(),
            video_profile: Some("main 10".to_string()),
            audio_codec: Some("aac".to_string()),
            copy_subtitles: true,
            ..TranscodeRequest::default()
        };
        let url = request.stream_url("http://media.local:8096", "abc", "src1");
        assert!(url.starts_with("http://media.local:8096/Videos/abc/stream.mp4?static=false"));
        assert!(url.contains("&MaxWidth=1920&MaxHeight=1080&MaxBitrate=8000000"));
        assert!(url.contains("&VideoCodec=hevc&Profile=main%2010&AudioCodec=aac"));
        assert!(url.ends_with("&CopySubtitles=true&SubtitleMethod=Embed"));
    }
}
