pub mod download;
pub mod item;

pub use download::{DownloadRecord, DownloadStatus, StreamSelection, TranscodeRequest};
pub use item::{ItemKind, MediaItem, MediaSource, MediaStream, StreamKind};
