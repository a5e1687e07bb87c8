use serde::{Deserialize, Serialize};

/// A catalog item as the media server reports it.
///
/// Only the fields the download pipeline needs are modeled; the full server
/// payload is preserved verbatim in the offline metadata JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    /// Owning series, set for episodes and seasons.
    pub series_id: Option<String>,
    pub series_name: Option<String>,
    pub index_number: Option<i32>,
    pub media_sources: Vec<MediaSource>,
}

impl MediaItem {
    /// The media-source identifier used as the download primary key.
    ///
    /// Falls back to the item id when the server reports no distinct source.
    #[must_use]
    pub fn resolve_source_id(&self, hint: Option<&str>) -> String {
        if let Some(hint) = hint {
            return hint.to_string();
        }
        self.media_sources
            .first()
            .map_or_else(|| self.id.clone(), |s| s.id.clone())
    }

    #[must_use]
    pub fn default_source(&self) -> Option<&MediaSource> {
        self.media_sources.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Movie,
    Episode,
    Season,
    Series,
    Other,
}

impl ItemKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "Movie",
            Self::Episode => "Episode",
            Self::Season => "Season",
            Self::Series => "Series",
            Self::Other => "Other",
        }
    }

    #[must_use]
    pub fn from_server(kind: &str) -> Self {
        match kind {
            "Movie" => Self::Movie,
            "Episode" => Self::Episode,
            "Season" => Self::Season,
            "Series" => Self::Series,
            _ => Self::Other,
        }
    }
}

/// One playable rendition of an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSource {
    pub id: String,
    pub container: Option<String>,
    pub size: Option<i64>,
    pub media_streams: Vec<MediaStream>,
}

impl MediaSource {
    /// First stream of the given type, the server's default selection.
    #[must_use]
    pub fn default_stream(&self, kind: StreamKind) -> Option<&MediaStream> {
        self.media_streams.iter().find(|s| s.kind == kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaStream {
    pub kind: StreamKind,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub display_title: Option<String>,
    pub index: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_sources(sources: Vec<MediaSource>) -> MediaItem {
        MediaItem {
            id: "item-1".to_string(),
            name: "Test".to_string(),
            kind: ItemKind::Movie,
            series_id: None,
            series_name: None,
            index_number: None,
            media_sources: sources,
        }
    }

    #[test]
    fn source_id_falls_back_to_item_id() {
        let item = item_with_sources(vec![]);
        assert_eq!(item.resolve_source_id(None), "item-1");
    }

    #[test]
    fn source_id_prefers_hint_then_first_source() {
        let item = item_with_sources(vec![MediaSource {
            id: "src-9".to_string(),
            container: Some("mkv".to_string()),
            size: None,
            media_streams: vec![],
        }]);
        assert_eq!(item.resolve_source_id(None), "src-9");
        assert_eq!(item.resolve_source_id(Some("hinted")), "hinted");
    }
}
