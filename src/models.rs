use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Archive,
    Highlight,
    Upload,
    Clip,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Archive => "archive",
            MediaKind::Highlight => "highlight",
            MediaKind::Upload => "upload",
            MediaKind::Clip => "clip",
            MediaKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> MediaKind {
        match s.to_ascii_lowercase().as_str() {
            "archive" => MediaKind::Archive,
            "highlight" => MediaKind::Highlight,
            "upload" => MediaKind::Upload,
            "clip" => MediaKind::Clip,
            _ => MediaKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutedSegment {
    pub duration: u64,
    pub offset: u64,
}

/// A video, highlight, upload or clip as reported by the catalog at query time.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub id: String,
    pub kind: MediaKind,
    pub title: String,
    /// RFC 3339 timestamp exactly as the API returned it.
    pub created_at: String,
    pub url: String,
    pub view_count: u64,
    /// Helix duration string for videos ("3h2m1s"), seconds for clips.
    pub duration: String,
    pub user_id: String,
    pub user_name: String,
    pub muted_segments: Vec<MutedSegment>,
    /// Source VOD of a clip.
    pub video_id: Option<String>,
    pub vod_offset: Option<i64>,
    pub creator_id: Option<String>,
    pub creator_name: Option<String>,
    pub game_id: Option<String>,
}

impl MediaItem {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.created_at) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%SZ")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPolicy {
    /// Per-bucket cap on admitted items. `None` admits everything.
    pub max_items: Option<usize>,
    /// View-count floor; the first item below it ends the channel.
    pub min_views: Option<u64>,
    pub render_chat: bool,
    pub transcribe: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub login: String,
    pub policy: ChannelPolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    pub login: String,
    #[serde(default)]
    pub display_name: String,
}

/// Persisted info record for a video, highlight or upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: String,
    pub url: String,
    pub views: u64,
    #[serde(default)]
    pub moments: Vec<serde_json::Value>,
    #[serde(default)]
    pub muted_segments: Vec<MutedSegment>,
    pub recorded_at: String,
    pub recorded_at_iso: String,
}

/// Persisted info record for a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipInfo {
    pub id: String,
    pub video_id: String,
    pub video_offset: i64,
    pub creator_id: String,
    pub creator_name: String,
    pub title: String,
    pub game_id: String,
    pub game: String,
    pub url: String,
    pub view_count: u64,
    pub duration: String,
    pub created_at: String,
    pub created_at_iso: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_media_kind_parse_is_case_insensitive() {
        assert_eq!(MediaKind::parse("archive"), MediaKind::Archive);
        assert_eq!(MediaKind::parse("Highlight"), MediaKind::Highlight);
        assert_eq!(MediaKind::parse("UPLOAD"), MediaKind::Upload);
        assert_eq!(MediaKind::parse("all"), MediaKind::Other);
    }

    #[test]
    fn test_created_at_parses_helix_timestamp() {
        let item = crate::test_support::video("1", MediaKind::Archive, 10);
        let dt = item.created_at_utc().unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 3);
    }

    #[test]
    fn test_created_at_garbage_is_none() {
        let mut item = crate::test_support::video("1", MediaKind::Archive, 10);
        item.created_at = "yesterday".to_string();
        assert!(item.created_at_utc().is_none());
    }

    #[test]
    fn test_video_info_serializes_type_field() {
        let info = VideoInfo {
            id: "1".into(),
            user_id: "2".into(),
            user_name: "someone".into(),
            title: "t".into(),
            kind: "archive".into(),
            duration: "1h".into(),
            url: "u".into(),
            views: 3,
            moments: Vec::new(),
            muted_segments: Vec::new(),
            recorded_at: "2024-03-05T10:00:00Z".into(),
            recorded_at_iso: "20240305 T100000Z".into(),
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["type"], "archive");
        assert!(value["moments"].as_array().unwrap().is_empty());
    }
}
