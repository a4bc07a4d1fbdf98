use std::path::{Path, PathBuf};

use chrono::Datelike;

use super::Artifact;
use crate::models::MediaItem;

/// Compact timestamp used at the front of every archive filename.
pub const TIMESTAMP_COMPACT: &str = "%Y%m%d T%H%M%SZ";

const UNKNOWN_BUCKET: &str = "unknown";
/// Longest title slice kept in a filename, so names stay under NAME_MAX.
const MAX_TITLE_BYTES: usize = 100;
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strips characters that are not allowed in filenames on common platforms.
/// Only for readability; the item id carries identity.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();
    cleaned.trim_end_matches(['.', ' ']).to_string()
}

/// `YYYY-MM` of the item's creation time, or `unknown` if it does not parse.
pub fn date_bucket(item: &MediaItem) -> String {
    match item.created_at_utc() {
        Some(dt) => format!("{:04}-{:02}", dt.year(), dt.month()),
        None => UNKNOWN_BUCKET.to_string(),
    }
}

/// Cuts `title` to at most `max` bytes without splitting a character.
fn truncate_title(title: &str, max: usize) -> &str {
    if title.len() <= max {
        return title;
    }
    let mut end = max;
    while !title.is_char_boundary(end) {
        end -= 1;
    }
    &title[..end]
}

pub fn file_stem(item: &MediaItem) -> String {
    let stamp = item
        .created_at_utc()
        .map(|dt| dt.format(TIMESTAMP_COMPACT).to_string())
        .unwrap_or_else(|| UNKNOWN_BUCKET.to_string());
    sanitize_filename(&format!(
        "{} - {} - {}_{}",
        stamp,
        item.id,
        truncate_title(&item.title, MAX_TITLE_BYTES),
        item.kind.as_str()
    ))
}

/// Maps (channel, item, artifact) to canonical and scratch locations.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
    temp: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>, temp: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp: temp.into(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp
    }

    pub fn channel_dir(&self, channel: &str) -> PathBuf {
        self.root.join(channel.to_lowercase())
    }

    pub fn item_dir(&self, channel: &str, item: &MediaItem) -> PathBuf {
        self.channel_dir(channel).join(date_bucket(item))
    }

    pub fn artifact_path(&self, channel: &str, item: &MediaItem, artifact: Artifact) -> PathBuf {
        let name = format!("{}{}", file_stem(item), artifact.suffix());
        self.item_dir(channel, item).join(name)
    }

    pub fn chat_marker_path(&self, channel: &str, item: &MediaItem) -> PathBuf {
        let name = format!("{}{}.BAD", file_stem(item), Artifact::Chat.suffix());
        self.item_dir(channel, item).join(name)
    }

    /// Scratch location keyed by item id only.
    pub fn temp_path(&self, item: &MediaItem, artifact: Artifact) -> PathBuf {
        let name = format!("{}{}", sanitize_filename(&item.id), artifact.suffix());
        self.temp.join(name)
    }
}
