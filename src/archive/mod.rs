pub mod fs;
pub mod layout;

use std::path::PathBuf;

use crate::errors::Result;
use crate::models::MediaItem;

pub use fs::FsArchive;
pub use layout::ArtifactLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Info,
    Video,
    Chat,
    Captions,
    Render,
}

impl Artifact {
    pub fn suffix(&self) -> &'static str {
        match self {
            Artifact::Info => "_info.json",
            Artifact::Video => ".mp4",
            Artifact::Chat => "_chat.json",
            Artifact::Captions => ".vtt",
            Artifact::Render => "_chat.mp4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfoState {
    #[default]
    Missing,
    /// Present, but its moments list came back empty last time.
    NeedsMoments,
    Complete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactStatus {
    pub info: InfoState,
    pub video: bool,
    pub chat: bool,
    pub chat_unavailable: bool,
    pub captions: bool,
    pub render: bool,
}

impl ArtifactStatus {
    /// Chat is settled either way: downloaded, or known not to exist.
    pub fn chat_settled(&self) -> bool {
        self.chat || self.chat_unavailable
    }
}

/// Local record of what has already been archived.
///
/// `status` is a read-only check. The write operations are only called by
/// the executor; each creates the channel and date directories on demand.
pub trait ArchiveStore {
    fn status(&self, channel: &str, item: &MediaItem) -> Result<ArtifactStatus>;
    fn artifact_path(&self, channel: &str, item: &MediaItem, artifact: Artifact) -> PathBuf;
    /// Fresh scratch path for an external write; clears leftovers from an interrupted run.
    fn scratch(&self, item: &MediaItem, artifact: Artifact) -> Result<PathBuf>;
    fn read_info(&self, channel: &str, item: &MediaItem) -> Result<Option<serde_json::Value>>;
    fn write_info(&self, channel: &str, item: &MediaItem, info: &serde_json::Value) -> Result<()>;
    /// Moves the scratch file into place. `Ok(false)` if there was nothing to move.
    fn commit(&self, channel: &str, item: &MediaItem, artifact: Artifact) -> Result<bool>;
    fn mark_chat_unavailable(&self, channel: &str, item: &MediaItem) -> Result<()>;
}
