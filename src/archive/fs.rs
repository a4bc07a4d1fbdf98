use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::layout::ArtifactLayout;
use super::{ArchiveStore, Artifact, ArtifactStatus, InfoState};
use crate::errors::Result;
use crate::models::MediaItem;

const CHAT_UNAVAILABLE_NOTE: &str =
    "No chat log for this item. Either nothing was said or the source VOD is no longer available.";

/// Filesystem-backed archive: a file's presence is the record that the work was done.
pub struct FsArchive {
    layout: ArtifactLayout,
}

impl FsArchive {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    fn ensure_item_dir(&self, channel: &str, item: &MediaItem) -> Result<()> {
        fs::create_dir_all(self.layout.item_dir(channel, item))?;
        Ok(())
    }

    fn info_state(&self, path: &Path) -> InfoState {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => return InfoState::Missing,
        };
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => match value.get("moments").and_then(|m| m.as_array()) {
                Some(moments) if moments.is_empty() => InfoState::NeedsMoments,
                _ => InfoState::Complete,
            },
            Err(e) => {
                log::warn!("unreadable info file {}: {}", path.display(), e);
                InfoState::Missing
            }
        }
    }
}

/// Moves `from` to `to`, copying across filesystems when a rename is not possible.
/// A missing source is not an error and returns `Ok(false)`.
pub fn relocate(from: &Path, to: &Path) -> std::io::Result<bool> {
    if !from.exists() {
        return Ok(false);
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(_) => {
            // Copy next to the destination first so the final name only ever
            // appears complete.
            let partial = partial_path(to);
            fs::copy(from, &partial)?;
            fs::rename(&partial, to)?;
            fs::remove_file(from)?;
            Ok(true)
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Serializes with four-space indentation.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

impl ArchiveStore for FsArchive {
    fn status(&self, channel: &str, item: &MediaItem) -> Result<ArtifactStatus> {
        let path = |artifact| self.layout.artifact_path(channel, item, artifact);
        Ok(ArtifactStatus {
            info: self.info_state(&path(Artifact::Info)),
            video: path(Artifact::Video).exists(),
            chat: path(Artifact::Chat).exists(),
            chat_unavailable: self.layout.chat_marker_path(channel, item).exists(),
            captions: path(Artifact::Captions).exists(),
            render: path(Artifact::Render).exists(),
        })
    }

    fn artifact_path(&self, channel: &str, item: &MediaItem, artifact: Artifact) -> PathBuf {
        self.layout.artifact_path(channel, item, artifact)
    }

    fn scratch(&self, item: &MediaItem, artifact: Artifact) -> Result<PathBuf> {
        fs::create_dir_all(self.layout.temp_dir())?;
        let path = self.layout.temp_path(item, artifact);
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("removed stale scratch file {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(path)
    }

    fn read_info(&self, channel: &str, item: &MediaItem) -> Result<Option<serde_json::Value>> {
        let path = self.layout.artifact_path(channel, item, Artifact::Info);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_info(&self, channel: &str, item: &MediaItem, info: &serde_json::Value) -> Result<()> {
        self.ensure_item_dir(channel, item)?;
        let tmp = self.scratch(item, Artifact::Info)?;
        fs::write(&tmp, to_pretty_json(info)?)?;
        relocate(&tmp, &self.layout.artifact_path(channel, item, Artifact::Info))?;
        Ok(())
    }

    fn commit(&self, channel: &str, item: &MediaItem, artifact: Artifact) -> Result<bool> {
        self.ensure_item_dir(channel, item)?;
        let tmp = self.layout.temp_path(item, artifact);
        let dest = self.layout.artifact_path(channel, item, artifact);
        Ok(relocate(&tmp, &dest)?)
    }

    fn mark_chat_unavailable(&self, channel: &str, item: &MediaItem) -> Result<()> {
        self.ensure_item_dir(channel, item)?;
        fs::write(self.layout.chat_marker_path(channel, item), CHAT_UNAVAILABLE_NOTE)?;
        Ok(())
    }
}
