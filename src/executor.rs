//! Performs one planned action for one item and reports what happened.
//!
//! Every external product lands in a scratch file first and is only moved
//! into the archive after the producer reported success, so a canonical path
//! never holds a partial file.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::archive::layout::TIMESTAMP_COMPACT;
use crate::archive::{ArchiveStore, Artifact};
use crate::cancel::CancelToken;
use crate::catalog::{Catalog, GameNames};
use crate::errors::Result;
use crate::models::{ClipInfo, MediaItem, MediaKind, VideoInfo};
use crate::notify::{Notifier, ready_message};
use crate::planner::Action;
use crate::tool::{ExternalTool, ToolInvocation, ToolMode, ToolOutcome};
use crate::transcribe::Captioner;

const RECORDED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const CLIP_CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The artifact now exists in the archive.
    Saved,
    /// Nothing new to write; the action will be offered again next run.
    Unchanged,
    /// Chat is confirmed unavailable and will not be retried.
    MarkedUnavailable,
    /// Transient failure; nothing was committed.
    Failed(String),
    Skipped(String),
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }
}

fn describe(outcome: &ToolOutcome) -> String {
    match outcome {
        ToolOutcome::Success => "success".to_string(),
        ToolOutcome::Failed { code: Some(code) } => format!("exited with code {}", code),
        ToolOutcome::Failed { code: None } => "terminated by signal".to_string(),
        ToolOutcome::TimedOut => "timed out".to_string(),
    }
}

pub struct Executor<'a> {
    catalog: &'a dyn Catalog,
    archive: &'a dyn ArchiveStore,
    tool: &'a dyn ExternalTool,
    notifier: &'a dyn Notifier,
    captioner: Option<&'a dyn Captioner>,
    render_args: Vec<String>,
    games: GameNames,
    cancel: CancelToken,
}

impl<'a> Executor<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        archive: &'a dyn ArchiveStore,
        tool: &'a dyn ExternalTool,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            catalog,
            archive,
            tool,
            notifier,
            captioner: None,
            render_args: Vec::new(),
            games: GameNames::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_captioner(mut self, captioner: Option<&'a dyn Captioner>) -> Self {
        self.captioner = captioner;
        self
    }

    pub fn with_render_args(mut self, args: Vec<String>) -> Self {
        self.render_args = args;
        self
    }

    /// A raised token stops multi-attempt actions between attempts.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// `started` is when work on the item began; it feeds the ready notification.
    pub fn execute(
        &mut self,
        channel: &str,
        item: &MediaItem,
        action: Action,
        started: Instant,
    ) -> Result<ActionOutcome> {
        match action {
            Action::WriteInfo => self.write_info(channel, item),
            Action::RefreshMoments => self.refresh_moments(channel, item),
            Action::DownloadVideo => self.download_video(channel, item),
            Action::DownloadChat => self.download_chat(channel, item),
            Action::Transcribe => self.transcribe(channel, item, started),
            Action::RenderChat => self.render_chat(channel, item),
        }
    }

    fn write_info(&mut self, channel: &str, item: &MediaItem) -> Result<ActionOutcome> {
        let value = if item.kind == MediaKind::Clip {
            serde_json::to_value(self.clip_info(item))?
        } else {
            let moments = self.catalog.moments(&item.id);
            serde_json::to_value(video_info(item, moments))?
        };
        self.archive.write_info(channel, item, &value)?;
        Ok(ActionOutcome::Saved)
    }

    fn refresh_moments(&mut self, channel: &str, item: &MediaItem) -> Result<ActionOutcome> {
        let moments = self.catalog.moments(&item.id);
        if moments.is_empty() {
            return Ok(ActionOutcome::Unchanged);
        }
        let value = match self.archive.read_info(channel, item)? {
            Some(mut value) => {
                value["moments"] = serde_json::Value::Array(moments);
                value
            }
            None => serde_json::to_value(video_info(item, moments))?,
        };
        self.archive.write_info(channel, item, &value)?;
        Ok(ActionOutcome::Saved)
    }

    fn clip_info(&mut self, item: &MediaItem) -> ClipInfo {
        let created = item.created_at_utc();
        let game_id = item.game_id.clone().unwrap_or_default();
        ClipInfo {
            id: item.id.clone(),
            video_id: item.video_id.clone().unwrap_or_default(),
            video_offset: item.vod_offset.unwrap_or(-1),
            creator_id: item.creator_id.clone().unwrap_or_default(),
            creator_name: item.creator_name.clone().unwrap_or_default(),
            title: item.title.clone(),
            game: self.games.lookup(self.catalog, &game_id),
            game_id,
            url: item.url.clone(),
            view_count: item.view_count,
            duration: item.duration.clone(),
            created_at: created
                .map(|dt| dt.format(CLIP_CREATED_FORMAT).to_string())
                .unwrap_or_else(|| item.created_at.clone()),
            created_at_iso: created
                .map(|dt| dt.format(TIMESTAMP_COMPACT).to_string())
                .unwrap_or_default(),
        }
    }

    /// Runs the tool into the scratch file for `artifact` and commits on success.
    fn produce(
        &self,
        channel: &str,
        item: &MediaItem,
        artifact: Artifact,
        invocation: ToolInvocation,
    ) -> Result<ActionOutcome> {
        let outcome = self.tool.run(&invocation)?;
        if !outcome.is_success() {
            return Ok(ActionOutcome::Failed(describe(&outcome)));
        }
        self.commit_or_fail(channel, item, artifact)
    }

    fn download_video(&mut self, channel: &str, item: &MediaItem) -> Result<ActionOutcome> {
        let tmp = self.archive.scratch(item, Artifact::Video)?;
        let mode = match item.kind {
            MediaKind::Clip => ToolMode::ClipDownload,
            _ => ToolMode::VideoDownload,
        };
        let mut invocation = ToolInvocation::download(mode, &item.id, tmp.clone());
        if mode == ToolMode::VideoDownload {
            invocation = invocation.with_temp_dir(&scratch_dir(&tmp));
        }
        self.produce(channel, item, Artifact::Video, invocation)
    }

    fn download_chat(&mut self, channel: &str, item: &MediaItem) -> Result<ActionOutcome> {
        let tmp = self.archive.scratch(item, Artifact::Chat)?;
        let with_emotes = ToolInvocation::download(ToolMode::ChatDownload, &item.id, tmp).with_emotes(true);
        let first = self.tool.run(&with_emotes)?;
        if first.is_success() {
            return self.commit_or_fail(channel, item, Artifact::Chat);
        }
        if first.is_interrupted() {
            return Ok(ActionOutcome::Failed(describe(&first)));
        }
        if self.cancel.is_cancelled() {
            return Ok(ActionOutcome::Failed(format!(
                "{} with emotes, stopped before retrying",
                describe(&first)
            )));
        }

        log::info!("chat download for {} {}, retrying without emotes", item.id, describe(&first));
        let tmp = self.archive.scratch(item, Artifact::Chat)?;
        let plain = ToolInvocation::download(ToolMode::ChatDownload, &item.id, tmp);
        let second = self.tool.run(&plain)?;
        match second {
            ToolOutcome::Success => self.commit_or_fail(channel, item, Artifact::Chat),
            ToolOutcome::Failed { code: Some(_) } => {
                self.archive.mark_chat_unavailable(channel, item)?;
                Ok(ActionOutcome::MarkedUnavailable)
            }
            ToolOutcome::Failed { code: None } | ToolOutcome::TimedOut => {
                Ok(ActionOutcome::Failed(describe(&second)))
            }
        }
    }

    fn commit_or_fail(&self, channel: &str, item: &MediaItem, artifact: Artifact) -> Result<ActionOutcome> {
        if self.archive.commit(channel, item, artifact)? {
            Ok(ActionOutcome::Saved)
        } else {
            Ok(ActionOutcome::Failed(
                "downloader reported success but wrote no file".to_string(),
            ))
        }
    }

    fn transcribe(&mut self, channel: &str, item: &MediaItem, started: Instant) -> Result<ActionOutcome> {
        let Some(captioner) = self.captioner else {
            return Ok(ActionOutcome::Skipped("no speech model configured".to_string()));
        };
        let video = self.archive.artifact_path(channel, item, Artifact::Video);
        let tmp = self.archive.scratch(item, Artifact::Captions)?;
        let cues = captioner.caption(&video, &tmp)?;
        if !self.archive.commit(channel, item, Artifact::Captions)? {
            return Ok(ActionOutcome::Failed("caption file missing after transcription".to_string()));
        }
        log::debug!("wrote {} caption cues for {}", cues, item.id);
        self.notifier
            .notify(&ready_message(&item.user_name, &item.id, started.elapsed()));
        Ok(ActionOutcome::Saved)
    }

    fn render_chat(&mut self, channel: &str, item: &MediaItem) -> Result<ActionOutcome> {
        let chat = self.archive.artifact_path(channel, item, Artifact::Chat);
        let tmp = self.archive.scratch(item, Artifact::Render)?;
        let invocation = ToolInvocation::render(chat, tmp.clone())
            .with_args(&self.render_args)
            .with_temp_dir(&scratch_dir(&tmp));
        self.produce(channel, item, Artifact::Render, invocation)
    }
}

fn scratch_dir(tmp: &Path) -> PathBuf {
    tmp.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn video_info(item: &MediaItem, moments: Vec<serde_json::Value>) -> VideoInfo {
    let created = item.created_at_utc();
    VideoInfo {
        id: item.id.clone(),
        user_id: item.user_id.clone(),
        user_name: item.user_name.clone(),
        title: item.title.clone(),
        kind: item.kind.as_str().to_string(),
        duration: item.duration.clone(),
        url: item.url.clone(),
        views: item.view_count,
        moments,
        muted_segments: item.muted_segments.clone(),
        recorded_at: created
            .map(|dt| dt.format(RECORDED_AT_FORMAT).to_string())
            .unwrap_or_else(|| item.created_at.clone()),
        recorded_at_iso: created
            .map(|dt| dt.format(TIMESTAMP_COMPACT).to_string())
            .unwrap_or_default(),
    }
}
