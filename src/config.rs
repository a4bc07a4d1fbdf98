use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::{ArchiveError, Result};
use crate::models::{Channel, ChannelPolicy};
use crate::sync::SyncMode;

const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 6 * 60 * 60;

pub struct AppPaths {
    pub base_dir: PathBuf,
    pub config_file: PathBuf,
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl AppPaths {
    pub fn new() -> Self {
        let base = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vodkeep");
        Self::from_base(base)
    }

    pub fn from_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.yaml"),
            base_dir: base,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushoverSettings {
    pub token: String,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoSection {
    pub root: PathBuf,
    pub temp: PathBuf,
    pub channels: Vec<String>,
    pub max_videos: usize,
    pub render_chat: Vec<bool>,
    pub render_webvtt: Vec<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipSection {
    pub root: PathBuf,
    pub temp: PathBuf,
    pub channels: Vec<String>,
    pub min_view_counts: Vec<u64>,
    pub num_days_to_query: i64,
    #[serde(default)]
    pub max_clips: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    pub downloader: PathBuf,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default)]
    pub vosk_model: Option<PathBuf>,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_render_args")]
    pub render_args: Vec<String>,
    #[serde(default)]
    pub pushover: Option<PushoverSettings>,
    #[serde(default)]
    pub videos: Option<VideoSection>,
    #[serde(default)]
    pub clips: Option<ClipSection>,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_tool_timeout() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

fn default_render_args() -> Vec<String> {
    [
        "-h", "926", "-w", "274", "--update-rate", "0.1", "--framerate", "60", "--font-size", "15",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Settings {
    pub fn load(path: &Path) -> Result<Settings> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArchiveError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Settings> {
        let settings: Settings = serde_yaml::from_str(text)?;
        if settings.client_id.trim().is_empty() || settings.client_secret.trim().is_empty() {
            return Err(ArchiveError::Config(
                "client_id and client_secret must be set".to_string(),
            ));
        }
        Ok(settings)
    }

    /// `None` when the timeout is disabled with `tool_timeout_secs: 0`.
    pub fn tool_timeout(&self) -> Option<Duration> {
        match self.tool_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Archive root and scratch directory for a sync mode.
    pub fn roots(&self, mode: SyncMode) -> Result<(PathBuf, PathBuf)> {
        match mode {
            SyncMode::Videos => {
                let section = self.video_section()?;
                Ok((section.root.clone(), section.temp.clone()))
            }
            SyncMode::Clips => {
                let section = self.clip_section()?;
                Ok((section.root.clone(), section.temp.clone()))
            }
        }
    }

    pub fn channels(&self, mode: SyncMode) -> Result<Vec<Channel>> {
        match mode {
            SyncMode::Videos => self.video_channels(),
            SyncMode::Clips => self.clip_channels(),
        }
    }

    fn video_section(&self) -> Result<&VideoSection> {
        self.videos
            .as_ref()
            .ok_or_else(|| ArchiveError::Config("missing `videos` section".to_string()))
    }

    fn clip_section(&self) -> Result<&ClipSection> {
        self.clips
            .as_ref()
            .ok_or_else(|| ArchiveError::Config("missing `clips` section".to_string()))
    }

    pub fn video_channels(&self) -> Result<Vec<Channel>> {
        let section = self.video_section()?;
        let n = section.channels.len();
        if section.render_chat.len() != n || section.render_webvtt.len() != n {
            return Err(ArchiveError::Config(format!(
                "number of channels and render settings do not match: channels = {}, render_chat = {}, render_webvtt = {}",
                n,
                section.render_chat.len(),
                section.render_webvtt.len()
            )));
        }
        Ok(section
            .channels
            .iter()
            .enumerate()
            .map(|(idx, login)| Channel {
                login: login.clone(),
                policy: ChannelPolicy {
                    max_items: Some(section.max_videos),
                    min_views: None,
                    render_chat: section.render_chat[idx],
                    transcribe: section.render_webvtt[idx],
                },
            })
            .collect())
    }

    pub fn clip_channels(&self) -> Result<Vec<Channel>> {
        let section = self.clip_section()?;
        if section.min_view_counts.len() != section.channels.len() {
            return Err(ArchiveError::Config(format!(
                "number of channels and view-count floors do not match: channels = {}, min_view_counts = {}",
                section.channels.len(),
                section.min_view_counts.len()
            )));
        }
        Ok(section
            .channels
            .iter()
            .zip(&section.min_view_counts)
            .map(|(login, &floor)| Channel {
                login: login.clone(),
                policy: ChannelPolicy {
                    max_items: section.max_clips,
                    min_views: Some(floor),
                    render_chat: false,
                    transcribe: false,
                },
            })
            .collect())
    }

    /// Query window for clips, ending at `now`.
    pub fn clip_window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let section = self.clip_section()?;
        let start = now - chrono::Duration::days(section.num_days_to_query);
        Ok((start, now))
    }
}
