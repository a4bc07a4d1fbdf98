use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use vodkeep::archive::{ArchiveStore, Artifact, ArtifactLayout, FsArchive, InfoState};
use vodkeep::cancel::CancelToken;
use vodkeep::catalog::{Catalog, ItemStream};
use vodkeep::errors::{ArchiveError, Result};
use vodkeep::executor::Executor;
use vodkeep::models::{Channel, ChannelPolicy, MediaItem, MediaKind, RemoteUser};
use vodkeep::notify::Notifier;
use vodkeep::sync::{self, RunSummary, SyncMode, SyncRequest};
use vodkeep::tool::{ExternalTool, ToolInvocation, ToolMode, ToolOutcome};
use vodkeep::transcribe::Captioner;

const LOGIN: &str = "somestreamer";

fn item(id: &str, kind: MediaKind, views: u64) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        kind,
        title: format!("Stream {}", id),
        created_at: "2024-03-05T10:15:00Z".to_string(),
        url: format!("https://www.twitch.tv/videos/{}", id),
        view_count: views,
        duration: "1h0m0s".to_string(),
        user_id: "42".to_string(),
        user_name: "SomeStreamer".to_string(),
        muted_segments: Vec::new(),
        video_id: None,
        vod_offset: None,
        creator_id: None,
        creator_name: None,
        game_id: None,
    }
}

fn archive_item(id: &str) -> MediaItem {
    item(id, MediaKind::Archive, 0)
}

fn clip(id: &str, views: u64) -> MediaItem {
    MediaItem {
        video_id: Some("2001".to_string()),
        vod_offset: Some(30),
        game_id: Some("509658".to_string()),
        ..item(id, MediaKind::Clip, views)
    }
}

struct FakeCatalog {
    live: bool,
    videos: Vec<MediaItem>,
    clips: Vec<MediaItem>,
    moments: RefCell<Vec<serde_json::Value>>,
    pulled: Cell<usize>,
    fail_listing: bool,
}

impl FakeCatalog {
    fn with_videos(videos: Vec<MediaItem>) -> Self {
        Self {
            live: false,
            videos,
            clips: Vec::new(),
            moments: RefCell::new(Vec::new()),
            pulled: Cell::new(0),
            fail_listing: false,
        }
    }

    fn with_clips(clips: Vec<MediaItem>) -> Self {
        Self {
            clips,
            ..Self::with_videos(Vec::new())
        }
    }

    fn stream<'a>(&'a self, items: &'a [MediaItem]) -> ItemStream<'a> {
        if self.fail_listing {
            return Box::new(std::iter::once(Err::<MediaItem, _>(ArchiveError::Api(
                "listing broke".to_string(),
            ))));
        }
        Box::new(items.iter().map(move |item| {
            self.pulled.set(self.pulled.get() + 1);
            Ok(item.clone())
        }))
    }
}

impl Catalog for FakeCatalog {
    fn resolve_users(&self, logins: &[String]) -> Result<Vec<RemoteUser>> {
        Ok(logins
            .iter()
            .filter(|l| l.eq_ignore_ascii_case(LOGIN))
            .map(|_| RemoteUser {
                id: "42".to_string(),
                login: LOGIN.to_string(),
                display_name: "SomeStreamer".to_string(),
            })
            .collect())
    }

    fn is_live(&self, _user_id: &str) -> Result<bool> {
        Ok(self.live)
    }

    fn videos(&self, _user_id: &str) -> ItemStream<'_> {
        self.stream(&self.videos)
    }

    fn clips(&self, _id: &str, _start: DateTime<Utc>, _end: DateTime<Utc>) -> ItemStream<'_> {
        self.stream(&self.clips)
    }

    fn game_name(&self, game_id: &str) -> Result<Option<String>> {
        Ok((game_id == "509658").then(|| "Just Chatting".to_string()))
    }

    fn moments(&self, _video_id: &str) -> Vec<serde_json::Value> {
        self.moments.borrow().clone()
    }
}

/// Writes the invocation's output file unless told to fail.
#[derive(Default)]
struct FakeTool {
    calls: RefCell<Vec<ToolInvocation>>,
    /// Chat attempts that fail before one succeeds.
    chat_failures: Cell<usize>,
    /// Chat attempts killed by a signal, checked before `chat_failures`.
    chat_kills: Cell<usize>,
    failing_videos: Vec<String>,
    /// Trips the token once this many calls have been made.
    cancel_after: Option<(usize, CancelToken)>,
}

impl FakeTool {
    fn calls_for(&self, mode: ToolMode) -> usize {
        self.calls.borrow().iter().filter(|c| c.mode == mode).count()
    }
}

impl ExternalTool for FakeTool {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        self.calls.borrow_mut().push(invocation.clone());
        if let Some((after, token)) = &self.cancel_after
            && self.calls.borrow().len() >= *after
        {
            token.cancel();
        }

        if invocation.mode == ToolMode::ChatDownload && self.chat_kills.get() > 0 {
            self.chat_kills.set(self.chat_kills.get() - 1);
            return Ok(ToolOutcome::Failed { code: None });
        }
        let fail = match invocation.mode {
            ToolMode::ChatDownload if self.chat_failures.get() > 0 => {
                self.chat_failures.set(self.chat_failures.get() - 1);
                true
            }
            ToolMode::VideoDownload | ToolMode::ClipDownload => invocation
                .id
                .as_ref()
                .is_some_and(|id| self.failing_videos.contains(id)),
            _ => false,
        };
        if fail {
            return Ok(ToolOutcome::Failed { code: Some(1) });
        }
        fs::write(&invocation.output, format!("{:?}", invocation.mode))?;
        Ok(ToolOutcome::Success)
    }
}

#[derive(Default)]
struct Inbox(RefCell<Vec<String>>);

impl Notifier for Inbox {
    fn notify(&self, message: &str) {
        self.0.borrow_mut().push(message.to_string());
    }
}

struct FakeCaptioner;

impl Captioner for FakeCaptioner {
    fn caption(&self, video: &Path, output: &Path) -> Result<usize> {
        assert!(video.exists(), "captions need the downloaded video");
        fs::write(output, "WEBVTT\n\n00:00:00.000 --> 00:00:00.500\nhello\n\n")?;
        Ok(1)
    }
}

struct BrokenCaptioner;

impl Captioner for BrokenCaptioner {
    fn caption(&self, _video: &Path, _output: &Path) -> Result<usize> {
        Err(ArchiveError::Transcription("model failed to load".to_string()))
    }
}

struct Workspace {
    dir: TempDir,
    archive: FsArchive,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let archive = FsArchive::new(ArtifactLayout::new(dir.path().join("archive"), dir.path().join("tmp")));
        Self { dir, archive }
    }

    fn path(&self, item: &MediaItem, artifact: Artifact) -> PathBuf {
        self.archive.artifact_path(LOGIN, item, artifact)
    }

    fn files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut out = Vec::new();
        let root = self.dir.path().join("archive");
        if root.exists() {
            walk(&root, &mut out);
        }
        out.sort();
        out
    }
}

fn video_channel(max: usize, render_chat: bool, transcribe: bool) -> Channel {
    Channel {
        login: "SomeStreamer".to_string(),
        policy: ChannelPolicy {
            max_items: Some(max),
            min_views: None,
            render_chat,
            transcribe,
        },
    }
}

fn clip_channel(floor: u64) -> Channel {
    Channel {
        login: LOGIN.to_string(),
        policy: ChannelPolicy {
            max_items: None,
            min_views: Some(floor),
            render_chat: false,
            transcribe: false,
        },
    }
}

fn window() -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap(),
    ))
}

struct Run<'a> {
    catalog: &'a FakeCatalog,
    ws: &'a Workspace,
    tool: &'a FakeTool,
    notifier: &'a Inbox,
    captioner: Option<&'a dyn Captioner>,
}

impl Run<'_> {
    fn sync(&self, mode: SyncMode, channels: &[Channel], cancel: &CancelToken) -> RunSummary {
        let req = SyncRequest {
            mode,
            channels,
            window: window(),
        };
        let mut executor = Executor::new(self.catalog, &self.ws.archive, self.tool, self.notifier)
            .with_captioner(self.captioner)
            .with_render_args(vec!["--framerate".to_string(), "60".to_string()])
            .with_cancel(cancel.clone());
        sync::run(&req, self.catalog, &self.ws.archive, &mut executor, cancel).unwrap()
    }
}

#[test]
fn test_second_run_is_a_no_op() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001"), archive_item("2000")]);
    *catalog.moments.borrow_mut() = vec![serde_json::json!({"id": "m1"})];
    let channels = [video_channel(5, true, false)];

    let first_tool = FakeTool::default();
    let inbox = Inbox::default();
    let first = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &first_tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());
    assert_eq!(first.downloaded, 2);
    assert_eq!(first.failed, 0);
    let files_after_first = ws.files();
    // info, video, chat, render for each item
    assert_eq!(files_after_first.len(), 8);
    let info_before = fs::read(ws.path(&archive_item("2001"), Artifact::Info)).unwrap();

    let second_tool = FakeTool::default();
    let second = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &second_tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.checked, 2);
    assert!(second_tool.calls.borrow().is_empty());
    assert_eq!(ws.files(), files_after_first);
    assert_eq!(fs::read(ws.path(&archive_item("2001"), Artifact::Info)).unwrap(), info_before);
}

#[test]
fn test_live_channel_skips_in_progress_video() {
    let ws = Workspace::new();
    let mut catalog = FakeCatalog::with_videos(vec![archive_item("live"), archive_item("done")]);
    catalog.live = true;
    let tool = FakeTool::default();
    let inbox = Inbox::default();

    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &[video_channel(5, false, false)], &CancelToken::new());

    assert_eq!(summary.downloaded, 1);
    assert!(!ws.path(&archive_item("live"), Artifact::Video).exists());
    assert!(!ws.path(&archive_item("live"), Artifact::Info).exists());
    assert!(ws.path(&archive_item("done"), Artifact::Video).exists());
}

#[test]
fn test_view_floor_stops_listing() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_clips(vec![
        clip("c1", 500),
        clip("c2", 300),
        clip("c3", 100),
        clip("c4", 400),
    ]);
    let tool = FakeTool::default();
    let inbox = Inbox::default();

    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Clips, &[clip_channel(200)], &CancelToken::new());

    assert_eq!(summary.checked, 3);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(catalog.pulled.get(), 3);
    assert_eq!(tool.calls_for(ToolMode::ClipDownload), 2);
    assert!(!ws.path(&clip("c4", 400), Artifact::Video).exists());

    let info: serde_json::Value =
        serde_json::from_slice(&fs::read(ws.path(&clip("c1", 500), Artifact::Info)).unwrap()).unwrap();
    assert_eq!(info["game"], "Just Chatting");
    assert_eq!(info["video_id"], "2001");
}

#[test]
fn test_per_type_cap() {
    let ws = Workspace::new();
    let videos = (0..5).map(|i| archive_item(&format!("a{}", i))).collect();
    let catalog = FakeCatalog::with_videos(videos);
    let tool = FakeTool::default();
    let inbox = Inbox::default();

    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &[video_channel(2, false, false)], &CancelToken::new());

    assert_eq!(summary.checked, 5);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(tool.calls_for(ToolMode::VideoDownload), 2);
    assert!(ws.path(&archive_item("a1"), Artifact::Video).exists());
    assert!(!ws.path(&archive_item("a2"), Artifact::Video).exists());
}

#[test]
fn test_chat_retries_without_emotes() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let tool = FakeTool::default();
    tool.chat_failures.set(1);
    let inbox = Inbox::default();

    Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &[video_channel(5, false, false)], &CancelToken::new());

    let chats: Vec<bool> = tool
        .calls
        .borrow()
        .iter()
        .filter(|c| c.mode == ToolMode::ChatDownload)
        .map(|c| c.embed_emotes)
        .collect();
    assert_eq!(chats, vec![true, false]);
    let status = ws.archive.status(LOGIN, &archive_item("2001")).unwrap();
    assert!(status.chat);
    assert!(!status.chat_unavailable);
}

#[test]
fn test_missing_chat_is_marked_and_not_retried() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let inbox = Inbox::default();
    let channels = [video_channel(5, true, false)];

    let tool = FakeTool::default();
    tool.chat_failures.set(2);
    Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());

    let status = ws.archive.status(LOGIN, &archive_item("2001")).unwrap();
    assert!(!status.chat);
    assert!(status.chat_unavailable);
    assert!(!status.render);
    assert_eq!(tool.calls_for(ToolMode::ChatRender), 0);

    let rerun = FakeTool::default();
    Run {
        catalog: &catalog,
        ws: &ws,
        tool: &rerun,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());
    assert_eq!(rerun.calls_for(ToolMode::ChatDownload), 0);
}

#[test]
fn test_chat_killed_by_signal_is_retried_next_run() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let inbox = Inbox::default();
    let channels = [video_channel(5, false, false)];

    let tool = FakeTool::default();
    tool.chat_kills.set(1);
    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());

    assert_eq!(summary.failed, 1);
    assert_eq!(tool.calls_for(ToolMode::ChatDownload), 1);
    let status = ws.archive.status(LOGIN, &archive_item("2001")).unwrap();
    assert!(!status.chat);
    assert!(!status.chat_unavailable);
    assert!(ws.files().iter().all(|f| !f.to_string_lossy().ends_with(".BAD")));

    let rerun = FakeTool::default();
    Run {
        catalog: &catalog,
        ws: &ws,
        tool: &rerun,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());
    assert_eq!(rerun.calls_for(ToolMode::ChatDownload), 1);
    assert!(ws.archive.status(LOGIN, &archive_item("2001")).unwrap().chat);
}

#[test]
fn test_cancel_between_chat_attempts_leaves_chat_unsettled() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let inbox = Inbox::default();
    let channels = [video_channel(5, false, false)];
    let cancel = CancelToken::new();

    // video download is call 1, the first chat attempt is call 2
    let tool = FakeTool {
        cancel_after: Some((2, cancel.clone())),
        ..Default::default()
    };
    tool.chat_failures.set(2);
    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &cancel);

    assert!(summary.cancelled);
    assert_eq!(tool.calls_for(ToolMode::ChatDownload), 1);
    let status = ws.archive.status(LOGIN, &archive_item("2001")).unwrap();
    assert!(status.video);
    assert!(!status.chat);
    assert!(!status.chat_unavailable);

    // one failure left: the emote attempt fails, the plain one succeeds
    let rerun = FakeTool::default();
    rerun.chat_failures.set(tool.chat_failures.get());
    Run {
        catalog: &catalog,
        ws: &ws,
        tool: &rerun,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());
    assert_eq!(rerun.calls_for(ToolMode::ChatDownload), 2);
    let status = ws.archive.status(LOGIN, &archive_item("2001")).unwrap();
    assert!(status.chat);
    assert!(!status.chat_unavailable);
}

#[test]
fn test_transcription_error_does_not_block_render() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let tool = FakeTool::default();
    let inbox = Inbox::default();
    let captioner = BrokenCaptioner;

    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: Some(&captioner),
    }
    .sync(SyncMode::Videos, &[video_channel(5, true, true)], &CancelToken::new());

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.downloaded, 1);
    let status = ws.archive.status(LOGIN, &archive_item("2001")).unwrap();
    assert!(!status.captions);
    assert!(status.render);
    assert_eq!(tool.calls_for(ToolMode::ChatRender), 1);
    assert!(inbox.0.borrow().is_empty());
}

#[test]
fn test_failed_video_is_retried_next_run() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001"), archive_item("2000")]);
    let inbox = Inbox::default();
    let channels = [video_channel(5, false, false)];

    let tool = FakeTool {
        failing_videos: vec!["2001".to_string()],
        ..Default::default()
    };
    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.failed, 1);
    assert!(!ws.path(&archive_item("2001"), Artifact::Video).exists());
    assert!(ws.path(&archive_item("2000"), Artifact::Video).exists());

    let rerun = FakeTool::default();
    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &rerun,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());
    assert_eq!(summary.downloaded, 1);
    assert_eq!(rerun.calls_for(ToolMode::VideoDownload), 1);
}

#[test]
fn test_moments_refreshed_once_available() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let inbox = Inbox::default();
    let channels = [video_channel(5, false, false)];
    let run = |tool: &FakeTool| {
        Run {
            catalog: &catalog,
            ws: &ws,
            tool,
            notifier: &inbox,
            captioner: None,
        }
        .sync(SyncMode::Videos, &channels, &CancelToken::new())
    };

    run(&FakeTool::default());
    let status = ws.archive.status(LOGIN, &archive_item("2001")).unwrap();
    assert_eq!(status.info, InfoState::NeedsMoments);

    *catalog.moments.borrow_mut() = vec![serde_json::json!({"id": "m1", "description": "Just Chatting"})];
    run(&FakeTool::default());
    let info = ws.archive.read_info(LOGIN, &archive_item("2001")).unwrap().unwrap();
    assert_eq!(info["moments"][0]["id"], "m1");
    assert_eq!(info["id"], "2001");
    assert_eq!(
        ws.archive.status(LOGIN, &archive_item("2001")).unwrap().info,
        InfoState::Complete
    );
}

#[test]
fn test_filenames_are_deterministic() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let tool = FakeTool::default();
    let inbox = Inbox::default();

    Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &[video_channel(5, false, false)], &CancelToken::new());

    let expected = ws
        .dir
        .path()
        .join("archive/somestreamer/2024-03/20240305 T101500Z - 2001 - Stream 2001_archive.mp4");
    assert!(expected.exists());
    assert_eq!(ws.path(&archive_item("2001"), Artifact::Video), expected);
}

#[test]
fn test_cancellation_stops_between_actions() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001"), archive_item("2000")]);
    let inbox = Inbox::default();
    let channels = [video_channel(5, false, false)];
    let cancel = CancelToken::new();

    let tool = FakeTool {
        cancel_after: Some((1, cancel.clone())),
        ..Default::default()
    };
    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &cancel);

    assert!(summary.cancelled);
    assert_eq!(tool.calls.borrow().len(), 1);
    assert!(ws.path(&archive_item("2001"), Artifact::Video).exists());
    assert!(!ws.path(&archive_item("2001"), Artifact::Chat).exists());
    assert!(!ws.path(&archive_item("2000"), Artifact::Info).exists());

    let rest = FakeTool::default();
    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &rest,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &channels, &CancelToken::new());
    assert!(!summary.cancelled);
    assert_eq!(summary.downloaded, 1);
    assert!(ws.path(&archive_item("2001"), Artifact::Chat).exists());
    assert!(ws.path(&archive_item("2000"), Artifact::Video).exists());
}

#[test]
fn test_captions_rendered_and_notified() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let tool = FakeTool::default();
    let inbox = Inbox::default();
    let captioner = FakeCaptioner;

    Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: Some(&captioner),
    }
    .sync(SyncMode::Videos, &[video_channel(5, true, true)], &CancelToken::new());

    let status = ws.archive.status(LOGIN, &archive_item("2001")).unwrap();
    assert!(status.captions);
    assert!(status.render);
    let sent = inbox.0.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("SomeStreamer vod 2001 ready to edit"));

    let modes: Vec<ToolMode> = tool.calls.borrow().iter().map(|c| c.mode).collect();
    assert_eq!(
        modes,
        vec![ToolMode::VideoDownload, ToolMode::ChatDownload, ToolMode::ChatRender]
    );
}

#[test]
fn test_unknown_channel_is_skipped() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let tool = FakeTool::default();
    let inbox = Inbox::default();
    let mut ghost = video_channel(5, false, false);
    ghost.login = "nobody".to_string();

    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &[ghost, video_channel(5, false, false)], &CancelToken::new());

    assert_eq!(summary.channels, 1);
    assert_eq!(summary.downloaded, 1);
}

#[test]
fn test_listing_error_counts_as_failure() {
    let ws = Workspace::new();
    let mut catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    catalog.fail_listing = true;
    let tool = FakeTool::default();
    let inbox = Inbox::default();

    let summary = Run {
        catalog: &catalog,
        ws: &ws,
        tool: &tool,
        notifier: &inbox,
        captioner: None,
    }
    .sync(SyncMode::Videos, &[video_channel(5, false, false)], &CancelToken::new());

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.downloaded, 0);
    assert!(ws.files().is_empty());
}

#[test]
fn test_preview_writes_nothing() {
    let ws = Workspace::new();
    let catalog = FakeCatalog::with_videos(vec![archive_item("2001")]);
    let channels = [video_channel(5, true, true)];
    let req = SyncRequest {
        mode: SyncMode::Videos,
        channels: &channels,
        window: None,
    };

    let previews = sync::preview(&req, &catalog, &ws.archive, &CancelToken::new()).unwrap();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0].channel, LOGIN);
    assert_eq!(
        previews[0].items[0].actions,
        vec!["write info", "download video", "download chat", "transcribe", "render chat"]
    );
    assert!(ws.files().is_empty());
}
