use std::path::{Path, PathBuf};
use std::process;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use serde::Serialize;

use vodkeep::archive::{ArtifactLayout, FsArchive};
use vodkeep::cancel::{CancelToken, install_ctrlc_handler};
use vodkeep::catalog::HelixClient;
use vodkeep::config::{AppPaths, Settings};
use vodkeep::errors::{ArchiveError, Result};
use vodkeep::executor::Executor;
use vodkeep::models::Channel;
use vodkeep::notify::{NoopNotifier, Notifier, PushoverNotifier};
use vodkeep::sync::{self, SyncMode, SyncRequest};
use vodkeep::tool::{DownloaderProcess, resolve_program};
use vodkeep::transcribe::{Captioner, Transcriber};

#[derive(Parser)]
#[command(name = "vodkeep", version, about = "Keeps a local archive of Twitch videos and clips")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive past broadcasts, highlights and uploads
    Videos,

    /// Archive popular clips from the configured window
    Clips,

    /// Show what a sync would do without downloading anything
    Plan {
        #[arg(value_enum)]
        mode: ModeArg,
    },

    /// Validate the config file and print the resolved channels
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Videos,
    Clips,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Videos => SyncMode::Videos,
            ModeArg::Clips => SyncMode::Clips,
        }
    }
}

#[derive(Serialize)]
struct ChannelRow<'a> {
    mode: SyncMode,
    login: &'a str,
    max_items: Option<usize>,
    min_views: Option<u64>,
    render_chat: bool,
    transcribe: bool,
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        if json {
            eprintln!("{}", serde_json::json!({"error": e.to_string()}));
        } else {
            eprintln!("error: {}", e);
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.config.unwrap_or_else(|| AppPaths::new().config_file);
    let settings = Settings::load(&config)?;
    let json = cli.json;

    match cli.command {
        Commands::Videos => cmd_sync(&settings, SyncMode::Videos, json),
        Commands::Clips => cmd_sync(&settings, SyncMode::Clips, json),
        Commands::Plan { mode } => cmd_plan(&settings, mode.into(), json),
        Commands::CheckConfig => cmd_check_config(&settings, json),
    }
}

fn request<'r>(settings: &Settings, mode: SyncMode, channels: &'r [Channel]) -> Result<SyncRequest<'r>> {
    let window = match mode {
        SyncMode::Videos => None,
        SyncMode::Clips => Some(settings.clip_window(Utc::now())?),
    };
    Ok(SyncRequest {
        mode,
        channels,
        window,
    })
}

fn archive_for(settings: &Settings, mode: SyncMode) -> Result<FsArchive> {
    let (root, temp) = settings.roots(mode)?;
    Ok(FsArchive::new(ArtifactLayout::new(root, temp)))
}

fn find_ffmpeg(settings: &Settings) -> Result<PathBuf> {
    resolve_program(&settings.ffmpeg)
        .ok_or_else(|| ArchiveError::Config(format!("ffmpeg not found: {}", settings.ffmpeg)))
}

fn check_downloader(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ArchiveError::Config(format!("downloader not found: {}", path.display())))
    }
}

#[cfg(feature = "vosk")]
fn build_transcriber(settings: &Settings, ffmpeg: &Path) -> Option<Transcriber> {
    use vodkeep::transcribe::vosk::VoskFactory;

    let Some(model) = &settings.vosk_model else {
        log::warn!("no vosk_model configured; captions will be skipped");
        return None;
    };
    match VoskFactory::load(model) {
        Ok(factory) => Some(Transcriber::new(
            ffmpeg.to_path_buf(),
            Box::new(factory),
            settings.tool_timeout(),
        )),
        Err(e) => {
            log::warn!("{}; captions will be skipped", e);
            None
        }
    }
}

#[cfg(not(feature = "vosk"))]
fn build_transcriber(_settings: &Settings, _ffmpeg: &Path) -> Option<Transcriber> {
    log::warn!("built without the `vosk` feature; captions will be skipped");
    None
}

fn cmd_sync(settings: &Settings, mode: SyncMode, json: bool) -> Result<()> {
    let channels = settings.channels(mode)?;
    let req = request(settings, mode, &channels)?;
    let archive = archive_for(settings, mode)?;
    let ffmpeg = find_ffmpeg(settings)?;
    check_downloader(&settings.downloader)?;

    let catalog = HelixClient::connect(&settings.client_id, &settings.client_secret)?;
    let tool = DownloaderProcess::new(settings.downloader.clone(), ffmpeg.clone(), settings.tool_timeout());
    let transcriber = if channels.iter().any(|c| c.policy.transcribe) {
        build_transcriber(settings, &ffmpeg)
    } else {
        None
    };
    let notifier: Box<dyn Notifier> = match &settings.pushover {
        Some(pushover) => Box::new(PushoverNotifier::new(pushover.clone())?),
        None => Box::new(NoopNotifier),
    };

    let cancel = CancelToken::new();
    install_ctrlc_handler(&cancel);

    let mut executor = Executor::new(&catalog, &archive, &tool, notifier.as_ref())
        .with_captioner(transcriber.as_ref().map(|t| t as &dyn Captioner))
        .with_render_args(settings.render_args.clone())
        .with_cancel(cancel.clone());
    let summary = sync::run(&req, &catalog, &archive, &mut executor, &cancel)?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

fn cmd_plan(settings: &Settings, mode: SyncMode, json: bool) -> Result<()> {
    let channels = settings.channels(mode)?;
    let req = request(settings, mode, &channels)?;
    let archive = archive_for(settings, mode)?;
    let catalog = HelixClient::connect(&settings.client_id, &settings.client_secret)?;

    let cancel = CancelToken::new();
    install_ctrlc_handler(&cancel);
    let previews = sync::preview(&req, &catalog, &archive, &cancel)?;

    if json {
        println!("{}", serde_json::to_string(&previews)?);
        return Ok(());
    }

    for preview in &previews {
        println!(
            "{} ({} checked, {} with work)",
            preview.channel,
            preview.checked,
            preview.items.len()
        );
        if let Some(id) = &preview.live_skipped {
            println!("  {:<12} live, skipped", id);
        }
        for item in &preview.items {
            println!(
                "  {:<12} {:<9} {}  [{}]",
                item.id,
                item.kind,
                truncate(&item.title, 50),
                item.actions.join(", ")
            );
        }
    }
    Ok(())
}

fn cmd_check_config(settings: &Settings, json: bool) -> Result<()> {
    let mut modes = Vec::new();
    if settings.videos.is_some() {
        modes.push((SyncMode::Videos, settings.video_channels()?));
    }
    if settings.clips.is_some() {
        modes.push((SyncMode::Clips, settings.clip_channels()?));
    }
    if modes.is_empty() {
        return Err(ArchiveError::Config(
            "neither a `videos` nor a `clips` section is configured".to_string(),
        ));
    }
    let mut rows = Vec::new();
    for (mode, channels) in &modes {
        for channel in channels {
            rows.push(ChannelRow {
                mode: *mode,
                login: &channel.login,
                max_items: channel.policy.max_items,
                min_views: channel.policy.min_views,
                render_chat: channel.policy.render_chat,
                transcribe: channel.policy.transcribe,
            });
        }
    }

    if json {
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }

    println!("Config OK.");
    for row in &rows {
        let limit = match (row.max_items, row.min_views) {
            (_, Some(floor)) => format!("min views {}", floor),
            (Some(max), None) => format!("max {} per type", max),
            (None, None) => "no limit".to_string(),
        };
        println!(
            "  {:<7} {:<25} {:<20} chat render: {:<5} captions: {}",
            row.mode.as_str(),
            row.login,
            limit,
            row.render_chat,
            row.transcribe
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 1).collect();
        format!("{}…", truncated)
    }
}
