use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::errors::{ArchiveError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    VideoDownload,
    ClipDownload,
    ChatDownload,
    ChatRender,
}

impl ToolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolMode::VideoDownload => "VideoDownload",
            ToolMode::ClipDownload => "ClipDownload",
            ToolMode::ChatDownload => "ChatDownload",
            ToolMode::ChatRender => "ChatRender",
        }
    }
}

/// One call of the downloader, described independently of how it is run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub mode: ToolMode,
    pub id: Option<String>,
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub embed_emotes: bool,
    pub temp_dir: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl ToolInvocation {
    pub fn download(mode: ToolMode, id: &str, output: PathBuf) -> Self {
        Self {
            mode,
            id: Some(id.to_string()),
            input: None,
            output,
            embed_emotes: false,
            temp_dir: None,
            extra_args: Vec::new(),
        }
    }

    pub fn render(input: PathBuf, output: PathBuf) -> Self {
        Self {
            mode: ToolMode::ChatRender,
            id: None,
            input: Some(input),
            output,
            embed_emotes: false,
            temp_dir: None,
            extra_args: Vec::new(),
        }
    }

    pub fn with_emotes(mut self, embed: bool) -> Self {
        self.embed_emotes = embed;
        self
    }

    pub fn with_temp_dir(mut self, dir: &Path) -> Self {
        self.temp_dir = Some(dir.to_path_buf());
        self
    }

    pub fn with_args(mut self, args: &[String]) -> Self {
        self.extra_args.extend(args.iter().cloned());
        self
    }

    /// Command-line arguments, in the order the downloader documents them.
    pub fn args(&self, ffmpeg: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-m".into(), self.mode.as_str().into()];
        if let Some(id) = &self.id {
            args.push("--id".into());
            args.push(id.into());
        }
        if let Some(input) = &self.input {
            args.push("-i".into());
            args.push(input.into());
        }
        args.push("--ffmpeg-path".into());
        args.push(ffmpeg.into());
        if self.embed_emotes {
            args.push("--embed-emotes".into());
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        if let Some(dir) = &self.temp_dir {
            args.push("--temp-path".into());
            args.push(dir.into());
        }
        args.push("-o".into());
        args.push(self.output.clone().into());
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success,
    Failed { code: Option<i32> },
    TimedOut,
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success)
    }

    /// Interrupted rather than refused: killed by a signal or by the timeout.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ToolOutcome::TimedOut | ToolOutcome::Failed { code: None })
    }
}

pub trait ExternalTool {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutcome>;
}

/// Runs the downloader executable as a child process.
pub struct DownloaderProcess {
    program: PathBuf,
    ffmpeg: PathBuf,
    timeout: Option<Duration>,
}

impl DownloaderProcess {
    pub fn new(program: PathBuf, ffmpeg: PathBuf, timeout: Option<Duration>) -> Self {
        Self {
            program,
            ffmpeg,
            timeout,
        }
    }
}

impl ExternalTool for DownloaderProcess {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        let args = invocation.args(&self.ffmpeg);
        log::debug!("running {} {:?}", self.program.display(), args);
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach_from_terminal_signals(&mut command);
        let mut child = command
            .spawn()
            .map_err(|e| {
                ArchiveError::Tool(format!("failed to start {}: {}", self.program.display(), e))
            })?;

        Ok(match wait_with_timeout(&mut child, self.timeout)? {
            Some(status) if status.success() => ToolOutcome::Success,
            Some(status) => ToolOutcome::Failed {
                code: status.code(),
            },
            None => ToolOutcome::TimedOut,
        })
    }
}

/// Starts the child in its own process group; a terminal Ctrl+C reaches only this process.
pub fn detach_from_terminal_signals(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = command;
}

/// Waits for `child`, killing it once `timeout` has elapsed. `None` means it was killed.
pub fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return Ok(Some(child.wait()?));
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            log::warn!("process {} exceeded {:?}, killing it", child.id(), timeout);
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
    }
}

/// Absolute path of `program`, searching `PATH` when it is a bare name.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path).find_map(|dir| {
        let full = dir.join(program);
        if full.is_file() {
            return Some(full);
        }
        let exe = dir.join(format!("{}.exe", program));
        exe.is_file().then_some(exe)
    })
}
