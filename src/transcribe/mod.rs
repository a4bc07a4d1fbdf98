#[cfg(feature = "vosk")]
pub mod vosk;
pub mod vtt;

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{ArchiveError, Result};
use crate::tool::detach_from_terminal_signals;

pub use vtt::{format_timestamp, write_webvtt};

pub const SAMPLE_RATE: u32 = 16_000;
const CHUNK_BYTES: usize = 4000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimedWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

pub trait SpeechRecognizer {
    /// Feeds mono samples. `true` once an utterance boundary is reached and
    /// `result` has words ready.
    fn accept(&mut self, samples: &[i16]) -> Result<bool>;
    fn result(&mut self) -> Vec<TimedWord>;
    /// Flushes whatever is left after the stream ends.
    fn final_result(&mut self) -> Vec<TimedWord>;
}

pub trait RecognizerFactory {
    fn create(&self, sample_rate: u32) -> Result<Box<dyn SpeechRecognizer>>;
}

/// Produces a caption file for a downloaded video.
pub trait Captioner {
    /// Returns the number of cues written to `output`.
    fn caption(&self, video: &Path, output: &Path) -> Result<usize>;
}

/// Streams raw s16le mono PCM through `recognizer` in fixed-size chunks and
/// returns every recognized word in arrival order.
pub fn transcribe_pcm<R: Read>(mut reader: R, recognizer: &mut dyn SpeechRecognizer) -> Result<Vec<TimedWord>> {
    let mut words = Vec::new();
    let mut buf = [0u8; CHUNK_BYTES];
    // Odd byte left over from the previous read, if any.
    let mut carry: Option<u8> = None;
    let mut samples = Vec::with_capacity(CHUNK_BYTES / 2 + 1);

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        samples.clear();
        let mut bytes = &buf[..n];
        if let Some(lo) = carry.take() {
            samples.push(i16::from_le_bytes([lo, bytes[0]]));
            bytes = &bytes[1..];
        }
        let mut pairs = bytes.chunks_exact(2);
        samples.extend(pairs.by_ref().map(|p| i16::from_le_bytes([p[0], p[1]])));
        carry = pairs.remainder().first().copied();

        if !samples.is_empty() && recognizer.accept(&samples)? {
            words.extend(recognizer.result());
        }
    }

    words.extend(recognizer.final_result());
    Ok(words)
}

/// Decodes a video's audio with ffmpeg and writes a WebVTT caption track.
pub struct Transcriber {
    ffmpeg: PathBuf,
    factory: Box<dyn RecognizerFactory>,
    timeout: Option<Duration>,
}

impl Transcriber {
    pub fn new(ffmpeg: PathBuf, factory: Box<dyn RecognizerFactory>, timeout: Option<Duration>) -> Self {
        Self {
            ffmpeg,
            factory,
            timeout,
        }
    }

    /// Returns the number of caption cues written to `output`.
    pub fn transcribe_file(&self, video: &Path, output: &Path) -> Result<usize> {
        let mut recognizer = self.factory.create(SAMPLE_RATE)?;
        let rate = SAMPLE_RATE.to_string();
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-nostdin")
            .args(["-loglevel", "quiet", "-i"])
            .arg(video)
            .args(["-ar", &rate, "-ac", "1", "-f", "s16le", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        detach_from_terminal_signals(&mut command);
        let mut child = command
            .spawn()
            .map_err(|e| ArchiveError::Tool(format!("failed to start ffmpeg: {}", e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ArchiveError::Tool("ffmpeg stdout not captured".to_string()))?;

        let child = Arc::new(Mutex::new(child));
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let watchdog = self.timeout.map(|timeout| {
            let child = Arc::clone(&child);
            thread::spawn(move || match done_rx.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Ok(mut child) = child.lock() {
                        let _ = child.kill();
                    }
                    true
                }
                _ => false,
            })
        });

        let words = transcribe_pcm(stdout, recognizer.as_mut());
        let _ = done_tx.send(());
        let timed_out = watchdog
            .map(|handle| handle.join().unwrap_or(false))
            .unwrap_or(false);
        let status = child
            .lock()
            .map_err(|_| ArchiveError::Tool("ffmpeg handle poisoned".to_string()))?
            .wait()?;

        if timed_out {
            return Err(ArchiveError::Transcription(format!(
                "ffmpeg decode of {} timed out",
                video.display()
            )));
        }
        let words = words?;
        if !status.success() {
            return Err(ArchiveError::Transcription(format!(
                "ffmpeg exited with {} for {}",
                status,
                video.display()
            )));
        }

        write_webvtt(BufWriter::new(File::create(output)?), &words)?;
        Ok(words.len())
    }
}

impl Captioner for Transcriber {
    fn caption(&self, video: &Path, output: &Path) -> Result<usize> {
        self.transcribe_file(video, output)
    }
}
