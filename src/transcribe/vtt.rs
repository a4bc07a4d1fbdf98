use std::io::{self, Write};

use super::TimedWord;

/// Seconds to a zero-padded `HH:MM:SS.mmm` cue timestamp.
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// One cue per word, in the order given.
pub fn write_webvtt<W: Write>(mut out: W, words: &[TimedWord]) -> io::Result<()> {
    writeln!(out, "WEBVTT")?;
    writeln!(out)?;
    for word in words {
        writeln!(
            out,
            "{} --> {}",
            format_timestamp(word.start),
            format_timestamp(word.end)
        )?;
        writeln!(out, "{}", word.word)?;
        writeln!(out)?;
    }
    out.flush()
}
