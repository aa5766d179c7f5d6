use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};

use super::util::command_line;
use crate::ui::prelude::*;

/// Runs one ffmpeg invocation to completion.
pub trait FfmpegRunner {
    fn run(&self, args: &[String], options: FfmpegRunOptions) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct FfmpegRunOptions {
    /// Expected output duration, drives the progress bar
    pub total_duration: Option<f64>,
    /// Echo ffmpeg's stderr
    pub verbose: bool,
    pub label: String,
}

impl FfmpegRunOptions {
    pub fn new(total_duration: Option<f64>, verbose: bool, label: impl Into<String>) -> Self {
        Self {
            total_duration,
            verbose,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemFfmpegRunner {
    binary: PathBuf,
}

impl SystemFfmpegRunner {
    /// Locate `ffmpeg` on `PATH`.
    pub fn detect() -> Result<Self> {
        let binary = which::which("ffmpeg")
            .context("ffmpeg not found on PATH; install ffmpeg to render videos")?;
        Ok(Self { binary })
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl FfmpegRunner for SystemFfmpegRunner {
    fn run(&self, args: &[String], options: FfmpegRunOptions) -> Result<()> {
        emit(
            Level::Debug,
            "story.ffmpeg.command",
            &command_line(&self.binary().to_string_lossy(), args),
            None,
        );
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary.display()))?;

        let stderr = child
            .stderr
            .take()
            .context("ffmpeg stderr was not captured")?;

        let pb = options
            .total_duration
            .filter(|d| *d > 0.0)
            .map(|duration| progress_bar(duration, &options.label));

        let mut tail = StderrTail::default();
        let result = read_ffmpeg_stderr(stderr, options.verbose, pb.as_ref(), &mut tail);

        let status = child.wait().context("Failed to wait for ffmpeg")?;
        result?;

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        if !status.success() {
            bail!(
                "ffmpeg exited with status {:?}: {}",
                status.code(),
                tail.summary()
            );
        }

        Ok(())
    }
}

fn progress_bar(duration: f64, label: &str) -> ProgressBar {
    if get_output_format() == OutputFormat::Json {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new((duration * 1000.0) as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(label.to_string());
    pb
}

/// Last line and error lines of ffmpeg's stderr, for failure messages.
#[derive(Debug, Default)]
struct StderrTail {
    last_line: String,
    error_lines: Vec<String>,
}

impl StderrTail {
    fn record(&mut self, line: &str) {
        self.last_line = line.to_string();
        if line.to_ascii_lowercase().contains("error") {
            self.error_lines.push(line.to_string());
        }
    }

    fn summary(&self) -> String {
        if self.error_lines.is_empty() {
            self.last_line.trim().to_string()
        } else {
            self.error_lines.join("\n").trim().to_string()
        }
    }
}

fn read_ffmpeg_stderr<R: Read>(
    mut stderr: R,
    verbose: bool,
    pb: Option<&ProgressBar>,
    tail: &mut StderrTail,
) -> Result<()> {
    let mut buffer = [0u8; 4096];
    let mut accumulated = String::new();

    loop {
        let bytes_read = stderr
            .read(&mut buffer)
            .context("Failed to read ffmpeg stderr")?;
        if bytes_read == 0 {
            break;
        }

        accumulated.push_str(&String::from_utf8_lossy(&buffer[..bytes_read]));

        // ffmpeg rewrites its status line with '\r'
        while let Some(pos) = accumulated.find(['\r', '\n']) {
            let line: String = accumulated.drain(..=pos).collect();
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }

            tail.record(line);

            if verbose {
                eprintln!("{line}");
            }

            if let Some(pb) = pb
                && let Some(progress) = parse_ffmpeg_progress(line)
            {
                pb.set_position((progress * 1000.0) as u64);
            }
        }
    }

    if !accumulated.trim().is_empty() {
        tail.record(accumulated.trim());
    }

    Ok(())
}

fn parse_ffmpeg_progress(line: &str) -> Option<f64> {
    let time_start = line.find("time=")?;
    let time_str = &line[time_start + 5..];
    let time_val = time_str.split_whitespace().next()?;
    parse_time_to_seconds(time_val)
}

fn parse_time_to_seconds(time_str: &str) -> Option<f64> {
    let mut parts = time_str.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
