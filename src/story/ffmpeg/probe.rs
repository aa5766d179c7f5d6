use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Container duration of a media file, via `ffprobe`.
pub fn probe_duration_seconds(path: &Path) -> Result<f64> {
    let ffprobe = which::which("ffprobe").context("ffprobe not found on PATH")?;
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .with_context(|| format!("Failed to run ffprobe for {}", path.display()))?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("Failed to parse ffprobe duration for {}", path.display()))
}

fn parse_duration(stdout: &str) -> Result<f64> {
    let value = stdout.trim();
    let duration: f64 = value
        .parse()
        .with_context(|| format!("unexpected ffprobe output `{value}`"))?;
    if !duration.is_finite() || duration < 0.0 {
        anyhow::bail!("ffprobe reported invalid duration {duration}");
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_duration() {
        assert_eq!(parse_duration("12.480000\n").unwrap(), 12.48);
    }

    #[test]
    fn rejects_missing_duration() {
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-3").is_err());
    }
}
