use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

use super::narration::NarrationUnit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtCue {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// One cue per narration unit, spanning its cumulative timing. Units without
/// duration get no cue.
pub fn cues_from_units(units: &[NarrationUnit]) -> Vec<SrtCue> {
    let mut cues = Vec::with_capacity(units.len());
    let mut cursor = 0.0f64;

    for unit in units {
        let start = cursor;
        cursor += unit.duration();
        let text = unit.text().trim();
        if unit.duration() <= 0.0 || text.is_empty() {
            continue;
        }
        cues.push(SrtCue {
            start: seconds_to_duration(start),
            end: seconds_to_duration(cursor),
            text: text.to_string(),
        });
    }

    cues
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::from_millis((seconds.max(0.0) * 1000.0).round() as u64)
}

/// `HH:MM:SS,mmm`
pub fn format_timestamp(value: Duration) -> String {
    let total_millis = value.as_millis();
    let millis = total_millis % 1000;
    let total_seconds = total_millis / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

pub fn render_srt(cues: &[SrtCue]) -> String {
    let mut out = String::new();
    for (index, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            cue.text
        ));
    }
    out
}

pub fn write_srt(units: &[NarrationUnit], path: &Path) -> Result<usize> {
    let cues = cues_from_units(units);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::write(path, render_srt(&cues))
        .with_context(|| format!("writing captions to {}", path.display()))?;
    Ok(cues.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str, duration: f64) -> NarrationUnit {
        NarrationUnit::new(text, duration).unwrap()
    }

    #[test]
    fn timestamps_use_comma_milliseconds() {
        assert_eq!(format_timestamp(Duration::from_millis(0)), "00:00:00,000");
        assert_eq!(format_timestamp(Duration::from_millis(3_723_045)), "01:02:03,045");
    }

    #[test]
    fn cues_follow_cumulative_unit_timing() {
        let units = [unit("One.", 1.25), unit("", 0.0), unit("Two.", 2.5)];
        let cues = cues_from_units(&units);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].end, Duration::from_millis(1250));
        assert_eq!(cues[1].start, Duration::from_millis(1250));
        assert_eq!(cues[1].end, Duration::from_millis(3750));
    }

    #[test]
    fn renders_numbered_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs").join("story.srt");
        let count = write_srt(&[unit("Hello.", 1.0), unit("World.", 0.5)], &path).unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "1\n00:00:00,000 --> 00:00:01,000\nHello.\n\n2\n00:00:01,000 --> 00:00:01,500\nWorld.\n\n"
        );
    }
}
