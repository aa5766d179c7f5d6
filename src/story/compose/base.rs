use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::story::config::StoryConfig;
use crate::story::ffmpeg::util::{concat_list_entry, format_time, path_arg};
use crate::story::ffmpeg::{FfmpegRunOptions, FfmpegRunner};
use crate::story::narration::VoicedUnit;
use crate::ui::prelude::*;

/// Every ffmpeg call needed to render a base track, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseTrackPlan {
    /// Silence clips for units that have no audio, rendered first
    pub silence: Vec<Vec<String>>,
    /// Contents of the concat demuxer list
    pub concat_list: String,
    pub render: Vec<String>,
    pub total_duration: f64,
}

/// Renders the black, audio-bearing canvas the compositor draws on.
pub struct BaseTrackBuilder<'a> {
    runner: &'a dyn FfmpegRunner,
    width: u32,
    height: u32,
    fps: u32,
    sample_rate: u32,
    video_codec: String,
    preset: String,
    crf: u8,
    verbose: bool,
}

impl<'a> BaseTrackBuilder<'a> {
    pub fn new(runner: &'a dyn FfmpegRunner, config: &StoryConfig) -> Self {
        Self {
            runner,
            width: config.width,
            height: config.height,
            fps: config.fps,
            sample_rate: config.audio_sample_rate,
            video_codec: config.video_codec.clone(),
            preset: config.preset.clone(),
            crf: config.crf,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Plan the render with scratch files (silence, concat list) under `scratch`.
    pub fn plan(
        &self,
        voiced: &[VoicedUnit],
        scratch: &Path,
        output: &Path,
    ) -> Result<BaseTrackPlan> {
        let mut silence = Vec::new();
        let mut entries = Vec::new();
        let mut total_duration = 0.0;

        for (index, item) in voiced.iter().enumerate() {
            let duration = item.unit.duration();
            total_duration += duration;

            match &item.audio {
                Some(audio) => {
                    if !audio.is_file() {
                        bail!(
                            "audio clip for sentence {} not found at {}",
                            index + 1,
                            audio.display()
                        );
                    }
                    entries.push(concat_list_entry(audio));
                }
                None if duration > 0.0 => {
                    let clip = scratch.join(format!("silence_{index:03}.wav"));
                    silence.push(self.silence_args(duration, &clip));
                    entries.push(concat_list_entry(&clip));
                }
                None => {}
            }
        }

        if entries.is_empty() || total_duration <= 0.0 {
            bail!("narration has no audible duration; nothing to render");
        }

        let list_path = scratch.join("audio.txt");
        Ok(BaseTrackPlan {
            silence,
            concat_list: entries.join("\n") + "\n",
            render: self.render_args(&list_path, total_duration, output),
            total_duration,
        })
    }

    pub fn build(&self, voiced: &[VoicedUnit], output: &Path) -> Result<PathBuf> {
        let scratch = tempfile::Builder::new()
            .prefix("storyreel-base-")
            .tempdir()
            .context("creating scratch directory for the base track")?;
        let plan = self.plan(voiced, scratch.path(), output)?;

        for args in &plan.silence {
            self.runner
                .run(args, FfmpegRunOptions::new(None, self.verbose, "silence"))
                .context("rendering silence for a sentence without audio")?;
        }

        let list_path = scratch.path().join("audio.txt");
        fs::write(&list_path, &plan.concat_list)
            .with_context(|| format!("writing concat list {}", list_path.display()))?;

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }

        emit(
            Level::Info,
            "story.base.render",
            &format!(
                "Rendering {:.1}s base track to {}",
                plan.total_duration,
                output.display()
            ),
            None,
        );
        self.runner
            .run(
                &plan.render,
                FfmpegRunOptions::new(Some(plan.total_duration), self.verbose, "base track"),
            )
            .context("rendering base track")?;

        Ok(output.to_path_buf())
    }

    fn silence_args(&self, duration: f64, clip: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!("anullsrc=r={}:cl=mono", self.sample_rate),
            "-t".to_string(),
            format_time(duration),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            path_arg(clip),
        ]
    }

    fn render_args(&self, list_path: &Path, total_duration: f64, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!(
                "color=c=black:s={}x{}:r={}:d={}",
                self.width,
                self.height,
                self.fps,
                format_time(total_duration)
            ),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            path_arg(list_path),
            "-map".to_string(),
            "0:v".to_string(),
            "-map".to_string(),
            "1:a".to_string(),
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-shortest".to_string(),
            path_arg(output),
        ]
    }
}
