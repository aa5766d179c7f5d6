//! End-to-end driver: narration in, composited video out.
//!
//! Stages run strictly in order and every stage reports itself with a
//! `story.stage.<name>` event. A failing stage is named in the returned
//! error; whatever earlier stages produced stays in the work directory.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;

use super::captions::write_srt;
use super::compose::{BaseTrackBuilder, CancelFlag, Compositor, CompositorSettings};
use super::config::StoryConfig;
use super::ffmpeg::FfmpegRunner;
use super::images::{ImageProvider, render_scene_images};
use super::narration::{AudioManifest, NarrationIndex, VoicedUnit, load_sentences, units_of};
use super::prompt::PromptProvider;
use super::timeline::{SceneDocument, build_timeline};
use crate::common::progress::{create_spinner, finish_spinner_with_success};
use crate::ui::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Scenes,
    Images,
    Captions,
    Base,
    Compose,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Scenes => "scenes",
            Stage::Images => "images",
            Stage::Captions => "captions",
            Stage::Base => "base",
            Stage::Compose => "compose",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one stage, reporting its start and failure.
pub fn run_stage<T>(stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
    emit(
        Level::Info,
        &format!("story.stage.{}", stage.name()),
        &format!("Stage {stage}"),
        None,
    );
    f().map_err(|err| {
        emit(
            Level::Error,
            "story.stage.failed",
            &format!("Stage `{stage}` failed: {err:#}"),
            Some(json!({ "stage": stage.name() })),
        );
        err.context(format!("stage `{stage}` failed"))
    })
}

/// Where narration comes from.
#[derive(Debug, Clone)]
pub struct NarrationSource {
    /// One sentence per line; manifest order is used when absent
    pub sentences: Option<PathBuf>,
    pub audio_manifest: PathBuf,
    /// Directory the manifest's clip names are relative to
    pub audio_dir: Option<PathBuf>,
}

impl NarrationSource {
    fn audio_dir(&self) -> PathBuf {
        self.audio_dir.clone().unwrap_or_else(|| {
            self.audio_manifest
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        })
    }

    /// Resolve every sentence's duration and audio clip.
    pub fn load(&self, fallback_duration: f64) -> Result<Vec<VoicedUnit>> {
        let manifest = AudioManifest::load(&self.audio_manifest)?;
        if manifest.total_sentences != 0 && manifest.total_sentences != manifest.audio_files.len() {
            emit(
                Level::Warn,
                "story.narration.manifest_mismatch",
                &format!(
                    "{} declares {} sentence(s) but lists {}",
                    self.audio_manifest.display(),
                    manifest.total_sentences,
                    manifest.audio_files.len()
                ),
                None,
            );
        }
        let sentences = match &self.sentences {
            Some(path) => load_sentences(path)?,
            None => manifest.sentences(),
        };
        if sentences.is_empty() {
            anyhow::bail!(
                "no sentences found in {}",
                self.audio_manifest.display()
            );
        }

        let index = NarrationIndex::from_manifest(&manifest, &self.audio_dir(), fallback_duration);
        let voiced = index
            .resolve(&sentences)
            .context("resolving sentence durations")?;

        emit(
            Level::Debug,
            "story.narration.loaded",
            &format!(
                "{} sentence(s), {:.1}s narrated, from {} ({})",
                voiced.len(),
                manifest.total_duration,
                self.audio_manifest.display(),
                manifest.source_file.as_deref().unwrap_or("unknown source")
            ),
            None,
        );
        Ok(voiced)
    }
}

/// Fixed file names inside a work directory.
#[derive(Debug, Clone)]
pub struct WorkLayout {
    root: PathBuf,
}

impl WorkLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scene_document(&self) -> PathBuf {
        self.root.join("scenes.json")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn captions(&self) -> PathBuf {
        self.root.join("story.srt")
    }

    pub fn base_track(&self) -> PathBuf {
        self.root.join("base.mp4")
    }

    pub fn default_output(&self) -> PathBuf {
        self.root.join("story.mp4")
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub scene_count: usize,
    pub scene_document: PathBuf,
    pub captions: PathBuf,
    pub base_track: PathBuf,
    pub output: PathBuf,
}

pub struct StoryPipeline<'a> {
    pub config: &'a StoryConfig,
    pub runner: &'a dyn FfmpegRunner,
    pub prompts: &'a dyn PromptProvider,
    pub images: &'a dyn ImageProvider,
    pub fallback_images: &'a dyn ImageProvider,
    pub cancel: CancelFlag,
    pub verbose: bool,
}

impl StoryPipeline<'_> {
    pub fn run(
        &self,
        source: &NarrationSource,
        layout: &WorkLayout,
        output: &Path,
    ) -> Result<PipelineOutcome> {
        let config = self.config;

        let voiced = run_stage(Stage::Load, || source.load(config.fallback_duration))?;
        let units = units_of(&voiced);

        let document = run_stage(Stage::Scenes, || {
            let spinner = create_spinner("Building scene timeline".to_string());
            let scenes = build_timeline(&units, config.scene_cap_seconds, self.prompts)?;
            let document = SceneDocument::new(scenes)?;
            document.save(&layout.scene_document())?;
            finish_spinner_with_success(
                spinner,
                format!(
                    "{} scene(s) written to {}",
                    document.len(),
                    layout.scene_document().display()
                ),
            );
            Ok(document)
        })?;

        run_stage(Stage::Images, || {
            let report = render_scene_images(
                document.scenes(),
                &layout.images_dir(),
                self.images,
                self.fallback_images,
            )?;
            emit(
                Level::Info,
                "story.images.report",
                &format!(
                    "Images: {} rendered, {} kept, {} fallback",
                    report.rendered.len(),
                    report.skipped.len(),
                    report.fallbacks.len()
                ),
                serde_json::to_value(&report).ok(),
            );
            Ok(())
        })?;

        run_stage(Stage::Captions, || {
            write_srt(&units, &layout.captions())?;
            Ok(())
        })?;

        let base_track = run_stage(Stage::Base, || {
            BaseTrackBuilder::new(self.runner, config)
                .verbose(self.verbose)
                .build(&voiced, &layout.base_track())
        })?;

        let output = run_stage(Stage::Compose, || {
            let compositor = Compositor::new(self.runner, CompositorSettings::from(config))
                .with_cancel_flag(self.cancel.clone())
                .with_workspace_root(Some(layout.root().to_path_buf()))
                .verbose(self.verbose);
            Ok(compositor.composite(
                document.scenes(),
                &layout.images_dir(),
                &base_track,
                output,
            )?)
        })?;

        Ok(PipelineOutcome {
            scene_count: document.len(),
            scene_document: layout.scene_document(),
            captions: layout.captions(),
            base_track,
            output,
        })
    }
}
