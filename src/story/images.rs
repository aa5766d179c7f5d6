//! Scene images.
//!
//! Images are produced by an [`ImageProvider`] into the image directory,
//! one file per scene named by the scene's `image_file`. Scenes whose image
//! already exists are left alone, so an interrupted run resumes where it
//! stopped and externally rendered images are kept.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;

use super::error::ImageError;
use super::ffmpeg::util::path_arg;
use super::ffmpeg::{FfmpegRunOptions, FfmpegRunner};
use super::prompt::fallback_prompt;
use super::timeline::Scene;
use crate::ui::prelude::*;

pub trait ImageProvider {
    fn name(&self) -> &str;

    fn render(&self, scene: &Scene, prompt: &str, out: &Path) -> Result<(), ImageError>;
}

/// Card colours, cycled by scene id.
const PLACEHOLDER_PALETTE: [&str; 6] = [
    "0x313244", "0x45475a", "0x585b70", "0x1e1e2e", "0x6c7086", "0x181825",
];

/// Solid-colour card rendered with ffmpeg's `color` source.
pub struct PlaceholderImageProvider<'a> {
    runner: &'a dyn FfmpegRunner,
    width: u32,
    height: u32,
}

impl<'a> PlaceholderImageProvider<'a> {
    pub fn new(runner: &'a dyn FfmpegRunner, width: u32, height: u32) -> Self {
        Self {
            runner,
            width,
            height,
        }
    }

    pub fn color_for(scene_id: usize) -> &'static str {
        PLACEHOLDER_PALETTE[scene_id % PLACEHOLDER_PALETTE.len()]
    }

    fn args(&self, scene: &Scene, out: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!(
                "color=c={}:s={}x{}",
                Self::color_for(scene.id()),
                self.width,
                self.height
            ),
            "-frames:v".to_string(),
            "1".to_string(),
            path_arg(out),
        ]
    }
}

impl ImageProvider for PlaceholderImageProvider<'_> {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn render(&self, scene: &Scene, _prompt: &str, out: &Path) -> Result<(), ImageError> {
        self.runner
            .run(
                &self.args(scene, out),
                FfmpegRunOptions::new(None, false, format!("scene {}", scene.id())),
            )
            .map_err(|err| ImageError::Backend {
                provider: self.name().to_string(),
                scene_id: scene.id(),
                message: format!("{err:#}"),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageReport {
    pub rendered: Vec<usize>,
    pub skipped: Vec<usize>,
    /// Scenes whose provider failed and got a fallback image instead
    pub fallbacks: Vec<usize>,
}

/// Render the image of every scene that does not have one yet.
///
/// A provider failure for one scene is recovered with `fallback`, so every
/// scene still ends up with an image; only a failing fallback is an error.
pub fn render_scene_images(
    scenes: &[Scene],
    dir: &Path,
    provider: &dyn ImageProvider,
    fallback: &dyn ImageProvider,
) -> Result<ImageReport, ImageError> {
    fs::create_dir_all(dir)?;
    let mut report = ImageReport::default();

    for scene in scenes {
        let out: PathBuf = dir.join(scene.image_file());
        if out.is_file() {
            emit(
                Level::Debug,
                "story.images.skip",
                &format!("Scene {} already has {}", scene.id(), out.display()),
                None,
            );
            report.skipped.push(scene.id());
            continue;
        }

        let prompt = scene
            .prompt()
            .map(str::to_string)
            .unwrap_or_else(|| fallback_prompt(scene.sentences()));

        match provider.render(scene, &prompt, &out) {
            Ok(()) => report.rendered.push(scene.id()),
            Err(err) => {
                emit(
                    Level::Warn,
                    "story.images.fallback",
                    &format!("{err}; using {} image", fallback.name()),
                    Some(json!({ "scene_id": scene.id() })),
                );
                fallback.render(scene, &prompt, &out)?;
                report.fallbacks.push(scene.id());
            }
        }
    }

    Ok(report)
}
