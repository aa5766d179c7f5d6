use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::paths;

/// How motion progresses across a scene's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Easing {
    #[default]
    Linear,
    Smooth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Upper bound for the summed narration duration of one scene, in seconds
    pub scene_cap_seconds: f64,
    /// Duration assumed for sentences without a measured audio clip
    pub fallback_duration: f64,
    /// Number of scenes overlaid per ffmpeg invocation
    pub batch_size: usize,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Animate images with pans and zooms
    pub motion: bool,
    pub easing: Easing,
    /// Seed for the per-scene motion choice
    pub seed: u64,
    /// Longest overlay fade in/out, in seconds
    pub fade_max_seconds: f64,
    /// Images are scaled this much larger than the frame so motion never exposes an edge
    pub safety_margin: f64,
    /// Pan travel as a fraction of the shorter image side
    pub pan_fraction: f64,
    /// Extra scale reached by zooms (0.05 = 1.00 -> 1.05)
    pub zoom_amount: f64,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_sample_rate: u32,
    /// Setting text prepended to every image prompt
    pub prompt_setting: Option<String>,
    pub prompt_suffix: String,
    /// Where scene documents, images and tracks are written by `run`
    pub work_dir: Option<PathBuf>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            scene_cap_seconds: Self::DEFAULT_SCENE_CAP,
            fallback_duration: Self::DEFAULT_FALLBACK_DURATION,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            width: 1920,
            height: 1080,
            fps: 30,
            motion: true,
            easing: Easing::Linear,
            seed: 42,
            fade_max_seconds: Self::DEFAULT_FADE_MAX,
            safety_margin: Self::DEFAULT_SAFETY_MARGIN,
            pan_fraction: Self::DEFAULT_PAN_FRACTION,
            zoom_amount: Self::DEFAULT_ZOOM_AMOUNT,
            video_codec: "libx264".to_string(),
            preset: "slow".to_string(),
            crf: 18,
            audio_sample_rate: 24_000,
            prompt_setting: None,
            prompt_suffix: Self::DEFAULT_PROMPT_SUFFIX.to_string(),
            work_dir: None,
        }
    }
}

impl StoryConfig {
    pub const DEFAULT_SCENE_CAP: f64 = 10.0;
    pub const DEFAULT_FALLBACK_DURATION: f64 = 2.0;
    pub const DEFAULT_BATCH_SIZE: usize = 5;
    pub const DEFAULT_FADE_MAX: f64 = 0.5;
    pub const DEFAULT_SAFETY_MARGIN: f64 = 1.15;
    pub const DEFAULT_PAN_FRACTION: f64 = 0.05;
    pub const DEFAULT_ZOOM_AMOUNT: f64 = 0.05;
    pub const DEFAULT_PROMPT_SUFFIX: &'static str =
        "masterpiece, best quality, photorealistic, cinematic lighting, detailed, 8k uhd";

    /// Load the config from `override_path`, or from the default location.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        match override_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load_from_path(paths::story_config_path()?),
        }
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            config.save_to_path(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading story config from {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing story config {}", path.display()))?;
        config.sanitize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating story config directory {}", parent.display()))?;
        }

        let toml = toml::to_string_pretty(self).context("serializing story config")?;
        fs::write(path, toml)
            .with_context(|| format!("writing story config to {}", path.display()))?;
        Ok(())
    }

    /// Replace out-of-range values with their defaults.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        if !positive(self.scene_cap_seconds) {
            self.scene_cap_seconds = Self::DEFAULT_SCENE_CAP;
        }
        if !self.fallback_duration.is_finite() || self.fallback_duration < 0.0 {
            self.fallback_duration = Self::DEFAULT_FALLBACK_DURATION;
        }
        if self.batch_size == 0 {
            self.batch_size = Self::DEFAULT_BATCH_SIZE;
        }
        if self.width == 0 || self.height == 0 {
            self.width = defaults.width;
            self.height = defaults.height;
        }
        // yuv420p needs even dimensions
        self.width += self.width % 2;
        self.height += self.height % 2;
        if self.fps == 0 {
            self.fps = defaults.fps;
        }
        if !self.fade_max_seconds.is_finite() || self.fade_max_seconds < 0.0 {
            self.fade_max_seconds = Self::DEFAULT_FADE_MAX;
        }
        if !self.safety_margin.is_finite() || self.safety_margin < 1.0 {
            self.safety_margin = Self::DEFAULT_SAFETY_MARGIN;
        }
        if !self.pan_fraction.is_finite() || !(0.0..=0.5).contains(&self.pan_fraction) {
            self.pan_fraction = Self::DEFAULT_PAN_FRACTION;
        }
        if !self.zoom_amount.is_finite() || !(0.0..=1.0).contains(&self.zoom_amount) {
            self.zoom_amount = Self::DEFAULT_ZOOM_AMOUNT;
        }
        if self.crf > 51 {
            self.crf = defaults.crf;
        }
        if self.video_codec.trim().is_empty() {
            self.video_codec = defaults.video_codec;
        }
        if self.preset.trim().is_empty() {
            self.preset = defaults.preset;
        }
        if self.audio_sample_rate == 0 {
            self.audio_sample_rate = defaults.audio_sample_rate;
        }
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
