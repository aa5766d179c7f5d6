//! ffmpeg invocations for one compositing batch.
//!
//! Input 0 is the track being composited onto; inputs 1..=k are the batch's
//! scene images in scene order. Each image is prepared in its own chain and
//! overlaid on the running video label, so scene k ends up above scenes
//! 1..k-1:
//!
//! ```text
//! [1:v]scale=..,crop=..,format=rgba,fade=..,setpts=PTS-STARTPTS+S/TB[img1]
//! [0:v][img1]overlay=..:enable='gte(t,S)*lt(t,E)'[v1]
//! [2:v]...[img2]
//! [v1][img2]overlay=..[v2]
//! ```
//!
//! The base audio is copied untouched and overlays pass the main stream
//! through after they end, so every output keeps the input's duration.

use std::path::{Path, PathBuf};

use crate::story::config::{Easing, StoryConfig};
use crate::story::ffmpeg::util::{format_time, path_arg};
use crate::story::timeline::Scene;

use super::batch::CompositingBatch;
use super::motion::{Motion, MotionPlan, eased_expr, fade_duration};

#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<String>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: String) {
        self.filters.push(filter);
    }

    pub fn join(&self) -> String {
        self.filters.join("; ")
    }
}

/// Render settings shared by every batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub batch_size: usize,
    pub motion: bool,
    pub easing: Easing,
    pub seed: u64,
    pub fade_max: f64,
    pub safety_margin: f64,
    pub pan_fraction: f64,
    pub zoom_amount: f64,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
}

impl From<&StoryConfig> for CompositorSettings {
    fn from(config: &StoryConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            batch_size: config.batch_size,
            motion: config.motion,
            easing: config.easing,
            seed: config.seed,
            fade_max: config.fade_max_seconds,
            safety_margin: config.safety_margin,
            pan_fraction: config.pan_fraction,
            zoom_amount: config.zoom_amount,
            video_codec: config.video_codec.clone(),
            preset: config.preset.clone(),
            crf: config.crf,
        }
    }
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self::from(&StoryConfig::default())
    }
}

impl CompositorSettings {
    /// Size images are scaled to when they move, so no edge ever shows.
    fn cover_size(&self) -> (u32, u32) {
        (
            even_ceil(self.width as f64 * self.safety_margin),
            even_ceil(self.height as f64 * self.safety_margin),
        )
    }
}

fn even_ceil(value: f64) -> u32 {
    // absorb float noise: 1920 * 1.15 is not exactly 2208
    let v = (value - 1e-6).ceil().max(2.0) as u32;
    v + v % 2
}

/// One ffmpeg invocation: argument list plus what it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchCommand {
    pub batch_index: usize,
    pub args: Vec<String>,
    pub output: PathBuf,
    /// Scenes actually overlaid; zero-length scenes are skipped
    pub scene_ids: Vec<usize>,
}

pub struct BatchGraphBuilder<'a> {
    settings: &'a CompositorSettings,
    motions: &'a MotionPlan,
    images_dir: &'a Path,
}

impl<'a> BatchGraphBuilder<'a> {
    pub fn new(
        settings: &'a CompositorSettings,
        motions: &'a MotionPlan,
        images_dir: &'a Path,
    ) -> Self {
        Self {
            settings,
            motions,
            images_dir,
        }
    }

    pub fn image_path(&self, scene: &Scene) -> PathBuf {
        self.images_dir.join(scene.image_file())
    }

    pub fn build(&self, batch: &CompositingBatch<'_>, input: &Path, output: &Path) -> BatchCommand {
        let visible: Vec<&Scene> = batch
            .scenes
            .iter()
            .filter(|scene| scene.duration() > 0.0)
            .collect();

        if visible.is_empty() {
            return BatchCommand {
                batch_index: batch.index,
                args: passthrough_args(input, output),
                output: output.to_path_buf(),
                scene_ids: Vec::new(),
            };
        }

        let mut args = vec!["-y".to_string(), "-i".to_string(), path_arg(input)];
        let mut filters = FilterChain::new();
        let mut current_label = "0:v".to_string();

        for (offset, scene) in visible.iter().enumerate() {
            let input_index = offset + 1;
            let motion = self.motions.for_scene(scene.id());
            args.extend(self.image_input_args(scene, motion));

            let image_label = format!("img{input_index}");
            let output_label = format!("v{input_index}");
            filters.push(self.image_chain(scene, motion, input_index, &image_label));
            filters.push(self.overlay(scene, motion, &current_label, &image_label, &output_label));
            current_label = output_label;
        }

        args.push("-filter_complex".to_string());
        args.push(filters.join());
        args.push("-map".to_string());
        args.push(format!("[{current_label}]"));
        args.push("-map".to_string());
        args.push("0:a?".to_string());
        args.extend(self.encode_args());
        args.push(path_arg(output));

        BatchCommand {
            batch_index: batch.index,
            args,
            output: output.to_path_buf(),
            scene_ids: visible.iter().map(|scene| scene.id()).collect(),
        }
    }

    fn image_input_args(&self, scene: &Scene, motion: Option<Motion>) -> Vec<String> {
        let image = path_arg(&self.image_path(scene));
        match motion {
            // zoompan expands the single decoded frame itself
            Some(m) if m.is_zoom() => vec!["-i".to_string(), image],
            _ => vec![
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                self.settings.fps.to_string(),
                "-t".to_string(),
                format_time(scene.duration()),
                "-i".to_string(),
                image,
            ],
        }
    }

    fn image_chain(
        &self,
        scene: &Scene,
        motion: Option<Motion>,
        input_index: usize,
        label: &str,
    ) -> String {
        let settings = self.settings;
        let (width, height) = match motion {
            Some(_) => settings.cover_size(),
            None => (settings.width, settings.height),
        };

        let mut steps = vec![
            format!("scale={width}:{height}:force_original_aspect_ratio=increase"),
            format!("crop={width}:{height}"),
            "setsar=1".to_string(),
        ];

        if let Some(m) = motion.filter(|m| m.is_zoom()) {
            steps.push(self.zoompan(scene, m));
        }

        steps.push("format=rgba".to_string());

        let fade = fade_duration(scene.duration(), settings.fade_max);
        if fade > 0.0 {
            steps.push(format!(
                "fade=t=in:st=0:d={d}:alpha=1",
                d = format_time(fade)
            ));
            steps.push(format!(
                "fade=t=out:st={st}:d={d}:alpha=1",
                st = format_time(scene.duration() - fade),
                d = format_time(fade)
            ));
        }

        steps.push(format!(
            "setpts=PTS-STARTPTS+{start}/TB",
            start = format_time(scene.start_time())
        ));

        format!("[{input_index}:v]{chain}[{label}]", chain = steps.join(","))
    }

    fn zoompan(&self, scene: &Scene, motion: Motion) -> String {
        let settings = self.settings;
        let frames = frame_count(scene.duration(), settings.fps);
        let linear = format!("min(on/{},1)", frames.saturating_sub(1).max(1));
        let progress = eased_expr(settings.easing, &linear);
        let amount = settings.zoom_amount;
        let zoom = match motion {
            Motion::ZoomOut => format!("1+{amount}*(1-{progress})"),
            _ => format!("1+{amount}*{progress}"),
        };
        format!(
            "zoompan=z='{zoom}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={w}x{h}:fps={fps}",
            w = settings.width,
            h = settings.height,
            fps = settings.fps,
        )
    }

    fn overlay(
        &self,
        scene: &Scene,
        motion: Option<Motion>,
        base_label: &str,
        image_label: &str,
        output_label: &str,
    ) -> String {
        let start = format_time(scene.start_time());
        let end = format_time(scene.end_time());
        let enable = format!("gte(t,{start})*lt(t,{end})");

        let position = match motion {
            Some(m) if !m.is_zoom() => {
                let (x, y) = self.pan_position(scene, m);
                format!("x='{x}':y='{y}':eval=frame")
            }
            _ => "x=(W-w)/2:y=(H-h)/2".to_string(),
        };

        format!(
            "[{base_label}][{image_label}]overlay={position}:eof_action=pass:enable='{enable}'[{output_label}]"
        )
    }

    /// Centred overlay offsets that travel across the scene's window.
    fn pan_position(&self, scene: &Scene, motion: Motion) -> (String, String) {
        let settings = self.settings;
        let (cover_w, cover_h) = settings.cover_size();
        let travel = settings.pan_fraction * f64::from(cover_w.min(cover_h));
        let travel_x = travel.min(f64::from(cover_w - settings.width));
        let travel_y = travel.min(f64::from(cover_h - settings.height));

        let linear = format!(
            "clip((t-{start})/{duration},0,1)",
            start = format_time(scene.start_time()),
            duration = format_time(scene.duration())
        );
        let progress = eased_expr(settings.easing, &linear);

        let centred_x = "(W-w)/2".to_string();
        let centred_y = "(H-h)/2".to_string();
        let slide = |travel: f64, forward: bool| {
            let direction = if forward {
                format!("({progress}-0.5)")
            } else {
                format!("(0.5-{progress})")
            };
            format!("+{travel:.3}*{direction}")
        };

        match motion {
            Motion::PanLeft => (centred_x + &slide(travel_x, false), centred_y),
            Motion::PanRight => (centred_x + &slide(travel_x, true), centred_y),
            Motion::PanUp => (centred_x, centred_y + &slide(travel_y, false)),
            Motion::PanDown => (centred_x, centred_y + &slide(travel_y, true)),
            Motion::ZoomIn | Motion::ZoomOut => (centred_x, centred_y),
        }
    }

    fn encode_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.settings.video_codec.clone(),
            "-preset".to_string(),
            self.settings.preset.clone(),
            "-crf".to_string(),
            self.settings.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            self.settings.fps.to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
        ]
    }
}

/// Stream-copy `input` to `output` unchanged.
pub fn passthrough_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-map".to_string(),
        "0".to_string(),
        "-c".to_string(),
        "copy".to_string(),
        path_arg(output),
    ]
}

fn frame_count(duration: f64, fps: u32) -> u64 {
    ((duration * f64::from(fps)).round() as u64).max(1)
}
