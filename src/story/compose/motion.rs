use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::story::config::Easing;

/// Camera movement applied to one scene's image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    PanLeft,
    PanRight,
    PanUp,
    PanDown,
    ZoomIn,
    ZoomOut,
}

impl Motion {
    pub const ALL: [Motion; 6] = [
        Motion::PanLeft,
        Motion::PanRight,
        Motion::PanUp,
        Motion::PanDown,
        Motion::ZoomIn,
        Motion::ZoomOut,
    ];

    pub fn is_zoom(self) -> bool {
        matches!(self, Motion::ZoomIn | Motion::ZoomOut)
    }

    pub fn name(self) -> &'static str {
        match self {
            Motion::PanLeft => "pan-left",
            Motion::PanRight => "pan-right",
            Motion::PanUp => "pan-up",
            Motion::PanDown => "pan-down",
            Motion::ZoomIn => "zoom-in",
            Motion::ZoomOut => "zoom-out",
        }
    }
}

/// Motion for every scene of a timeline, drawn once in scene order so a
/// scene's motion never depends on how scenes are batched.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPlan {
    motions: Vec<Option<Motion>>,
}

impl MotionPlan {
    pub fn new(scene_count: usize, seed: u64, enabled: bool) -> Self {
        if !enabled {
            return Self {
                motions: vec![None; scene_count],
            };
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let motions = (0..scene_count)
            .map(|_| Some(Motion::ALL[rng.gen_range(0..Motion::ALL.len())]))
            .collect();
        Self { motions }
    }

    /// Motion of the scene with the given 1-based id.
    pub fn for_scene(&self, scene_id: usize) -> Option<Motion> {
        scene_id
            .checked_sub(1)
            .and_then(|i| self.motions.get(i).copied())
            .flatten()
    }
}

/// Fade in/out length for a scene of `duration` seconds.
pub fn fade_duration(duration: f64, fade_max: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    fade_max.min(duration / 10.0).max(0.0)
}

/// ffmpeg expression for eased progress, given a linear progress expression in [0, 1].
pub fn eased_expr(easing: Easing, linear: &str) -> String {
    match easing {
        Easing::Linear => linear.to_string(),
        Easing::Smooth => format!("(1-cos(PI*{linear}))/2"),
    }
}
