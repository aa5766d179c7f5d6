use crate::story::error::TimelineError;
use crate::story::narration::NarrationUnit;
use crate::story::prompt::PromptProvider;

use super::scene::{OpenScene, Scene};

/// Partition `units` into scenes whose summed duration stays within `cap`.
///
/// A unit that alone exceeds `cap` forms its own scene. Empty input yields an
/// empty timeline.
pub fn build_timeline(
    units: &[NarrationUnit],
    cap: f64,
    prompts: &dyn PromptProvider,
) -> Result<Vec<Scene>, TimelineError> {
    if !cap.is_finite() || cap <= 0.0 {
        return Err(TimelineError::InvalidCap(cap));
    }

    let mut state = TimelineBuildState::new(cap, prompts);
    for (index, unit) in units.iter().enumerate() {
        state.apply_unit(index, unit)?;
    }
    Ok(state.finalize(units.len()))
}

struct TimelineBuildState<'a> {
    cap: f64,
    prompts: &'a dyn PromptProvider,
    scenes: Vec<Scene>,
    current: Option<OpenScene>,
    cursor_time: f64,
}

impl<'a> TimelineBuildState<'a> {
    fn new(cap: f64, prompts: &'a dyn PromptProvider) -> Self {
        Self {
            cap,
            prompts,
            scenes: Vec::new(),
            current: None,
            cursor_time: 0.0,
        }
    }

    fn apply_unit(&mut self, index: usize, unit: &NarrationUnit) -> Result<(), TimelineError> {
        let duration = unit.duration();
        if !duration.is_finite() || duration < 0.0 {
            return Err(TimelineError::InvalidDuration { index, duration });
        }

        match self.current.as_mut() {
            None => self.open_scene(index, unit),
            Some(open) if open.duration() + duration <= self.cap => open.push(unit),
            Some(_) => {
                self.close_current(index - 1);
                self.open_scene(index, unit);
            }
        }
        Ok(())
    }

    fn open_scene(&mut self, index: usize, unit: &NarrationUnit) {
        let id = self.scenes.len() + 1;
        self.current = Some(OpenScene::open(id, index, unit, self.cursor_time));
    }

    fn close_current(&mut self, end_index: usize) {
        if let Some(open) = self.current.take() {
            let scene = open.close(end_index, self.prompts);
            self.cursor_time = scene.end_time();
            self.scenes.push(scene);
        }
    }

    fn finalize(mut self, unit_count: usize) -> Vec<Scene> {
        if unit_count > 0 {
            self.close_current(unit_count - 1);
        }
        self.scenes
    }
}
