use serde::{Deserialize, Serialize};

use crate::story::narration::NarrationUnit;
use crate::story::prompt::{PromptProvider, describe_or_fallback};

/// Half-open interval `[start, end)` on the output timeline, in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A closed scene: a contiguous run of narration units shown with one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(rename = "scene_id")]
    id: usize,
    start_index: usize,
    end_index: usize,
    sentences: Vec<String>,
    duration: f64,
    start_time: f64,
    end_time: f64,
    image_file: String,
    prompt: Option<String>,
}

impl Scene {
    /// 1-based, dense scene id.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Inclusive index of the scene's last narration unit.
    pub fn end_index(&self) -> usize {
        self.end_index
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    pub fn image_file(&self) -> &str {
        &self.image_file
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn unit_count(&self) -> usize {
        self.end_index + 1 - self.start_index
    }
}

pub fn image_file_name(scene_id: usize) -> String {
    format!("scene_{scene_id:03}.png")
}

/// A scene still accumulating units.
#[derive(Debug, Clone)]
pub(crate) struct OpenScene {
    id: usize,
    start_index: usize,
    sentences: Vec<String>,
    duration: f64,
    start_time: f64,
}

impl OpenScene {
    pub(crate) fn open(id: usize, index: usize, unit: &NarrationUnit, start_time: f64) -> Self {
        Self {
            id,
            start_index: index,
            sentences: vec![unit.text().to_string()],
            duration: unit.duration(),
            start_time,
        }
    }

    pub(crate) fn duration(&self) -> f64 {
        self.duration
    }

    pub(crate) fn push(&mut self, unit: &NarrationUnit) {
        self.sentences.push(unit.text().to_string());
        self.duration += unit.duration();
    }

    /// Finalize the scene. The prompt is generated here, exactly once.
    pub(crate) fn close(self, end_index: usize, prompts: &dyn PromptProvider) -> Scene {
        let prompt = describe_or_fallback(prompts, self.id, &self.sentences);
        Scene {
            id: self.id,
            start_index: self.start_index,
            end_index,
            end_time: self.start_time + self.duration,
            duration: self.duration,
            start_time: self.start_time,
            image_file: image_file_name(self.id),
            sentences: self.sentences,
            prompt: Some(prompt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_duration_spans_start_to_end() {
        assert_eq!(TimeWindow::new(2.0, 5.0).duration(), 3.0);
    }

    #[test]
    fn image_file_is_zero_padded() {
        assert_eq!(image_file_name(1), "scene_001.png");
        assert_eq!(image_file_name(42), "scene_042.png");
        assert_eq!(image_file_name(1234), "scene_1234.png");
    }

    #[test]
    fn serializes_with_stable_field_names() {
        let unit = NarrationUnit::new("Hello.", 1.5).unwrap();
        let prompts = crate::story::prompt::TemplatePromptProvider::new(None, "");
        let scene = OpenScene::open(1, 0, &unit, 0.0).close(0, &prompts);

        let value = serde_json::to_value(&scene).unwrap();
        for key in [
            "scene_id",
            "start_index",
            "end_index",
            "sentences",
            "duration",
            "start_time",
            "end_time",
            "image_file",
            "prompt",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["image_file"], "scene_001.png");
        assert_eq!(value["prompt"], "Hello.");
    }
}
