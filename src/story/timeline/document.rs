use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::story::error::TimelineError;

use super::scene::{Scene, image_file_name};

const TIME_TOLERANCE: f64 = 1e-6;

/// The persisted scene list, written as a pretty JSON array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneDocument {
    scenes: Vec<Scene>,
}

impl SceneDocument {
    pub fn new(scenes: Vec<Scene>) -> Result<Self, TimelineError> {
        let document = Self { scenes };
        document.validate()?;
        Ok(document)
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.scenes.last().map(Scene::end_time).unwrap_or(0.0)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading scene document {}", path.display()))?;
        let document: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parsing scene document {}", path.display()))?;
        document
            .validate()
            .with_context(|| format!("validating scene document {}", path.display()))?;
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing scene document")?;
        fs::write(path, json)
            .with_context(|| format!("writing scene document {}", path.display()))?;
        Ok(())
    }

    /// Check the partition and timing invariants, naming the first bad scene.
    pub fn validate(&self) -> Result<(), TimelineError> {
        validate_scenes(&self.scenes)
    }
}

/// Check that `scenes` form a valid timeline: dense ids from 1, unit ranges
/// partitioning the narration, contiguous windows from 0 and durations that
/// match their windows. The first bad scene is named in the error.
pub fn validate_scenes(scenes: &[Scene]) -> Result<(), TimelineError> {
    let mut next_index = 0usize;
    let mut next_time = 0.0f64;

    for (position, scene) in scenes.iter().enumerate() {
        let id = scene.id();
        let fail = |reason: String| -> Result<(), TimelineError> {
            Err(TimelineError::invariant(id, reason))
        };

        if id != position + 1 {
            return fail(format!("expected scene id {}", position + 1));
        }
        if scene.start_index() != next_index {
            return fail(format!(
                "starts at unit {} but unit {} is next",
                scene.start_index(),
                next_index
            ));
        }
        if scene.end_index() < scene.start_index() {
            return fail("end_index precedes start_index".to_string());
        }
        if scene.sentences().len() != scene.unit_count() {
            return fail(format!(
                "covers {} units but lists {} sentences",
                scene.unit_count(),
                scene.sentences().len()
            ));
        }
        if !scene.duration().is_finite() || scene.duration() < 0.0 {
            return fail(format!("invalid duration {}", scene.duration()));
        }
        if (scene.start_time() - next_time).abs() > TIME_TOLERANCE {
            return fail(format!(
                "starts at {:.6}s but the previous scene ends at {:.6}s",
                scene.start_time(),
                next_time
            ));
        }
        if (scene.window().duration() - scene.duration()).abs() > TIME_TOLERANCE {
            return fail(format!(
                "duration {:.6}s does not match its window {:.6}s..{:.6}s",
                scene.duration(),
                scene.start_time(),
                scene.end_time()
            ));
        }
        if scene.image_file() != image_file_name(id) {
            return fail(format!(
                "image file {} should be {}",
                scene.image_file(),
                image_file_name(id)
            ));
        }

        next_index = scene.end_index() + 1;
        next_time = scene.end_time();
    }
    Ok(())
}
