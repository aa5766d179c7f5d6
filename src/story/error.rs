use std::path::PathBuf;

use thiserror::Error;

/// Broken scene/narration invariants. These are programming or input-data
/// errors and are never recovered from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("narration unit {index} has invalid duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },

    #[error("scene duration cap must be a positive number of seconds, got {0}")]
    InvalidCap(f64),

    #[error("scene {scene_id}: {reason}")]
    Invariant { scene_id: usize, reason: String },
}

impl TimelineError {
    pub fn invariant(scene_id: usize, reason: impl Into<String>) -> Self {
        TimelineError::Invariant {
            scene_id,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum NarrationError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse audio manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} contains no narration")]
    Empty(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("prompt backend failed: {0}")]
    Backend(String),

    #[error("prompt backend returned an empty description")]
    Empty,
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("{provider} could not render scene {scene_id}: {message}")]
    Backend {
        provider: String,
        scene_id: usize,
        message: String,
    },

    #[error("image I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the batched compositor. Every variant is fatal to the whole
/// composite: a partially composited track is never handed on.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("image for scene {scene_id} not found at {path}")]
    MissingImage { scene_id: usize, path: PathBuf },

    #[error("compositing batch {batch_index} failed: {reason}")]
    CompositionFailed {
        batch_index: usize,
        reason: String,
        artifacts: Option<PathBuf>,
    },

    #[error("compositing cancelled after {completed_batches} batch(es)")]
    Cancelled {
        completed_batches: usize,
        artifacts: Option<PathBuf>,
    },

    #[error("compositing workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("failed to write composite output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

impl ComposeError {
    /// Directory holding the intermediate tracks kept for inspection, if any.
    pub fn artifacts(&self) -> Option<&PathBuf> {
        match self {
            ComposeError::CompositionFailed { artifacts, .. }
            | ComposeError::Cancelled { artifacts, .. } => artifacts.as_ref(),
            _ => None,
        }
    }
}
