//! Scene timeline.
//!
//! Narration units are partitioned, in order, into scenes of bounded summed
//! duration. Scene windows are contiguous: scene 1 starts at 0 and every
//! following scene starts where the previous one ended.

mod builder;
mod document;
mod scene;

pub use builder::build_timeline;
pub use document::{SceneDocument, validate_scenes};
pub use scene::{Scene, TimeWindow, image_file_name};
