//! Batched, time-windowed compositing of scene images onto a base track.

mod base;
mod batch;
mod cancel;
mod graph;
mod motion;
mod workspace;

pub use base::BaseTrackBuilder;
pub use cancel::CancelFlag;
pub use graph::{BatchCommand, CompositorSettings};

use batch::split_batches;
use graph::{BatchGraphBuilder, passthrough_args};
use motion::MotionPlan;
use workspace::{Workspace, intermediate_in};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::json;

use super::error::ComposeError;
use super::ffmpeg::{FfmpegRunOptions, FfmpegRunner};
use super::timeline::{Scene, validate_scenes};
use crate::ui::prelude::*;

pub struct Compositor<'a> {
    runner: &'a dyn FfmpegRunner,
    settings: CompositorSettings,
    cancel: CancelFlag,
    workspace_root: Option<PathBuf>,
    verbose: bool,
}

impl<'a> Compositor<'a> {
    pub fn new(runner: &'a dyn FfmpegRunner, settings: CompositorSettings) -> Self {
        Self {
            runner,
            settings,
            cancel: CancelFlag::new(),
            workspace_root: None,
            verbose: false,
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Create workspaces under `root` instead of the system temp directory.
    pub fn with_workspace_root(mut self, root: Option<PathBuf>) -> Self {
        self.workspace_root = root;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The ffmpeg invocations a composite would run, with intermediates
    /// placed in `workspace_dir`. Nothing is executed.
    pub fn plan(
        &self,
        scenes: &[Scene],
        images_dir: &Path,
        base_track: &Path,
        workspace_dir: &Path,
    ) -> Result<Vec<BatchCommand>, ComposeError> {
        validate_scenes(scenes)?;
        let batches = split_batches(scenes, self.settings.batch_size)?;
        if batches.is_empty() {
            let output = intermediate_in(workspace_dir, 0);
            return Ok(vec![BatchCommand {
                batch_index: 0,
                args: passthrough_args(base_track, &output),
                output,
                scene_ids: Vec::new(),
            }]);
        }

        let motions = MotionPlan::new(scenes.len(), self.settings.seed, self.settings.motion);
        for scene in scenes {
            if let Some(motion) = motions.for_scene(scene.id()) {
                emit(
                    Level::Debug,
                    "story.compose.motion",
                    &format!("Scene {}: {}", scene.id(), motion.name()),
                    None,
                );
            }
        }
        let builder = BatchGraphBuilder::new(&self.settings, &motions, images_dir);

        let mut current = base_track.to_path_buf();
        let mut commands = Vec::with_capacity(batches.len());
        for batch in &batches {
            let output = intermediate_in(workspace_dir, batch.index);
            let command = builder.build(batch, &current, &output);
            current = output;
            commands.push(command);
        }
        Ok(commands)
    }

    /// Overlay every scene's image onto `base_track` and write the result to
    /// `output`. The output keeps the base track's duration and audio.
    pub fn composite(
        &self,
        scenes: &[Scene],
        images_dir: &Path,
        base_track: &Path,
        output: &Path,
    ) -> Result<PathBuf, ComposeError> {
        if self.settings.batch_size == 0 {
            return Err(ComposeError::InvalidBatchSize);
        }
        validate_scenes(scenes)?;
        self.check_images(scenes, images_dir)?;

        let workspace = Workspace::create(self.workspace_root.as_deref())?;
        let commands = self.plan(scenes, images_dir, base_track, workspace.path())?;
        let total_duration = scenes.last().map(Scene::end_time);
        let batch_total = commands.len();

        let mut current = base_track.to_path_buf();
        for (completed, command) in commands.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(workspace, completed));
            }

            emit(
                Level::Info,
                "story.compose.batch",
                &format!(
                    "Compositing batch {}/{} ({} scene(s))",
                    command.batch_index + 1,
                    batch_total,
                    command.scene_ids.len()
                ),
                Some(json!({
                    "batch_index": command.batch_index,
                    "batches": batch_total,
                    "scene_ids": command.scene_ids,
                })),
            );

            let options = FfmpegRunOptions::new(
                total_duration,
                self.verbose,
                format!("batch {}/{}", command.batch_index + 1, batch_total),
            );
            if let Err(err) = self.runner.run(&command.args, options) {
                // Ctrl-C reaches ffmpeg too; report it as a cancellation
                if self.cancel.is_cancelled() {
                    return Err(self.cancelled(workspace, completed));
                }
                let artifacts = workspace.preserve();
                emit(
                    Level::Error,
                    "story.compose.batch_failed",
                    &format!(
                        "Batch {} failed; intermediates kept in {}",
                        command.batch_index,
                        artifacts.display()
                    ),
                    None,
                );
                return Err(ComposeError::CompositionFailed {
                    batch_index: command.batch_index,
                    reason: format!("{err:#}"),
                    artifacts: Some(artifacts),
                });
            }

            workspace.discard(&current);
            current = command.output.clone();
        }

        if let Err(source) = move_file(&current, output) {
            let artifacts = workspace.preserve();
            emit(
                Level::Error,
                "story.compose.output_failed",
                &format!("Final track kept in {}", artifacts.display()),
                None,
            );
            return Err(ComposeError::Output {
                path: output.to_path_buf(),
                source,
            });
        }

        workspace.release();
        Ok(output.to_path_buf())
    }

    fn check_images(&self, scenes: &[Scene], images_dir: &Path) -> Result<(), ComposeError> {
        for scene in scenes {
            let path = images_dir.join(scene.image_file());
            if !path.is_file() {
                return Err(ComposeError::MissingImage {
                    scene_id: scene.id(),
                    path,
                });
            }
        }
        Ok(())
    }

    fn cancelled(&self, workspace: Workspace, completed_batches: usize) -> ComposeError {
        let artifacts = workspace.preserve();
        emit(
            Level::Warn,
            "story.compose.cancelled",
            &format!(
                "Cancelled after {completed_batches} batch(es); intermediates kept in {}",
                artifacts.display()
            ),
            None,
        );
        ComposeError::Cancelled {
            completed_batches,
            artifacts: Some(artifacts),
        }
    }
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

#[cfg(test)]
mod tests {
    use super::graph::tests::enable_windows;
    use super::*;
    use crate::story::error::TimelineError;
    use crate::story::ffmpeg::testing::RecordingRunner;
    use crate::story::timeline::testing::scenes_of;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        images: PathBuf,
        base: PathBuf,
        output: PathBuf,
        work: PathBuf,
    }

    impl Fixture {
        fn new(scenes: &[Scene]) -> Self {
            let root = tempfile::tempdir().unwrap();
            let images = root.path().join("images");
            fs::create_dir_all(&images).unwrap();
            for scene in scenes {
                fs::write(images.join(scene.image_file()), "png").unwrap();
            }
            let base = root.path().join("base.mp4");
            fs::write(&base, "base").unwrap();
            Self {
                output: root.path().join("out").join("final.mp4"),
                work: root.path().join("work"),
                images,
                base,
                root,
            }
        }

        fn compositor<'a>(&self, runner: &'a RecordingRunner, batch_size: usize) -> Compositor<'a> {
            let settings = CompositorSettings {
                batch_size,
                ..CompositorSettings::default()
            };
            Compositor::new(runner, settings).with_workspace_root(Some(self.work.clone()))
        }

        fn workspaces(&self) -> Vec<PathBuf> {
            match fs::read_dir(&self.work) {
                Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
                Err(_) => Vec::new(),
            }
        }
    }

    /// No two of these fit one 10 s scene, so every unit is its own scene.
    fn durations(n: usize) -> Vec<f64> {
        (0..n).map(|i| 5.5 + (i % 4) as f64 * 1.5).collect()
    }

    /// Every (image, window) pair the runner was asked to overlay.
    fn visible_windows(calls: &[Vec<String>]) -> BTreeSet<(String, String, String)> {
        let mut seen = BTreeSet::new();
        for args in calls {
            let images: Vec<String> = args
                .windows(2)
                .filter(|w| w[0] == "-i")
                .map(|w| w[1].clone())
                .skip(1)
                .collect();
            let windows = enable_windows(args);
            assert_eq!(images.len(), windows.len());
            for (image, (start, end)) in images.into_iter().zip(windows) {
                let name = Path::new(&image)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned();
                seen.insert((name, start, end));
            }
        }
        seen
    }

    #[test]
    fn batch_size_does_not_change_what_is_shown() {
        let scenes = scenes_of(&durations(11));
        let fixture = Fixture::new(&scenes);

        let small = RecordingRunner::default();
        fixture
            .compositor(&small, 3)
            .composite(&scenes, &fixture.images, &fixture.base, &fixture.output)
            .unwrap();
        let large = RecordingRunner::default();
        fixture
            .compositor(&large, 10)
            .composite(&scenes, &fixture.images, &fixture.base, &fixture.output)
            .unwrap();

        assert_eq!(small.calls().len(), scenes.len().div_ceil(3));
        assert_eq!(large.calls().len(), scenes.len().div_ceil(10));
        let shown = visible_windows(&small.calls());
        assert_eq!(shown.len(), scenes.len());
        assert_eq!(shown, visible_windows(&large.calls()));
    }

    #[test]
    fn batches_chain_through_intermediates() {
        let scenes = scenes_of(&durations(7));
        let fixture = Fixture::new(&scenes);
        let runner = RecordingRunner::default();

        let out = fixture
            .compositor(&runner, 3)
            .composite(&scenes, &fixture.images, &fixture.base, &fixture.output)
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0][2], fixture.base.to_string_lossy());
        assert_eq!(calls[1][2], *calls[0].last().unwrap());
        assert_eq!(calls[2][2], *calls[1].last().unwrap());

        assert_eq!(out, fixture.output);
        assert_eq!(fs::read_to_string(&fixture.output).unwrap(), "call 2");
        assert!(fixture.base.exists());
        assert!(fixture.workspaces().is_empty());
    }

    #[test]
    fn failure_stops_at_the_failing_batch() {
        let scenes = scenes_of(&durations(9));
        let fixture = Fixture::new(&scenes);
        let runner = RecordingRunner::failing_at(1);

        let err = fixture
            .compositor(&runner, 3)
            .composite(&scenes, &fixture.images, &fixture.base, &fixture.output)
            .unwrap_err();

        match &err {
            ComposeError::CompositionFailed {
                batch_index,
                reason,
                artifacts,
            } => {
                assert_eq!(*batch_index, 1);
                assert!(reason.contains("Invalid argument"));
                let artifacts = artifacts.as_ref().unwrap();
                assert!(artifacts.join("batch_000.mp4").exists());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runner.calls().len(), 2);
        assert!(!fixture.output.exists());
        assert_eq!(fixture.workspaces().len(), 1);
    }

    #[test]
    fn cancellation_is_checked_between_batches() {
        let scenes = scenes_of(&durations(9));
        let fixture = Fixture::new(&scenes);
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let runner = RecordingRunner {
            after_call: Some(Box::new(move |calls| {
                if calls == 2 {
                    trigger.cancel();
                }
            })),
            ..RecordingRunner::default()
        };

        let err = fixture
            .compositor(&runner, 3)
            .with_cancel_flag(cancel)
            .composite(&scenes, &fixture.images, &fixture.base, &fixture.output)
            .unwrap_err();

        assert!(matches!(
            err,
            ComposeError::Cancelled {
                completed_batches: 2,
                ..
            }
        ));
        assert!(err.artifacts().is_some());
        assert_eq!(runner.calls().len(), 2);
        assert!(!fixture.output.exists());
    }

    #[test]
    fn missing_image_fails_before_running_ffmpeg() {
        let scenes = scenes_of(&durations(4));
        let fixture = Fixture::new(&scenes);
        fs::remove_file(fixture.images.join("scene_003.png")).unwrap();
        let runner = RecordingRunner::default();

        let err = fixture
            .compositor(&runner, 2)
            .composite(&scenes, &fixture.images, &fixture.base, &fixture.output)
            .unwrap_err();

        assert!(matches!(err, ComposeError::MissingImage { scene_id: 3, .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn zero_scenes_copy_the_base_track_through() {
        let fixture = Fixture::new(&[]);
        let runner = RecordingRunner::default();

        fixture
            .compositor(&runner, 5)
            .composite(&[], &fixture.images, &fixture.base, &fixture.output)
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].windows(2).any(|w| w[0] == "-c" && w[1] == "copy"));
        assert!(!calls[0].contains(&"-filter_complex".to_string()));
        assert!(fixture.output.exists());
    }

    #[test]
    fn plan_is_deterministic_and_runs_nothing() {
        let scenes = scenes_of(&durations(6));
        let fixture = Fixture::new(&scenes);
        let runner = RecordingRunner::default();
        let compositor = fixture.compositor(&runner, 4);

        let first = compositor
            .plan(&scenes, &fixture.images, &fixture.base, fixture.root.path())
            .unwrap();
        let second = compositor
            .plan(&scenes, &fixture.images, &fixture.base, fixture.root.path())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(runner.calls().is_empty());
    }

    /// Two valid 6 s scenes, then `edit` applied to their JSON form.
    fn tampered(edit: impl FnOnce(&mut serde_json::Value)) -> Vec<Scene> {
        let mut value = serde_json::to_value(scenes_of(&[6.0, 6.0])).unwrap();
        edit(&mut value);
        serde_json::from_value(value).unwrap()
    }

    fn assert_rejected(scenes: &[Scene], scene_id: usize) {
        let fixture = Fixture::new(scenes);
        let runner = RecordingRunner::default();
        let compositor = fixture.compositor(&runner, 5);

        let err = compositor
            .composite(scenes, &fixture.images, &fixture.base, &fixture.output)
            .unwrap_err();
        match err {
            ComposeError::Timeline(TimelineError::Invariant { scene_id: id, .. }) => {
                assert_eq!(id, scene_id)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            compositor.plan(scenes, &fixture.images, &fixture.base, &fixture.work),
            Err(ComposeError::Timeline(_))
        ));
        assert!(runner.calls().is_empty());
        assert!(!fixture.output.exists());
    }

    #[test]
    fn overlapping_unit_ranges_are_rejected() {
        assert_rejected(&tampered(|v| v[1]["start_index"] = json!(0)), 2);
    }

    #[test]
    fn negative_duration_scene_is_rejected_not_skipped() {
        assert_rejected(&tampered(|v| v[1]["duration"] = json!(-1.0)), 2);
    }

    #[test]
    fn non_dense_scene_ids_are_rejected() {
        assert_rejected(&tampered(|v| v[1]["scene_id"] = json!(7)), 7);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let scenes = scenes_of(&durations(2));
        let fixture = Fixture::new(&scenes);
        let runner = RecordingRunner::default();
        let err = fixture
            .compositor(&runner, 0)
            .composite(&scenes, &fixture.images, &fixture.base, &fixture.output)
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidBatchSize));
    }
}
