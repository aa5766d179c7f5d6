use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::json;

use super::captions::write_srt;
use super::cli::{
    BaseArgs, CaptionsArgs, ComposeArgs, ConfigArgs, ImagesArgs, NarrationArgs, RunArgs,
    ScenesArgs, StoryCommands,
};
use super::compose::{BaseTrackBuilder, CancelFlag, Compositor, CompositorSettings};
use super::config::StoryConfig;
use super::ffmpeg::util::command_line;
use super::ffmpeg::{SystemFfmpegRunner, probe_duration_seconds};
use super::images::{PlaceholderImageProvider, render_scene_images};
use super::narration::units_of;
use super::pipeline::{NarrationSource, StoryPipeline, WorkLayout};
use super::prompt::TemplatePromptProvider;
use super::timeline::{SceneDocument, build_timeline};
use crate::common::paths;
use crate::ui::prelude::*;

/// Drift between the planned and the probed base track that is worth a warning.
const DURATION_TOLERANCE: f64 = 0.1;

pub fn handle_story_command(command: StoryCommands, config_path: Option<&Path>) -> Result<()> {
    if let StoryCommands::Config(args) = &command {
        return handle_config(args, config_path);
    }

    let config = StoryConfig::load(config_path)?;
    match command {
        StoryCommands::Scenes(args) => handle_scenes(args, &config),
        StoryCommands::Images(args) => handle_images(args, &config),
        StoryCommands::Captions(args) => handle_captions(args, &config),
        StoryCommands::Base(args) => handle_base(args, &config),
        StoryCommands::Compose(args) => handle_compose(args, &config),
        StoryCommands::Run(args) => handle_run(args, &config),
        StoryCommands::Config(_) => Ok(()),
    }
}

impl From<&NarrationArgs> for NarrationSource {
    fn from(args: &NarrationArgs) -> Self {
        Self {
            sentences: args.sentences.clone(),
            audio_manifest: args.audio_manifest.clone(),
            audio_dir: args.audio_dir.clone(),
        }
    }
}

fn handle_scenes(args: ScenesArgs, config: &StoryConfig) -> Result<()> {
    let out_file = args
        .out_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("scenes.json"));
    prepare_output_destination(&out_file, args.force, &[])?;

    let voiced = NarrationSource::from(&args.narration).load(config.fallback_duration)?;
    let prompts = TemplatePromptProvider::new(
        config.prompt_setting.clone(),
        config.prompt_suffix.clone(),
    );
    let cap = args.cap.unwrap_or(config.scene_cap_seconds);
    let scenes = build_timeline(&units_of(&voiced), cap, &prompts)?;
    let document = SceneDocument::new(scenes)?;
    document.save(&out_file)?;

    emit(
        Level::Success,
        "story.scenes.written",
        &format!(
            "✓ {} scene(s), {:.2}s total, written to {}",
            document.len(),
            document.total_duration(),
            out_file.display()
        ),
        Some(json!({
            "scenes": document.len(),
            "total_duration": document.total_duration(),
            "path": out_file,
        })),
    );
    Ok(())
}

fn handle_images(args: ImagesArgs, config: &StoryConfig) -> Result<()> {
    let document = SceneDocument::load(&args.scenes)?;
    let images_dir = args
        .images
        .clone()
        .unwrap_or_else(|| sibling(&args.scenes, "images"));

    let runner = SystemFfmpegRunner::detect()?;
    let placeholder = PlaceholderImageProvider::new(&runner, config.width, config.height);
    let report = render_scene_images(document.scenes(), &images_dir, &placeholder, &placeholder)?;

    emit(
        Level::Success,
        "story.images.written",
        &format!(
            "✓ {} image(s) rendered, {} already present in {}",
            report.rendered.len() + report.fallbacks.len(),
            report.skipped.len(),
            images_dir.display()
        ),
        serde_json::to_value(&report).ok(),
    );
    Ok(())
}

fn handle_captions(args: CaptionsArgs, config: &StoryConfig) -> Result<()> {
    let out_file = args
        .out_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("story.srt"));
    prepare_output_destination(&out_file, args.force, &[])?;

    let voiced = NarrationSource::from(&args.narration).load(config.fallback_duration)?;
    let cues = write_srt(&units_of(&voiced), &out_file)?;

    emit(
        Level::Success,
        "story.captions.written",
        &format!("✓ {cues} caption(s) written to {}", out_file.display()),
        Some(json!({ "cues": cues, "path": out_file })),
    );
    Ok(())
}

fn handle_base(args: BaseArgs, config: &StoryConfig) -> Result<()> {
    let out_file = args
        .out_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("base.mp4"));
    prepare_output_destination(&out_file, args.force, &[])?;

    let voiced = NarrationSource::from(&args.narration).load(config.fallback_duration)?;
    let planned: f64 = voiced.iter().map(|v| v.unit.duration()).sum();

    let runner = SystemFfmpegRunner::detect()?;
    let output = BaseTrackBuilder::new(&runner, config)
        .verbose(args.verbose)
        .build(&voiced, &out_file)?;

    check_duration(&output, planned);
    emit(
        Level::Success,
        "story.base.written",
        &format!("✓ Base track written to {}", output.display()),
        Some(json!({ "duration": planned, "path": output })),
    );
    Ok(())
}

fn handle_compose(args: ComposeArgs, config: &StoryConfig) -> Result<()> {
    let document = SceneDocument::load(&args.scenes)?;
    let images_dir = args
        .images
        .clone()
        .unwrap_or_else(|| sibling(&args.scenes, "images"));
    let out_file = args
        .out_file
        .clone()
        .unwrap_or_else(|| default_composite_path(&args.base));

    let mut settings = CompositorSettings::from(config);
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size;
    }
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }
    if args.no_motion {
        settings.motion = false;
    }

    if args.dry_run {
        // Never executed, so ffmpeg need not be installed
        let runner = SystemFfmpegRunner::with_binary("ffmpeg");
        let compositor = Compositor::new(&runner, settings);
        let workspace = std::env::temp_dir().join("storyreel-compose");
        let commands = compositor.plan(document.scenes(), &images_dir, &args.base, &workspace)?;
        print_commands(&commands, &out_file);
        return Ok(());
    }

    if !args.base.is_file() {
        bail!("Base track {} not found", args.base.display());
    }
    prepare_output_destination(&out_file, args.force, &[&args.base])?;

    let runner = SystemFfmpegRunner::detect()?;
    let cancel = install_cancel_flag();
    let compositor = Compositor::new(&runner, settings)
        .with_cancel_flag(cancel)
        .with_workspace_root(config.work_dir.clone())
        .verbose(args.verbose);

    let output = compositor
        .composite(document.scenes(), &images_dir, &args.base, &out_file)
        .map_err(|err| {
            if let Some(artifacts) = err.artifacts() {
                emit(
                    Level::Info,
                    "story.compose.artifacts",
                    &format!("Intermediate tracks kept in {}", artifacts.display()),
                    Some(json!({ "path": artifacts })),
                );
            }
            err
        })?;

    check_duration(&output, document.total_duration());
    emit(
        Level::Success,
        "story.compose.written",
        &format!("✓ Composited video written to {}", output.display()),
        Some(json!({ "scenes": document.len(), "path": output })),
    );
    Ok(())
}

fn handle_run(args: RunArgs, config: &StoryConfig) -> Result<()> {
    let source = NarrationSource::from(&args.narration);
    let work_dir = args
        .work_dir
        .clone()
        .or_else(|| config.work_dir.clone())
        .unwrap_or_else(|| sibling(&source.audio_manifest, "storyreel"));
    let layout = WorkLayout::new(work_dir);
    let out_file = args
        .out_file
        .clone()
        .unwrap_or_else(|| layout.default_output());
    prepare_output_destination(&out_file, args.force, &[&layout.base_track()])?;
    fs::create_dir_all(layout.root())
        .with_context(|| format!("creating work directory {}", layout.root().display()))?;

    let runner = SystemFfmpegRunner::detect()?;
    let prompts = TemplatePromptProvider::new(
        config.prompt_setting.clone(),
        config.prompt_suffix.clone(),
    );
    let placeholder = PlaceholderImageProvider::new(&runner, config.width, config.height);
    let pipeline = StoryPipeline {
        config,
        runner: &runner,
        prompts: &prompts,
        images: &placeholder,
        fallback_images: &placeholder,
        cancel: install_cancel_flag(),
        verbose: args.verbose,
    };

    let outcome = pipeline.run(&source, &layout, &out_file)?;
    emit(
        Level::Success,
        "story.run.done",
        &format!(
            "✓ {} scene(s) rendered to {}",
            outcome.scene_count,
            outcome.output.display()
        ),
        Some(json!({
            "scenes": outcome.scene_count,
            "scene_document": outcome.scene_document,
            "captions": outcome.captions,
            "base_track": outcome.base_track,
            "output": outcome.output,
        })),
    );
    Ok(())
}

fn handle_config(args: &ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => paths::story_config_path()?,
    };
    if args.path {
        println!("{}", path.display());
        return Ok(());
    }

    let config = StoryConfig::load_from_path(&path)?;
    match get_output_format() {
        OutputFormat::Json => {
            let data = serde_json::to_value(&config).context("serializing story config")?;
            emit(
                Level::Info,
                "story.config",
                &path.display().to_string(),
                Some(json!({ "path": path, "config": data })),
            );
        }
        OutputFormat::Text => {
            let toml = toml::to_string_pretty(&config).context("serializing story config")?;
            println!("# {}", path.display());
            print!("{toml}");
        }
    }
    Ok(())
}

fn print_commands(commands: &[super::compose::BatchCommand], out_file: &Path) {
    if get_output_format() == OutputFormat::Json {
        for command in commands {
            emit(
                Level::Info,
                "story.compose.plan",
                &command_line("ffmpeg", &command.args),
                Some(json!({
                    "batch_index": command.batch_index,
                    "scene_ids": command.scene_ids,
                    "args": command.args,
                })),
            );
        }
        return;
    }

    println!("ffmpeg commands that would be executed:");
    for command in commands {
        println!();
        println!("# batch {}", command.batch_index);
        println!("{}", command_line("ffmpeg", &command.args));
    }
    println!();
    println!("# final track moved to {}", out_file.display());
}

/// Warn when the rendered file's length drifts from what the scenes add up to.
fn check_duration(path: &Path, expected: f64) {
    match probe_duration_seconds(path) {
        Ok(actual) if (actual - expected).abs() > DURATION_TOLERANCE => emit(
            Level::Warn,
            "story.duration.mismatch",
            &format!(
                "{} is {actual:.2}s long, expected {expected:.2}s",
                path.display()
            ),
            Some(json!({ "actual": actual, "expected": expected })),
        ),
        Ok(_) => {}
        Err(err) => emit(
            Level::Debug,
            "story.duration.unprobed",
            &format!("Could not probe {}: {err:#}", path.display()),
            None,
        ),
    }
}

fn install_cancel_flag() -> CancelFlag {
    let cancel = CancelFlag::new();
    if let Err(err) = cancel.install_ctrlc_handler() {
        emit(
            Level::Warn,
            "story.cancel.unavailable",
            &format!("Ctrl-C will not stop cleanly: {err}"),
            None,
        );
    }
    cancel
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn default_composite_path(base: &Path) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "story".to_string());
    sibling(base, &format!("{stem}_composited.mp4"))
}

pub(crate) fn prepare_output_destination(
    output_path: &Path,
    force: bool,
    inputs: &[&Path],
) -> Result<()> {
    if inputs.iter().any(|input| *input == output_path) {
        bail!(
            "Output path {} would overwrite one of the inputs",
            output_path.display()
        );
    }

    if output_path.exists() {
        if force {
            fs::remove_file(output_path).with_context(|| {
                format!(
                    "Failed to remove existing output file {} before overwrite",
                    output_path.display()
                )
            })?;
        } else {
            bail!(
                "Output file {} already exists. Use --force to overwrite.",
                output_path.display()
            );
        }
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    Ok(())
}
