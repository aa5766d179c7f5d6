use clap::{Args, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum StoryCommands {
    /// Group narrated sentences into timed scenes and write the scene document
    Scenes(ScenesArgs),
    /// Render one image per scene of a scene document
    Images(ImagesArgs),
    /// Write SRT captions, one cue per sentence
    Captions(CaptionsArgs),
    /// Render the black base track carrying the narration audio
    Base(BaseArgs),
    /// Overlay scene images onto a base track in batches
    Compose(ComposeArgs),
    /// Run every stage from narration to finished video
    Run(RunArgs),
    /// Show the active configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NarrationArgs {
    /// Audio manifest (audio_info.json) produced by the narration step
    #[arg(short = 'm', long = "audio-manifest", value_hint = ValueHint::FilePath)]
    pub audio_manifest: PathBuf,

    /// Sentences file, one sentence per line; defaults to the manifest's order
    #[arg(short = 's', long = "sentences", value_hint = ValueHint::FilePath)]
    pub sentences: Option<PathBuf>,

    /// Directory holding the audio clips; defaults to the manifest's directory
    #[arg(long = "audio-dir", value_hint = ValueHint::DirPath)]
    pub audio_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ScenesArgs {
    #[command(flatten)]
    pub narration: NarrationArgs,

    /// Where to write the scene document; defaults to scenes.json
    #[arg(short = 'o', long = "out-file", value_hint = ValueHint::FilePath)]
    pub out_file: Option<PathBuf>,

    /// Maximum scene length in seconds (overrides config)
    #[arg(long)]
    pub cap: Option<f64>,

    /// Overwrite an existing scene document
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ImagesArgs {
    /// Scene document (scenes.json)
    #[arg(value_hint = ValueHint::FilePath)]
    pub scenes: PathBuf,

    /// Image directory; defaults to images/ next to the scene document
    #[arg(short = 'i', long = "images", value_hint = ValueHint::DirPath)]
    pub images: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CaptionsArgs {
    #[command(flatten)]
    pub narration: NarrationArgs,

    /// Where to write the captions; defaults to story.srt
    #[arg(short = 'o', long = "out-file", value_hint = ValueHint::FilePath)]
    pub out_file: Option<PathBuf>,

    /// Overwrite an existing captions file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BaseArgs {
    #[command(flatten)]
    pub narration: NarrationArgs,

    /// Where to write the base track; defaults to base.mp4
    #[arg(short = 'o', long = "out-file", value_hint = ValueHint::FilePath)]
    pub out_file: Option<PathBuf>,

    /// Overwrite an existing base track
    #[arg(long)]
    pub force: bool,

    /// Stream ffmpeg output instead of a progress bar
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ComposeArgs {
    /// Scene document (scenes.json)
    #[arg(value_hint = ValueHint::FilePath)]
    pub scenes: PathBuf,

    /// Base track to draw on
    #[arg(short = 'b', long = "base", value_hint = ValueHint::FilePath)]
    pub base: PathBuf,

    /// Image directory; defaults to images/ next to the scene document
    #[arg(short = 'i', long = "images", value_hint = ValueHint::DirPath)]
    pub images: Option<PathBuf>,

    /// Output video; defaults to <base>_composited.mp4
    #[arg(short = 'o', long = "out-file", value_hint = ValueHint::FilePath)]
    pub out_file: Option<PathBuf>,

    /// Scenes per ffmpeg invocation (overrides config)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seed for motion selection (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Disable pan and zoom motion
    #[arg(long)]
    pub no_motion: bool,

    /// Overwrite the output file if it exists
    #[arg(long)]
    pub force: bool,

    /// Print the ffmpeg commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Stream ffmpeg output instead of a progress bar
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub narration: NarrationArgs,

    /// Directory for intermediate artifacts (overrides config)
    #[arg(short = 'w', long = "work-dir", value_hint = ValueHint::DirPath)]
    pub work_dir: Option<PathBuf>,

    /// Output video; defaults to story.mp4 in the work directory
    #[arg(short = 'o', long = "out-file", value_hint = ValueHint::FilePath)]
    pub out_file: Option<PathBuf>,

    /// Overwrite the output file if it exists
    #[arg(long)]
    pub force: bool,

    /// Stream ffmpeg output instead of a progress bar
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Only print the config file path
    #[arg(long)]
    pub path: bool,
}
