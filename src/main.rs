mod common;
mod story;
mod ui;

use clap::Parser;
use std::path::PathBuf;

use crate::story::{StoryCommands, handle_story_command};
use crate::ui::prelude::*;

/// Storyreel main parser
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format for events
    #[arg(long = "output", value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Use this config file instead of the default location
    #[arg(long = "config", global = true, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: StoryCommands,
}

fn main() {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color);
    ui::set_debug_mode(cli.debug);

    if let Err(err) = handle_story_command(cli.command, cli.config.as_deref()) {
        let chain: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
        emit(
            Level::Error,
            "story.error",
            &format!("Error: {err:#}"),
            Some(serde_json::json!({ "causes": chain })),
        );
        std::process::exit(1);
    }
}
