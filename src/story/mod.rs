pub mod captions;
pub mod cli;
pub mod commands;
pub mod compose;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod images;
pub mod narration;
pub mod pipeline;
pub mod prompt;
pub mod timeline;

pub use cli::StoryCommands;
pub use commands::handle_story_command;
