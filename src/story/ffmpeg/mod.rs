pub mod probe;
pub mod services;
pub mod util;

pub use probe::probe_duration_seconds;
pub use services::{FfmpegRunOptions, FfmpegRunner, SystemFfmpegRunner};
