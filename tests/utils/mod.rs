use anyhow::Result;
use std::fs;
use std::path::Path;
use std::process::Command;

use super::common::TestEnvironment;

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub fn run_storyreel_command(env: &TestEnvironment, args: &[&str]) -> Result<CommandOutput> {
    let config = env.config_path();
    let output = Command::new(env!("CARGO_BIN_EXE_storyreel"))
        .arg("--no-color")
        .arg("--config")
        .arg(&config)
        .args(args)
        .current_dir(env.path())
        .output()?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Touch one empty image per scene so compose accepts the image directory.
pub fn touch_images(dir: &Path, scene_count: usize) -> Result<()> {
    fs::create_dir_all(dir)?;
    for id in 1..=scene_count {
        fs::write(dir.join(format!("scene_{id:03}.png")), "")?;
    }
    Ok(())
}
