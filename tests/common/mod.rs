use anyhow::Result;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory with its own config file and a narrated story.
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Config file handed to every command, so the user's own is never touched
    pub fn config_path(&self) -> PathBuf {
        self.path().join("config").join("story.toml")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.path().join("audio")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.audio_dir().join("audio_info.json")
    }

    /// Write an audio manifest (and dummy clips) for `(sentence, duration)` pairs.
    pub fn write_story(&self, sentences: &[(&str, f64)]) -> Result<PathBuf> {
        fs::create_dir_all(self.audio_dir())?;

        let mut entries = Vec::new();
        for (id, (sentence, duration)) in sentences.iter().enumerate() {
            let clip = format!("audio_{id:03}.wav");
            fs::write(self.audio_dir().join(&clip), "wav")?;
            entries.push(json!({
                "id": id,
                "sentence": sentence,
                "audio_file": clip,
                "duration": duration,
            }));
        }

        let total: f64 = sentences.iter().map(|(_, d)| d).sum();
        let manifest = json!({
            "source_file": "story.txt",
            "total_sentences": sentences.len(),
            "total_duration": total,
            "audio_files": entries,
        });
        fs::write(self.manifest_path(), serde_json::to_string_pretty(&manifest)?)?;
        Ok(self.manifest_path())
    }
}
