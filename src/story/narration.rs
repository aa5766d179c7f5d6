//! Narration input.
//!
//! Sentences come from a plain text file (one sentence per line) and their
//! measured durations from the audio manifest written by the speech
//! synthesis step:
//!
//! ```json
//! {
//!   "source_file": "story.txt",
//!   "total_sentences": 2,
//!   "total_duration": 5.1,
//!   "audio_files": [
//!     { "id": 0, "sentence": "...", "audio_file": "audio_000.wav", "duration": 2.4 },
//!     { "id": 1, "sentence": "...", "error": "synthesis failed" }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{NarrationError, TimelineError};
use crate::ui::prelude::*;

/// One voiced sentence with its measured audio duration in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationUnit {
    text: String,
    duration: f64,
}

impl NarrationUnit {
    pub fn new(text: impl Into<String>, duration: f64) -> Result<Self, TimelineError> {
        Self::at(0, text, duration)
    }

    /// Like [`NarrationUnit::new`] but reports `index` on failure.
    pub fn at(index: usize, text: impl Into<String>, duration: f64) -> Result<Self, TimelineError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(TimelineError::InvalidDuration { index, duration });
        }
        Ok(Self {
            text: text.into(),
            duration,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioManifest {
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub total_sentences: usize,
    #[serde(default)]
    pub total_duration: f64,
    pub audio_files: Vec<AudioEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEntry {
    pub id: usize,
    pub sentence: String,
    #[serde(default)]
    pub audio_file: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AudioEntry {
    /// Duration of a successfully synthesized entry.
    fn voiced_duration(&self) -> Option<f64> {
        if self.error.is_some() {
            return None;
        }
        self.duration.filter(|d| d.is_finite() && *d >= 0.0)
    }
}

impl AudioManifest {
    pub fn load(path: &Path) -> Result<Self, NarrationError> {
        let contents = fs::read_to_string(path).map_err(|source| NarrationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| NarrationError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Sentences in manifest order, used when no separate sentence list is given.
    pub fn sentences(&self) -> Vec<String> {
        self.audio_files
            .iter()
            .map(|entry| entry.sentence.clone())
            .collect()
    }
}

/// Read a sentence list: one sentence per line, blank lines ignored.
pub fn load_sentences(path: &Path) -> Result<Vec<String>, NarrationError> {
    let contents = fs::read_to_string(path).map_err(|source| NarrationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let sentences: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if sentences.is_empty() {
        return Err(NarrationError::Empty(path.to_path_buf()));
    }
    Ok(sentences)
}

#[derive(Debug, Clone)]
struct Voicing {
    duration: f64,
    audio: Option<PathBuf>,
}

/// A narration unit together with the audio clip that voices it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct VoicedUnit {
    pub unit: NarrationUnit,
    pub audio: Option<PathBuf>,
}

/// Exact-text lookup of measured durations and audio clips.
///
/// When several manifest entries share the same text the first successful
/// one wins.
#[derive(Debug, Clone)]
pub struct NarrationIndex {
    by_text: HashMap<String, Voicing>,
    fallback_duration: f64,
}

impl NarrationIndex {
    /// `audio_dir` is the directory the manifest's `audio_file` names are relative to.
    pub fn from_manifest(
        manifest: &AudioManifest,
        audio_dir: &Path,
        fallback_duration: f64,
    ) -> Self {
        let mut by_text = HashMap::new();
        for entry in &manifest.audio_files {
            let Some(duration) = entry.voiced_duration() else {
                emit(
                    Level::Debug,
                    "story.narration.entry_failed",
                    &format!(
                        "Manifest entry {} has no usable audio: {}",
                        entry.id,
                        entry.error.as_deref().unwrap_or("missing duration")
                    ),
                    None,
                );
                continue;
            };
            by_text.entry(entry.sentence.clone()).or_insert_with(|| Voicing {
                duration,
                audio: entry.audio_file.as_ref().map(|file| audio_dir.join(file)),
            });
        }
        Self {
            by_text,
            fallback_duration,
        }
    }

    /// Duration for `text`, substituting the fallback (with a warning) on a miss.
    pub fn duration_for(&self, text: &str) -> f64 {
        match self.by_text.get(text) {
            Some(voicing) => voicing.duration,
            None => {
                emit(
                    Level::Warn,
                    "story.narration.duration_missing",
                    &format!(
                        "No measured duration for sentence {:?}; using {:.1}s",
                        text, self.fallback_duration
                    ),
                    None,
                );
                self.fallback_duration
            }
        }
    }

    pub fn audio_for(&self, text: &str) -> Option<&Path> {
        self.by_text
            .get(text)
            .and_then(|voicing| voicing.audio.as_deref())
    }

    /// Resolve every sentence into a voiced unit, in order.
    pub fn resolve(&self, sentences: &[String]) -> Result<Vec<VoicedUnit>, TimelineError> {
        sentences
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let unit = NarrationUnit::at(index, text.clone(), self.duration_for(text))?;
                Ok(VoicedUnit {
                    audio: self.audio_for(text).map(Path::to_path_buf),
                    unit,
                })
            })
            .collect()
    }
}

pub fn units_of(voiced: &[VoicedUnit]) -> Vec<NarrationUnit> {
    voiced.iter().map(|v| v.unit.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> AudioManifest {
        serde_json::from_str(
            r#"{
                "source_file": "story.txt",
                "total_sentences": 3,
                "total_duration": 5.5,
                "audio_files": [
                    {"id": 0, "sentence": "First.", "audio_file": "audio_000.wav", "duration": 2.5},
                    {"id": 1, "sentence": "Broken.", "error": "voice server down"},
                    {"id": 2, "sentence": "First.", "audio_file": "audio_002.wav", "duration": 9.0},
                    {"id": 3, "sentence": "Third.", "audio_file": "audio_003.wav", "duration": 3.0}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn lookup_uses_first_successful_entry() {
        let index = NarrationIndex::from_manifest(&manifest(), Path::new("/audio"), 2.0);
        assert_eq!(index.duration_for("First."), 2.5);
        assert_eq!(
            index.audio_for("First."),
            Some(Path::new("/audio/audio_000.wav"))
        );
    }

    #[test]
    fn lookup_miss_and_failed_entry_fall_back() {
        let index = NarrationIndex::from_manifest(&manifest(), Path::new("/audio"), 2.0);
        assert_eq!(index.duration_for("Broken."), 2.0);
        assert_eq!(index.duration_for("Never voiced."), 2.0);
        assert!(index.audio_for("Broken.").is_none());
    }

    #[test]
    fn resolve_keeps_sentence_order() {
        let index = NarrationIndex::from_manifest(&manifest(), Path::new("a"), 2.0);
        let sentences = vec!["Third.".to_string(), "Unknown.".to_string()];
        let voiced = index.resolve(&sentences).unwrap();
        assert_eq!(voiced[0].unit.text(), "Third.");
        assert_eq!(voiced[0].unit.duration(), 3.0);
        assert_eq!(voiced[1].unit.duration(), 2.0);
        assert!(voiced[1].audio.is_none());
    }

    #[test]
    fn negative_duration_is_rejected() {
        let err = NarrationUnit::at(4, "x", -1.0).unwrap_err();
        assert_eq!(
            err,
            TimelineError::InvalidDuration {
                index: 4,
                duration: -1.0
            }
        );
        assert!(NarrationUnit::new("x", f64::NAN).is_err());
    }

    #[test]
    fn load_sentences_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.txt");
        fs::write(&path, "One.\n\n  Two.  \n").unwrap();
        assert_eq!(load_sentences(&path).unwrap(), vec!["One.", "Two."]);

        fs::write(&path, "\n \n").unwrap();
        assert!(matches!(
            load_sentences(&path),
            Err(NarrationError::Empty(_))
        ));
    }
}
