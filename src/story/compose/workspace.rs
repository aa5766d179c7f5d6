use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::ui::prelude::*;

/// Scoped directory holding a composite's intermediate tracks.
///
/// Dropped or released on success; [`Workspace::preserve`] keeps it on disk
/// when a run fails so the intermediates can be inspected.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("storyreel-compose-");
        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete a superseded intermediate. Already-missing files are fine.
    pub fn discard(&self, path: &Path) {
        if !path.starts_with(self.dir.path()) {
            return;
        }
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => emit(
                Level::Warn,
                "story.compose.cleanup_failed",
                &format!("Could not remove {}: {err}", path.display()),
                None,
            ),
        }
    }

    /// Keep the directory on disk and return its path.
    pub fn preserve(self) -> PathBuf {
        self.dir.keep()
    }

    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(err) = self.dir.close() {
            emit(
                Level::Warn,
                "story.compose.cleanup_failed",
                &format!("Could not remove workspace {}: {err}", path.display()),
                None,
            );
        }
    }
}

/// Track produced by batch `batch_index` inside `dir`.
pub fn intermediate_in(dir: &Path, batch_index: usize) -> PathBuf {
    dir.join(format!("batch_{batch_index:03}.mp4"))
}
