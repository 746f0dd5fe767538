use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("slidecast")
}

pub fn get_root_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slidecast")
}

pub fn get_model_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join("models")
}

pub fn get_runs_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join("runs")
}

/// Find a video file in a directory
pub fn find_video_in_cache(cache_dir: &Path) -> Option<PathBuf> {
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return None;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if matches!(ext.as_str(), "mp4" | "webm" | "mkv" | "mov" | "avi") {
                return Some(path);
            }
        }
    }
    None
}

/// Scratch directory owned by a single pipeline run.
///
/// Source media, extracted audio and subtitle tracks live here. The directory
/// and everything in it is removed when the value is dropped, on every exit path.
pub struct RunDir {
    run_id: Uuid,
    dir: TempDir,
}

impl RunDir {
    pub fn create(work_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(work_root)?;
        let run_id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("run-{}-", run_id.simple()))
            .tempdir_in(work_root)?;
        debug!(%run_id, path = %dir.path().display(), "created run directory");
        Ok(Self { run_id, dir })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn audio_path(&self) -> PathBuf {
        self.path().join("audio.wav")
    }

    /// Remove the directory now, logging instead of failing
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(run_id = %self.run_id, "removed run directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to clean run directory"),
        }
    }
}

/// Delete a file, treating an already missing file as success
pub fn remove_file_if_exists(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
