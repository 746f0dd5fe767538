use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::{
    cache::remove_file_if_exists,
    error::{PipelineError, Result},
    types::VideoRecord,
};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert, or replace the record with the same source id
    async fn upsert(&self, record: &VideoRecord) -> Result<()>;
    async fn get(&self, source_id: &str) -> Result<Option<VideoRecord>>;
    /// Remove the record and its screenshot files. `false` if it did not exist.
    async fn delete(&self, source_id: &str) -> Result<bool>;
    /// All records, most recently processed first
    async fn list(&self) -> Result<Vec<VideoRecord>>;
}

/// One pretty-printed JSON file per source id
pub struct JsonRecordStore {
    records_dir: PathBuf,
    screenshots_dir: PathBuf,
}

impl JsonRecordStore {
    pub fn new(records_dir: impl Into<PathBuf>, screenshots_dir: impl Into<PathBuf>) -> Self {
        Self {
            records_dir: records_dir.into(),
            screenshots_dir: screenshots_dir.into(),
        }
    }

    fn record_path(&self, source_id: &str) -> Result<PathBuf> {
        validate_source_id(source_id)?;
        Ok(self.records_dir.join(format!("{}.json", source_id)))
    }

    async fn load(path: &Path) -> Result<VideoRecord> {
        let json_content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&json_content)?)
    }

    /// Screenshot files named `<id>_<seconds>.jpg`, including ones no record lists
    fn screenshot_files(&self, source_id: &str) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.screenshots_dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy())
                    .is_some_and(|name| is_screenshot_of(&name, source_id))
            })
            .collect()
    }
}

/// `abc_1.50.jpg` belongs to `abc`; `abc_def_1.50.jpg` belongs to `abc_def`
fn is_screenshot_of(file_name: &str, source_id: &str) -> bool {
    file_name
        .strip_prefix(source_id)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|rest| rest.strip_suffix(".jpg"))
        .is_some_and(|seconds| seconds.parse::<f64>().is_ok_and(f64::is_finite))
}

/// Source ids become file names, so they may not escape the store directory
pub fn validate_source_id(source_id: &str) -> Result<()> {
    if source_id.is_empty()
        || source_id.contains(['/', '\\'])
        || source_id.contains("..")
    {
        return Err(PipelineError::PersistenceFailed {
            reason: format!("invalid source id {:?}", source_id),
        });
    }
    Ok(())
}

fn persistence(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::PersistenceFailed {
        reason: e.to_string(),
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn upsert(&self, record: &VideoRecord) -> Result<()> {
        let path = self.record_path(&record.source_id)?;
        fs::create_dir_all(&self.records_dir)
            .await
            .map_err(persistence)?;

        let existed = path.exists();
        let pretty_json = serde_json::to_string_pretty(record)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, &pretty_json).await.map_err(persistence)?;
        fs::rename(&staging, &path).await.map_err(persistence)?;

        info!(source_id = %record.source_id, updated = existed, "record saved");
        Ok(())
    }

    async fn get(&self, source_id: &str) -> Result<Option<VideoRecord>> {
        let path = self.record_path(source_id)?;
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).await.map(Some).map_err(persistence)
    }

    async fn delete(&self, source_id: &str) -> Result<bool> {
        let path = self.record_path(source_id)?;
        let Some(record) = self.get(source_id).await? else {
            warn!(source_id, "no record to delete");
            return Ok(false);
        };

        let mut files: Vec<PathBuf> = record
            .screenshots
            .iter()
            .map(|shot| self.screenshots_dir.join(&shot.filename))
            .collect();
        for extra in self.screenshot_files(source_id) {
            if !files.contains(&extra) {
                files.push(extra);
            }
        }
        for file in &files {
            match remove_file_if_exists(file) {
                Ok(_) => debug!(path = %file.display(), "deleted screenshot"),
                Err(e) => warn!(path = %file.display(), error = %e, "failed to delete screenshot"),
            }
        }

        remove_file_if_exists(&path).map_err(persistence)?;
        info!(source_id, screenshots = files.len(), "record deleted");
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<VideoRecord>> {
        let mut entries = match fs::read_dir(&self.records_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(persistence(e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(persistence)? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::load(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }

        records.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(records)
    }
}

/// Result of a delete request, suitable for showing to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub message: String,
}

pub async fn delete_video(store: &dyn RecordStore, source_id: &str) -> DeleteOutcome {
    match store.delete(source_id).await {
        Ok(true) => DeleteOutcome {
            success: true,
            message: format!(
                "Video {} was deleted together with its screenshots",
                source_id
            ),
        },
        Ok(false) => DeleteOutcome {
            success: false,
            message: format!("No video with id {} was found", source_id),
        },
        Err(e) => DeleteOutcome {
            success: false,
            message: format!("Deleting video {} failed: {}", source_id, e),
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::types::ScreenshotRecord;

    fn record(source_id: &str, minutes_ago: i64) -> VideoRecord {
        VideoRecord {
            source_id: source_id.to_string(),
            title: format!("title {}", source_id),
            description: String::new(),
            creator: String::new(),
            source_timestamp: None,
            duration: "1:00".to_string(),
            language: "english".to_string(),
            processed_at: Utc::now() - Duration::minutes(minutes_ago),
            subtitle_used: false,
            screenshots: vec![ScreenshotRecord::new(source_id, 0.0)],
            transcription: String::new(),
            translation: String::new(),
            summary: String::new(),
        }
    }

    fn store(root: &TempDir) -> JsonRecordStore {
        JsonRecordStore::new(root.path().join("records"), root.path().join("shots"))
    }

    #[tokio::test]
    async fn upsert_replaces_existing_record() {
        let root = TempDir::new().unwrap();
        let store = store(&root);

        store.upsert(&record("abc", 5)).await.unwrap();
        let mut updated = record("abc", 0);
        updated.title = "second run".to_string();
        store.upsert(&updated).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "second run");
        assert_eq!(store.get("abc").await.unwrap().unwrap().title, "second run");
    }

    #[tokio::test]
    async fn list_orders_by_processing_time() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        store.upsert(&record("old", 60)).await.unwrap();
        store.upsert(&record("new", 1)).await.unwrap();
        store.upsert(&record("mid", 30)).await.unwrap();

        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.source_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn delete_removes_record_and_screenshots() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        let shots = root.path().join("shots");
        std::fs::create_dir_all(&shots).unwrap();
        std::fs::write(shots.join("abc_0.00.jpg"), b"x").unwrap();
        std::fs::write(shots.join("abc_99.00.jpg"), b"stray").unwrap();
        std::fs::write(shots.join("other_0.00.jpg"), b"keep").unwrap();
        store.upsert(&record("abc", 0)).await.unwrap();

        let outcome = delete_video(&store, "abc").await;

        assert!(outcome.success, "{}", outcome.message);
        assert!(store.get("abc").await.unwrap().is_none());
        assert!(!shots.join("abc_0.00.jpg").exists());
        assert!(!shots.join("abc_99.00.jpg").exists());
        assert!(shots.join("other_0.00.jpg").exists());
    }

    #[tokio::test]
    async fn delete_keeps_screenshots_of_ids_sharing_a_prefix() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        let shots = root.path().join("shots");
        std::fs::create_dir_all(&shots).unwrap();
        std::fs::write(shots.join("abc_0.00.jpg"), b"x").unwrap();
        std::fs::write(shots.join("abc_def_0.00.jpg"), b"keep").unwrap();
        std::fs::write(shots.join("abc_def_12.50.jpg"), b"keep").unwrap();
        store.upsert(&record("abc", 0)).await.unwrap();
        store.upsert(&record("abc_def", 0)).await.unwrap();

        let outcome = delete_video(&store, "abc").await;

        assert!(outcome.success, "{}", outcome.message);
        assert!(!shots.join("abc_0.00.jpg").exists());
        assert!(shots.join("abc_def_0.00.jpg").exists());
        assert!(shots.join("abc_def_12.50.jpg").exists());
        assert!(store.get("abc_def").await.unwrap().is_some());
    }

    #[test]
    fn screenshot_names_need_a_timestamp_after_the_id() {
        assert!(is_screenshot_of("abc_1.50.jpg", "abc"));
        assert!(!is_screenshot_of("abc_def_1.50.jpg", "abc"));
        assert!(!is_screenshot_of("abc_.jpg", "abc"));
        assert!(!is_screenshot_of("abc_1.50.png", "abc"));
    }

    #[tokio::test]
    async fn deleting_unknown_record_reports_failure() {
        let root = TempDir::new().unwrap();
        let outcome = delete_video(&store(&root), "missing").await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("missing"));
    }

    #[tokio::test]
    async fn rejects_path_like_source_ids() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        assert!(matches!(
            store.get("../etc").await,
            Err(PipelineError::PersistenceFailed { .. })
        ));
        assert!(matches!(
            store.upsert(&record("a/b", 0)).await,
            Err(PipelineError::PersistenceFailed { .. })
        ));
    }
}
