use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::WorkflowError;
use crate::store::HistoryLog;
use crate::workflow::types::ReviewHistoryEntry;

/// Append-only history log on disk, one JSON object per line.
///
/// Entries are only ever appended; listing replays and filters the file.
/// A lazily loaded id set keeps `append` idempotent without re-reading the
/// file on every call.
pub struct FileHistoryLog {
    path: PathBuf,
    seen_ids: Mutex<Option<HashSet<String>>>,
}

impl FileHistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen_ids: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }

    async fn load_seen_ids(&self) -> Result<HashSet<String>, WorkflowError> {
        let entries = self.read_entries().await?;
        Ok(entries.into_iter().map(|entry| entry.id).collect())
    }
}

#[async_trait]
impl HistoryLog for FileHistoryLog {
    async fn append(&self, entry: ReviewHistoryEntry) -> Result<(), WorkflowError> {
        let mut seen_guard = self.seen_ids.lock().await;
        if seen_guard.is_none() {
            *seen_guard = Some(self.load_seen_ids().await?);
        }
        let seen = seen_guard.as_mut().expect("seen id set was just loaded");
        if seen.contains(&entry.id) {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let line = format!("{}\n", serde_json::to_string(&entry)?);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;

        seen.insert(entry.id);
        Ok(())
    }

    async fn list_by_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        let mut entries: Vec<ReviewHistoryEntry> = self
            .read_entries()
            .await?
            .into_iter()
            .filter(|entry| entry.workflow_id == workflow_id)
            .collect();
        entries.sort_by_key(|entry| entry.performed_at);
        Ok(entries)
    }

    async fn list_by_engagement(
        &self,
        engagement: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        let mut entries: Vec<ReviewHistoryEntry> = self
            .read_entries()
            .await?
            .into_iter()
            .filter(|entry| entry.engagement == engagement)
            .collect();
        entries.sort_by_key(|entry| entry.performed_at);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{ItemType, ReviewStatus};
    use chrono::{Duration, Utc};
    use serde_json::Map;

    fn entry(id: &str, workflow_id: &str, minutes_ago: i64) -> ReviewHistoryEntry {
        ReviewHistoryEntry {
            id: id.to_string(),
            workflow_id: workflow_id.to_string(),
            item_type: ItemType::WorkingPaper,
            item_id: "wp-1".to_string(),
            engagement: "E1".to_string(),
            action: "submitted-for-review".to_string(),
            performed_by: "s1".to_string(),
            performed_at: Utc::now() - Duration::minutes(minutes_ago),
            previous_status: ReviewStatus::InProgress,
            new_status: ReviewStatus::ReadyForReview,
            comments: None,
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_append_and_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileHistoryLog::new(dir.path().join("audit/history.jsonl"));

        log.append(entry("e-1", "wf-1", 20)).await.unwrap();
        log.append(entry("e-2", "wf-1", 10)).await.unwrap();
        log.append(entry("e-3", "wf-2", 5)).await.unwrap();

        let entries = log.list_by_workflow("wf-1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "e-1");
        assert_eq!(entries[1].id, "e-2");

        let scoped = log.list_by_engagement("E1").await.unwrap();
        assert_eq!(scoped.len(), 3);
    }

    #[tokio::test]
    async fn test_append_is_idempotent_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        let log = FileHistoryLog::new(&path);
        log.append(entry("e-1", "wf-1", 10)).await.unwrap();
        log.append(entry("e-1", "wf-1", 10)).await.unwrap();

        // A fresh instance replays the file before appending, so the
        // duplicate is still skipped.
        let reopened = FileHistoryLog::new(&path);
        reopened.append(entry("e-1", "wf-1", 10)).await.unwrap();
        reopened.append(entry("e-2", "wf-1", 1)).await.unwrap();

        let entries = reopened.list_by_workflow("wf-1").await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_listing_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileHistoryLog::new(dir.path().join("never-written.jsonl"));
        assert!(log.list_by_workflow("wf-1").await.unwrap().is_empty());
    }
}
