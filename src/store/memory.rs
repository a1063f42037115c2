use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::WorkflowError;
use crate::query::{Page, PageResult, WorkflowFilter};
use crate::store::{HistoryLog, StoredWorkflow, WorkflowRecordStore};
use crate::workflow::types::{ReviewHistoryEntry, ReviewWorkflow, WorkflowKey};

#[derive(Default)]
struct RecordState {
    records: HashMap<String, StoredWorkflow>,
    /// Natural-key index: key of each non-superseded record to its id.
    /// `create` consults this for the conditional insert.
    by_key: HashMap<WorkflowKey, String>,
}

/// In-memory record store, the default backend.
///
/// Interior mutability via a single RwLock keeps create/CAS atomic with the
/// key index; reads take the shared lock.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    inner: RwLock<RecordState>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRecordStore for InMemoryWorkflowStore {
    async fn get(&self, id: &str) -> Result<Option<StoredWorkflow>, WorkflowError> {
        let state = self.inner.read().await;
        Ok(state.records.get(id).cloned())
    }

    async fn get_by_key(&self, key: &WorkflowKey) -> Result<Option<StoredWorkflow>, WorkflowError> {
        let state = self.inner.read().await;
        Ok(state
            .by_key
            .get(key)
            .and_then(|id| state.records.get(id))
            .cloned())
    }

    async fn create(&self, mut record: ReviewWorkflow) -> Result<StoredWorkflow, WorkflowError> {
        let key = record.key();
        let mut state = self.inner.write().await;

        if let Some(existing_id) = state.by_key.get(&key) {
            let still_active = state
                .records
                .get(existing_id)
                .map_or(false, |stored| !stored.record.superseded);
            if still_active {
                return Err(WorkflowError::conflict(format!(
                    "an active workflow already exists for {key}"
                )));
            }
        }

        let now = Utc::now();
        record.created_at = now;
        record.updated_at = now;
        let stored = StoredWorkflow {
            revision: 1,
            record,
        };
        state.by_key.insert(key, stored.record.id.clone());
        state
            .records
            .insert(stored.record.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn compare_and_swap(
        &self,
        id: &str,
        expected_revision: u64,
        mut record: ReviewWorkflow,
    ) -> Result<StoredWorkflow, WorkflowError> {
        let mut state = self.inner.write().await;
        let current = state
            .records
            .get(id)
            .ok_or_else(|| WorkflowError::not_found(format!("workflow id {id}")))?;

        if current.revision != expected_revision {
            return Err(WorkflowError::conflict(format!(
                "workflow {id} is at revision {}, write expected {expected_revision}",
                current.revision
            )));
        }
        if record.key() != current.record.key() {
            return Err(WorkflowError::validation(
                "the natural key of a workflow is immutable",
            ));
        }

        record.created_at = current.record.created_at;
        record.updated_at = Utc::now();
        let stored = StoredWorkflow {
            revision: expected_revision + 1,
            record,
        };
        state.records.insert(id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn list(
        &self,
        filter: &WorkflowFilter,
        page: &Page,
    ) -> Result<PageResult<ReviewWorkflow>, WorkflowError> {
        let state = self.inner.read().await;
        let mut matched: Vec<ReviewWorkflow> = state
            .records
            .values()
            .filter(|stored| filter.matches(&stored.record))
            .map(|stored| stored.record.clone())
            .collect();

        // Stable order so pagination neither duplicates nor skips records
        // absent concurrent writes.
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();

        Ok(PageResult {
            items,
            total,
            offset: page.offset,
            limit: page.limit,
        })
    }
}

/// In-memory append-only history log.
#[derive(Default)]
pub struct InMemoryHistoryLog {
    entries: RwLock<Vec<ReviewHistoryEntry>>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryLog for InMemoryHistoryLog {
    async fn append(&self, entry: ReviewHistoryEntry) -> Result<(), WorkflowError> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|existing| existing.id == entry.id) {
            return Ok(());
        }
        entries.push(entry);
        Ok(())
    }

    async fn list_by_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        let entries = self.entries.read().await;
        let mut matched: Vec<ReviewHistoryEntry> = entries
            .iter()
            .filter(|entry| entry.workflow_id == workflow_id)
            .cloned()
            .collect();
        matched.sort_by_key(|entry| entry.performed_at);
        Ok(matched)
    }

    async fn list_by_engagement(
        &self,
        engagement: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        let entries = self.entries.read().await;
        let mut matched: Vec<ReviewHistoryEntry> = entries
            .iter()
            .filter(|entry| entry.engagement == engagement)
            .cloned()
            .collect();
        matched.sort_by_key(|entry| entry.performed_at);
        Ok(matched)
    }
}
