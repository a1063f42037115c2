// Storage Layer - Workflow Records and Audit History
//
// Two shared mutable resources back the engine: the record store (current
// state, versioned writes) and the history log (append-only audit trail).
// All mutation flows through WorkflowService; nothing else calls
// compare_and_swap or append.

pub mod file;
pub mod memory;

#[cfg(feature = "database")]
pub mod database;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::query::{Page, PageResult, WorkflowFilter};
use crate::workflow::types::{ReviewHistoryEntry, ReviewWorkflow, WorkflowKey};

pub use file::FileHistoryLog;
pub use memory::{InMemoryHistoryLog, InMemoryWorkflowStore};

#[cfg(feature = "database")]
pub use database::{SqliteHistoryLog, SqliteWorkflowStore};

/// A workflow record coupled with its storage revision.
///
/// The revision is a store-level monotonic counter incremented on every
/// write. It is the compare-and-swap gate and is distinct from the domain
/// `version` field, which only increments on reopen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub revision: u64,
    pub record: ReviewWorkflow,
}

/// Durable keyed storage for workflow records.
///
/// `create` enforces the one-active-workflow-per-natural-key invariant as a
/// conditional insert; `compare_and_swap` is the sole concurrency gate for
/// updates. Implementations stamp `created_at`/`updated_at`.
#[async_trait]
pub trait WorkflowRecordStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<StoredWorkflow>, WorkflowError>;

    async fn get_by_key(&self, key: &WorkflowKey) -> Result<Option<StoredWorkflow>, WorkflowError>;

    /// Conditional insert: fails with `Conflict` when a non-superseded
    /// record already holds the natural key.
    async fn create(&self, record: ReviewWorkflow) -> Result<StoredWorkflow, WorkflowError>;

    /// Versioned write: fails with `Conflict` when the stored revision does
    /// not match `expected_revision`.
    async fn compare_and_swap(
        &self,
        id: &str,
        expected_revision: u64,
        record: ReviewWorkflow,
    ) -> Result<StoredWorkflow, WorkflowError>;

    async fn list(
        &self,
        filter: &WorkflowFilter,
        page: &Page,
    ) -> Result<PageResult<ReviewWorkflow>, WorkflowError>;
}

/// Append-only store of transition events.
///
/// No update or delete exists; attempting one is a programming error by
/// construction (the trait offers no such operation). `append` is
/// idempotent-safe: re-appending an entry id that already exists inserts
/// nothing and overwrites nothing.
#[async_trait]
pub trait HistoryLog: Send + Sync {
    async fn append(&self, entry: ReviewHistoryEntry) -> Result<(), WorkflowError>;

    /// All entries for a workflow, ordered by `performed_at` ascending.
    async fn list_by_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError>;

    /// All entries for an engagement, ordered by `performed_at` ascending.
    /// Used for engagement-scoped audit export.
    async fn list_by_engagement(
        &self,
        engagement: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError>;
}
