// Workflow Service - End-to-End Transition Orchestration
//
// The single writer path: load -> authorize -> state machine -> CAS write ->
// history append -> event emit. Read paths bypass the state machine and talk
// directly to the stores. The service never auto-retries a Conflict; retry
// is caller policy.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::assignment::ReviewerAssignment;
use crate::config::PaginationConfig;
use crate::error::WorkflowError;
use crate::events::{TracingSink, TransitionEvent, TransitionSink};
use crate::lock::LockManager;
use crate::query::{Page, PageResult, WorkflowFilter};
use crate::store::{HistoryLog, StoredWorkflow, WorkflowRecordStore};
use crate::telemetry::create_workflow_span;
use crate::workflow::state_machine::StateMachine;
use crate::workflow::types::{
    Actor, Priority, ReviewAction, ReviewHistoryEntry, ReviewWorkflow, WorkflowKey, WorkflowNote,
};

/// Optional attributes for workflow creation.
#[derive(Debug, Clone, Default)]
pub struct CreateWorkflowOptions {
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
}

pub struct WorkflowService {
    records: Arc<dyn WorkflowRecordStore>,
    history: Arc<dyn HistoryLog>,
    sink: Arc<dyn TransitionSink>,
    pagination: PaginationConfig,
}

impl WorkflowService {
    pub fn new(records: Arc<dyn WorkflowRecordStore>, history: Arc<dyn HistoryLog>) -> Self {
        Self {
            records,
            history,
            sink: Arc::new(TracingSink),
            pagination: PaginationConfig::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TransitionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Create the workflow for `key`, or return the existing one.
    ///
    /// Idempotent so that double-submission from the surrounding UI is
    /// harmless: a concurrent duplicate create loses the conditional insert
    /// and falls back to reading the winner.
    pub async fn create(
        &self,
        key: WorkflowKey,
        options: CreateWorkflowOptions,
    ) -> Result<ReviewWorkflow, WorkflowError> {
        validate_key(&key)?;

        if let Some(existing) = self.records.get_by_key(&key).await? {
            return Ok(existing.record);
        }

        let mut record = ReviewWorkflow::new(Uuid::new_v4().to_string(), key.clone());
        if let Some(priority) = options.priority {
            record.priority = priority;
        }
        record.due_date = options.due_date;

        match self.records.create(record).await {
            Ok(stored) => {
                info!(
                    workflow.id = %stored.record.id,
                    key = %key,
                    "Created review workflow"
                );
                Ok(stored.record)
            }
            Err(WorkflowError::Conflict { .. }) => {
                let existing = self.records.get_by_key(&key).await?.ok_or_else(|| {
                    WorkflowError::conflict(format!(
                        "workflow for {key} was created concurrently but cannot be read back"
                    ))
                })?;
                Ok(existing.record)
            }
            Err(err) => Err(err),
        }
    }

    /// Apply one lifecycle transition.
    ///
    /// On a `Conflict` the caller must re-read and retry with fresh intent;
    /// on a `PartialCommit` the state change is valid and only the audit
    /// trail needs repair.
    pub async fn transition(
        &self,
        key: &WorkflowKey,
        action: ReviewAction,
        actor: &Actor,
    ) -> Result<ReviewWorkflow, WorkflowError> {
        let span = create_workflow_span("transition", key, Some(&actor.id));
        async {
            validate_key(key)?;
            validate_actor(actor)?;

            let stored = self.load(key).await?;
            ReviewerAssignment::authorize(&action, actor, &stored.record)?;

            let outcome = StateMachine::apply(&stored.record, &action, actor, Utc::now())?;
            let committed = self
                .records
                .compare_and_swap(&stored.record.id, stored.revision, outcome.record)
                .await?;

            for entry in &outcome.entries {
                if let Err(append_err) = self.history.append(entry.clone()).await {
                    error!(
                        workflow.id = %committed.record.id,
                        action = %action.label(),
                        error = %append_err,
                        "History append failed after a committed record write"
                    );
                    return Err(WorkflowError::PartialCommit {
                        workflow_id: committed.record.id.clone(),
                        reason: append_err.to_string(),
                    });
                }
            }

            self.publish(&committed.record, &outcome.entries, actor);

            info!(
                workflow.id = %committed.record.id,
                action = %action.label(),
                from = %outcome.previous_status,
                to = %committed.record.status,
                version = committed.record.version,
                "Applied workflow transition"
            );
            Ok(committed.record)
        }
        .instrument(span)
        .await
    }

    pub async fn get(&self, key: &WorkflowKey) -> Result<ReviewWorkflow, WorkflowError> {
        validate_key(key)?;
        Ok(self.load(key).await?.record)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<ReviewWorkflow, WorkflowError> {
        let stored = self
            .records
            .get(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("workflow id {id}")))?;
        Ok(stored.record)
    }

    /// The audit trail of one workflow, ordered by time ascending.
    pub async fn get_history(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        if self.records.get(workflow_id).await?.is_none() {
            return Err(WorkflowError::not_found(format!(
                "workflow id {workflow_id}"
            )));
        }
        self.history.list_by_workflow(workflow_id).await
    }

    /// Engagement-scoped audit export across all workflows.
    pub async fn engagement_history(
        &self,
        engagement: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        self.history.list_by_engagement(engagement).await
    }

    pub async fn list(
        &self,
        filter: &WorkflowFilter,
        page: Page,
    ) -> Result<PageResult<ReviewWorkflow>, WorkflowError> {
        let limit = if page.limit == 0 {
            self.pagination.default_page_size
        } else {
            page.limit.min(self.pagination.max_page_size)
        };
        self.records
            .list(filter, &Page::new(page.offset, limit))
            .await
    }

    /// Convenience for external content editors: the authoritative
    /// editability signal for the artifact behind `key`.
    pub async fn is_editable(&self, key: &WorkflowKey) -> Result<bool, WorkflowError> {
        let record = self.get(key).await?;
        Ok(LockManager::is_editable(&record))
    }

    /// Append free-form commentary to the workflow. Notes are distinct from
    /// the formal history log and do not count as transitions.
    pub async fn add_note(
        &self,
        key: &WorkflowKey,
        text: impl Into<String>,
        actor: &Actor,
    ) -> Result<ReviewWorkflow, WorkflowError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(WorkflowError::validation("a note requires text"));
        }
        let note = WorkflowNote {
            text,
            added_by: actor.id.clone(),
            added_at: Utc::now(),
        };
        self.update_metadata(key, actor, "note", move |record| {
            record.notes.push(note);
        })
        .await
    }

    pub async fn set_priority(
        &self,
        key: &WorkflowKey,
        priority: Priority,
        actor: &Actor,
    ) -> Result<ReviewWorkflow, WorkflowError> {
        self.update_metadata(key, actor, "priority", move |record| {
            record.priority = priority;
        })
        .await
    }

    pub async fn set_due_date(
        &self,
        key: &WorkflowKey,
        due_date: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<ReviewWorkflow, WorkflowError> {
        self.update_metadata(key, actor, "due date", move |record| {
            record.due_date = due_date;
        })
        .await
    }

    /// Add a tag to the workflow's tag set. Tags stay deduplicated and
    /// sorted for deterministic listings.
    pub async fn tag(
        &self,
        key: &WorkflowKey,
        tag: impl Into<String>,
        actor: &Actor,
    ) -> Result<ReviewWorkflow, WorkflowError> {
        let tag = tag.into().trim().to_string();
        if tag.is_empty() {
            return Err(WorkflowError::validation("a tag requires text"));
        }
        self.update_metadata(key, actor, "tag", move |record| {
            if !record.tags.contains(&tag) {
                record.tags.push(tag);
                record.tags.sort();
            }
        })
        .await
    }

    async fn load(&self, key: &WorkflowKey) -> Result<StoredWorkflow, WorkflowError> {
        self.records
            .get_by_key(key)
            .await?
            .ok_or_else(|| WorkflowError::not_found(key))
    }

    /// Scheduling-metadata writes share the CAS path with transitions but
    /// append no history entry: the audit trail counts transitions only.
    async fn update_metadata<F>(
        &self,
        key: &WorkflowKey,
        actor: &Actor,
        what: &str,
        mutate: F,
    ) -> Result<ReviewWorkflow, WorkflowError>
    where
        F: FnOnce(&mut ReviewWorkflow),
    {
        validate_key(key)?;
        validate_actor(actor)?;

        let stored = self.load(key).await?;
        let mut record = stored.record.clone();
        mutate(&mut record);
        let committed = self
            .records
            .compare_and_swap(&stored.record.id, stored.revision, record)
            .await?;

        info!(
            workflow.id = %committed.record.id,
            actor = %actor.id,
            changed = what,
            "Updated workflow metadata"
        );
        Ok(committed.record)
    }

    fn publish(&self, record: &ReviewWorkflow, entries: &[ReviewHistoryEntry], actor: &Actor) {
        for entry in entries {
            self.sink.publish(&TransitionEvent {
                workflow_id: record.id.clone(),
                item_type: record.item_type,
                item_id: record.item_id.clone(),
                engagement: record.engagement.clone(),
                previous_status: entry.previous_status,
                new_status: entry.new_status,
                actor: actor.id.clone(),
                occurred_at: entry.performed_at,
            });
        }
    }
}

fn validate_key(key: &WorkflowKey) -> Result<(), WorkflowError> {
    if key.item_id.trim().is_empty() {
        return Err(WorkflowError::validation("item id must not be empty"));
    }
    if key.engagement.trim().is_empty() {
        return Err(WorkflowError::validation("engagement must not be empty"));
    }
    Ok(())
}

fn validate_actor(actor: &Actor) -> Result<(), WorkflowError> {
    if actor.id.trim().is_empty() {
        return Err(WorkflowError::validation("actor id must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryHistoryLog, InMemoryWorkflowStore};
    use crate::workflow::types::{ActorRole, ItemType};

    fn service() -> WorkflowService {
        WorkflowService::new(
            Arc::new(InMemoryWorkflowStore::new()),
            Arc::new(InMemoryHistoryLog::new()),
        )
    }

    fn key() -> WorkflowKey {
        WorkflowKey::new(ItemType::DocumentRequest, "dr-1", "E1")
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let service = service();
        let first = service
            .create(key(), CreateWorkflowOptions::default())
            .await
            .unwrap();
        let second = service
            .create(key(), CreateWorkflowOptions::default())
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_key_fields() {
        let service = service();
        let blank = WorkflowKey::new(ItemType::DocumentRequest, "  ", "E1");
        let result = service.create(blank, CreateWorkflowOptions::default()).await;
        assert!(matches!(result, Err(WorkflowError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_transition_on_missing_workflow_is_not_found() {
        let service = service();
        let actor = Actor::new("s1", ActorRole::Staff);
        let result = service
            .transition(&key(), ReviewAction::Submit, &actor)
            .await;
        assert!(matches!(result, Err(WorkflowError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_note_and_tag_require_text() {
        let service = service();
        service
            .create(key(), CreateWorkflowOptions::default())
            .await
            .unwrap();
        let actor = Actor::new("s1", ActorRole::Staff);

        let blank_note = service.add_note(&key(), "   ", &actor).await;
        assert!(matches!(blank_note, Err(WorkflowError::Validation { .. })));

        let blank_tag = service.tag(&key(), " ", &actor).await;
        assert!(matches!(blank_tag, Err(WorkflowError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_tags_stay_deduplicated_and_sorted() {
        let service = service();
        service
            .create(key(), CreateWorkflowOptions::default())
            .await
            .unwrap();
        let actor = Actor::new("s1", ActorRole::Staff);

        service.tag(&key(), "revenue", &actor).await.unwrap();
        service.tag(&key(), "cutoff", &actor).await.unwrap();
        let record = service.tag(&key(), "revenue", &actor).await.unwrap();

        assert_eq!(record.tags, vec!["cutoff", "revenue"]);
    }

    #[tokio::test]
    async fn test_metadata_updates_append_no_history() {
        let service = service();
        let created = service
            .create(key(), CreateWorkflowOptions::default())
            .await
            .unwrap();
        let actor = Actor::new("s1", ActorRole::Staff);

        service
            .set_priority(&key(), Priority::Critical, &actor)
            .await
            .unwrap();
        service.add_note(&key(), "walkthrough pending", &actor).await.unwrap();

        let history = service.get_history(&created.id).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_list_clamps_page_limit() {
        let service = service().with_pagination(PaginationConfig {
            default_page_size: 2,
            max_page_size: 3,
        });
        for n in 0..5 {
            service
                .create(
                    WorkflowKey::new(ItemType::Pbc, format!("item-{n}"), "E1"),
                    CreateWorkflowOptions::default(),
                )
                .await
                .unwrap();
        }

        let defaulted = service
            .list(&WorkflowFilter::default(), Page::new(0, 0))
            .await
            .unwrap();
        assert_eq!(defaulted.items.len(), 2);

        let clamped = service
            .list(&WorkflowFilter::default(), Page::new(0, 100))
            .await
            .unwrap();
        assert_eq!(clamped.items.len(), 3);
        assert_eq!(clamped.total, 5);
    }
}
