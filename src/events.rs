use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::workflow::types::{ItemType, ReviewStatus};

/// Emitted on every successful transition for downstream collaborators
/// (the notification subsystem translates these into user-facing alerts).
/// The engine itself sends nothing to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub workflow_id: String,
    pub item_type: ItemType,
    pub item_id: String,
    pub engagement: String,
    pub previous_status: ReviewStatus,
    pub new_status: ReviewStatus,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

/// Outbound event channel. Implementations must not fail the transition:
/// publishing is fire-and-forget from the engine's point of view.
pub trait TransitionSink: Send + Sync {
    fn publish(&self, event: &TransitionEvent);
}

/// Default sink: a structured tracing event, picked up by whatever
/// subscriber the host process installed.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TransitionSink for TracingSink {
    fn publish(&self, event: &TransitionEvent) {
        tracing::info!(
            workflow.id = %event.workflow_id,
            item.r#type = %event.item_type,
            item.id = %event.item_id,
            engagement = %event.engagement,
            from = %event.previous_status,
            to = %event.new_status,
            actor = %event.actor,
            "Workflow transition"
        );
    }
}

/// Buffering sink for tests and batch consumers.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TransitionEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<TransitionEvent> {
        std::mem::take(&mut *self.events.lock().expect("event buffer poisoned"))
    }

    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().expect("event buffer poisoned").clone()
    }
}

impl TransitionSink for MemorySink {
    fn publish(&self, event: &TransitionEvent) {
        self.events
            .lock()
            .expect("event buffer poisoned")
            .push(event.clone());
    }
}
