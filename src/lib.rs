// Signoff Engine - Review & Sign-off Workflow Core
// This exposes the generic review lifecycle shared by every auditable
// artifact kind in the engagement portal: authoring, review, approval,
// sign-off, locking, and controlled reopening with an immutable audit trail.

pub mod assignment;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod query;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use assignment::ReviewerAssignment;
pub use config::{config, init_config, PaginationConfig, SignoffConfig};
pub use error::WorkflowError;
pub use events::{MemorySink, TracingSink, TransitionEvent, TransitionSink};
pub use lock::LockManager;
pub use query::{Page, PageResult, WorkflowFilter};
pub use service::{CreateWorkflowOptions, WorkflowService};
pub use store::{
    FileHistoryLog, HistoryLog, InMemoryHistoryLog, InMemoryWorkflowStore, StoredWorkflow,
    WorkflowRecordStore,
};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    Actor, ActorRole, ItemType, Priority, ReviewAction, ReviewHistoryEntry, ReviewStatus,
    ReviewWorkflow, StateMachine, TransitionOutcome, WorkflowKey, WorkflowNote,
};

#[cfg(feature = "database")]
pub use store::database::{connect_sqlite, SqliteHistoryLog, SqliteWorkflowStore};
