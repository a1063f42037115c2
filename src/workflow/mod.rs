// Review Workflow Module - Polymorphic Sign-off Lifecycle
//
// This module implements the review & sign-off lifecycle shared by every
// auditable item kind, with the pure transition logic separated from
// storage and orchestration for comprehensive testing.

pub mod state_machine;
pub mod types;

pub use state_machine::{StateMachine, TransitionOutcome};
pub use types::{
    Actor, ActorRole, ItemType, Priority, ReviewAction, ReviewHistoryEntry, ReviewStatus,
    ReviewWorkflow, WorkflowKey, WorkflowNote,
};
