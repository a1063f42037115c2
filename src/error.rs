use thiserror::Error;

use crate::workflow::types::ReviewStatus;

/// Errors that can occur during workflow operations.
///
/// All domain errors are typed and returned to the immediate caller; the
/// engine never retries a `Conflict` automatically (retry is caller policy,
/// since a blind retry could replay a stale intent).
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid input: {reason}")]
    Validation { reason: String },

    #[error("no workflow found for {reference}")]
    NotFound { reference: String },

    #[error("action '{action}' is not allowed while the workflow is {status}")]
    InvalidTransition {
        action: String,
        status: ReviewStatus,
    },

    #[error("write conflict: {reason}")]
    Conflict { reason: String },

    #[error("content is locked for editing while the workflow is {status}")]
    Locked { status: ReviewStatus },

    #[error("actor '{actor}' is not permitted to {action}")]
    Permission { actor: String, action: String },

    /// The record was written but the history append failed. The state
    /// change is valid; only the audit trail needs repair, so callers must
    /// reconcile rather than assume full success or full failure.
    #[error("workflow {workflow_id} was updated but the history append failed: {reason}")]
    PartialCommit {
        workflow_id: String,
        reason: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WorkflowError {
    pub fn validation(reason: impl Into<String>) -> Self {
        WorkflowError::Validation {
            reason: reason.into(),
        }
    }

    pub fn not_found(reference: impl ToString) -> Self {
        WorkflowError::NotFound {
            reference: reference.to_string(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        WorkflowError::Conflict {
            reason: reason.into(),
        }
    }

    pub fn permission(actor: impl Into<String>, action: impl Into<String>) -> Self {
        WorkflowError::Permission {
            actor: actor.into(),
            action: action.into(),
        }
    }

    /// True for the errors a caller can resolve by re-reading and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Conflict { .. })
    }
}
