// Content Lock Policy - Derived Editability Signal
//
// The engine does not guard the artifact stores itself; it provides the
// authoritative editability signal that the eight external item-editors
// consult before permitting a content mutation.

use crate::error::WorkflowError;
use crate::workflow::types::{ReviewStatus, ReviewWorkflow};

#[derive(Debug)]
pub struct LockManager;

impl LockManager {
    /// Whether the underlying artifact content may be edited.
    ///
    /// Purely derived: editing is blocked exactly while the workflow is
    /// under review, approved, or signed off.
    pub fn is_editable(record: &ReviewWorkflow) -> bool {
        !Self::lock_for_status(record.status)
    }

    /// The persisted `is_locked` value for a status.
    pub fn lock_for_status(status: ReviewStatus) -> bool {
        matches!(
            status,
            ReviewStatus::UnderReview | ReviewStatus::Approved | ReviewStatus::SignedOff
        )
    }

    /// Guard for external content editors: `Locked` when editing is blocked.
    pub fn ensure_editable(record: &ReviewWorkflow) -> Result<(), WorkflowError> {
        if Self::is_editable(record) {
            Ok(())
        } else {
            Err(WorkflowError::Locked {
                status: record.status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{ItemType, WorkflowKey};

    fn workflow_with_status(status: ReviewStatus) -> ReviewWorkflow {
        let mut workflow =
            ReviewWorkflow::new("wf-1", WorkflowKey::new(ItemType::Procedure, "p-1", "E1"));
        workflow.status = status;
        workflow
    }

    #[test]
    fn test_lock_derivation_matches_status() {
        let locked = [
            ReviewStatus::UnderReview,
            ReviewStatus::Approved,
            ReviewStatus::SignedOff,
        ];
        let editable = [
            ReviewStatus::InProgress,
            ReviewStatus::ReadyForReview,
            ReviewStatus::Rejected,
            ReviewStatus::ReOpened,
        ];

        for status in locked {
            assert!(LockManager::lock_for_status(status), "{status} should lock");
            assert!(!LockManager::is_editable(&workflow_with_status(status)));
        }
        for status in editable {
            assert!(
                !LockManager::lock_for_status(status),
                "{status} should not lock"
            );
            assert!(LockManager::is_editable(&workflow_with_status(status)));
        }
    }

    #[test]
    fn test_ensure_editable_surfaces_locked_error() {
        let record = workflow_with_status(ReviewStatus::SignedOff);
        match LockManager::ensure_editable(&record) {
            Err(WorkflowError::Locked { status }) => assert_eq!(status, ReviewStatus::SignedOff),
            other => panic!("expected Locked error, got {other:?}"),
        }

        let record = workflow_with_status(ReviewStatus::InProgress);
        assert!(LockManager::ensure_editable(&record).is_ok());
    }
}
