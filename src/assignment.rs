// Reviewer Assignment Policy - Capability Checks
//
// Authorization is an explicit capability-set check, centralized here and
// testable independent of how the portal represents its users. Capability
// failures produce PermissionError, never a silent no-op.

use crate::error::WorkflowError;
use crate::workflow::types::{Actor, ReviewAction, ReviewStatus, ReviewWorkflow};

#[derive(Debug)]
pub struct ReviewerAssignment;

impl ReviewerAssignment {
    /// Whether `actor` may claim `record` for review.
    ///
    /// Requires a reviewer-capable role, a record waiting for review, and a
    /// free reviewer slot. An actor who already holds the slot may re-claim
    /// idempotently.
    pub fn can_claim(actor: &Actor, record: &ReviewWorkflow) -> bool {
        actor.role.can_review()
            && record.status == ReviewStatus::ReadyForReview
            && record
                .assigned_reviewer
                .as_deref()
                .map_or(true, |assigned| assigned == actor.id)
    }

    /// Sign-off is reserved for elevated roles, on approved records only.
    pub fn can_sign_off(actor: &Actor, record: &ReviewWorkflow) -> bool {
        actor.role.is_elevated() && record.status == ReviewStatus::Approved
    }

    /// Reopening is reserved for elevated roles, on signed-off records only.
    pub fn can_reopen(actor: &Actor, record: &ReviewWorkflow) -> bool {
        actor.role.is_elevated() && record.status == ReviewStatus::SignedOff
    }

    /// Authorize `action` against `record` before the state machine runs.
    ///
    /// Only role and assignment facts are decided here; a status that merely
    /// makes the action meaningless is left to the state machine so the
    /// caller sees `InvalidTransition` rather than `Permission`.
    pub fn authorize(
        action: &ReviewAction,
        actor: &Actor,
        record: &ReviewWorkflow,
    ) -> Result<(), WorkflowError> {
        match action {
            ReviewAction::Claim => {
                if !actor.role.can_review() {
                    return Err(WorkflowError::permission(&actor.id, "claim a review"));
                }
                if let Some(assigned) = record.assigned_reviewer.as_deref() {
                    if assigned != actor.id {
                        return Err(WorkflowError::permission(
                            &actor.id,
                            format!("claim a review already assigned to '{assigned}'"),
                        ));
                    }
                }
                Ok(())
            }
            ReviewAction::Approve { .. } | ReviewAction::Reject { .. } => {
                // The reviewer slot is retained through the forward path;
                // once assigned, only that reviewer may conclude the review.
                if let Some(assigned) = record.assigned_reviewer.as_deref() {
                    if assigned != actor.id {
                        return Err(WorkflowError::permission(
                            &actor.id,
                            format!("conclude a review assigned to '{assigned}'"),
                        ));
                    }
                }
                Ok(())
            }
            ReviewAction::SignOff { .. } => {
                if !actor.role.is_elevated() {
                    return Err(WorkflowError::permission(&actor.id, "sign off"));
                }
                Ok(())
            }
            ReviewAction::Reopen { .. } => {
                if !actor.role.is_elevated() {
                    return Err(WorkflowError::permission(
                        &actor.id,
                        "reopen a signed-off workflow",
                    ));
                }
                Ok(())
            }
            // Submission and resubmission are open to any authenticated
            // participant; engagement membership is the caller's concern.
            ReviewAction::Submit | ReviewAction::Resubmit => Ok(()),
        }
    }
}
