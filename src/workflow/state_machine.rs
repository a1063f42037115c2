use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::lock::LockManager;
use crate::workflow::types::{
    Actor, ReviewAction, ReviewHistoryEntry, ReviewStatus, ReviewWorkflow,
};

/// Result of a valid transition: the successor record plus the history
/// entries the service must append in the same logical operation.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub record: ReviewWorkflow,
    pub entries: Vec<ReviewHistoryEntry>,
    pub previous_status: ReviewStatus,
}

/// Pure transition-validation logic for the review lifecycle.
///
/// Given the current record, the requested action, and the acting user,
/// `apply` either computes the successor record and its audit entry or
/// rejects with a typed error. No storage, no authorization, and no
/// item-type branching happens here; the item type rides through as an
/// opaque tag.
#[derive(Debug)]
pub struct StateMachine;

impl StateMachine {
    /// Compute the successor of `record` under `action`.
    ///
    /// The transition table is total and closed: any (status, action) pair
    /// not listed yields `InvalidTransition`. Reopen passes through the
    /// transient `ReOpened` status and rests in `InProgress` within the
    /// same outcome, so callers always observe `InProgress` after a reopen.
    pub fn apply(
        record: &ReviewWorkflow,
        action: &ReviewAction,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let previous_status = record.status;
        let mut next = record.clone();
        let mut metadata = Map::new();

        let new_status = match (record.status, action) {
            (ReviewStatus::InProgress, ReviewAction::Submit) => {
                next.submitted_for_review_at = Some(now);
                next.submitted_for_review_by = Some(actor.id.clone());
                ReviewStatus::ReadyForReview
            }
            (ReviewStatus::ReadyForReview, ReviewAction::Claim) => {
                next.assigned_reviewer = Some(actor.id.clone());
                ReviewStatus::UnderReview
            }
            (ReviewStatus::UnderReview, ReviewAction::Approve { comments }) => {
                next.reviewed_at = Some(now);
                next.reviewed_by = Some(actor.id.clone());
                next.review_comments = comments.clone();
                ReviewStatus::Approved
            }
            (ReviewStatus::UnderReview, ReviewAction::Reject { comments }) => {
                next.reviewed_at = Some(now);
                next.reviewed_by = Some(actor.id.clone());
                next.review_comments = comments.clone();
                ReviewStatus::Rejected
            }
            (ReviewStatus::Approved, ReviewAction::SignOff { comments }) => {
                next.signed_off_at = Some(now);
                next.signed_off_by = Some(actor.id.clone());
                next.sign_off_comments = comments.clone();
                ReviewStatus::SignedOff
            }
            (ReviewStatus::Rejected, ReviewAction::Resubmit) => {
                next.clear_review_cycle();
                ReviewStatus::InProgress
            }
            (ReviewStatus::SignedOff, ReviewAction::Reopen { reason }) => {
                if reason.trim().is_empty() {
                    return Err(WorkflowError::validation(
                        "a reopen requires a non-empty reason",
                    ));
                }
                let version_before = next.version;
                next.version = version_before + 1;
                next.previous_version = Some(version_before);
                next.reopened_at = Some(now);
                next.reopened_by = Some(actor.id.clone());
                next.reopen_reason = Some(reason.clone());
                next.signed_off_at = None;
                next.signed_off_by = None;
                next.sign_off_comments = None;
                next.clear_review_cycle();
                metadata.insert("version_before".to_string(), json!(version_before));
                metadata.insert("version_after".to_string(), json!(next.version));
                metadata.insert(
                    "transient_status".to_string(),
                    Value::String(ReviewStatus::ReOpened.as_str().to_string()),
                );
                ReviewStatus::InProgress
            }
            (status, action) => {
                return Err(WorkflowError::InvalidTransition {
                    action: action.label().to_string(),
                    status,
                });
            }
        };

        next.status = new_status;
        next.is_locked = LockManager::lock_for_status(new_status);

        let comments = match action {
            ReviewAction::Approve { comments }
            | ReviewAction::Reject { comments }
            | ReviewAction::SignOff { comments } => comments.clone(),
            ReviewAction::Reopen { reason } => Some(reason.clone()),
            ReviewAction::Submit | ReviewAction::Claim | ReviewAction::Resubmit => None,
        };

        let entry = ReviewHistoryEntry {
            id: Uuid::new_v4().to_string(),
            workflow_id: record.id.clone(),
            item_type: record.item_type,
            item_id: record.item_id.clone(),
            engagement: record.engagement.clone(),
            action: action.label().to_string(),
            performed_by: actor.id.clone(),
            performed_at: now,
            previous_status,
            new_status,
            comments,
            metadata,
        };

        tracing::debug!(
            workflow.id = %record.id,
            action = %action.label(),
            from = %previous_status,
            to = %new_status,
            "Computed workflow transition"
        );

        Ok(TransitionOutcome {
            record: next,
            entries: vec![entry],
            previous_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{ActorRole, ItemType, WorkflowKey};

    fn staff() -> Actor {
        Actor::new("s1", ActorRole::Staff)
    }

    fn reviewer() -> Actor {
        Actor::new("r1", ActorRole::Reviewer)
    }

    fn partner() -> Actor {
        Actor::new("p1", ActorRole::Partner)
    }

    fn fresh() -> ReviewWorkflow {
        ReviewWorkflow::new("wf-1", WorkflowKey::new(ItemType::Pbc, "Q1", "E1"))
    }

    fn apply(record: &ReviewWorkflow, action: ReviewAction, actor: &Actor) -> ReviewWorkflow {
        StateMachine::apply(record, &action, actor, Utc::now())
            .expect("transition should be valid")
            .record
    }

    fn signed_off() -> ReviewWorkflow {
        let record = fresh();
        let record = apply(&record, ReviewAction::Submit, &staff());
        let record = apply(&record, ReviewAction::Claim, &reviewer());
        let record = apply(
            &record,
            ReviewAction::Approve {
                comments: Some("looks good".to_string()),
            },
            &reviewer(),
        );
        apply(&record, ReviewAction::SignOff { comments: None }, &partner())
    }

    #[test]
    fn test_submit_sets_submission_fields() {
        let now = Utc::now();
        let outcome = StateMachine::apply(&fresh(), &ReviewAction::Submit, &staff(), now).unwrap();
        assert_eq!(outcome.record.status, ReviewStatus::ReadyForReview);
        assert_eq!(outcome.record.submitted_for_review_at, Some(now));
        assert_eq!(
            outcome.record.submitted_for_review_by.as_deref(),
            Some("s1")
        );
        assert!(!outcome.record.is_locked);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].action, "submitted-for-review");
        assert_eq!(outcome.entries[0].previous_status, ReviewStatus::InProgress);
        assert_eq!(outcome.entries[0].new_status, ReviewStatus::ReadyForReview);
    }

    #[test]
    fn test_claim_assigns_reviewer_and_locks() {
        let record = apply(&fresh(), ReviewAction::Submit, &staff());
        let record = apply(&record, ReviewAction::Claim, &reviewer());
        assert_eq!(record.status, ReviewStatus::UnderReview);
        assert_eq!(record.assigned_reviewer.as_deref(), Some("r1"));
        assert!(record.is_locked);
    }

    #[test]
    fn test_approve_and_reject_record_review_outcome() {
        let record = apply(&fresh(), ReviewAction::Submit, &staff());
        let under_review = apply(&record, ReviewAction::Claim, &reviewer());

        let approved = apply(
            &under_review,
            ReviewAction::Approve {
                comments: Some("looks good".to_string()),
            },
            &reviewer(),
        );
        assert_eq!(approved.status, ReviewStatus::Approved);
        assert_eq!(approved.reviewed_by.as_deref(), Some("r1"));
        assert_eq!(approved.review_comments.as_deref(), Some("looks good"));
        assert!(approved.is_locked);

        let rejected = apply(
            &under_review,
            ReviewAction::Reject {
                comments: Some("missing tie-out".to_string()),
            },
            &reviewer(),
        );
        assert_eq!(rejected.status, ReviewStatus::Rejected);
        assert_eq!(rejected.reviewed_by.as_deref(), Some("r1"));
        // The reviewer slot is retained on rejection; only resubmission
        // clears it.
        assert_eq!(rejected.assigned_reviewer.as_deref(), Some("r1"));
        assert!(!rejected.is_locked);
    }

    #[test]
    fn test_sign_off_keeps_lock_and_version() {
        let record = signed_off();
        assert_eq!(record.status, ReviewStatus::SignedOff);
        assert!(record.is_locked);
        assert_eq!(record.signed_off_by.as_deref(), Some("p1"));
        assert!(record.signed_off_at.is_some());
        assert_eq!(record.version, 1);
    }

    #[test]
    fn test_resubmit_clears_review_cycle_but_not_version() {
        let record = apply(&fresh(), ReviewAction::Submit, &staff());
        let record = apply(&record, ReviewAction::Claim, &reviewer());
        let record = apply(
            &record,
            ReviewAction::Reject {
                comments: Some("redo section 3".to_string()),
            },
            &reviewer(),
        );
        let record = apply(&record, ReviewAction::Resubmit, &staff());

        assert_eq!(record.status, ReviewStatus::InProgress);
        assert!(!record.is_locked);
        assert_eq!(record.assigned_reviewer, None);
        assert_eq!(record.reviewed_at, None);
        assert_eq!(record.reviewed_by, None);
        assert_eq!(record.review_comments, None);
        assert_eq!(record.submitted_for_review_at, None);
        assert_eq!(record.version, 1);
    }

    #[test]
    fn test_reopen_bumps_version_and_clears_sign_off() {
        let record = signed_off();
        let outcome = StateMachine::apply(
            &record,
            &ReviewAction::Reopen {
                reason: "missing evidence".to_string(),
            },
            &partner(),
            Utc::now(),
        )
        .unwrap();

        let reopened = &outcome.record;
        assert_eq!(reopened.status, ReviewStatus::InProgress);
        assert_eq!(reopened.version, 2);
        assert_eq!(reopened.previous_version, Some(1));
        assert!(!reopened.is_locked);
        assert_eq!(reopened.signed_off_at, None);
        assert_eq!(reopened.signed_off_by, None);
        assert_eq!(reopened.sign_off_comments, None);
        assert_eq!(reopened.assigned_reviewer, None);
        assert_eq!(reopened.reopened_by.as_deref(), Some("p1"));
        assert_eq!(reopened.reopen_reason.as_deref(), Some("missing evidence"));

        // One entry per successful transition; the reopen entry carries the
        // version bump and the transient status in its metadata.
        assert_eq!(outcome.entries.len(), 1);
        let entry = &outcome.entries[0];
        assert_eq!(entry.action, "re-opened");
        assert_eq!(entry.previous_status, ReviewStatus::SignedOff);
        assert_eq!(entry.new_status, ReviewStatus::InProgress);
        assert_eq!(entry.metadata.get("version_before"), Some(&json!(1)));
        assert_eq!(entry.metadata.get("version_after"), Some(&json!(2)));
        assert_eq!(
            entry.metadata.get("transient_status"),
            Some(&json!("re-opened"))
        );
    }

    #[test]
    fn test_reopen_requires_a_reason() {
        let record = signed_off();
        let result = StateMachine::apply(
            &record,
            &ReviewAction::Reopen {
                reason: "  ".to_string(),
            },
            &partner(),
            Utc::now(),
        );
        assert!(matches!(result, Err(WorkflowError::Validation { .. })));
    }

    #[test]
    fn test_second_reopen_cycle_reaches_version_three() {
        let record = signed_off();
        let record = apply(
            &record,
            ReviewAction::Reopen {
                reason: "missing evidence".to_string(),
            },
            &partner(),
        );
        let record = apply(&record, ReviewAction::Submit, &staff());
        let record = apply(&record, ReviewAction::Claim, &reviewer());
        let record = apply(&record, ReviewAction::Approve { comments: None }, &reviewer());
        let record = apply(&record, ReviewAction::SignOff { comments: None }, &partner());
        let record = apply(
            &record,
            ReviewAction::Reopen {
                reason: "late adjustment".to_string(),
            },
            &partner(),
        );
        assert_eq!(record.version, 3);
        assert_eq!(record.previous_version, Some(2));
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let invalid = [
            (fresh(), ReviewAction::Claim),
            (fresh(), ReviewAction::Approve { comments: None }),
            (fresh(), ReviewAction::SignOff { comments: None }),
            (fresh(), ReviewAction::Resubmit),
            (
                fresh(),
                ReviewAction::Reopen {
                    reason: "too early".to_string(),
                },
            ),
            (signed_off(), ReviewAction::Submit),
            (signed_off(), ReviewAction::SignOff { comments: None }),
        ];
        for (record, action) in invalid {
            let result = StateMachine::apply(&record, &action, &partner(), Utc::now());
            assert!(
                matches!(result, Err(WorkflowError::InvalidTransition { .. })),
                "{} from {} should be invalid",
                action.label(),
                record.status
            );
        }
    }

    #[test]
    fn test_item_type_rides_through_unchanged() {
        for item_type in [
            ItemType::Procedure,
            ItemType::DocumentRequest,
            ItemType::WorkingPaper,
        ] {
            let record =
                ReviewWorkflow::new("wf-x", WorkflowKey::new(item_type, "item", "E9"));
            let outcome =
                StateMachine::apply(&record, &ReviewAction::Submit, &staff(), Utc::now()).unwrap();
            assert_eq!(outcome.record.item_type, item_type);
            assert_eq!(outcome.entries[0].item_type, item_type);
        }
    }
}
