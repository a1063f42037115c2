use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of auditable item kinds a workflow can govern.
///
/// The engine never branches on this tag; it exists so that callers can
/// resolve the underlying artifact in their own domain and so that listings
/// can be scoped per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    Procedure,
    PlanningProcedure,
    DocumentRequest,
    ChecklistItem,
    Pbc,
    Kyc,
    IsqmDocument,
    WorkingPaper,
    ClassificationSection,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Procedure => "procedure",
            ItemType::PlanningProcedure => "planning-procedure",
            ItemType::DocumentRequest => "document-request",
            ItemType::ChecklistItem => "checklist-item",
            ItemType::Pbc => "pbc",
            ItemType::Kyc => "kyc",
            ItemType::IsqmDocument => "isqm-document",
            ItemType::WorkingPaper => "working-paper",
            ItemType::ClassificationSection => "classification-section",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a review workflow.
///
/// `ReOpened` is transient: the state machine derives the `InProgress`
/// successor within the same transition, so stored records always rest in
/// one of the other six statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewStatus {
    InProgress,
    ReadyForReview,
    UnderReview,
    Approved,
    Rejected,
    SignedOff,
    ReOpened,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::InProgress => "in-progress",
            ReviewStatus::ReadyForReview => "ready-for-review",
            ReviewStatus::UnderReview => "under-review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::SignedOff => "signed-off",
            ReviewStatus::ReOpened => "re-opened",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scheduling priority of a workflow. Defaults to `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

/// Role an actor carries when invoking the engine.
///
/// Roles are capabilities, not identities: the engine checks what a role may
/// do, never who the person is beyond their identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorRole {
    Staff,
    Reviewer,
    Partner,
}

impl ActorRole {
    /// Reviewer-capable roles may claim workflows for review.
    pub fn can_review(&self) -> bool {
        matches!(self, ActorRole::Reviewer | ActorRole::Partner)
    }

    /// Elevated roles may sign off and reopen.
    pub fn is_elevated(&self) -> bool {
        matches!(self, ActorRole::Partner)
    }
}

/// The actor performing an operation against the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Natural key of a workflow: at most one non-superseded workflow exists per
/// (item type, item id, engagement) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowKey {
    pub item_type: ItemType,
    pub item_id: String,
    pub engagement: String,
}

impl WorkflowKey {
    pub fn new(
        item_type: ItemType,
        item_id: impl Into<String>,
        engagement: impl Into<String>,
    ) -> Self {
        Self {
            item_type,
            item_id: item_id.into(),
            engagement: engagement.into(),
        }
    }
}

impl fmt::Display for WorkflowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.item_type, self.item_id, self.engagement
        )
    }
}

/// Free-form commentary attached to a workflow, distinct from the formal
/// history log. Append-only in practice: the service only ever pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowNote {
    pub text: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

/// Current state of one review workflow — the materialized view of the
/// latest transition. The history log, not this record, is the source of
/// truth for what happened and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewWorkflow {
    pub id: String,
    pub item_type: ItemType,
    pub item_id: String,
    pub engagement: String,
    pub status: ReviewStatus,
    pub assigned_reviewer: Option<String>,
    pub submitted_for_review_at: Option<DateTime<Utc>>,
    pub submitted_for_review_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_comments: Option<String>,
    pub signed_off_at: Option<DateTime<Utc>>,
    pub signed_off_by: Option<String>,
    pub sign_off_comments: Option<String>,
    pub reopened_at: Option<DateTime<Utc>>,
    pub reopened_by: Option<String>,
    pub reopen_reason: Option<String>,
    /// Derived from `status` but persisted for fast external checks.
    pub is_locked: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    /// Deduplicated, kept sorted for deterministic listings.
    pub tags: Vec<String>,
    pub notes: Vec<WorkflowNote>,
    /// Domain version. Starts at 1 and increments only on reopen.
    pub version: u32,
    /// The pre-increment version, present only after at least one reopen.
    pub previous_version: Option<u32>,
    /// A superseded record no longer counts against the natural-key
    /// uniqueness constraint. Nothing in the engine flips this; it exists so
    /// retired workflows stay queryable for audit.
    pub superseded: bool,
    /// Maintained by the store.
    pub created_at: DateTime<Utc>,
    /// Maintained by the store.
    pub updated_at: DateTime<Utc>,
}

impl ReviewWorkflow {
    /// A fresh workflow for `key`, resting in `InProgress`. The store stamps
    /// `created_at`/`updated_at` on insert.
    pub fn new(id: impl Into<String>, key: WorkflowKey) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            id: id.into(),
            item_type: key.item_type,
            item_id: key.item_id,
            engagement: key.engagement,
            status: ReviewStatus::InProgress,
            assigned_reviewer: None,
            submitted_for_review_at: None,
            submitted_for_review_by: None,
            reviewed_at: None,
            reviewed_by: None,
            review_comments: None,
            signed_off_at: None,
            signed_off_by: None,
            sign_off_comments: None,
            reopened_at: None,
            reopened_by: None,
            reopen_reason: None,
            is_locked: false,
            priority: Priority::default(),
            due_date: None,
            tags: Vec::new(),
            notes: Vec::new(),
            version: 1,
            previous_version: None,
            superseded: false,
            created_at: epoch,
            updated_at: epoch,
        }
    }

    pub fn key(&self) -> WorkflowKey {
        WorkflowKey {
            item_type: self.item_type,
            item_id: self.item_id.clone(),
            engagement: self.engagement.clone(),
        }
    }

    /// Reset the per-cycle review fields so a resubmitted or reopened
    /// workflow re-enters the claim queue cleanly. History retains the
    /// cleared values.
    pub(crate) fn clear_review_cycle(&mut self) {
        self.assigned_reviewer = None;
        self.submitted_for_review_at = None;
        self.submitted_for_review_by = None;
        self.reviewed_at = None;
        self.reviewed_by = None;
        self.review_comments = None;
    }
}

/// One immutable record of a single transition, forming the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewHistoryEntry {
    pub id: String,
    pub workflow_id: String,
    pub item_type: ItemType,
    pub item_id: String,
    pub engagement: String,
    /// Transition label, e.g. "submitted-for-review", "signed-off".
    pub action: String,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
    pub previous_status: ReviewStatus,
    pub new_status: ReviewStatus,
    pub comments: Option<String>,
    /// Transition-specific facts, e.g. version-before/after on reopen.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A requested transition, with its transition-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "action", content = "payload")]
pub enum ReviewAction {
    Submit,
    Claim,
    Approve { comments: Option<String> },
    Reject { comments: Option<String> },
    SignOff { comments: Option<String> },
    Resubmit,
    Reopen { reason: String },
}

impl ReviewAction {
    /// The history/audit label this action produces on success.
    pub fn label(&self) -> &'static str {
        match self {
            ReviewAction::Submit => "submitted-for-review",
            ReviewAction::Claim => "claimed-for-review",
            ReviewAction::Approve { .. } => "approved",
            ReviewAction::Reject { .. } => "rejected",
            ReviewAction::SignOff { .. } => "signed-off",
            ReviewAction::Resubmit => "resubmitted",
            ReviewAction::Reopen { .. } => "re-opened",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
