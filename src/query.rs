use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::types::{ItemType, Priority, ReviewStatus, ReviewWorkflow};

/// Conjunctive filter over workflow listings. Empty filter matches every
/// non-superseded record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFilter {
    pub status: Option<ReviewStatus>,
    pub engagement: Option<String>,
    pub item_type: Option<ItemType>,
    pub assigned_reviewer: Option<String>,
    pub priority: Option<Priority>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    /// Matches records whose due date has passed at the given instant and
    /// which are not yet signed off. Intended for the external overdue
    /// sweep; the engine only answers the query.
    pub overdue_as_of: Option<DateTime<Utc>>,
}

impl WorkflowFilter {
    pub fn by_engagement(engagement: impl Into<String>) -> Self {
        Self {
            engagement: Some(engagement.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ReviewStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_item_type(mut self, item_type: ItemType) -> Self {
        self.item_type = Some(item_type);
        self
    }

    pub fn with_assigned_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.assigned_reviewer = Some(reviewer.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.due_from = from;
        self.due_to = to;
        self
    }

    /// Filter for the overdue sweep: due before `now`, not signed off.
    pub fn overdue_as_of(now: DateTime<Utc>) -> Self {
        Self {
            overdue_as_of: Some(now),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &ReviewWorkflow) -> bool {
        if record.superseded {
            return false;
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(engagement) = &self.engagement {
            if &record.engagement != engagement {
                return false;
            }
        }
        if let Some(item_type) = self.item_type {
            if record.item_type != item_type {
                return false;
            }
        }
        if let Some(reviewer) = &self.assigned_reviewer {
            if record.assigned_reviewer.as_deref() != Some(reviewer.as_str()) {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if record.priority != priority {
                return false;
            }
        }
        if let Some(from) = self.due_from {
            match record.due_date {
                Some(due) if due >= from => {}
                _ => return false,
            }
        }
        if let Some(to) = self.due_to {
            match record.due_date {
                Some(due) if due <= to => {}
                _ => return false,
            }
        }
        if let Some(now) = self.overdue_as_of {
            let overdue = record
                .due_date
                .map_or(false, |due| due < now && record.status != ReviewStatus::SignedOff);
            if !overdue {
                return false;
            }
        }
        true
    }
}

/// Offset/limit page request. A zero limit asks the service for its
/// configured default page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    pub fn next(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

/// One page of a listing, with the total match count for the filter so
/// callers can derive page counts without a second query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl<T> PageResult<T> {
    pub fn has_more(&self) -> bool {
        self.offset + self.items.len() < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::WorkflowKey;
    use chrono::Duration;

    fn record() -> ReviewWorkflow {
        let mut workflow = ReviewWorkflow::new(
            "wf-1",
            WorkflowKey::new(ItemType::ChecklistItem, "c-1", "E1"),
        );
        workflow.status = ReviewStatus::UnderReview;
        workflow.assigned_reviewer = Some("r1".to_string());
        workflow.priority = Priority::High;
        workflow
    }

    #[test]
    fn test_empty_filter_matches_active_records_only() {
        let active = record();
        assert!(WorkflowFilter::default().matches(&active));

        let mut superseded = record();
        superseded.superseded = true;
        assert!(!WorkflowFilter::default().matches(&superseded));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let filter = WorkflowFilter::by_engagement("E1")
            .with_status(ReviewStatus::UnderReview)
            .with_assigned_reviewer("r1");
        assert!(filter.matches(&record()));

        let wrong_engagement = WorkflowFilter::by_engagement("E2")
            .with_status(ReviewStatus::UnderReview);
        assert!(!wrong_engagement.matches(&record()));

        let wrong_status =
            WorkflowFilter::by_engagement("E1").with_status(ReviewStatus::SignedOff);
        assert!(!wrong_status.matches(&record()));
    }

    #[test]
    fn test_due_range_requires_a_due_date() {
        let now = Utc::now();
        let ranged = WorkflowFilter::default().with_due_range(None, Some(now));
        assert!(!ranged.matches(&record()));

        let mut due_yesterday = record();
        due_yesterday.due_date = Some(now - Duration::days(1));
        assert!(ranged.matches(&due_yesterday));
    }

    #[test]
    fn test_overdue_excludes_signed_off_and_future_due_dates() {
        let now = Utc::now();
        let filter = WorkflowFilter::overdue_as_of(now);

        let mut overdue = record();
        overdue.due_date = Some(now - Duration::hours(1));
        assert!(filter.matches(&overdue));

        let mut future = record();
        future.due_date = Some(now + Duration::hours(1));
        assert!(!filter.matches(&future));

        let mut signed_off = overdue.clone();
        signed_off.status = ReviewStatus::SignedOff;
        assert!(!filter.matches(&signed_off));

        assert!(!filter.matches(&record()));
    }

    #[test]
    fn test_page_result_has_more() {
        let page = PageResult {
            items: vec![1, 2, 3],
            total: 7,
            offset: 0,
            limit: 3,
        };
        assert!(page.has_more());

        let last = PageResult {
            items: vec![7],
            total: 7,
            offset: 6,
            limit: 3,
        };
        assert!(!last.has_more());
    }
}
