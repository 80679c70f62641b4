//! Worksheet progress aggregation.
//!
//! Everything here is derived from the task list on demand. Nothing is
//! stored, so progress cannot drift from the tasks it summarizes.

use serde::Serialize;

use crate::role::UserId;
use crate::task::{Task, TaskCategory, TaskStatus};
use crate::worksheet::{Worksheet, WorksheetId};

/// `round(100 * approved / total)`, half rounded up; `0` when `total == 0`.
pub fn completion_percentage(approved: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let approved = approved.min(total) as u64;
    let total = total as u64;
    ((200 * approved + total) / (2 * total)) as u8
}

/// Per-status counts of a group of tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub todo: usize,
    pub awaiting_approval: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn of<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = StatusCounts::default();
        for task in tasks {
            match task.status {
                TaskStatus::Todo => counts.todo += 1,
                TaskStatus::AwaitingApproval => counts.awaiting_approval += 1,
                TaskStatus::Approved => counts.approved += 1,
                TaskStatus::Rejected => counts.rejected += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.todo + self.awaiting_approval + self.approved + self.rejected
    }
}

/// Tasks of one group, sorted by `order`, with their progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskGroup {
    pub tasks: Vec<Task>,
    pub counts: StatusCounts,
    pub completion_percentage: u8,
}

impl TaskGroup {
    fn from_tasks(mut tasks: Vec<Task>) -> Self {
        tasks.sort_by_key(|t| t.order);
        let counts = StatusCounts::of(&tasks);
        Self {
            completion_percentage: completion_percentage(counts.approved, counts.total()),
            counts,
            tasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub general: TaskGroup,
    pub individual: TaskGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorksheetProgress {
    pub combined: TaskGroup,
    /// Present only when both categories have tasks.
    pub by_category: Option<CategoryBreakdown>,
}

impl WorksheetProgress {
    pub fn of(tasks: &[Task]) -> Self {
        let (general, individual): (Vec<Task>, Vec<Task>) = tasks
            .iter()
            .cloned()
            .partition(|t| t.category == TaskCategory::General);

        let by_category = if !general.is_empty() && !individual.is_empty() {
            Some(CategoryBreakdown {
                general: TaskGroup::from_tasks(general),
                individual: TaskGroup::from_tasks(individual),
            })
        } else {
            None
        };

        Self {
            combined: TaskGroup::from_tasks(tasks.to_vec()),
            by_category,
        }
    }

    pub fn completion_percentage(&self) -> u8 {
        self.combined.completion_percentage
    }

    pub fn is_complete(&self) -> bool {
        let counts = &self.combined.counts;
        counts.total() > 0 && counts.approved == counts.total()
    }
}

impl Worksheet {
    pub fn progress(&self) -> WorksheetProgress {
        WorksheetProgress::of(&self.tasks)
    }
}

/// A task waiting for a given approver's decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub worksheet_id: WorksheetId,
    pub worksheet_name: String,
    pub owner: UserId,
    pub task: Task,
}

/// Tasks submitted to `approver` across non-archived worksheets.
pub fn awaiting_review(worksheets: &[Worksheet], approver: &UserId) -> Vec<ReviewItem> {
    worksheets
        .iter()
        .filter(|ws| !ws.is_archived)
        .flat_map(|ws| {
            ws.tasks
                .iter()
                .filter(|t| t.status == TaskStatus::AwaitingApproval && t.is_approver(approver))
                .map(move |t| ReviewItem {
                    worksheet_id: ws.id,
                    worksheet_name: ws.name.clone(),
                    owner: ws.owner.clone(),
                    task: t.clone(),
                })
        })
        .collect()
}
