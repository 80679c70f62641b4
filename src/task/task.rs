//! Core Task type as exchanged with the authoritative store.
//!
//! # Invariants
//! - `approver.is_some()` iff `status != Todo`
//! - `approval_date.is_some()` only while `status == Approved`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transition::{transition, ApproverEffect, TaskAction};
use crate::role::UserId;

/// Unique identifier for a task within its worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Which requirement group a task belongs to. Selects the capability
/// threshold that gates supervisory actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    /// Skill or technique requirement.
    #[default]
    General,
    /// Personal growth requirement.
    Individual,
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskCategory::General => f.write_str("general"),
            TaskCategory::Individual => f.write_str("individual"),
        }
    }
}

/// Status of a task in its approval lifecycle.
///
/// # State Machine
/// ```text
/// Todo -> AwaitingApproval -> Approved
///   ^          |    \            |
///   |          v     \-> Rejected <-/
///   +---- (unsubmit)      |  |
///   +---------(clear)-----+  +-> AwaitingApproval (resubmit)
/// ```
///
/// Encoded on the wire as an integer, `0..=3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaskStatus {
    #[default]
    Todo,
    AwaitingApproval,
    Approved,
    Rejected,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::AwaitingApproval,
        TaskStatus::Approved,
        TaskStatus::Rejected,
    ];

    /// Whether a task in this status must carry an approver.
    pub fn requires_approver(&self) -> bool {
        !matches!(self, TaskStatus::Todo)
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Todo => 0,
            TaskStatus::AwaitingApproval => 1,
            TaskStatus::Approved => 2,
            TaskStatus::Rejected => 3,
        }
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = TaskError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TaskStatus::Todo),
            1 => Ok(TaskStatus::AwaitingApproval),
            2 => Ok(TaskStatus::Approved),
            3 => Ok(TaskStatus::Rejected),
            other => Err(TaskError::UnknownStatus(other)),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::AwaitingApproval => "AWAITING_APPROVAL",
            TaskStatus::Approved => "APPROVED",
            TaskStatus::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

/// A single checklist item of a worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    /// Display name, owned by worksheet editing.
    #[serde(rename = "task")]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub category: TaskCategory,

    /// Position within its category.
    #[serde(default)]
    pub order: i32,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub approver: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_name: Option<String>,

    #[serde(default)]
    pub approval_date: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a fresh task in `Todo`.
    pub fn new(name: impl Into<String>, category: TaskCategory, order: i32) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            description: None,
            category,
            order,
            status: TaskStatus::Todo,
            approver: None,
            approver_name: None,
            approval_date: None,
        }
    }

    /// Whether `user` is the task's assigned approver.
    pub fn is_approver(&self, user: &UserId) -> bool {
        self.approver.as_ref() == Some(user)
    }

    /// Check the approver/status invariant.
    pub fn approver_consistent(&self) -> bool {
        self.status.requires_approver() == self.approver.is_some()
            && (self.approval_date.is_none() || self.status == TaskStatus::Approved)
    }

    /// Apply `action` performed by `actor`.
    ///
    /// This is the authoritative mutation. Clients only run it on a copy to
    /// predict what the store should return.
    ///
    /// # Errors
    /// - `InvalidTransition` if `action` is not legal from the current status
    /// - `MissingApprover` if a submission names no approver
    pub fn apply(
        &mut self,
        action: TaskAction,
        actor: &UserId,
        chosen: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        let rule = transition(self.status, action)?;

        let approver = match rule.approver {
            ApproverEffect::SetChosen => Some(chosen.ok_or(TaskError::MissingApprover)?.clone()),
            ApproverEffect::Clear => None,
            ApproverEffect::SetActor => Some(actor.clone()),
            ApproverEffect::SetActorIfUnset => {
                Some(self.approver.clone().unwrap_or_else(|| actor.clone()))
            }
        };

        if approver != self.approver {
            self.approver_name = None;
        }
        self.approver = approver;
        self.status = rule.to;
        self.approval_date = match rule.to {
            TaskStatus::Approved => Some(now),
            _ => None,
        };
        Ok(())
    }
}

/// Errors that can occur during task operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Cannot {action} a task in status {from}")]
    InvalidTransition { from: TaskStatus, action: TaskAction },

    #[error("Unknown task status code {0}")]
    UnknownStatus(u8),

    #[error("Submission requires an approver")]
    MissingApprover,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    #[test]
    fn test_status_wire_encoding() {
        let task = Task::new("Make a fire", TaskCategory::General, 0);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], 0);
        assert_eq!(json["category"], "general");
        assert_eq!(json["task"], "Make a fire");

        let raw = serde_json::json!({
            "id": "7f0c9a4e-8a53-4f7a-9d57-7a0c1d7b6f11",
            "task": "Lead a hike",
            "category": "individual",
            "status": 1,
            "approver": "leader",
        });
        let parsed: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.status, TaskStatus::AwaitingApproval);
        assert_eq!(parsed.category, TaskCategory::Individual);
        assert_eq!(parsed.approver, Some(user("leader")));
        assert!(parsed.approver_consistent());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let raw = serde_json::json!({
            "id": "7f0c9a4e-8a53-4f7a-9d57-7a0c1d7b6f11",
            "task": "x",
            "status": 9,
        });
        assert!(serde_json::from_value::<Task>(raw).is_err());
    }

    #[test]
    fn test_invariant_across_every_transition() {
        let now = Utc::now();
        for status in TaskStatus::ALL {
            for action in TaskAction::ALL {
                let mut task = Task::new("t", TaskCategory::General, 0);
                task.status = status;
                if status.requires_approver() {
                    task.approver = Some(user("previous"));
                }
                if status == TaskStatus::Approved {
                    task.approval_date = Some(now);
                }
                assert!(task.approver_consistent());

                let before = task.clone();
                match task.apply(action, &user("actor"), Some(&user("chosen")), now) {
                    Ok(()) => assert!(
                        task.approver_consistent(),
                        "{action} from {status} broke the invariant: {task:?}"
                    ),
                    Err(e) => {
                        assert!(matches!(e, TaskError::InvalidTransition { .. }));
                        assert_eq!(task, before, "failed transition must not mutate");
                    }
                }
            }
        }
    }

    #[test]
    fn test_accept_keeps_existing_approver() {
        let now = Utc::now();
        let mut task = Task::new("t", TaskCategory::General, 0);
        task.apply(TaskAction::Submit, &user("owner"), Some(&user("x")), now)
            .unwrap();
        task.apply(TaskAction::Accept, &user("y"), None, now).unwrap();
        assert_eq!(task.approver, Some(user("x")));
        assert_eq!(task.approval_date, Some(now));

        let mut direct = Task::new("t", TaskCategory::General, 0);
        direct.apply(TaskAction::Accept, &user("y"), None, now).unwrap();
        assert_eq!(direct.status, TaskStatus::Approved);
        assert_eq!(direct.approver, Some(user("y")));
    }

    #[test]
    fn test_reject_takes_over_approver_and_clears_date() {
        let now = Utc::now();
        let mut task = Task::new("t", TaskCategory::General, 0);
        task.apply(TaskAction::Accept, &user("x"), None, now).unwrap();
        task.approver_name = Some("X".to_string());
        task.apply(TaskAction::Reject, &user("z"), None, now).unwrap();
        assert_eq!(task.status, TaskStatus::Rejected);
        assert_eq!(task.approver, Some(user("z")));
        assert_eq!(task.approver_name, None);
        assert_eq!(task.approval_date, None);
    }

    #[test]
    fn test_submit_requires_approver() {
        let mut task = Task::new("t", TaskCategory::General, 0);
        let err = task
            .apply(TaskAction::Submit, &user("owner"), None, Utc::now())
            .unwrap_err();
        assert_eq!(err, TaskError::MissingApprover);
        assert_eq!(task.status, TaskStatus::Todo);
    }
}
