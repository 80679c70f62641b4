//! Engine error taxonomy.
//!
//! Every error carries a machine-readable [`ErrorKind`]. Only transport
//! failures are worth retrying, and the engine never retries on its own.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::role::{FunctionLevel, UserId};
use crate::task::{TaskAction, TaskError, TaskId, TaskStatus};

/// Machine-readable error classification, shared with the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidTransition,
    Forbidden,
    NoEligibleApprover,
    Transport,
    TaskBusy,
    NotFound,
    InvalidResponse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NoEligibleApprover => "no_eligible_approver",
            ErrorKind::Transport => "transport",
            ErrorKind::TaskBusy => "task_busy",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidResponse => "invalid_response",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an actor was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForbiddenReason {
    #[error("only the worksheet owner can do this")]
    NotOwner,

    #[error("you cannot sign off your own task")]
    SelfApproval,

    #[error("function level {actual} is below the required {required}")]
    InsufficientRank {
        required: FunctionLevel,
        actual: FunctionLevel,
    },

    #[error("you are not the approver of this task (approver: {approver})")]
    NotApprover { approver: UserId },

    #[error("the worksheet belongs to another team")]
    OutsideTeam,

    #[error("{0} cannot approve this task")]
    ApproverNotEligible(UserId),

    /// Refusal reported by the remote store.
    #[error("{0}")]
    Denied(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Invalid transition: cannot {action} a task in status {from}")]
    InvalidTransition { from: TaskStatus, action: TaskAction },

    /// Transition refused by the store without local context.
    #[error("Invalid transition: {0}")]
    RemoteInvalidTransition(String),

    #[error("Forbidden: {0}")]
    Forbidden(ForbiddenReason),

    #[error("No eligible approver for this task")]
    NoEligibleApprover,

    #[error(
        "Transport error{}: {}",
        .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default(),
        .message
    )]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Task {0} already has a transition in flight")]
    TaskBusy(TaskId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response from store: {0}")]
    InvalidResponse(String),
}

impl EngineError {
    pub fn transport(message: impl Into<String>) -> Self {
        EngineError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidTransition { .. } | EngineError::RemoteInvalidTransition(_) => {
                ErrorKind::InvalidTransition
            }
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::NoEligibleApprover => ErrorKind::NoEligibleApprover,
            EngineError::Transport { .. } => ErrorKind::Transport,
            EngineError::TaskBusy(_) => ErrorKind::TaskBusy,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }

    /// Whether the caller may retry. Transitions are not idempotent, so the
    /// engine itself never does.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Transport { .. } | EngineError::TaskBusy(_)
        )
    }

    /// Build an error from a store error body.
    pub fn from_remote(kind: ErrorKind, message: String, status: Option<u16>) -> Self {
        match kind {
            ErrorKind::InvalidTransition => EngineError::RemoteInvalidTransition(message),
            ErrorKind::Forbidden => EngineError::Forbidden(ForbiddenReason::Denied(message)),
            ErrorKind::NoEligibleApprover => EngineError::NoEligibleApprover,
            ErrorKind::NotFound => EngineError::NotFound(message),
            ErrorKind::InvalidResponse => EngineError::InvalidResponse(message),
            ErrorKind::Transport | ErrorKind::TaskBusy => {
                EngineError::Transport { status, message }
            }
        }
    }
}

impl From<ForbiddenReason> for EngineError {
    fn from(reason: ForbiddenReason) -> Self {
        EngineError::Forbidden(reason)
    }
}

impl From<TaskError> for EngineError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::InvalidTransition { from, action } => {
                EngineError::InvalidTransition { from, action }
            }
            TaskError::MissingApprover => EngineError::NoEligibleApprover,
            TaskError::UnknownStatus(_) => EngineError::InvalidResponse(err.to_string()),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(EngineError::transport("timeout").is_retryable());
        assert!(!EngineError::NoEligibleApprover.is_retryable());
        assert!(!EngineError::Forbidden(ForbiddenReason::NotOwner).is_retryable());
        assert!(!EngineError::InvalidTransition {
            from: TaskStatus::Approved,
            action: TaskAction::Accept
        }
        .is_retryable());
    }

    #[test]
    fn test_forbidden_messages_distinguish_cause() {
        let rank = EngineError::Forbidden(ForbiddenReason::InsufficientRank {
            required: FunctionLevel(3),
            actual: FunctionLevel(1),
        });
        let approver = EngineError::Forbidden(ForbiddenReason::NotApprover {
            approver: UserId::new("x"),
        });
        assert_eq!(rank.kind(), ErrorKind::Forbidden);
        assert!(rank.to_string().contains("below the required 3"));
        assert!(approver.to_string().contains("not the approver"));
    }

    #[test]
    fn test_transport_display() {
        let err = EngineError::Transport {
            status: Some(502),
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Transport error (HTTP 502): bad gateway");
        assert_eq!(
            EngineError::transport("reset").to_string(),
            "Transport error: reset"
        );
    }

    #[test]
    fn test_kind_wire_names() {
        let kind: ErrorKind = serde_json::from_str("\"no_eligible_approver\"").unwrap();
        assert_eq!(kind, ErrorKind::NoEligibleApprover);
        assert_eq!(
            EngineError::from_remote(kind, "none".into(), Some(422)),
            EngineError::NoEligibleApprover
        );
    }
}
