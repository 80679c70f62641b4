//! Transition table of the task approval state machine.
//!
//! Pure: `(status, action) -> Transition`, no actor or store involved.

use serde::{Deserialize, Serialize};

use super::task::{TaskError, TaskStatus};

/// An action that moves a task between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    /// Put the task into the approval queue of a chosen approver.
    Submit,
    /// Withdraw a pending submission.
    Unsubmit,
    /// Sign off the task.
    Accept,
    /// Refuse a submission or revoke an approval.
    Reject,
    /// Reset a rejected task back to `Todo`.
    Clear,
}

impl TaskAction {
    pub const ALL: [TaskAction; 5] = [
        TaskAction::Submit,
        TaskAction::Unsubmit,
        TaskAction::Accept,
        TaskAction::Reject,
        TaskAction::Clear,
    ];

    /// URL path segment of the remote endpoint.
    pub fn endpoint(&self) -> &'static str {
        match self {
            TaskAction::Submit => "submit",
            TaskAction::Unsubmit => "unsubmit",
            TaskAction::Accept => "accept",
            TaskAction::Reject => "reject",
            TaskAction::Clear => "clear-status",
        }
    }
}

impl std::fmt::Display for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskAction::Submit => "submit",
            TaskAction::Unsubmit => "unsubmit",
            TaskAction::Accept => "accept",
            TaskAction::Reject => "reject",
            TaskAction::Clear => "clear",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TaskAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submit" => Ok(TaskAction::Submit),
            "unsubmit" => Ok(TaskAction::Unsubmit),
            "accept" => Ok(TaskAction::Accept),
            "reject" => Ok(TaskAction::Reject),
            "clear" | "clear-status" => Ok(TaskAction::Clear),
            other => Err(format!("unknown task action '{}'", other)),
        }
    }
}

/// Who is entitled to trigger a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorClass {
    /// The worksheet owner managing their own approval queue.
    Owner,
    /// A sufficiently ranked user or the task's assigned approver.
    Supervisor,
    /// Either of the above.
    OwnerOrSupervisor,
}

/// Effect of a transition on the task's `approver` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproverEffect {
    SetChosen,
    Clear,
    SetActor,
    SetActorIfUnset,
}

/// Outcome of a legal `(status, action)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: TaskStatus,
    pub actor: ActorClass,
    pub approver: ApproverEffect,
}

/// Look up the transition for `action` from `from`.
///
/// # Errors
/// `TaskError::InvalidTransition` for every pair outside the table.
pub fn transition(from: TaskStatus, action: TaskAction) -> Result<Transition, TaskError> {
    use ActorClass::*;
    use TaskAction::*;
    use TaskStatus::*;

    let (to, actor, approver) = match (from, action) {
        (Todo | Rejected, Submit) => (AwaitingApproval, Owner, ApproverEffect::SetChosen),
        (AwaitingApproval, Unsubmit) => (Todo, Owner, ApproverEffect::Clear),
        (Todo | AwaitingApproval | Rejected, Accept) => {
            (Approved, Supervisor, ApproverEffect::SetActorIfUnset)
        }
        (AwaitingApproval | Approved, Reject) => (Rejected, Supervisor, ApproverEffect::SetActor),
        (Rejected, Clear) => (Todo, OwnerOrSupervisor, ApproverEffect::Clear),
        (Approved | AwaitingApproval, Submit)
        | (Todo | Approved | Rejected, Unsubmit)
        | (Approved, Accept)
        | (Todo | Rejected, Reject)
        | (Todo | AwaitingApproval | Approved, Clear) => {
            return Err(TaskError::InvalidTransition { from, action });
        }
    };

    Ok(Transition {
        to,
        actor,
        approver,
    })
}

/// Actions that are legal from `status`, in declaration order.
pub fn available_actions(status: TaskStatus) -> Vec<TaskAction> {
    TaskAction::ALL
        .into_iter()
        .filter(|action| transition(status, *action).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table() {
        use TaskAction::*;
        use TaskStatus::*;

        let legal = [
            (Todo, Submit, AwaitingApproval),
            (Rejected, Submit, AwaitingApproval),
            (AwaitingApproval, Unsubmit, Todo),
            (Todo, Accept, Approved),
            (AwaitingApproval, Accept, Approved),
            (Rejected, Accept, Approved),
            (AwaitingApproval, Reject, Rejected),
            (Approved, Reject, Rejected),
            (Rejected, Clear, Todo),
        ];

        let mut legal_count = 0;
        for from in TaskStatus::ALL {
            for action in TaskAction::ALL {
                let expected = legal
                    .iter()
                    .find(|(f, a, _)| *f == from && *a == action)
                    .map(|(_, _, to)| *to);
                match (transition(from, action), expected) {
                    (Ok(t), Some(to)) => {
                        assert_eq!(t.to, to);
                        legal_count += 1;
                    }
                    (Err(TaskError::InvalidTransition { from: f, action: a }), None) => {
                        assert_eq!((f, a), (from, action));
                    }
                    (other, expected) => {
                        panic!("{action} from {from}: got {other:?}, expected {expected:?}")
                    }
                }
            }
        }
        assert_eq!(legal_count, legal.len());
    }

    #[test]
    fn test_actor_classes() {
        assert_eq!(
            transition(TaskStatus::Todo, TaskAction::Submit).unwrap().actor,
            ActorClass::Owner
        );
        assert_eq!(
            transition(TaskStatus::Approved, TaskAction::Reject)
                .unwrap()
                .actor,
            ActorClass::Supervisor
        );
        assert_eq!(
            transition(TaskStatus::Rejected, TaskAction::Clear).unwrap().actor,
            ActorClass::OwnerOrSupervisor
        );
    }

    #[test]
    fn test_available_actions() {
        assert_eq!(
            available_actions(TaskStatus::Rejected),
            vec![TaskAction::Submit, TaskAction::Accept, TaskAction::Clear]
        );
        assert_eq!(
            available_actions(TaskStatus::Approved),
            vec![TaskAction::Reject]
        );
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("clear-status".parse::<TaskAction>(), Ok(TaskAction::Clear));
        assert_eq!(TaskAction::Clear.endpoint(), "clear-status");
        assert!("approve".parse::<TaskAction>().is_err());
    }
}
