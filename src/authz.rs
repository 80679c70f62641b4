//! Authorization resolver.
//!
//! Single place that decides whether an actor may trigger an action on a
//! task. Two gates, evaluated in order:
//!
//! 1. State legality: the action must be in the transition table for the
//!    task's status. Capability is never consulted for illegal pairs.
//! 2. Actor legality: owners run their own approval queue, supervisory
//!    actions need the category threshold or the approver assignment.

use crate::error::{EngineError, EngineResult, ForbiddenReason};
use crate::role::{Actor, ApprovalPolicy};
use crate::task::{transition, ActorClass, Task, TaskAction, Transition};
use crate::worksheet::Worksheet;

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationResolver {
    policy: ApprovalPolicy,
}

impl AuthorizationResolver {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self { policy }
    }

    /// Decide whether `actor` may perform `action` on `task`.
    ///
    /// Returns the matching transition when allowed.
    ///
    /// # Errors
    /// - `InvalidTransition` when the action is illegal from the task status
    /// - `Forbidden` when the actor lacks the right to trigger it
    pub fn authorize(
        &self,
        worksheet: &Worksheet,
        task: &Task,
        actor: &Actor,
        action: TaskAction,
    ) -> EngineResult<Transition> {
        let rule = transition(task.status, action)?;
        let is_owner = worksheet.is_owner(&actor.id);

        match rule.actor {
            ActorClass::Owner => {
                if !is_owner {
                    // Acting on the member's behalf needs management rights.
                    self.check_rank(worksheet, task, actor)
                        .map_err(|_| EngineError::Forbidden(ForbiddenReason::NotOwner))?;
                }
            }
            ActorClass::Supervisor => {
                if is_owner {
                    return Err(ForbiddenReason::SelfApproval.into());
                }
                self.check_supervisor(worksheet, task, actor)?;
            }
            ActorClass::OwnerOrSupervisor => {
                if !is_owner {
                    self.check_supervisor(worksheet, task, actor)?;
                }
            }
        }

        Ok(rule)
    }

    /// Actions `actor` could currently perform on `task`.
    pub fn permitted_actions(
        &self,
        worksheet: &Worksheet,
        task: &Task,
        actor: &Actor,
    ) -> Vec<TaskAction> {
        TaskAction::ALL
            .into_iter()
            .filter(|action| self.authorize(worksheet, task, actor, *action).is_ok())
            .collect()
    }

    /// Assigned approver, or rank plus team reach.
    fn check_supervisor(&self, worksheet: &Worksheet, task: &Task, actor: &Actor) -> EngineResult<()> {
        if task.is_approver(&actor.id) {
            return Ok(());
        }
        self.check_rank(worksheet, task, actor)
            .map_err(|reason| match &task.approver {
                Some(approver) if matches!(reason, ForbiddenReason::InsufficientRank { .. }) => {
                    ForbiddenReason::NotApprover {
                        approver: approver.clone(),
                    }
                }
                _ => reason,
            })
            .map_err(EngineError::Forbidden)
    }

    fn check_rank(
        &self,
        worksheet: &Worksheet,
        task: &Task,
        actor: &Actor,
    ) -> Result<(), ForbiddenReason> {
        let required = self.policy.threshold(task.category);
        if !actor.function_level.meets(required) {
            return Err(ForbiddenReason::InsufficientRank {
                required,
                actual: actor.function_level,
            });
        }
        if !actor.reaches_team(worksheet.team.as_ref()) {
            return Err(ForbiddenReason::OutsideTeam);
        }
        Ok(())
    }
}
