//! Action dispatcher.
//!
//! The entry point callers use to move tasks through their lifecycle:
//!
//! 1. Reserve the task (at most one transition in flight per task)
//! 2. Run the authorization resolver locally (advisory fast-fail)
//! 3. For submissions, make sure an eligible approver exists
//! 4. Send the transition to the store
//! 5. Replace the local task with the returned one and recompute progress
//!
//! Steps 4 and 5 run on a spawned task that owns the reservation. Dropping
//! the caller's future does not abandon a request that was already sent:
//! the task stays reserved until the store answers and the answer is
//! applied.
//!
//! Local task state is only ever replaced by what the store returns. A
//! failed request leaves it untouched.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use futures::future::try_join_all;
use tracing::{info, warn};

use crate::approvers::ApproverCandidate;
use crate::authz::AuthorizationResolver;
use crate::error::{EngineError, EngineResult, ForbiddenReason};
use crate::progress::{awaiting_review, ReviewItem, WorksheetProgress};
use crate::remote::{TaskRemote, TransitionRequest};
use crate::role::{Actor, ApprovalPolicy, UserId};
use crate::task::{Task, TaskAction, TaskId};
use crate::worksheet::{Worksheet, WorksheetId};

/// Result of a successful transition.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The task as returned by the store.
    pub task: Task,
    /// Worksheet progress after applying it.
    pub progress: WorksheetProgress,
}

type TaskKey = (WorksheetId, TaskId);

/// Tracked worksheets and the tasks with a transition in flight.
#[derive(Default)]
struct LocalState {
    worksheets: RwLock<HashMap<WorksheetId, Worksheet>>,
    in_flight: Mutex<HashSet<TaskKey>>,
}

impl LocalState {
    fn reserve(self: &Arc<Self>, worksheet: WorksheetId, task: TaskId) -> EngineResult<InFlight> {
        let key = (worksheet, task);
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !set.insert(key) {
            return Err(EngineError::TaskBusy(task));
        }
        Ok(InFlight {
            state: Arc::clone(self),
            key,
        })
    }

    fn snapshot(&self, worksheet: WorksheetId, task: TaskId) -> EngineResult<(Worksheet, Task)> {
        let worksheets = self
            .worksheets
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let ws = worksheets
            .get(&worksheet)
            .ok_or_else(|| EngineError::NotFound(format!("worksheet {}", worksheet)))?;
        let found = ws
            .task(task)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("task {} in worksheet {}", task, worksheet)))?;
        Ok((ws.clone(), found))
    }

    fn apply(&self, worksheet: WorksheetId, task: Task) -> EngineResult<WorksheetProgress> {
        let mut worksheets = self
            .worksheets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let ws = worksheets
            .get_mut(&worksheet)
            .ok_or_else(|| EngineError::NotFound(format!("worksheet {}", worksheet)))?;
        let task_id = task.id;
        if !ws.replace_task(task) {
            return Err(EngineError::NotFound(format!(
                "task {} in worksheet {}",
                task_id, worksheet
            )));
        }
        Ok(ws.progress())
    }
}

/// Releases a task reservation when dropped.
struct InFlight {
    state: Arc<LocalState>,
    key: TaskKey,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.state
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct ActionDispatcher<R> {
    remote: Arc<R>,
    authz: AuthorizationResolver,
    state: Arc<LocalState>,
}

impl<R: TaskRemote + 'static> ActionDispatcher<R> {
    pub fn new(remote: R, policy: ApprovalPolicy) -> Self {
        Self {
            remote: Arc::new(remote),
            authz: AuthorizationResolver::new(policy),
            state: Arc::new(LocalState::default()),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Start tracking a worksheet snapshot obtained elsewhere.
    pub fn track(&self, worksheet: Worksheet) {
        self.state
            .worksheets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(worksheet.id, worksheet);
    }

    /// Load (or reload) a worksheet from the store.
    pub async fn refresh(&self, worksheet: WorksheetId) -> EngineResult<Worksheet> {
        let fresh = self.remote.fetch_worksheet(worksheet).await?;
        if fresh.id != worksheet {
            return Err(EngineError::InvalidResponse(format!(
                "asked for worksheet {}, got {}",
                worksheet, fresh.id
            )));
        }
        self.track(fresh.clone());
        Ok(fresh)
    }

    /// Reload several worksheets concurrently. Fails on the first error.
    pub async fn refresh_all(&self, worksheets: &[WorksheetId]) -> EngineResult<Vec<Worksheet>> {
        try_join_all(worksheets.iter().map(|id| self.refresh(*id))).await
    }

    pub fn worksheet(&self, worksheet: WorksheetId) -> Option<Worksheet> {
        self.state
            .worksheets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&worksheet)
            .cloned()
    }

    pub fn progress(&self, worksheet: WorksheetId) -> Option<WorksheetProgress> {
        self.state
            .worksheets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&worksheet)
            .map(Worksheet::progress)
    }

    /// Actions `actor` may currently take on a tracked task.
    pub fn permitted_actions(
        &self,
        actor: &Actor,
        worksheet: WorksheetId,
        task: TaskId,
    ) -> EngineResult<Vec<TaskAction>> {
        let (ws, task) = self.state.snapshot(worksheet, task)?;
        Ok(self.authz.permitted_actions(&ws, &task, actor))
    }

    /// Ask the store who the task can be submitted to.
    pub async fn list_approvers(
        &self,
        worksheet: WorksheetId,
        task: TaskId,
    ) -> EngineResult<Vec<ApproverCandidate>> {
        self.state.snapshot(worksheet, task)?;
        self.remote.list_approvers(worksheet, task).await
    }

    /// Tasks submitted to `actor` and still awaiting a decision.
    pub async fn review_queue(&self, actor: &Actor) -> EngineResult<Vec<ReviewItem>> {
        let worksheets = self.remote.tasks_to_review().await?;
        Ok(awaiting_review(&worksheets, &actor.id))
    }

    pub async fn submit(
        &self,
        actor: &Actor,
        worksheet: WorksheetId,
        task: TaskId,
        approver: UserId,
    ) -> EngineResult<DispatchOutcome> {
        self.dispatch(actor, worksheet, task, TransitionRequest::Submit { approver })
            .await
    }

    pub async fn unsubmit(
        &self,
        actor: &Actor,
        worksheet: WorksheetId,
        task: TaskId,
    ) -> EngineResult<DispatchOutcome> {
        self.dispatch(actor, worksheet, task, TransitionRequest::Unsubmit)
            .await
    }

    pub async fn accept(
        &self,
        actor: &Actor,
        worksheet: WorksheetId,
        task: TaskId,
    ) -> EngineResult<DispatchOutcome> {
        self.dispatch(actor, worksheet, task, TransitionRequest::Accept)
            .await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        worksheet: WorksheetId,
        task: TaskId,
    ) -> EngineResult<DispatchOutcome> {
        self.dispatch(actor, worksheet, task, TransitionRequest::Reject)
            .await
    }

    pub async fn clear(
        &self,
        actor: &Actor,
        worksheet: WorksheetId,
        task: TaskId,
    ) -> EngineResult<DispatchOutcome> {
        self.dispatch(actor, worksheet, task, TransitionRequest::Clear)
            .await
    }

    /// Run one transition end to end.
    ///
    /// # Errors
    /// - `TaskBusy` if another transition of this task is still pending
    /// - `NotFound` if the worksheet or task is not tracked
    /// - `InvalidTransition` / `Forbidden` from the local pre-check or the store
    /// - `NoEligibleApprover` before any transition request is sent
    /// - `Transport` when the store could not be reached
    pub async fn dispatch(
        &self,
        actor: &Actor,
        worksheet: WorksheetId,
        task_id: TaskId,
        request: TransitionRequest,
    ) -> EngineResult<DispatchOutcome> {
        let reservation = self.state.reserve(worksheet, task_id)?;
        let action = request.action();

        let (ws, task) = self.state.snapshot(worksheet, task_id)?;
        self.authz.authorize(&ws, &task, actor, action)?;

        if let Some(chosen) = request.approver() {
            let candidates = self.remote.list_approvers(worksheet, task_id).await?;
            if candidates.is_empty() {
                warn!(%worksheet, task = %task_id, "No eligible approver, submission blocked");
                return Err(EngineError::NoEligibleApprover);
            }
            if !candidates.iter().any(|c| &c.id == chosen) {
                return Err(ForbiddenReason::ApproverNotEligible(chosen.clone()).into());
            }
        }

        let remote = Arc::clone(&self.remote);
        let state = Arc::clone(&self.state);
        let actor_id = actor.id.clone();
        let settle = tokio::spawn(async move {
            let _reservation = reservation;

            let returned = match remote.transition(worksheet, task_id, &request).await {
                Ok(returned) => returned,
                Err(e) => {
                    warn!(%worksheet, task = %task_id, %action, kind = %e.kind(), "Task transition failed: {}", e);
                    return Err(e);
                }
            };

            if returned.id != task_id {
                return Err(EngineError::InvalidResponse(format!(
                    "transition of task {} returned task {}",
                    task_id, returned.id
                )));
            }
            check_against_mirror(&task, &returned, &actor_id, &request);

            let progress = state.apply(worksheet, returned.clone())?;
            info!(
                %worksheet,
                task = %task_id,
                %action,
                status = %returned.status,
                completion = progress.completion_percentage(),
                "Task transition applied"
            );

            Ok(DispatchOutcome {
                task: returned,
                progress,
            })
        });

        match settle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(EngineError::transport(format!(
                "transition of task {} was aborted: {}",
                task_id, e
            ))),
        }
    }
}

/// Compare the store's answer with the locally predicted transition.
/// Differences are logged only; the store's version always wins.
fn check_against_mirror(
    before: &Task,
    returned: &Task,
    actor: &UserId,
    request: &TransitionRequest,
) {
    let mut expected = before.clone();
    if expected
        .apply(request.action(), actor, request.approver(), Utc::now())
        .is_ok()
        && (expected.status != returned.status || expected.approver != returned.approver)
    {
        warn!(
            task = %returned.id,
            expected_status = %expected.status,
            returned_status = %returned.status,
            "Store returned a different task state than predicted"
        );
    }
    if !returned.approver_consistent() {
        warn!(
            task = %returned.id,
            status = %returned.status,
            approver = ?returned.approver,
            "Store returned a task with inconsistent approver"
        );
    }
}
