//! In-memory authoritative store (non-persistent).
//!
//! Enforces the same rules a real store does: authorization, approver
//! eligibility and the transition table. Each [`InMemoryRemote`] is a
//! connection bound to one acting user.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{TaskRemote, TransitionRequest};
use crate::approvers::{ApproverCandidate, ApproverResolver, InMemoryDirectory, MemberDirectory};
use crate::authz::AuthorizationResolver;
use crate::error::{EngineError, EngineResult, ForbiddenReason};
use crate::role::{Actor, ApprovalPolicy};
use crate::task::{Task, TaskId, TaskStatus};
use crate::worksheet::{Worksheet, WorksheetId};

struct StoreInner {
    worksheets: RwLock<HashMap<WorksheetId, Worksheet>>,
    directory: InMemoryDirectory,
    authz: AuthorizationResolver,
    approvers: ApproverResolver,
    latency: Option<Duration>,
    transition_calls: AtomicUsize,
}

#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

impl InMemoryStore {
    pub fn new(policy: ApprovalPolicy, directory: InMemoryDirectory) -> Self {
        Self::build(policy, directory, None)
    }

    /// Store whose transition requests take `latency` to complete.
    pub fn with_latency(
        policy: ApprovalPolicy,
        directory: InMemoryDirectory,
        latency: Duration,
    ) -> Self {
        Self::build(policy, directory, Some(latency))
    }

    fn build(policy: ApprovalPolicy, directory: InMemoryDirectory, latency: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                worksheets: RwLock::new(HashMap::new()),
                directory,
                authz: AuthorizationResolver::new(policy),
                approvers: ApproverResolver::new(policy),
                latency,
                transition_calls: AtomicUsize::new(0),
            }),
        }
    }

    pub async fn insert_worksheet(&self, worksheet: Worksheet) {
        self.inner
            .worksheets
            .write()
            .await
            .insert(worksheet.id, worksheet);
    }

    pub async fn worksheet(&self, id: WorksheetId) -> Option<Worksheet> {
        self.inner.worksheets.read().await.get(&id).cloned()
    }

    /// Number of transition requests received, successful or not.
    pub fn transition_calls(&self) -> usize {
        self.inner.transition_calls.load(Ordering::SeqCst)
    }

    /// Open a connection acting as `actor`.
    pub fn connect(&self, actor: Actor) -> InMemoryRemote {
        InMemoryRemote {
            store: self.clone(),
            actor,
        }
    }
}

#[derive(Clone)]
pub struct InMemoryRemote {
    store: InMemoryStore,
    actor: Actor,
}

fn locate<'a>(
    worksheets: &'a HashMap<WorksheetId, Worksheet>,
    worksheet: WorksheetId,
    task: TaskId,
) -> EngineResult<(&'a Worksheet, &'a Task)> {
    let ws = worksheets
        .get(&worksheet)
        .ok_or_else(|| EngineError::NotFound(format!("worksheet {}", worksheet)))?;
    let task = ws
        .task(task)
        .ok_or_else(|| EngineError::NotFound(format!("task {} in worksheet {}", task, worksheet)))?;
    Ok((ws, task))
}

#[async_trait]
impl TaskRemote for InMemoryRemote {
    async fn fetch_worksheet(&self, worksheet: WorksheetId) -> EngineResult<Worksheet> {
        self.store
            .worksheet(worksheet)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("worksheet {}", worksheet)))
    }

    async fn transition(
        &self,
        worksheet: WorksheetId,
        task: TaskId,
        request: &TransitionRequest,
    ) -> EngineResult<Task> {
        let inner = &self.store.inner;
        inner.transition_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = inner.latency {
            tokio::time::sleep(latency).await;
        }

        let mut worksheets = inner.worksheets.write().await;
        let (ws, current) = locate(&worksheets, worksheet, task)?;
        let action = request.action();
        inner.authz.authorize(ws, current, &self.actor, action)?;

        if let Some(chosen) = request.approver() {
            let candidates = inner.approvers.resolve(ws, current, &inner.directory);
            if candidates.is_empty() {
                return Err(EngineError::NoEligibleApprover);
            }
            if !candidates.iter().any(|c| &c.id == chosen) {
                return Err(ForbiddenReason::ApproverNotEligible(chosen.clone()).into());
            }
        }

        let now = Utc::now();
        let mut updated = current.clone();
        updated.apply(action, &self.actor.id, request.approver(), now)?;
        if updated.approver_name.is_none() {
            updated.approver_name = updated
                .approver
                .as_ref()
                .and_then(|id| inner.directory.member(id))
                .map(|m| m.display_name);
        }

        if let Some(ws) = worksheets.get_mut(&worksheet) {
            ws.replace_task(updated.clone());
            ws.updated_at = Some(now);
        }
        Ok(updated)
    }

    async fn list_approvers(
        &self,
        worksheet: WorksheetId,
        task: TaskId,
    ) -> EngineResult<Vec<ApproverCandidate>> {
        let inner = &self.store.inner;
        let worksheets = inner.worksheets.read().await;
        let (ws, task) = locate(&worksheets, worksheet, task)?;
        Ok(inner.approvers.resolve(ws, task, &inner.directory))
    }

    async fn tasks_to_review(&self) -> EngineResult<Vec<Worksheet>> {
        let worksheets = self.store.inner.worksheets.read().await;
        let mut pending: Vec<Worksheet> = worksheets
            .values()
            .filter(|ws| !ws.is_archived)
            .filter_map(|ws| {
                let tasks: Vec<Task> = ws
                    .tasks
                    .iter()
                    .filter(|t| {
                        t.status == TaskStatus::AwaitingApproval && t.is_approver(&self.actor.id)
                    })
                    .cloned()
                    .collect();
                if tasks.is_empty() {
                    None
                } else {
                    Some(Worksheet {
                        tasks,
                        ..ws.clone()
                    })
                }
            })
            .collect();
        pending.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pending)
    }
}
