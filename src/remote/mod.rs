//! Access to the authoritative worksheet store.
//!
//! Supports:
//! - `http`: the REST API of the store (production)
//! - `memory`: an in-process authoritative store (tests, offline use)
//!
//! The acting user is bound to the remote connection itself (bearer token
//! for HTTP, session actor for memory), never passed per call.

mod http;
mod memory;

pub use http::HttpTaskRemote;
pub use memory::{InMemoryRemote, InMemoryStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::approvers::ApproverCandidate;
use crate::error::{EngineResult, ErrorKind};
use crate::role::UserId;
use crate::task::{Task, TaskAction, TaskId};
use crate::worksheet::{Worksheet, WorksheetId};

/// A transition request as sent to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRequest {
    Submit { approver: UserId },
    Unsubmit,
    Accept,
    Reject,
    Clear,
}

impl TransitionRequest {
    pub fn action(&self) -> TaskAction {
        match self {
            TransitionRequest::Submit { .. } => TaskAction::Submit,
            TransitionRequest::Unsubmit => TaskAction::Unsubmit,
            TransitionRequest::Accept => TaskAction::Accept,
            TransitionRequest::Reject => TaskAction::Reject,
            TransitionRequest::Clear => TaskAction::Clear,
        }
    }

    pub fn approver(&self) -> Option<&UserId> {
        match self {
            TransitionRequest::Submit { approver } => Some(approver),
            _ => None,
        }
    }
}

/// Body of a submit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBody {
    pub approver: UserId,
}

/// Error body returned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteErrorBody {
    #[serde(default)]
    pub kind: Option<ErrorKind>,
    #[serde(default)]
    pub detail: String,
}

/// Remote store trait - implemented by all store backends.
#[async_trait]
pub trait TaskRemote: Send + Sync {
    /// Fetch a worksheet with all its tasks.
    async fn fetch_worksheet(&self, worksheet: WorksheetId) -> EngineResult<Worksheet>;

    /// Perform a transition. Returns the task as stored afterwards.
    async fn transition(
        &self,
        worksheet: WorksheetId,
        task: TaskId,
        request: &TransitionRequest,
    ) -> EngineResult<Task>;

    /// Users the task can be submitted to, in presentation order.
    async fn list_approvers(
        &self,
        worksheet: WorksheetId,
        task: TaskId,
    ) -> EngineResult<Vec<ApproverCandidate>>;

    /// Worksheets holding tasks submitted to the connected user.
    async fn tasks_to_review(&self) -> EngineResult<Vec<Worksheet>>;

    async fn submit(
        &self,
        worksheet: WorksheetId,
        task: TaskId,
        approver: UserId,
    ) -> EngineResult<Task> {
        self.transition(worksheet, task, &TransitionRequest::Submit { approver })
            .await
    }

    async fn unsubmit(&self, worksheet: WorksheetId, task: TaskId) -> EngineResult<Task> {
        self.transition(worksheet, task, &TransitionRequest::Unsubmit)
            .await
    }

    async fn accept(&self, worksheet: WorksheetId, task: TaskId) -> EngineResult<Task> {
        self.transition(worksheet, task, &TransitionRequest::Accept)
            .await
    }

    async fn reject(&self, worksheet: WorksheetId, task: TaskId) -> EngineResult<Task> {
        self.transition(worksheet, task, &TransitionRequest::Reject)
            .await
    }

    async fn clear(&self, worksheet: WorksheetId, task: TaskId) -> EngineResult<Task> {
        self.transition(worksheet, task, &TransitionRequest::Clear)
            .await
    }
}
