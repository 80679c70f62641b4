//! REST client for the authoritative worksheet API.
//!
//! Requests are sent exactly once. A timeout after the request left the
//! process is ambiguous (the store may have applied it), so nothing here
//! retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{RemoteErrorBody, SubmitBody, TaskRemote, TransitionRequest};
use crate::approvers::ApproverCandidate;
use crate::config::Config;
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::task::{Task, TaskId};
use crate::worksheet::{Worksheet, WorksheetId};

#[derive(Clone)]
pub struct HttpTaskRemote {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl HttpTaskRemote {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(base_url, token, reqwest::Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        token: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client,
            token,
        }
    }

    pub fn from_config(config: &Config) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(
            config.api_url.clone(),
            config.api_token.clone(),
            client,
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn task_url(&self, worksheet: WorksheetId, task: TaskId, endpoint: &str) -> String {
        format!(
            "{}/worksheets/{}/tasks/{}/{}/",
            self.base_url, worksheet, task, endpoint
        )
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> EngineResult<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = request
            .send()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| EngineError::Transport {
                status: Some(status.as_u16()),
                message: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(error_from_response(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            EngineError::InvalidResponse(format!("{} (body: {})", e, text))
        })
    }
}

/// Classify a status code when the body carries no error kind.
fn classify_http_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        400 | 409 => ErrorKind::InvalidTransition,
        401 | 403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        422 => ErrorKind::NoEligibleApprover,
        _ => ErrorKind::Transport,
    }
}

fn error_from_response(status: StatusCode, body: &str) -> EngineError {
    let parsed: RemoteErrorBody = serde_json::from_str(body).unwrap_or_default();
    let kind = parsed
        .kind
        .unwrap_or_else(|| classify_http_status(status));
    let message = if !parsed.detail.is_empty() {
        parsed.detail
    } else if !body.trim().is_empty() {
        body.trim().to_string()
    } else {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    };
    EngineError::from_remote(kind, message, Some(status.as_u16()))
}

#[async_trait]
impl TaskRemote for HttpTaskRemote {
    async fn fetch_worksheet(&self, worksheet: WorksheetId) -> EngineResult<Worksheet> {
        let url = format!("{}/worksheets/{}/", self.base_url, worksheet);
        debug!(%url, "Fetching worksheet");
        self.send(self.client.get(&url)).await
    }

    async fn transition(
        &self,
        worksheet: WorksheetId,
        task: TaskId,
        request: &TransitionRequest,
    ) -> EngineResult<Task> {
        let url = self.task_url(worksheet, task, request.action().endpoint());
        debug!(%url, action = %request.action(), "Sending task transition");
        let builder = match request {
            TransitionRequest::Submit { approver } => self.client.post(&url).json(&SubmitBody {
                approver: approver.clone(),
            }),
            _ => self.client.post(&url),
        };
        self.send(builder).await
    }

    async fn list_approvers(
        &self,
        worksheet: WorksheetId,
        task: TaskId,
    ) -> EngineResult<Vec<ApproverCandidate>> {
        let url = self.task_url(worksheet, task, "approvers");
        debug!(%url, "Listing approvers");
        self.send(self.client.get(&url)).await
    }

    async fn tasks_to_review(&self) -> EngineResult<Vec<Worksheet>> {
        let url = format!("{}/worksheets/tasks/tbc/", self.base_url);
        debug!(%url, "Fetching tasks to review");
        self.send(self.client.get(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForbiddenReason;
    use crate::role::UserId;
    use crate::task::TaskStatus;
    use axum::extract::Path;
    use axum::http::{header, HeaderMap};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn task_json(id: &str, status: u8, approver: Value) -> Value {
        let approval_date = if status == 2 {
            json!("2025-06-01T10:00:00Z")
        } else {
            Value::Null
        };
        json!({
            "id": id,
            "task": "Pitch a tent",
            "description": null,
            "category": "general",
            "order": 0,
            "status": status,
            "approver": approver,
            "approval_date": approval_date,
        })
    }

    async fn accept_handler(
        Path((_ws, task)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> Response {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if auth != Some("Bearer secret") {
            return (
                axum::http::StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "missing token" })),
            )
                .into_response();
        }
        Json(task_json(&task, 2, json!("leader"))).into_response()
    }

    async fn submit_handler(
        Path((_ws, task)): Path<(String, String)>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        Json(task_json(&task, 1, body["approver"].clone()))
    }

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/worksheets/:ws/tasks/:task/accept/", post(accept_handler))
            .route("/worksheets/:ws/tasks/:task/submit/", post(submit_handler))
            .route(
                "/worksheets/:ws/tasks/:task/reject/",
                post(|| async {
                    (
                        axum::http::StatusCode::FORBIDDEN,
                        Json(json!({ "kind": "forbidden", "detail": "not your task" })),
                    )
                }),
            )
            .route(
                "/worksheets/:ws/tasks/:task/unsubmit/",
                post(|| async { (axum::http::StatusCode::CONFLICT, "") }),
            )
            .route(
                "/worksheets/:ws/tasks/:task/clear-status/",
                post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream down") }),
            )
            .route(
                "/worksheets/:ws/tasks/:task/approvers/",
                get(|| async {
                    Json(json!([
                        { "id": "a", "display_name": "Ania" },
                        { "id": "b", "display_name": "Bartek" },
                    ]))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_accept_parses_returned_task() {
        let base = spawn_server().await;
        let remote = HttpTaskRemote::new(&base, Some("secret".to_string()));
        assert!(!remote.base_url().ends_with('/'));

        let task_id = TaskId::new();
        let task = remote.accept(WorksheetId::new(), task_id).await.unwrap();
        assert_eq!(task.id, task_id);
        assert_eq!(task.status, TaskStatus::Approved);
        assert_eq!(task.approver, Some(UserId::new("leader")));
        assert!(task.approval_date.is_some());
    }

    #[tokio::test]
    async fn test_missing_token_is_forbidden() {
        let base = spawn_server().await;
        let remote = HttpTaskRemote::new(&base, None);
        let err = remote
            .accept(WorksheetId::new(), TaskId::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Forbidden(ForbiddenReason::Denied("missing token".to_string()))
        );
    }

    #[tokio::test]
    async fn test_submit_sends_approver() {
        let base = spawn_server().await;
        let remote = HttpTaskRemote::new(&base, None);
        let task = remote
            .submit(WorksheetId::new(), TaskId::new(), UserId::new("x"))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::AwaitingApproval);
        assert_eq!(task.approver, Some(UserId::new("x")));
    }

    #[tokio::test]
    async fn test_error_classification() {
        let base = spawn_server().await;
        let remote = HttpTaskRemote::new(&base, None);
        let (ws, task) = (WorksheetId::new(), TaskId::new());

        let err = remote.reject(ws, task).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(err.to_string().contains("not your task"));

        let err = remote.unsubmit(ws, task).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let err = remote.clear(ws, task).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::Transport {
                status: Some(502),
                message: "upstream down".to_string()
            }
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_list_approvers() {
        let base = spawn_server().await;
        let remote = HttpTaskRemote::new(&base, None);
        let approvers = remote
            .list_approvers(WorksheetId::new(), TaskId::new())
            .await
            .unwrap();
        let names: Vec<&str> = approvers.iter().map(|a| a.display_name.as_str()).collect();
        assert_eq!(names, vec!["Ania", "Bartek"]);
    }

    #[tokio::test]
    async fn test_list_approvers_from_user_objects() {
        let app = Router::new().route(
            "/worksheets/:ws/tasks/:task/approvers/",
            get(|| async {
                Json(json!([{
                    "id": "a",
                    "name": "Ania Kowalska",
                    "nickname": null,
                    "first_name": "Ania",
                    "last_name": "Kowalska",
                    "team": "t1",
                    "scout_rank": 2,
                    "instructor_rank": 0,
                    "function": 3,
                    "is_active": true,
                    "is_staff": false,
                    "is_superuser": false
                }]))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = Config::new(format!("http://{}/", addr));
        let remote = HttpTaskRemote::from_config(&config).unwrap();
        let approvers = remote
            .list_approvers(WorksheetId::new(), TaskId::new())
            .await
            .unwrap();
        assert_eq!(
            approvers,
            vec![ApproverCandidate {
                id: UserId::new("a"),
                display_name: "Ania Kowalska".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_unreachable_store_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote = HttpTaskRemote::new(format!("http://{}", addr), None);
        let err = remote
            .accept(WorksheetId::new(), TaskId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(
            classify_http_status(StatusCode::CONFLICT),
            ErrorKind::InvalidTransition
        );
        assert_eq!(classify_http_status(StatusCode::FORBIDDEN), ErrorKind::Forbidden);
        assert_eq!(classify_http_status(StatusCode::NOT_FOUND), ErrorKind::NotFound);
        assert_eq!(
            classify_http_status(StatusCode::UNPROCESSABLE_ENTITY),
            ErrorKind::NoEligibleApprover
        );
        assert_eq!(
            classify_http_status(StatusCode::SERVICE_UNAVAILABLE),
            ErrorKind::Transport
        );
    }
}
