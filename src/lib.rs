//! # Worksheet Engine
//!
//! Client-side engine for task-approval worksheets.
//!
//! Each member works through a worksheet of tasks. Tasks are submitted to a
//! supervisor, who accepts or rejects them. This library provides:
//! - The task lifecycle state machine and its per-status approver rule
//! - Authorization (who may trigger which transition)
//! - Approver eligibility resolution
//! - Derived worksheet progress
//! - A dispatcher that sends transitions to the authoritative store
//!
//! ## Task Lifecycle
//!
//! ```text
//!            submit(approver)
//!   ┌──────┐ ───────────────► ┌───────────────────┐  accept   ┌──────────┐
//!   │ TODO │                  │ AWAITING_APPROVAL │ ────────► │ APPROVED │
//!   └──────┘ ◄─────────────── └───────────────────┘           └──────────┘
//!      ▲         unsubmit              │ reject                     │
//!      │                               ▼                            │
//!      │        clear           ┌──────────┐         reject         │
//!      └─────────────────────── │ REJECTED │ ◄──────────────────────┘
//!                               └──────────┘
//! ```
//!
//! A supervisor may also accept directly from TODO or REJECTED, and the
//! owner may resubmit a REJECTED task.
//!
//! ## Dispatch Flow
//! 1. Reserve the task (one transition in flight per task)
//! 2. Check authorization locally
//! 3. Send the transition to the store
//! 4. Replace the local task with the stored one and recompute progress
//!
//! ## Modules
//! - `task`: Task definitions and the transition table
//! - `authz`: Authorization resolver
//! - `approvers`: Approver eligibility and the membership directory
//! - `remote`: HTTP and in-memory store clients
//! - `dispatcher`: Action dispatcher

pub mod approvers;
pub mod authz;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod progress;
pub mod remote;
pub mod role;
pub mod task;
pub mod worksheet;

pub use config::Config;
pub use dispatcher::{ActionDispatcher, DispatchOutcome};
pub use error::{EngineError, EngineResult, ErrorKind, ForbiddenReason};
pub use role::{Actor, ApprovalPolicy, FunctionLevel, UserId};
pub use task::{Task, TaskAction, TaskCategory, TaskId, TaskStatus};
pub use worksheet::{TeamId, Worksheet, WorksheetId};
