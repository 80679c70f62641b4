//! Task module - task data model and the approval state machine.
//!
//! - All types use algebraic data types with exhaustive matching
//! - The transition table is a pure function, separated from IO

pub mod task;
pub mod transition;

pub use task::{Task, TaskCategory, TaskError, TaskId, TaskStatus};
pub use transition::{
    available_actions, transition, ActorClass, ApproverEffect, TaskAction, Transition,
};
