//! Worksheet: the ordered set of tasks tracking one member's progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::UserId;
use crate::task::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorksheetId(Uuid);

impl WorksheetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorksheetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorksheetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorksheetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Team (organizational unit) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TeamId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A worksheet as returned by the authoritative store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub id: WorksheetId,
    /// The member whose progress this worksheet tracks.
    #[serde(rename = "user")]
    pub owner: UserId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Standing supervisor with notes visibility, independent of rank.
    #[serde(default)]
    pub supervisor: Option<UserId>,
    #[serde(default)]
    pub supervisor_name: Option<String>,
    /// The owner's team.
    #[serde(default)]
    pub team: Option<TeamId>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Worksheet {
    pub fn new(owner: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: WorksheetId::new(),
            owner: owner.into(),
            name: name.into(),
            description: String::new(),
            supervisor: None,
            supervisor_name: None,
            team: None,
            tasks: Vec::new(),
            is_archived: false,
            updated_at: None,
        }
    }

    pub fn in_team(mut self, team: impl Into<TeamId>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_supervisor(mut self, supervisor: impl Into<UserId>) -> Self {
        self.supervisor = Some(supervisor.into());
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn is_owner(&self, user: &UserId) -> bool {
        &self.owner == user
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Replace the task with the same id. Returns `false` if it is unknown.
    pub fn replace_task(&mut self, task: Task) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => {
                *slot = task;
                true
            }
            None => false,
        }
    }
}
