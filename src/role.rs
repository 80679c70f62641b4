//! Role and capability model.
//!
//! A user's authority is a single ordered [`FunctionLevel`]. Which level is
//! needed to supervise a task depends on the task's category and is supplied
//! from configuration through [`ApprovalPolicy`].

use serde::{Deserialize, Serialize};

use crate::task::TaskCategory;
use crate::worksheet::TeamId;

/// Opaque user identifier as issued by the authoritative store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// Organizational rank. Higher values carry more authority.
///
/// `0` is a plain member without any function.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FunctionLevel(pub u8);

impl FunctionLevel {
    pub const NONE: FunctionLevel = FunctionLevel(0);

    /// Whether this level satisfies `required`.
    pub fn meets(self, required: FunctionLevel) -> bool {
        self >= required
    }
}

impl std::fmt::Display for FunctionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimum function levels gating supervisory actions, per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    /// Required to manage `general` (skill) tasks.
    pub general_min: FunctionLevel,
    /// Required to manage `individual` (personal growth) tasks.
    pub individual_min: FunctionLevel,
    /// Draw approver candidates from every known member instead of the
    /// owner's team only.
    pub approvers_outside_team: bool,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            general_min: FunctionLevel(3),
            individual_min: FunctionLevel(2),
            approvers_outside_team: false,
        }
    }
}

impl ApprovalPolicy {
    pub fn threshold(&self, category: TaskCategory) -> FunctionLevel {
        match category {
            TaskCategory::General => self.general_min,
            TaskCategory::Individual => self.individual_min,
        }
    }
}

/// The user invoking an action.
///
/// Passed explicitly into every authorization and dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub function_level: FunctionLevel,
    /// Team the actor belongs to, if any.
    #[serde(default)]
    pub team: Option<TeamId>,
    /// Externally granted privilege to act on worksheets of other teams.
    #[serde(default)]
    pub cross_team: bool,
}

impl Actor {
    pub fn new(id: impl Into<UserId>, function_level: FunctionLevel) -> Self {
        Self {
            id: id.into(),
            function_level,
            team: None,
            cross_team: false,
        }
    }

    pub fn in_team(mut self, team: impl Into<TeamId>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_cross_team(mut self) -> Self {
        self.cross_team = true;
        self
    }

    /// Whether the actor may reach a worksheet owned by a member of `team`.
    pub fn reaches_team(&self, team: Option<&TeamId>) -> bool {
        if self.cross_team {
            return true;
        }
        match (self.team.as_ref(), team) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

/// A member of the organization as known to the membership directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub display_name: String,
    pub function_level: FunctionLevel,
    #[serde(default)]
    pub team: Option<TeamId>,
}

impl Member {
    pub fn new(
        id: impl Into<UserId>,
        display_name: impl Into<String>,
        function_level: FunctionLevel,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            function_level,
            team: None,
        }
    }

    pub fn in_team(mut self, team: impl Into<TeamId>) -> Self {
        self.team = Some(team.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_per_category() {
        let policy = ApprovalPolicy::default();
        assert_eq!(policy.threshold(TaskCategory::General), FunctionLevel(3));
        assert_eq!(policy.threshold(TaskCategory::Individual), FunctionLevel(2));
        assert!(FunctionLevel(3).meets(policy.general_min));
        assert!(!FunctionLevel(2).meets(policy.general_min));
    }

    #[test]
    fn test_team_reach() {
        let actor = Actor::new("leader", FunctionLevel(3)).in_team("t1");
        assert!(actor.reaches_team(Some(&TeamId::new("t1"))));
        assert!(!actor.reaches_team(Some(&TeamId::new("t2"))));
        assert!(!actor.reaches_team(None));

        let roaming = actor.with_cross_team();
        assert!(roaming.reaches_team(Some(&TeamId::new("t2"))));
        assert!(roaming.reaches_team(None));
    }
}
