//! Approver resolution.
//!
//! Produces the users a member may submit a task to. Anyone returned here
//! could legally accept or reject the task once it is submitted to them.
//!
//! Membership data is external; it is read through [`MemberDirectory`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::role::{ApprovalPolicy, Member, UserId};
use crate::task::Task;
use crate::worksheet::{TeamId, Worksheet};

/// Read access to organizational membership.
pub trait MemberDirectory: Send + Sync {
    fn member(&self, id: &UserId) -> Option<Member>;

    fn team_members(&self, team: &TeamId) -> Vec<Member>;

    fn all_members(&self) -> Vec<Member>;
}

/// Directory backed by a fixed member list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    members: HashMap<UserId, Member>,
}

impl InMemoryDirectory {
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            members: members.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }
}

impl MemberDirectory for InMemoryDirectory {
    fn member(&self, id: &UserId) -> Option<Member> {
        self.members.get(id).cloned()
    }

    fn team_members(&self, team: &TeamId) -> Vec<Member> {
        self.members
            .values()
            .filter(|m| m.team.as_ref() == Some(team))
            .cloned()
            .collect()
    }

    fn all_members(&self) -> Vec<Member> {
        self.members.values().cloned().collect()
    }
}

/// Someone a task can be submitted to.
///
/// Deserializes either from `{id, display_name}` or from a full user
/// object, in which case the display name is built from the name parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserPayload")]
pub struct ApproverCandidate {
    pub id: UserId,
    pub display_name: String,
}

/// User object as served by the worksheet API.
#[derive(Deserialize)]
struct UserPayload {
    id: UserId,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl UserPayload {
    /// "First Last „Nick”", falling back to `name`, then the id.
    fn derived_name(&self) -> String {
        let first = self.given_name.as_deref().or(self.first_name.as_deref());
        let last = self.family_name.as_deref().or(self.last_name.as_deref());
        let nickname = self
            .nickname
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| format!("„{}”", n.trim()));

        let parts: Vec<String> = [first.map(str::to_string), last.map(str::to_string), nickname]
            .into_iter()
            .flatten()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join(" ");
        }

        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }
}

impl From<UserPayload> for ApproverCandidate {
    fn from(payload: UserPayload) -> Self {
        let display_name = match payload.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => payload.derived_name(),
        };
        Self {
            id: payload.id,
            display_name,
        }
    }
}

impl From<&Member> for ApproverCandidate {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.clone(),
            display_name: member.display_name.clone(),
        }
    }
}

/// The single candidate worth pre-selecting, if there is exactly one.
pub fn preselect(candidates: &[ApproverCandidate]) -> Option<&UserId> {
    match candidates {
        [only] => Some(&only.id),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApproverResolver {
    policy: ApprovalPolicy,
}

impl ApproverResolver {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self { policy }
    }

    /// Eligible approvers for `task`, sorted by display name.
    ///
    /// 1. Pool: the owner's team, or every member when the policy allows
    ///    approvers from outside the team.
    /// 2. Keep members meeting the category threshold, plus the worksheet
    ///    supervisor regardless of rank.
    /// 3. The owner is never a candidate.
    pub fn resolve(
        &self,
        worksheet: &Worksheet,
        task: &Task,
        directory: &dyn MemberDirectory,
    ) -> Vec<ApproverCandidate> {
        let required = self.policy.threshold(task.category);

        let pool = if self.policy.approvers_outside_team {
            directory.all_members()
        } else {
            match &worksheet.team {
                Some(team) => directory.team_members(team),
                None => Vec::new(),
            }
        };

        let mut eligible: HashMap<UserId, ApproverCandidate> = pool
            .iter()
            .filter(|m| m.function_level.meets(required))
            .map(|m| (m.id.clone(), ApproverCandidate::from(m)))
            .collect();

        if let Some(supervisor) = &worksheet.supervisor {
            let candidate = match directory.member(supervisor) {
                Some(member) => ApproverCandidate::from(&member),
                None => ApproverCandidate {
                    id: supervisor.clone(),
                    display_name: worksheet
                        .supervisor_name
                        .clone()
                        .unwrap_or_else(|| supervisor.to_string()),
                },
            };
            eligible.entry(supervisor.clone()).or_insert(candidate);
        }

        eligible.remove(&worksheet.owner);

        let mut candidates: Vec<ApproverCandidate> = eligible.into_values().collect();
        candidates.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates
    }
}
