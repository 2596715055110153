// Immutable project snapshots and the records they own

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::roles::{ProjectId, Role, UserId};
use super::stages::{timeline, Milestone, Stage};
use super::transitions::{Precondition, TransitionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Invited,
    Active,
    Removed,
}

/// A user's single role on a project. Never deleted, only marked removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMembership {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: Role,
    pub status: MembershipStatus,
}

impl ProjectMembership {
    /// Invited or active
    pub fn is_current(&self) -> bool {
        self.status != MembershipStatus::Removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Submitted,
    Accepted,
    Rejected,
    /// Still open when contractor selection ended
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub bid_id: String,
    pub contractor_id: UserId,
    pub amount_pence: u64,
    pub status: BidStatus,
    pub submitted_at: DateTime<Utc>,
}

/// One applied stage change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransitionRecord {
    pub from: Stage,
    pub to: Stage,
    pub kind: TransitionKind,
    pub actor_role: Role,
    pub forced: bool,
    #[serde(default)]
    pub warnings: Vec<Precondition>,
    pub at: DateTime<Utc>,
}

/// Immutable snapshot of a project's workflow position.
///
/// Every change produces a new snapshot with `version` bumped by one; the
/// version is the token stores compare on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub current_stage: Stage,
    pub participants: Vec<ProjectMembership>,
    #[serde(default)]
    pub bids: Vec<Bid>,
    #[serde(default)]
    pub history: Vec<StageTransitionRecord>,
    pub last_transition_at: DateTime<Utc>,
    pub version: u64,
}

impl ProjectState {
    /// A new project always starts at `initial` with its owner as active homeowner
    pub fn new(project_id: ProjectId, owner: UserId, created_at: DateTime<Utc>) -> Self {
        let owner_membership = ProjectMembership {
            project_id: project_id.clone(),
            user_id: owner,
            role: Role::Homeowner,
            status: MembershipStatus::Active,
        };
        Self {
            project_id,
            title: None,
            current_stage: Stage::Initial,
            participants: vec![owner_membership],
            bids: Vec::new(),
            history: Vec::new(),
            last_transition_at: created_at,
            version: 1,
        }
    }

    pub fn membership(&self, user_id: &UserId) -> Option<&ProjectMembership> {
        self.participants.iter().find(|m| &m.user_id == user_id)
    }

    /// Role of an active member, `None` for invited, removed or unknown users
    pub fn active_role(&self, user_id: &UserId) -> Option<Role> {
        self.membership(user_id)
            .filter(|m| m.status == MembershipStatus::Active)
            .map(|m| m.role)
    }

    pub fn active_members(&self) -> impl Iterator<Item = &ProjectMembership> {
        self.participants
            .iter()
            .filter(|m| m.status == MembershipStatus::Active)
    }

    /// Whether anyone invited or active holds one of `roles`
    pub fn has_participant_in(&self, roles: &[Role]) -> bool {
        self.participants
            .iter()
            .any(|m| m.is_current() && roles.contains(&m.role))
    }

    /// Users who should hear about project changes
    pub fn recipients(&self) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|m| m.is_current())
            .map(|m| m.user_id.clone())
            .collect()
    }

    pub fn bid(&self, bid_id: &str) -> Option<&Bid> {
        self.bids.iter().find(|b| b.bid_id == bid_id)
    }

    pub fn open_bids(&self) -> impl Iterator<Item = &Bid> {
        self.bids
            .iter()
            .filter(|b| b.status == BidStatus::Submitted)
    }

    pub fn has_accepted_bid(&self) -> bool {
        self.bids.iter().any(|b| b.status == BidStatus::Accepted)
    }

    /// Whether the project has ever been moved into `stage`
    pub fn has_entered(&self, stage: Stage) -> bool {
        stage == Stage::Initial || self.history.iter().any(|r| r.to == stage)
    }

    /// Main-sequence stage the progress view should show as active. While on
    /// hold or cancelled this is the last main stage the project occupied.
    pub fn progress_anchor(&self) -> Stage {
        if !self.current_stage.is_side_stage() {
            return self.current_stage;
        }
        self.history
            .iter()
            .rev()
            .map(|record| record.from)
            .find(|stage| !stage.is_side_stage())
            .unwrap_or(Stage::Initial)
    }

    pub fn timeline(&self) -> Vec<Milestone> {
        timeline(self.progress_anchor())
    }

    /// Copy for the next snapshot with the version bumped
    pub(crate) fn successor(&self) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next
    }
}
