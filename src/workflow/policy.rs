// Role-action policy: which actions a role may take at a stage
//
// Stage-specific rows are role-gated. Common actions are offered at every
// stage to every role. Lookups never fail: a stage with no rows (side stages,
// or a key outside the registry) yields the common set only.

use serde::Serialize;
use tracing::debug;

use super::actions::{Action, ActionDescriptor};
use super::roles::Role;
use super::stages::Stage;

/// Which roles a policy row applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoleScope {
    Any,
    Only(&'static [Role]),
}

impl RoleScope {
    pub fn includes(&self, role: Role) -> bool {
        match self {
            RoleScope::Any => true,
            RoleScope::Only(roles) => roles.contains(&role),
        }
    }
}

/// One row of the stage table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyRule {
    pub stage: Stage,
    pub roles: RoleScope,
    pub descriptor: ActionDescriptor,
}

const DESIGN_PROFESSIONALS: &[Role] = &[Role::Architect, Role::Surveyor];

const COMMON_ACTIONS: [ActionDescriptor; 2] = [
    ActionDescriptor::navigational(Action::SendMessage, "Send Message", "messages"),
    ActionDescriptor::mutating(Action::UploadDocument, "Upload Document"),
];

const STAGE_RULES: [PolicyRule; 12] = [
    PolicyRule {
        stage: Stage::Initial,
        roles: RoleScope::Only(&[Role::Homeowner]),
        descriptor: ActionDescriptor::mutating(
            Action::RequestAssessment,
            "Request Planning Assessment",
        )
        .primary(),
    },
    PolicyRule {
        stage: Stage::PlanningAssessment,
        roles: RoleScope::Only(&[Role::Homeowner]),
        descriptor: ActionDescriptor::navigational(
            Action::ViewAssessment,
            "View Assessment Progress",
            "assessment",
        ),
    },
    PolicyRule {
        stage: Stage::PlanningAssessment,
        roles: RoleScope::Only(DESIGN_PROFESSIONALS),
        descriptor: ActionDescriptor::navigational(
            Action::UpdateAssessment,
            "Update Assessment",
            "assessment/edit",
        )
        .primary(),
    },
    PolicyRule {
        stage: Stage::PlanningApplication,
        roles: RoleScope::Any,
        descriptor: ActionDescriptor::navigational(
            Action::ViewApplication,
            "View Planning Application",
            "planning",
        ),
    },
    PolicyRule {
        stage: Stage::PlanningApplication,
        roles: RoleScope::Only(DESIGN_PROFESSIONALS),
        descriptor: ActionDescriptor::navigational(
            Action::UpdateApplication,
            "Update Application",
            "planning/edit",
        )
        .primary(),
    },
    PolicyRule {
        stage: Stage::PartyWall,
        roles: RoleScope::Any,
        descriptor: ActionDescriptor::navigational(
            Action::ViewPartyWall,
            "View Party Wall Notices",
            "party-wall",
        ),
    },
    PolicyRule {
        stage: Stage::PartyWall,
        roles: RoleScope::Only(&[Role::Surveyor]),
        descriptor: ActionDescriptor::navigational(
            Action::ManagePartyWall,
            "Manage Party Wall Process",
            "party-wall/manage",
        )
        .primary(),
    },
    PolicyRule {
        stage: Stage::ContractorSelection,
        roles: RoleScope::Only(&[Role::Homeowner]),
        descriptor: ActionDescriptor::navigational(Action::ViewBids, "View Contractor Bids", "bids")
            .primary(),
    },
    PolicyRule {
        stage: Stage::ContractorSelection,
        roles: RoleScope::Only(&[Role::Contractor]),
        descriptor: ActionDescriptor::mutating(Action::SubmitBid, "Submit Bid").primary(),
    },
    PolicyRule {
        stage: Stage::Construction,
        roles: RoleScope::Any,
        descriptor: ActionDescriptor::navigational(
            Action::TrackProgress,
            "Track Construction Progress",
            "construction",
        )
        .primary(),
    },
    PolicyRule {
        stage: Stage::Construction,
        roles: RoleScope::Only(&[Role::Contractor]),
        descriptor: ActionDescriptor::mutating(Action::UpdateProgress, "Update Progress"),
    },
    PolicyRule {
        stage: Stage::Completion,
        roles: RoleScope::Only(&[Role::Homeowner]),
        descriptor: ActionDescriptor::mutating(Action::LeaveReview, "Leave Review"),
    },
];

/// Table-driven (stage, role) -> actions lookup
#[derive(Debug, Clone)]
pub struct RoleActionPolicy {
    common: Vec<ActionDescriptor>,
    rules: Vec<PolicyRule>,
}

impl Default for RoleActionPolicy {
    fn default() -> Self {
        Self::new(COMMON_ACTIONS.to_vec(), STAGE_RULES.to_vec())
    }
}

impl RoleActionPolicy {
    pub fn new(common: Vec<ActionDescriptor>, rules: Vec<PolicyRule>) -> Self {
        Self { common, rules }
    }

    pub fn common_actions(&self) -> &[ActionDescriptor] {
        &self.common
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Actions for `role` at `stage`, stage-specific rows first then the
    /// common set, in declaration order. When an action appears in both, the
    /// stage-specific descriptor (and its primary flag) is kept.
    pub fn actions_for(&self, stage: Stage, role: Role) -> Vec<ActionDescriptor> {
        let mut actions: Vec<ActionDescriptor> = self
            .rules
            .iter()
            .filter(|rule| rule.stage == stage && rule.roles.includes(role))
            .map(|rule| rule.descriptor)
            .collect();

        let stage_specific = actions.len();
        for common in &self.common {
            if !actions[..stage_specific].iter().any(|a| a.action == common.action) {
                actions.push(*common);
            }
        }

        debug!(
            stage = %stage,
            role = %role,
            stage_specific,
            total = actions.len(),
            "Resolved actions from policy"
        );
        actions
    }

    /// Same lookup keyed by a raw stage string. Keys outside the registry get
    /// the common set only.
    pub fn actions_for_key(&self, stage: &str, role: Role) -> Vec<ActionDescriptor> {
        match stage.parse::<Stage>() {
            Ok(stage) => self.actions_for(stage, role),
            Err(_) => {
                debug!(stage, role = %role, "Unknown stage key, offering common actions only");
                self.common.clone()
            }
        }
    }

    /// [`actions_for`](Self::actions_for) with primary actions moved to the
    /// front; the sort is stable so declaration order holds otherwise
    pub fn ordered_actions_for(&self, stage: Stage, role: Role) -> Vec<ActionDescriptor> {
        primary_first(self.actions_for(stage, role))
    }

    pub fn ordered_actions_for_key(&self, stage: &str, role: Role) -> Vec<ActionDescriptor> {
        primary_first(self.actions_for_key(stage, role))
    }

    pub fn permits(&self, stage: Stage, role: Role, action: Action) -> bool {
        self.actions_for(stage, role)
            .iter()
            .any(|descriptor| descriptor.action == action)
    }
}

fn primary_first(mut actions: Vec<ActionDescriptor>) -> Vec<ActionDescriptor> {
    actions.sort_by_key(|action| !action.primary);
    actions
}
