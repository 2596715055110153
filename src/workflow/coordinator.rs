// Workflow coordinator - turns commands into new snapshots plus effects
//
// Pure: every operation maps (state, input) to a new state and a list of
// effects. Nothing here performs I/O; callers run the effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::actions::{Action, ActionDescriptor};
use super::effects::{
    CloseOpenBids, DocumentKind, Effect, Notice, NotifyParticipants, RequireDocumentUpload,
};
use super::errors::WorkflowError;
use super::policy::RoleActionPolicy;
use super::roles::{Role, UserId};
use super::stages::Stage;
use super::state::{
    Bid, BidStatus, MembershipStatus, ProjectMembership, ProjectState, StageTransitionRecord,
};
use super::transitions::{EnforcementPolicy, Precondition, TransitionKind, TransitionValidator};

/// Source of transition timestamps
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for deterministic snapshots
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Who is issuing a command. The role is trusted as supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkflowCommand {
    RequestTransition {
        target: Stage,
        #[serde(default)]
        force: bool,
    },
    AssignMembership {
        user_id: UserId,
        role: Role,
    },
    InviteProfessional {
        user_id: UserId,
        role: Role,
    },
    /// Accept the actor's own pending invitation
    AcceptInvitation,
    RemoveMembership {
        user_id: UserId,
    },
    SubmitBid {
        amount_pence: u64,
    },
    AcceptBid {
        bid_id: String,
    },
}

impl WorkflowCommand {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowCommand::RequestTransition { .. } => "request_transition",
            WorkflowCommand::AssignMembership { .. } => "assign_membership",
            WorkflowCommand::InviteProfessional { .. } => "invite_professional",
            WorkflowCommand::AcceptInvitation => "accept_invitation",
            WorkflowCommand::RemoveMembership { .. } => "remove_membership",
            WorkflowCommand::SubmitBid { .. } => "submit_bid",
            WorkflowCommand::AcceptBid { .. } => "accept_bid",
        }
    }
}

/// Result of applying a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub state: ProjectState,
    /// Kind of stage change applied, `None` when the stage did not move
    pub transition: Option<TransitionKind>,
    /// Unmet preconditions the transition went ahead despite
    pub warnings: Vec<Precondition>,
    pub effects: Vec<Effect>,
}

impl CommandOutcome {
    fn state_only(state: ProjectState) -> Self {
        Self {
            state,
            transition: None,
            warnings: Vec::new(),
            effects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowCoordinator {
    policy: RoleActionPolicy,
    validator: TransitionValidator,
    enforcement: EnforcementPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for WorkflowCoordinator {
    fn default() -> Self {
        Self::new(
            RoleActionPolicy::default(),
            TransitionValidator::default(),
            EnforcementPolicy::default(),
        )
    }
}

impl WorkflowCoordinator {
    pub fn new(
        policy: RoleActionPolicy,
        validator: TransitionValidator,
        enforcement: EnforcementPolicy,
    ) -> Self {
        Self {
            policy,
            validator,
            enforcement,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &RoleActionPolicy {
        &self.policy
    }

    pub fn validator(&self) -> &TransitionValidator {
        &self.validator
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Actions for `role` at the project's stage, primary ones first and
    /// declaration order kept otherwise
    pub fn available_actions(&self, state: &ProjectState, role: Role) -> Vec<ActionDescriptor> {
        self.policy.ordered_actions_for(state.current_stage, role)
    }

    fn ensure_permitted(
        &self,
        state: &ProjectState,
        role: Role,
        action: Action,
    ) -> Result<(), WorkflowError> {
        if self.policy.permits(state.current_stage, role, action) {
            Ok(())
        } else {
            Err(WorkflowError::ActionNotPermitted {
                stage: state.current_stage,
                role,
                action,
            })
        }
    }

    /// Dispatch a command on behalf of `actor`
    pub fn apply(
        &self,
        state: &ProjectState,
        actor: &Actor,
        command: &WorkflowCommand,
    ) -> Result<CommandOutcome, WorkflowError> {
        debug!(
            project_id = %state.project_id,
            command = command.name(),
            actor = %actor.user_id,
            role = %actor.role,
            "Applying workflow command"
        );

        match command {
            WorkflowCommand::RequestTransition { target, force } => {
                self.request_transition(state, *target, actor.role, *force)
            }
            WorkflowCommand::AssignMembership { user_id, role } => {
                ensure_manages_team(actor.role, "assign project roles")?;
                Ok(CommandOutcome::state_only(
                    self.assign_membership(state, user_id, *role),
                ))
            }
            WorkflowCommand::InviteProfessional { user_id, role } => {
                ensure_manages_team(actor.role, "invite professionals")?;
                self.invite_professional(state, user_id, *role)
            }
            WorkflowCommand::AcceptInvitation => self
                .accept_invitation(state, &actor.user_id)
                .map(CommandOutcome::state_only),
            WorkflowCommand::RemoveMembership { user_id } => {
                ensure_manages_team(actor.role, "remove project members")?;
                self.remove_membership(state, user_id)
                    .map(CommandOutcome::state_only)
            }
            WorkflowCommand::SubmitBid { amount_pence } => {
                self.submit_bid(state, &actor.user_id, actor.role, *amount_pence)
            }
            WorkflowCommand::AcceptBid { bid_id } => self.accept_bid(state, bid_id, actor.role),
        }
    }

    /// Move the project to `target`.
    ///
    /// Requesting the current stage is a no-op. Unmet mandatory preconditions
    /// fail the request unless `force` is set; anything unmet that did not
    /// block is returned as a warning.
    pub fn request_transition(
        &self,
        state: &ProjectState,
        target: Stage,
        actor_role: Role,
        force: bool,
    ) -> Result<CommandOutcome, WorkflowError> {
        let from = state.current_stage;
        if from == target {
            debug!(project_id = %state.project_id, stage = %target, "Already at requested stage");
            return Ok(CommandOutcome::state_only(state.clone()));
        }

        let kind = self.validator.classify_project(state, target)?;
        let unmet = self.validator.unmet_preconditions(state, target)?;

        let (blocking, advisory): (Vec<Precondition>, Vec<Precondition>) = unmet
            .iter()
            .copied()
            .partition(|p| self.enforcement.is_mandatory(*p));

        if !force && !blocking.is_empty() {
            debug!(
                project_id = %state.project_id,
                from = %from,
                to = %target,
                unmet = %Precondition::join(&blocking),
                "Transition blocked by preconditions"
            );
            return Err(WorkflowError::PreconditionUnmet {
                from,
                to: target,
                unmet: blocking,
            });
        }

        let warnings = if force { unmet } else { advisory };
        if !warnings.is_empty() {
            warn!(
                project_id = %state.project_id,
                from = %from,
                to = %target,
                forced = force,
                warnings = %Precondition::join(&warnings),
                "Transition proceeding with unmet preconditions"
            );
        }

        let now = self.clock.now();
        let mut next = state.successor();
        next.current_stage = target;
        next.last_transition_at = now;
        next.history.push(StageTransitionRecord {
            from,
            to: target,
            kind,
            actor_role,
            forced: force,
            warnings: warnings.clone(),
            at: now,
        });

        let mut effects = vec![Effect::NotifyParticipants(NotifyParticipants {
            project_id: state.project_id.clone(),
            recipients: state.recipients(),
            notice: Notice::StageChanged {
                from,
                to: target,
                kind,
            },
        })];

        if kind == TransitionKind::Reopen || !state.has_entered(target) {
            if let Some((document, requested_from)) = DocumentKind::required_on_entry(target) {
                effects.push(Effect::RequireDocumentUpload(RequireDocumentUpload {
                    project_id: state.project_id.clone(),
                    stage: target,
                    document,
                    requested_from,
                }));
            }
        }

        // Advancing out of hold starts from the stage the project was held in
        let origin = match from {
            Stage::OnHold => state.progress_anchor(),
            stage => stage,
        };
        let closes_bids = kind == TransitionKind::Cancel
            || (kind == TransitionKind::Advance && origin == Stage::ContractorSelection);
        if closes_bids {
            if let Some(closed) = close_open_bids(&mut next) {
                effects.push(Effect::CloseOpenBids(closed));
            }
        }

        info!(
            project_id = %state.project_id,
            from = %from,
            to = %target,
            kind = ?kind,
            actor_role = %actor_role,
            version = next.version,
            effects = effects.len(),
            "Stage transition applied"
        );

        Ok(CommandOutcome {
            state: next,
            transition: Some(kind),
            warnings,
            effects,
        })
    }

    /// Give `user_id` an active `role`, replacing any role they held before.
    /// A user keeps exactly one membership record per project.
    pub fn assign_membership(&self, state: &ProjectState, user_id: &UserId, role: Role) -> ProjectState {
        if let Some(existing) = state.membership(user_id) {
            if existing.role == role && existing.status == MembershipStatus::Active {
                return state.clone();
            }
        }

        let mut next = state.successor();
        match next.participants.iter_mut().find(|m| &m.user_id == user_id) {
            Some(membership) => {
                membership.role = role;
                membership.status = MembershipStatus::Active;
            }
            None => next.participants.push(ProjectMembership {
                project_id: state.project_id.clone(),
                user_id: user_id.clone(),
                role,
                status: MembershipStatus::Active,
            }),
        }

        info!(
            project_id = %state.project_id,
            user_id = %user_id,
            role = %role,
            "Membership assigned"
        );
        next
    }

    /// Invite a user in `role`. Users with a current membership cannot be
    /// invited again; a removed user's record is reused. Only professional
    /// roles can be invited.
    pub fn invite_professional(
        &self,
        state: &ProjectState,
        user_id: &UserId,
        role: Role,
    ) -> Result<CommandOutcome, WorkflowError> {
        if !role.is_professional() {
            return Err(WorkflowError::NotAProfessionalRole { role });
        }

        if let Some(existing) = state.membership(user_id).filter(|m| m.is_current()) {
            return Err(WorkflowError::DuplicateMembership {
                user_id: user_id.clone(),
                role: existing.role,
                status: existing.status,
            });
        }

        let mut next = state.successor();
        match next.participants.iter_mut().find(|m| &m.user_id == user_id) {
            Some(membership) => {
                membership.role = role;
                membership.status = MembershipStatus::Invited;
            }
            None => next.participants.push(ProjectMembership {
                project_id: state.project_id.clone(),
                user_id: user_id.clone(),
                role,
                status: MembershipStatus::Invited,
            }),
        }

        info!(
            project_id = %state.project_id,
            user_id = %user_id,
            role = %role,
            "Professional invited"
        );

        Ok(CommandOutcome {
            state: next,
            transition: None,
            warnings: Vec::new(),
            effects: vec![Effect::NotifyParticipants(NotifyParticipants {
                project_id: state.project_id.clone(),
                recipients: vec![user_id.clone()],
                notice: Notice::Invitation { role },
            })],
        })
    }

    pub fn accept_invitation(
        &self,
        state: &ProjectState,
        user_id: &UserId,
    ) -> Result<ProjectState, WorkflowError> {
        match state.membership(user_id) {
            None => Err(WorkflowError::MembershipNotFound {
                user_id: user_id.clone(),
            }),
            Some(m) if m.status != MembershipStatus::Invited => {
                Err(WorkflowError::NoPendingInvitation {
                    user_id: user_id.clone(),
                })
            }
            Some(_) => {
                let mut next = state.successor();
                if let Some(membership) = next.participants.iter_mut().find(|m| &m.user_id == user_id) {
                    membership.status = MembershipStatus::Active;
                }
                info!(project_id = %state.project_id, user_id = %user_id, "Invitation accepted");
                Ok(next)
            }
        }
    }

    /// Mark a membership removed. The record is kept; removing twice is a no-op.
    pub fn remove_membership(
        &self,
        state: &ProjectState,
        user_id: &UserId,
    ) -> Result<ProjectState, WorkflowError> {
        let existing = state
            .membership(user_id)
            .ok_or_else(|| WorkflowError::MembershipNotFound {
                user_id: user_id.clone(),
            })?;
        if existing.status == MembershipStatus::Removed {
            return Ok(state.clone());
        }

        let mut next = state.successor();
        if let Some(membership) = next.participants.iter_mut().find(|m| &m.user_id == user_id) {
            membership.status = MembershipStatus::Removed;
        }
        info!(project_id = %state.project_id, user_id = %user_id, "Membership removed");
        Ok(next)
    }

    pub fn submit_bid(
        &self,
        state: &ProjectState,
        contractor_id: &UserId,
        actor_role: Role,
        amount_pence: u64,
    ) -> Result<CommandOutcome, WorkflowError> {
        self.ensure_permitted(state, actor_role, Action::SubmitBid)?;

        if amount_pence == 0 {
            return Err(WorkflowError::InvalidBid {
                reason: "amount must be greater than zero".to_string(),
            });
        }
        if state.active_role(contractor_id) != Some(Role::Contractor) {
            return Err(WorkflowError::InvalidBid {
                reason: format!("{contractor_id} is not an active contractor on this project"),
            });
        }
        if state.open_bids().any(|b| &b.contractor_id == contractor_id) {
            return Err(WorkflowError::InvalidBid {
                reason: format!("{contractor_id} already has an open bid"),
            });
        }

        let bid = Bid {
            bid_id: Uuid::new_v4().to_string(),
            contractor_id: contractor_id.clone(),
            amount_pence,
            status: BidStatus::Submitted,
            submitted_at: self.clock.now(),
        };
        info!(
            project_id = %state.project_id,
            bid_id = %bid.bid_id,
            contractor_id = %contractor_id,
            amount_pence,
            "Bid submitted"
        );

        let mut next = state.successor();
        next.bids.push(bid);
        Ok(CommandOutcome::state_only(next))
    }

    pub fn accept_bid(
        &self,
        state: &ProjectState,
        bid_id: &str,
        actor_role: Role,
    ) -> Result<CommandOutcome, WorkflowError> {
        self.ensure_permitted(state, actor_role, Action::ViewBids)?;

        let bid = state.bid(bid_id).ok_or_else(|| WorkflowError::BidNotFound {
            bid_id: bid_id.to_string(),
        })?;
        if bid.status != BidStatus::Submitted {
            return Err(WorkflowError::InvalidBid {
                reason: format!("bid {bid_id} is {:?}, not open", bid.status),
            });
        }
        if state.has_accepted_bid() {
            return Err(WorkflowError::InvalidBid {
                reason: "a bid has already been accepted".to_string(),
            });
        }

        let mut next = state.successor();
        if let Some(bid) = next.bids.iter_mut().find(|b| b.bid_id == bid_id) {
            bid.status = BidStatus::Accepted;
        }
        info!(project_id = %state.project_id, bid_id, "Bid accepted");
        Ok(CommandOutcome::state_only(next))
    }
}

fn ensure_manages_team(role: Role, operation: &'static str) -> Result<(), WorkflowError> {
    match role {
        Role::Homeowner | Role::Admin => Ok(()),
        _ => Err(WorkflowError::NotAuthorized { role, operation }),
    }
}

/// Close every submitted bid in `state`, returning the effect if any were open
fn close_open_bids(state: &mut ProjectState) -> Option<CloseOpenBids> {
    let mut bid_ids = Vec::new();
    let mut bidders = Vec::new();
    for bid in state.bids.iter_mut().filter(|b| b.status == BidStatus::Submitted) {
        bid.status = BidStatus::Closed;
        bid_ids.push(bid.bid_id.clone());
        bidders.push(bid.contractor_id.clone());
    }

    if bid_ids.is_empty() {
        return None;
    }
    Some(CloseOpenBids {
        project_id: state.project_id.clone(),
        bid_ids,
        bidders,
    })
}
