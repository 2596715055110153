// Engine error taxonomy - every failure is a value the caller can match on

use thiserror::Error;

use super::actions::Action;
use super::roles::{Role, UserId};
use super::stages::Stage;
use super::state::MembershipStatus;
use super::transitions::Precondition;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stage: {stage}")]
pub struct UnknownStageError {
    pub stage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    UnknownStage(#[from] UnknownStageError),

    #[error("no transition from {from} to {to}")]
    InvalidEdge { from: Stage, to: Stage },

    #[error("transition from {from} to {to} blocked by unmet preconditions: {}", Precondition::join(.unmet))]
    PreconditionUnmet {
        from: Stage,
        to: Stage,
        unmet: Vec<Precondition>,
    },

    #[error("user {user_id} already holds a {status:?} {role} membership")]
    DuplicateMembership {
        user_id: UserId,
        role: Role,
        status: MembershipStatus,
    },

    #[error("user {user_id} has no membership on this project")]
    MembershipNotFound { user_id: UserId },

    #[error("user {user_id} has no pending invitation")]
    NoPendingInvitation { user_id: UserId },

    #[error("{role} may not {action} during {stage}")]
    ActionNotPermitted {
        stage: Stage,
        role: Role,
        action: Action,
    },

    #[error("{role} may not {operation}")]
    NotAuthorized { role: Role, operation: &'static str },

    #[error("{role} is not a professional role and cannot be invited")]
    NotAProfessionalRole { role: Role },

    #[error("bid {bid_id} not found")]
    BidNotFound { bid_id: String },

    #[error("invalid bid: {reason}")]
    InvalidBid { reason: String },
}

impl WorkflowError {
    /// Unmet preconditions carried by the error, empty for other kinds
    pub fn unmet_preconditions(&self) -> &[Precondition] {
        match self {
            WorkflowError::PreconditionUnmet { unmet, .. } => unmet,
            _ => &[],
        }
    }
}
