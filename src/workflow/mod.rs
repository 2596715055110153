// Project Workflow Engine
//
// Stage registry, role-action policy, transition validator and the
// coordinator that ties them together. Synchronous and free of I/O; see
// `crate::service` for the boundary that loads, saves and runs effects.

pub mod actions;
pub mod coordinator;
pub mod effects;
pub mod errors;
pub mod policy;
pub mod roles;
pub mod stages;
pub mod state;
pub mod transitions;


pub use actions::{Action, ActionDescriptor, ActionKind};
pub use coordinator::{
    Actor, Clock, CommandOutcome, FixedClock, SystemClock, WorkflowCommand, WorkflowCoordinator,
};
pub use effects::{
    CloseOpenBids, DocumentKind, Effect, Notice, NotifyParticipants, RequireDocumentUpload,
};
pub use errors::{UnknownStageError, WorkflowError};
pub use policy::{PolicyRule, RoleActionPolicy, RoleScope};
pub use roles::{ProjectId, Role, UnknownRoleError, UserId};
pub use stages::{label_of, list_stages, side_stages, timeline, Milestone, Stage, StageInfo};
pub use state::{
    Bid, BidStatus, MembershipStatus, ProjectMembership, ProjectState, StageTransitionRecord,
};
pub use transitions::{
    Enforcement, EnforcementPolicy, Precondition, TransitionKind, TransitionValidator,
};
