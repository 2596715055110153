// Transition validator: the stage graph and the preconditions on its edges

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use super::errors::WorkflowError;
use super::roles::Role;
use super::stages::Stage;
use super::state::ProjectState;

/// Shape of an edge in the stage graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Forward along the main sequence
    Advance,
    /// Backward to a stage already passed; may invalidate downstream work
    Reopen,
    /// Into `on_hold`
    Suspend,
    /// Out of `on_hold` back onto the main sequence
    Resume,
    /// Into `cancelled`
    Cancel,
}

/// A named condition that should hold before a transition is considered safe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    /// An architect or surveyor is invited or active
    AssessorRequired,
    /// At least one contractor is invited or active
    ContractorRequired,
    /// A contractor bid has been accepted
    AcceptedBidRequired,
    /// Reopening a stage invalidates approvals gathered after it
    DownstreamApprovalsInvalidated,
}

impl Precondition {
    pub const ALL: [Precondition; 4] = [
        Precondition::AssessorRequired,
        Precondition::ContractorRequired,
        Precondition::AcceptedBidRequired,
        Precondition::DownstreamApprovalsInvalidated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Precondition::AssessorRequired => "assessor_required",
            Precondition::ContractorRequired => "contractor_required",
            Precondition::AcceptedBidRequired => "accepted_bid_required",
            Precondition::DownstreamApprovalsInvalidated => "downstream_approvals_invalidated",
        }
    }

    /// Preconditions for entering `stage` from elsewhere
    pub fn for_entering(stage: Stage) -> &'static [Precondition] {
        match stage {
            Stage::PlanningAssessment => &[Precondition::AssessorRequired],
            Stage::ContractorSelection => &[Precondition::ContractorRequired],
            Stage::Construction => &[Precondition::AcceptedBidRequired],
            _ => &[],
        }
    }

    pub fn is_met(&self, state: &ProjectState) -> bool {
        match self {
            Precondition::AssessorRequired => {
                state.has_participant_in(&[Role::Architect, Role::Surveyor])
            }
            Precondition::ContractorRequired => state.has_participant_in(&[Role::Contractor]),
            Precondition::AcceptedBidRequired => state.has_accepted_bid(),
            // A warning by nature: it is raised for every reopen
            Precondition::DownstreamApprovalsInvalidated => false,
        }
    }

    pub fn join(preconditions: &[Precondition]) -> String {
        preconditions
            .iter()
            .map(Precondition::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an unmet precondition blocks the transition or only warns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    Mandatory,
    Advisory,
}

/// Per-precondition enforcement, falling back to built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforcementPolicy {
    overrides: HashMap<Precondition, Enforcement>,
}

impl EnforcementPolicy {
    pub fn with(mut self, precondition: Precondition, enforcement: Enforcement) -> Self {
        self.overrides.insert(precondition, enforcement);
        self
    }

    pub fn enforcement_of(&self, precondition: Precondition) -> Enforcement {
        if let Some(enforcement) = self.overrides.get(&precondition) {
            return *enforcement;
        }
        match precondition {
            Precondition::DownstreamApprovalsInvalidated => Enforcement::Advisory,
            _ => Enforcement::Mandatory,
        }
    }

    pub fn is_mandatory(&self, precondition: Precondition) -> bool {
        self.enforcement_of(precondition) == Enforcement::Mandatory
    }
}

/// Decides which stage changes are edges in the graph and what they require
#[derive(Debug, Clone, Default)]
pub struct TransitionValidator {
    allow_stage_skipping: bool,
}

impl TransitionValidator {
    pub fn new(allow_stage_skipping: bool) -> Self {
        Self {
            allow_stage_skipping,
        }
    }

    /// Classify the edge `from -> to`, failing if the graph has no such edge
    pub fn classify(&self, from: Stage, to: Stage) -> Result<TransitionKind, WorkflowError> {
        let invalid = || WorkflowError::InvalidEdge { from, to };

        if from == to || from.is_terminal() {
            return Err(invalid());
        }

        let kind = match (to, from.position(), to.position()) {
            (Stage::OnHold, _, _) => TransitionKind::Suspend,
            (Stage::Cancelled, _, _) => TransitionKind::Cancel,
            (_, None, Some(_)) => TransitionKind::Resume,
            (_, Some(f), Some(t)) if t == f + 1 => TransitionKind::Advance,
            (_, Some(f), Some(t)) if t > f + 1 && self.allow_stage_skipping => {
                TransitionKind::Advance
            }
            (_, Some(f), Some(t)) if t < f => TransitionKind::Reopen,
            _ => return Err(invalid()),
        };

        debug!(from = %from, to = %to, kind = ?kind, "Classified stage transition");
        Ok(kind)
    }

    pub fn can_transition(&self, from: Stage, to: Stage) -> bool {
        self.classify(from, to).is_ok()
    }

    /// Edge kind for moving `state` to `to`.
    ///
    /// Leaving `on_hold` is measured from the stage the project was suspended
    /// in: returning there is a resume, going further back a reopen, and going
    /// forward has to follow the advance rules from that stage.
    pub fn classify_project(
        &self,
        state: &ProjectState,
        to: Stage,
    ) -> Result<TransitionKind, WorkflowError> {
        let from = state.current_stage;
        if from != Stage::OnHold || to.is_side_stage() {
            return self.classify(from, to);
        }

        let anchor = state.progress_anchor();
        let kind = match (anchor.position(), to.position()) {
            (Some(a), Some(t)) if t == a => TransitionKind::Resume,
            (Some(a), Some(t)) if t < a => TransitionKind::Reopen,
            (Some(a), Some(t)) if t == a + 1 || self.allow_stage_skipping => {
                TransitionKind::Advance
            }
            _ => return Err(WorkflowError::InvalidEdge { from, to }),
        };

        debug!(
            from = %from,
            anchor = %anchor,
            to = %to,
            kind = ?kind,
            "Classified transition out of hold"
        );
        Ok(kind)
    }

    /// Everything the edge requires, whether or not it currently holds.
    ///
    /// Advancing checks the entry preconditions of every stage it passes
    /// into; resuming checks the target's; reopening always carries the
    /// downstream-invalidation warning.
    pub fn required_preconditions(
        &self,
        from: Stage,
        to: Stage,
    ) -> Result<Vec<Precondition>, WorkflowError> {
        let kind = self.classify(from, to)?;
        Ok(preconditions_for(kind, from, to))
    }

    /// Required preconditions that do not hold for `state`
    pub fn unmet_preconditions(
        &self,
        state: &ProjectState,
        to: Stage,
    ) -> Result<Vec<Precondition>, WorkflowError> {
        let kind = self.classify_project(state, to)?;
        let origin = match state.current_stage {
            Stage::OnHold => state.progress_anchor(),
            stage => stage,
        };
        Ok(preconditions_for(kind, origin, to)
            .into_iter()
            .filter(|precondition| !precondition.is_met(state))
            .collect())
    }
}

fn preconditions_for(kind: TransitionKind, origin: Stage, to: Stage) -> Vec<Precondition> {
    let mut required: Vec<Precondition> = match kind {
        TransitionKind::Advance => match (origin.position(), to.position()) {
            (Some(f), Some(t)) if t > f => Stage::ALL[f + 1..=t]
                .iter()
                .flat_map(|stage| Precondition::for_entering(*stage).iter().copied())
                .collect(),
            _ => Vec::new(),
        },
        TransitionKind::Resume => Precondition::for_entering(to).to_vec(),
        TransitionKind::Reopen => vec![Precondition::DownstreamApprovalsInvalidated],
        TransitionKind::Suspend | TransitionKind::Cancel => Vec::new(),
    };
    required.sort();
    required.dedup();
    required
}
