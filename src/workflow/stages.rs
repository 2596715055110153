// Stage registry - the fixed, ordered set of project stages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::UnknownStageError;

/// A named phase in a project's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    PlanningAssessment,
    PlanningApplication,
    PartyWall,
    ContractorSelection,
    Construction,
    Completion,
    /// Side stage, reachable from any non-terminal stage
    OnHold,
    /// Side stage and terminal
    Cancelled,
}

/// Registry entry: stage id plus its display label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageInfo {
    pub id: Stage,
    pub label: &'static str,
}

/// Main sequence in display order
const MAIN_SEQUENCE: [StageInfo; 7] = [
    StageInfo { id: Stage::Initial, label: "Project Initiation" },
    StageInfo { id: Stage::PlanningAssessment, label: "Planning Assessment" },
    StageInfo { id: Stage::PlanningApplication, label: "Planning Application" },
    StageInfo { id: Stage::PartyWall, label: "Party Wall" },
    StageInfo { id: Stage::ContractorSelection, label: "Contractor Selection" },
    StageInfo { id: Stage::Construction, label: "Construction" },
    StageInfo { id: Stage::Completion, label: "Completion" },
];

const SIDE_STAGES: [StageInfo; 2] = [
    StageInfo { id: Stage::OnHold, label: "On Hold" },
    StageInfo { id: Stage::Cancelled, label: "Cancelled" },
];

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Initial,
        Stage::PlanningAssessment,
        Stage::PlanningApplication,
        Stage::PartyWall,
        Stage::ContractorSelection,
        Stage::Construction,
        Stage::Completion,
        Stage::OnHold,
        Stage::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::PlanningAssessment => "planning_assessment",
            Stage::PlanningApplication => "planning_application",
            Stage::PartyWall => "party_wall",
            Stage::ContractorSelection => "contractor_selection",
            Stage::Construction => "construction",
            Stage::Completion => "completion",
            Stage::OnHold => "on_hold",
            Stage::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        MAIN_SEQUENCE
            .iter()
            .chain(SIDE_STAGES.iter())
            .find(|info| info.id == *self)
            .map(|info| info.label)
            .unwrap_or("Unknown Stage")
    }

    /// Index in the main sequence, `None` for side stages
    pub fn position(&self) -> Option<usize> {
        MAIN_SEQUENCE.iter().position(|info| info.id == *self)
    }

    pub fn is_side_stage(&self) -> bool {
        self.position().is_none()
    }

    /// Terminal stages have no outgoing edges
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completion | Stage::Cancelled)
    }

    /// Natural successor on the happy path
    pub fn successor(&self) -> Option<Stage> {
        self.position()
            .and_then(|idx| MAIN_SEQUENCE.get(idx + 1))
            .map(|info| info.id)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStageError { stage: s.to_string() })
    }
}

/// Ordered main-sequence stages with display labels
pub fn list_stages() -> &'static [StageInfo] {
    &MAIN_SEQUENCE
}

/// Stages outside the main sequence
pub fn side_stages() -> &'static [StageInfo] {
    &SIDE_STAGES
}

/// Display label for a stage key, failing for keys outside the registry
pub fn label_of(stage: &str) -> Result<&'static str, UnknownStageError> {
    stage.parse::<Stage>().map(|s| s.label())
}

/// A point on the progress timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub stage: Stage,
    pub label: &'static str,
    pub completed: bool,
    pub active: bool,
}

/// Progress view over the main sequence anchored at `anchor`.
///
/// Stages before the anchor are completed and the anchor itself is active.
/// A side-stage anchor yields a timeline with nothing active or completed.
pub fn timeline(anchor: Stage) -> Vec<Milestone> {
    let current = anchor.position();
    MAIN_SEQUENCE
        .iter()
        .enumerate()
        .map(|(idx, info)| Milestone {
            stage: info.id,
            label: info.label,
            completed: current.is_some_and(|c| idx < c),
            active: current == Some(idx),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_and_labels() {
        let ids: Vec<&str> = list_stages().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "initial",
                "planning_assessment",
                "planning_application",
                "party_wall",
                "contractor_selection",
                "construction",
                "completion"
            ]
        );
        assert_eq!(label_of("initial").unwrap(), "Project Initiation");
        assert_eq!(label_of("on_hold").unwrap(), "On Hold");
    }

    #[test]
    fn test_label_of_unknown_stage_fails() {
        let err = label_of("demolition").unwrap_err();
        assert_eq!(err.stage, "demolition");
    }

    #[test]
    fn test_successors_follow_declared_order() {
        assert_eq!(Stage::Initial.successor(), Some(Stage::PlanningAssessment));
        assert_eq!(Stage::Construction.successor(), Some(Stage::Completion));
        assert_eq!(Stage::Completion.successor(), None);
        assert_eq!(Stage::OnHold.successor(), None);
    }

    #[test]
    fn test_timeline_marks_completed_and_active() {
        let milestones = timeline(Stage::PartyWall);
        assert_eq!(milestones.len(), 7);
        assert!(milestones[0].completed && milestones[2].completed);
        assert!(milestones[3].active && !milestones[3].completed);
        assert!(!milestones[4].completed && !milestones[4].active);

        let side = timeline(Stage::OnHold);
        assert!(side.iter().all(|m| !m.completed && !m.active));
    }
}
