// Side-effecting instructions emitted by the coordinator for collaborators to run

use serde::{Deserialize, Serialize};

use super::roles::{ProjectId, Role, UserId};
use super::stages::Stage;
use super::transitions::TransitionKind;

/// What a notification is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    StageChanged {
        from: Stage,
        to: Stage,
        kind: TransitionKind,
    },
    Invitation {
        role: Role,
    },
    BidsClosed {
        bid_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyParticipants {
    pub project_id: ProjectId,
    pub recipients: Vec<UserId>,
    pub notice: Notice,
}

/// Documents the workflow asks for when a stage is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PlanningDrawings,
    PartyWallNotice,
    BuildingContract,
    CompletionCertificate,
}

impl DocumentKind {
    /// Document required on entering `stage`, and the role expected to supply it
    pub fn required_on_entry(stage: Stage) -> Option<(DocumentKind, Role)> {
        match stage {
            Stage::PlanningApplication => Some((DocumentKind::PlanningDrawings, Role::Architect)),
            Stage::PartyWall => Some((DocumentKind::PartyWallNotice, Role::Surveyor)),
            Stage::Construction => Some((DocumentKind::BuildingContract, Role::Contractor)),
            Stage::Completion => Some((DocumentKind::CompletionCertificate, Role::Contractor)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequireDocumentUpload {
    pub project_id: ProjectId,
    pub stage: Stage,
    pub document: DocumentKind,
    pub requested_from: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOpenBids {
    pub project_id: ProjectId,
    pub bid_ids: Vec<String>,
    /// Contractors whose bids were closed
    pub bidders: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    NotifyParticipants(NotifyParticipants),
    RequireDocumentUpload(RequireDocumentUpload),
    CloseOpenBids(CloseOpenBids),
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::NotifyParticipants(_) => "notify_participants",
            Effect::RequireDocumentUpload(_) => "require_document_upload",
            Effect::CloseOpenBids(_) => "close_open_bids",
        }
    }
}
