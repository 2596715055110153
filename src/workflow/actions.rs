// Capabilities surfaced to participants at a given stage

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    RequestAssessment,
    ViewAssessment,
    UpdateAssessment,
    ViewApplication,
    UpdateApplication,
    ViewPartyWall,
    ManagePartyWall,
    SubmitBid,
    ViewBids,
    TrackProgress,
    UpdateProgress,
    LeaveReview,
    UploadDocument,
    SendMessage,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::RequestAssessment => "request_assessment",
            Action::ViewAssessment => "view_assessment",
            Action::UpdateAssessment => "update_assessment",
            Action::ViewApplication => "view_application",
            Action::UpdateApplication => "update_application",
            Action::ViewPartyWall => "view_party_wall",
            Action::ManagePartyWall => "manage_party_wall",
            Action::SubmitBid => "submit_bid",
            Action::ViewBids => "view_bids",
            Action::TrackProgress => "track_progress",
            Action::UpdateProgress => "update_progress",
            Action::LeaveReview => "leave_review",
            Action::UploadDocument => "upload_document",
            Action::SendMessage => "send_message",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the caller surfaces an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Links to a project sub-view, e.g. `assessment/edit`
    Navigational { view: &'static str },
    /// Opens a command that needs input from the participant
    Mutating,
}

/// An action as offered at a particular stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub action: Action,
    pub label: &'static str,
    pub kind: ActionKind,
    pub primary: bool,
}

impl ActionDescriptor {
    pub const fn navigational(action: Action, label: &'static str, view: &'static str) -> Self {
        Self {
            action,
            label,
            kind: ActionKind::Navigational { view },
            primary: false,
        }
    }

    pub const fn mutating(action: Action, label: &'static str) -> Self {
        Self {
            action,
            label,
            kind: ActionKind::Mutating,
            primary: false,
        }
    }

    pub const fn primary(self) -> Self {
        Self {
            primary: true,
            ..self
        }
    }

    pub fn is_navigational(&self) -> bool {
        matches!(self.kind, ActionKind::Navigational { .. })
    }
}
