// Traits for the external collaborators the engine hands work to

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::workflow::{
    NotifyParticipants, ProjectId, ProjectState, RequireDocumentUpload, Role, UserId,
};

/// Errors from the persistence collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("project {project_id} was modified concurrently: expected version {expected}, found {found}")]
    ConcurrentModification {
        project_id: ProjectId,
        expected: u64,
        found: u64,
    },

    #[error("project {project_id} not found")]
    NotFound { project_id: ProjectId },

    #[error("invalid project id: {project_id}")]
    InvalidProjectId { project_id: ProjectId },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock acquisition failed: {reason}")]
    Lock { reason: String },

    #[error("Database error: {reason}")]
    Database { reason: String },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrentModification { .. })
    }
}

/// Errors from notification and document collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery to {recipient} failed: {reason}")]
    Rejected { recipient: String, reason: String },

    #[error("collaborator unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Persistence of project snapshots with optimistic concurrency
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn load_project_state(&self, project_id: &ProjectId) -> Result<ProjectState, StoreError>;

    /// Store `state` if the stored version still equals `expected_version`
    /// (0 for a project that has never been saved).
    async fn save_project_state(
        &self,
        state: &ProjectState,
        expected_version: u64,
    ) -> Result<(), StoreError>;
}

/// Fire-and-forget notification delivery
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, effect: &NotifyParticipants) -> Result<(), DeliveryError>;
}

/// Handle for an upload the document store is now waiting for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUploadRequest {
    pub upload_id: String,
    pub request: RequireDocumentUpload,
    pub requested_at: DateTime<Utc>,
}

/// Document/storage collaborator. Transfers and validation happen elsewhere.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn require_upload(
        &self,
        effect: &RequireDocumentUpload,
    ) -> Result<PendingUploadRequest, DeliveryError>;
}

/// Identity collaborator: the role a user acts in on a project.
/// The engine trusts the answer as given.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn role_for(&self, project: &ProjectState, user_id: &UserId) -> Option<Role>;
}
