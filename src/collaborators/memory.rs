// In-process collaborator implementations

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::*;
use crate::workflow::{
    NotifyParticipants, ProjectId, ProjectState, RequireDocumentUpload, Role, UserId,
};

/// Project store held in memory, guarded by a version check on every save
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<ProjectId, ProjectState>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.projects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.projects.read().await.is_empty()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn load_project_state(&self, project_id: &ProjectId) -> Result<ProjectState, StoreError> {
        self.projects
            .read()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                project_id: project_id.clone(),
            })
    }

    async fn save_project_state(
        &self,
        state: &ProjectState,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut projects = self.projects.write().await;
        let found = projects
            .get(&state.project_id)
            .map(|stored| stored.version)
            .unwrap_or(0);

        if found != expected_version {
            return Err(StoreError::ConcurrentModification {
                project_id: state.project_id.clone(),
                expected: expected_version,
                found,
            });
        }

        debug!(
            project_id = %state.project_id,
            version = state.version,
            "Saved project state in memory"
        );
        projects.insert(state.project_id.clone(), state.clone());
        Ok(())
    }
}

/// Notifier that only writes structured log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, effect: &NotifyParticipants) -> Result<(), DeliveryError> {
        info!(
            project_id = %effect.project_id,
            recipients = effect.recipients.len(),
            notice = ?effect.notice,
            "Notification dispatched"
        );
        Ok(())
    }
}

/// Notifier that keeps everything it was asked to send
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotifyParticipants>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<NotifyParticipants> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, effect: &NotifyParticipants) -> Result<(), DeliveryError> {
        self.sent.lock().await.push(effect.clone());
        Ok(())
    }
}

/// Document collaborator that queues upload requests until they are fulfilled
#[derive(Debug, Default)]
pub struct PendingUploadQueue {
    pending: RwLock<Vec<PendingUploadRequest>>,
}

impl PendingUploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending(&self) -> Vec<PendingUploadRequest> {
        self.pending.read().await.clone()
    }

    pub async fn pending_for(&self, project_id: &ProjectId) -> Vec<PendingUploadRequest> {
        self.pending
            .read()
            .await
            .iter()
            .filter(|p| &p.request.project_id == project_id)
            .cloned()
            .collect()
    }

    /// Mark an upload as received, returning whether it was pending
    pub async fn fulfil(&self, upload_id: &str) -> bool {
        let mut pending = self.pending.write().await;
        let before = pending.len();
        pending.retain(|p| p.upload_id != upload_id);
        before != pending.len()
    }
}

#[async_trait]
impl DocumentStore for PendingUploadQueue {
    async fn require_upload(
        &self,
        effect: &RequireDocumentUpload,
    ) -> Result<PendingUploadRequest, DeliveryError> {
        let mut pending = self.pending.write().await;
        if let Some(existing) = pending.iter().find(|p| &p.request == effect) {
            debug!(upload_id = %existing.upload_id, "Upload already pending");
            return Ok(existing.clone());
        }

        let request = PendingUploadRequest {
            upload_id: Uuid::new_v4().to_string(),
            request: effect.clone(),
            requested_at: Utc::now(),
        };
        info!(
            project_id = %effect.project_id,
            stage = %effect.stage,
            document = ?effect.document,
            requested_from = %effect.requested_from,
            upload_id = %request.upload_id,
            "Document upload requested"
        );
        pending.push(request.clone());
        Ok(request)
    }
}

/// Resolves the actor's role from their active membership. Configured
/// administrators act as `admin` on every project they are not a member of.
#[derive(Debug, Default, Clone)]
pub struct MembershipIdentity {
    admins: HashSet<UserId>,
}

impl MembershipIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admins<I>(admins: I) -> Self
    where
        I: IntoIterator<Item = UserId>,
    {
        Self {
            admins: admins.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for MembershipIdentity {
    async fn role_for(&self, project: &ProjectState, user_id: &UserId) -> Option<Role> {
        project
            .active_role(user_id)
            .or_else(|| self.admins.contains(user_id).then_some(Role::Admin))
    }
}
