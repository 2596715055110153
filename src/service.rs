// Workflow service: the boundary where snapshots are loaded, commands are
// applied by the pure coordinator, results are saved with a version check
// and effects are handed to the collaborators.

use backon::{ExponentialBuilder, Retryable};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn, Instrument};

use crate::collaborators::{
    DispatchReport, EffectExecutor, FileProjectStore, IdentityProvider, InMemoryProjectStore,
    LoggingNotifier, MembershipIdentity, PendingUploadQueue, ProjectStore, StoreError,
};
use crate::config::{StorageBackend, StorageConfig, WorkflowConfig};
use crate::intake::NewProjectRequest;
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::workflow::{
    ActionDescriptor, Actor, CommandOutcome, MembershipStatus, ProjectId, ProjectState, Role,
    RoleActionPolicy, UserId, WorkflowCommand, WorkflowCoordinator, WorkflowError,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("user {user_id} is not a participant in project {project_id}")]
    NotAParticipant {
        project_id: ProjectId,
        user_id: UserId,
    },

    #[error("project {project_id} kept changing underneath us; gave up after {attempts} attempts")]
    ConflictRetriesExhausted { project_id: ProjectId, attempts: u32 },

    #[error("storage backend {backend:?} is not available in this build")]
    BackendUnavailable { backend: StorageBackend },
}

impl ServiceError {
    /// A save lost the race against another writer
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Store(e) if e.is_conflict())
    }
}

/// Open the project store selected by configuration
pub async fn open_store(storage: &StorageConfig) -> Result<Arc<dyn ProjectStore>, ServiceError> {
    info!(backend = ?storage.backend, "Opening project store");
    match storage.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryProjectStore::new())),
        StorageBackend::File => Ok(Arc::new(FileProjectStore::new(&storage.state_dir))),
        #[cfg(feature = "database")]
        StorageBackend::Sqlite => Ok(Arc::new(
            crate::database::SqliteProjectStore::new(&storage.database_url).await?,
        )),
        #[cfg(not(feature = "database"))]
        StorageBackend::Sqlite => Err(ServiceError::BackendUnavailable {
            backend: StorageBackend::Sqlite,
        }),
    }
}

const MAX_BACKOFF_FACTOR: u32 = 16;

/// How conflicting saves are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_conflict_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Jittered exponential backoff starting at `backoff`
    fn strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.backoff)
            .with_max_delay(self.backoff.saturating_mul(MAX_BACKOFF_FACTOR))
            .with_max_times(self.max_conflict_retries as usize)
            .with_jitter()
    }
}

/// Everything that happened while executing one command
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub outcome: CommandOutcome,
    /// Load/apply/save rounds it took, 1 without conflicts
    pub attempts: u32,
    /// Whether a new snapshot was written
    pub saved: bool,
    pub dispatch: DispatchReport,
}

pub struct WorkflowService {
    coordinator: WorkflowCoordinator,
    store: Arc<dyn ProjectStore>,
    identity: Arc<dyn IdentityProvider>,
    executor: EffectExecutor,
    retry: RetryPolicy,
}

impl WorkflowService {
    pub fn new(
        coordinator: WorkflowCoordinator,
        store: Arc<dyn ProjectStore>,
        identity: Arc<dyn IdentityProvider>,
        executor: EffectExecutor,
    ) -> Self {
        Self {
            coordinator,
            store,
            identity,
            executor,
            retry: RetryPolicy::default(),
        }
    }

    /// Service wired from configuration with logging notifications, an
    /// in-process upload queue and membership-based identity
    pub fn from_config(config: &WorkflowConfig, store: Arc<dyn ProjectStore>) -> Self {
        let coordinator = WorkflowCoordinator::new(
            RoleActionPolicy::default(),
            config.transition_validator(),
            config.enforcement_policy(),
        );
        let identity = MembershipIdentity::with_admins(
            config.service.admins.iter().map(|id| UserId::from(id.as_str())),
        );
        let executor = EffectExecutor::new(
            Arc::new(LoggingNotifier),
            Arc::new(PendingUploadQueue::new()),
        );

        Self::new(coordinator, store, Arc::new(identity), executor).with_retry(RetryPolicy {
            max_conflict_retries: config.service.max_conflict_retries,
            backoff: Duration::from_millis(config.service.retry_backoff_ms),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn coordinator(&self) -> &WorkflowCoordinator {
        &self.coordinator
    }

    /// Open a new project from an intake request and store its first snapshot
    pub async fn create_project(
        &self,
        request: &NewProjectRequest,
    ) -> Result<ProjectState, ServiceError> {
        let state = request.to_project_state(ProjectId::generate(), self.coordinator.now());
        self.store.save_project_state(&state, 0).await?;
        info!(
            project_id = %state.project_id,
            owner = %request.owner,
            title = %request.title,
            "Project created"
        );
        Ok(state)
    }

    pub async fn load(&self, project_id: &ProjectId) -> Result<ProjectState, ServiceError> {
        Ok(self.store.load_project_state(project_id).await?)
    }

    /// Actions `user_id` can take on the project right now
    pub async fn available_actions(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<Vec<ActionDescriptor>, ServiceError> {
        let state = self.store.load_project_state(project_id).await?;
        let role = self.resolve_role(&state, user_id, None).await?;
        Ok(self.coordinator.available_actions(&state, role))
    }

    async fn resolve_role(
        &self,
        state: &ProjectState,
        user_id: &UserId,
        command: Option<&WorkflowCommand>,
    ) -> Result<Role, ServiceError> {
        if let Some(role) = self.identity.role_for(state, user_id).await {
            return Ok(role);
        }

        // Invitees act in their invited role until they accept
        let invited = state
            .membership(user_id)
            .filter(|m| m.status == MembershipStatus::Invited)
            .map(|m| m.role);
        match (command, invited) {
            (Some(WorkflowCommand::AcceptInvitation), Some(role)) => Ok(role),
            _ => Err(ServiceError::NotAParticipant {
                project_id: state.project_id.clone(),
                user_id: user_id.clone(),
            }),
        }
    }

    /// Execute `command` for `user_id`, retrying on concurrent modification
    pub async fn execute(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        command: &WorkflowCommand,
    ) -> Result<ExecutionReport, ServiceError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            command.name(),
            Some(project_id.as_str()),
            Some(correlation_id.as_str()),
        );
        self.execute_inner(project_id, user_id, command)
            .instrument(span)
            .await
    }

    /// One load/apply/save round. Returns whether a new snapshot was written.
    async fn attempt(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        command: &WorkflowCommand,
    ) -> Result<(CommandOutcome, bool), ServiceError> {
        let state = self.store.load_project_state(project_id).await?;
        let role = self.resolve_role(&state, user_id, Some(command)).await?;
        let actor = Actor::new(user_id.clone(), role);
        let outcome = self.coordinator.apply(&state, &actor, command)?;

        if outcome.state.version == state.version {
            return Ok((outcome, false));
        }
        self.store
            .save_project_state(&outcome.state, state.version)
            .await?;
        Ok((outcome, true))
    }

    async fn execute_inner(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        command: &WorkflowCommand,
    ) -> Result<ExecutionReport, ServiceError> {
        let attempts = AtomicU32::new(0);
        let result = (|| {
            attempts.fetch_add(1, Ordering::Relaxed);
            self.attempt(project_id, user_id, command)
        })
        .retry(self.retry.strategy())
        .sleep(tokio::time::sleep)
        .when(ServiceError::is_conflict)
        .notify(|err: &ServiceError, delay: Duration| {
            warn!(
                project_id = %project_id,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Version conflict, reloading"
            );
        })
        .await;

        let attempt = attempts.into_inner();
        let (outcome, saved) = match result {
            Ok(done) => done,
            Err(e) if e.is_conflict() => {
                warn!(
                    project_id = %project_id,
                    attempts = attempt,
                    "Giving up after repeated version conflicts"
                );
                return Err(ServiceError::ConflictRetriesExhausted {
                    project_id: project_id.clone(),
                    attempts: attempt,
                });
            }
            Err(e) => return Err(e),
        };

        let dispatch = self.executor.dispatch(&outcome.effects).await;
        info!(
            project_id = %project_id,
            command = command.name(),
            version = outcome.state.version,
            attempts = attempt,
            saved,
            effects = outcome.effects.len(),
            failed_effects = dispatch.failures.len(),
            "Command executed"
        );

        Ok(ExecutionReport {
            outcome,
            attempts: attempt,
            saved,
            dispatch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockProjectStore, RecordingNotifier};
    use crate::workflow::{Effect, FixedClock, Stage};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn coordinator() -> WorkflowCoordinator {
        WorkflowCoordinator::default().with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
        )))
    }

    fn executor(notifier: Arc<RecordingNotifier>) -> EffectExecutor {
        EffectExecutor::new(notifier, Arc::new(PendingUploadQueue::new()))
    }

    fn seeded(project_id: &str) -> ProjectState {
        ProjectState::new(ProjectId::from(project_id), UserId::from("owner"), Utc::now())
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            max_conflict_retries: 3,
            backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_execute_saves_and_dispatches() {
        let store = Arc::new(InMemoryProjectStore::new());
        let mut state = seeded("svc-1");
        state.participants.push(crate::workflow::ProjectMembership {
            project_id: state.project_id.clone(),
            user_id: UserId::from("arch"),
            role: Role::Architect,
            status: MembershipStatus::Invited,
        });
        store.save_project_state(&state, 0).await.unwrap();

        let notifier = Arc::new(RecordingNotifier::new());
        let service = WorkflowService::new(
            coordinator(),
            store.clone(),
            Arc::new(MembershipIdentity::new()),
            executor(notifier.clone()),
        );

        let report = service
            .execute(
                &ProjectId::from("svc-1"),
                &UserId::from("owner"),
                &WorkflowCommand::RequestTransition {
                    target: Stage::PlanningAssessment,
                    force: false,
                },
            )
            .await
            .unwrap();

        assert!(report.saved);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.outcome.state.version, 2);
        assert!(matches!(report.outcome.effects[0], Effect::NotifyParticipants(_)));
        assert_eq!(notifier.sent().await.len(), 1);

        let stored = store.load_project_state(&ProjectId::from("svc-1")).await.unwrap();
        assert_eq!(stored.current_stage, Stage::PlanningAssessment);
    }

    #[tokio::test]
    async fn test_noop_transition_skips_save() {
        let mut store = MockProjectStore::new();
        store
            .expect_load_project_state()
            .times(1)
            .returning(|id| Ok(ProjectState::new(id.clone(), UserId::from("owner"), Utc::now())));
        store.expect_save_project_state().never();

        let service = WorkflowService::new(
            coordinator(),
            Arc::new(store),
            Arc::new(MembershipIdentity::new()),
            executor(Arc::new(RecordingNotifier::new())),
        );

        let report = service
            .execute(
                &ProjectId::from("svc-2"),
                &UserId::from("owner"),
                &WorkflowCommand::RequestTransition {
                    target: Stage::Initial,
                    force: false,
                },
            )
            .await
            .unwrap();
        assert!(!report.saved);
        assert!(report.outcome.effects.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_reloads_and_retries() {
        let loads = Arc::new(Mutex::new(0u32));
        let mut store = MockProjectStore::new();
        let counter = loads.clone();
        store.expect_load_project_state().times(2).returning(move |id| {
            let mut count = counter.lock().unwrap();
            *count += 1;
            let mut state = ProjectState::new(id.clone(), UserId::from("owner"), Utc::now());
            // Someone else saved between our first load and save
            state.version = *count as u64;
            Ok(state)
        });

        let mut seq = mockall::Sequence::new();
        store
            .expect_save_project_state()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|state, expected| {
                Err(StoreError::ConcurrentModification {
                    project_id: state.project_id.clone(),
                    expected,
                    found: expected + 1,
                })
            });
        store
            .expect_save_project_state()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|state, expected| *expected == 2 && state.version == 3)
            .returning(|_, _| Ok(()));

        let service = WorkflowService::new(
            coordinator(),
            Arc::new(store),
            Arc::new(MembershipIdentity::new()),
            executor(Arc::new(RecordingNotifier::new())),
        )
        .with_retry(no_wait());

        let report = service
            .execute(
                &ProjectId::from("svc-3"),
                &UserId::from("owner"),
                &WorkflowCommand::InviteProfessional {
                    user_id: UserId::from("arch"),
                    role: Role::Architect,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(*loads.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_conflict_retries_are_bounded() {
        let mut store = MockProjectStore::new();
        store
            .expect_load_project_state()
            .times(3)
            .returning(|id| Ok(ProjectState::new(id.clone(), UserId::from("owner"), Utc::now())));
        store
            .expect_save_project_state()
            .times(3)
            .returning(|state, expected| {
                Err(StoreError::ConcurrentModification {
                    project_id: state.project_id.clone(),
                    expected,
                    found: expected + 1,
                })
            });

        let service = WorkflowService::new(
            coordinator(),
            Arc::new(store),
            Arc::new(MembershipIdentity::new()),
            executor(Arc::new(RecordingNotifier::new())),
        )
        .with_retry(RetryPolicy {
            max_conflict_retries: 2,
            backoff: Duration::ZERO,
        });

        let err = service
            .execute(
                &ProjectId::from("svc-4"),
                &UserId::from("owner"),
                &WorkflowCommand::AssignMembership {
                    user_id: UserId::from("builder"),
                    role: Role::Contractor,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::ConflictRetriesExhausted { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let store = Arc::new(InMemoryProjectStore::new());
        store.save_project_state(&seeded("svc-5"), 0).await.unwrap();
        let service = WorkflowService::new(
            coordinator(),
            store,
            Arc::new(MembershipIdentity::new()),
            executor(Arc::new(RecordingNotifier::new())),
        );

        let err = service
            .execute(
                &ProjectId::from("svc-5"),
                &UserId::from("stranger"),
                &WorkflowCommand::RequestTransition {
                    target: Stage::Cancelled,
                    force: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotAParticipant { .. }));
    }

    #[tokio::test]
    async fn test_invitee_can_accept_before_being_active() {
        let store = Arc::new(InMemoryProjectStore::new());
        store.save_project_state(&seeded("svc-6"), 0).await.unwrap();
        let service = WorkflowService::new(
            coordinator(),
            store,
            Arc::new(MembershipIdentity::new()),
            executor(Arc::new(RecordingNotifier::new())),
        );
        let project_id = ProjectId::from("svc-6");

        service
            .execute(
                &project_id,
                &UserId::from("owner"),
                &WorkflowCommand::InviteProfessional {
                    user_id: UserId::from("surveyor"),
                    role: Role::Surveyor,
                },
            )
            .await
            .unwrap();

        let report = service
            .execute(&project_id, &UserId::from("surveyor"), &WorkflowCommand::AcceptInvitation)
            .await
            .unwrap();
        assert_eq!(
            report.outcome.state.active_role(&UserId::from("surveyor")),
            Some(Role::Surveyor)
        );

        let actions = service
            .available_actions(&project_id, &UserId::from("surveyor"))
            .await
            .unwrap();
        assert!(!actions.is_empty());
    }

    #[tokio::test]
    async fn test_open_store_memory_backend() {
        let storage = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let store = open_store(&storage).await.unwrap();
        let err = store
            .load_project_state(&ProjectId::from("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_retry_strategy_is_bounded_and_jittered() {
        use backon::BackoffBuilder;

        let policy = RetryPolicy {
            max_conflict_retries: 3,
            backoff: Duration::from_millis(10),
        };
        let delays: Vec<Duration> = policy.strategy().build().collect();
        assert_eq!(delays.len(), 3);
        assert!(delays[0] >= Duration::from_millis(10));
        assert!(delays[0] <= Duration::from_millis(20));

        let immediate: Vec<Duration> = no_wait().strategy().build().collect();
        assert_eq!(immediate, vec![Duration::ZERO; 3]);
    }

    #[test]
    fn test_only_store_conflicts_are_retried() {
        let conflict = ServiceError::Store(StoreError::ConcurrentModification {
            project_id: ProjectId::from("p"),
            expected: 1,
            found: 2,
        });
        assert!(conflict.is_conflict());
        assert!(!ServiceError::Store(StoreError::NotFound {
            project_id: ProjectId::from("p")
        })
        .is_conflict());
        assert!(!ServiceError::Workflow(WorkflowError::BidNotFound {
            bid_id: "b".to_string()
        })
        .is_conflict());
    }
}
