//! Shared builders for integration tests
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use project_workflow::collaborators::{
    EffectExecutor, FileProjectStore, MembershipIdentity, PendingUploadQueue, ProjectStore,
    RecordingNotifier,
};
use project_workflow::intake::{
    quick_start, AdditionalInfo, BudgetRange, NewProjectRequest, ProjectType, PropertyDetails,
    Timeline,
};
use project_workflow::service::{RetryPolicy, WorkflowService};
use project_workflow::workflow::{
    FixedClock, MembershipStatus, ProjectId, ProjectMembership, ProjectState, Role, Stage,
    UserId, WorkflowCoordinator,
};

pub const OWNER: &str = "homeowner-1";
pub const ARCHITECT: &str = "architect-1";
pub const SURVEYOR: &str = "surveyor-1";
pub const CONTRACTOR: &str = "builder-1";

pub fn march_14() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap()
}

pub fn coordinator() -> WorkflowCoordinator {
    WorkflowCoordinator::default().with_clock(Arc::new(FixedClock(march_14())))
}

pub fn new_project(project_id: &str) -> ProjectState {
    ProjectState::new(ProjectId::from(project_id), UserId::from(OWNER), march_14())
}

/// Project with an active architect, surveyor and contractor alongside the owner
pub fn staffed_project(project_id: &str, stage: Stage) -> ProjectState {
    let mut state = new_project(project_id);
    state.current_stage = stage;
    for (user, role) in [
        (ARCHITECT, Role::Architect),
        (SURVEYOR, Role::Surveyor),
        (CONTRACTOR, Role::Contractor),
    ] {
        state.participants.push(ProjectMembership {
            project_id: state.project_id.clone(),
            user_id: UserId::from(user),
            role,
            status: MembershipStatus::Active,
        });
    }
    state
}

pub fn leeds_property() -> PropertyDetails {
    PropertyDetails::new("12 Acacia Avenue", "Leeds", "LS6 2AB")
}

pub fn loft_request() -> NewProjectRequest {
    quick_start(
        OWNER,
        ProjectType::LoftConversion,
        Some("Dormer loft with ensuite".to_string()),
        leeds_property(),
        AdditionalInfo {
            budget_range: Some(BudgetRange::From50kTo100k),
            timeline: Some(Timeline::ThreeToSixMonths),
            title: None,
        },
    )
    .expect("fixture request is valid")
}

/// Fresh directory removed when the guard drops
pub fn temp_state_dir(label: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("project-workflow-{label}-"))
        .tempdir()
        .expect("create temp dir")
}

/// Collaborators a test can inspect after running commands
pub struct Harness {
    pub service: WorkflowService,
    pub notifier: Arc<RecordingNotifier>,
    pub uploads: Arc<PendingUploadQueue>,
}

pub fn harness(store: Arc<dyn ProjectStore>) -> Harness {
    let notifier = Arc::new(RecordingNotifier::new());
    let uploads = Arc::new(PendingUploadQueue::new());
    let service = WorkflowService::new(
        coordinator(),
        store,
        Arc::new(MembershipIdentity::new()),
        EffectExecutor::new(notifier.clone(), uploads.clone()),
    )
    .with_retry(RetryPolicy {
        max_conflict_retries: 20,
        backoff: Duration::from_millis(1),
    });
    Harness {
        service,
        notifier,
        uploads,
    }
}

pub fn file_store(label: &str) -> (Arc<FileProjectStore>, TempDir) {
    let dir = temp_state_dir(label);
    (Arc::new(FileProjectStore::new(dir.path())), dir)
}
