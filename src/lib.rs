// Project Workflow Library - staged home-improvement project coordination
// This exposes the core components for testing and integration

pub mod collaborators;
pub mod config;
pub mod database;
pub mod intake;
pub mod service;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use collaborators::{
    DispatchReport, DocumentStore, EffectExecutor, FileProjectStore, IdentityProvider,
    InMemoryProjectStore, LoggingNotifier, MembershipIdentity, Notifier, PendingUploadQueue,
    PendingUploadRequest, ProjectStore, RecordingNotifier, StoreError,
};
pub use config::{config, init_config, StorageBackend, WorkflowConfig};
#[cfg(feature = "database")]
pub use database::SqliteProjectStore;
pub use intake::{IntakeError, IntakeSession, NewProjectRequest, QuickProjectWizard};
pub use service::{open_store, ExecutionReport, RetryPolicy, ServiceError, WorkflowService};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    ActionDescriptor, Actor, CommandOutcome, Effect, ProjectId, ProjectState, Role, Stage,
    TransitionKind, UserId, WorkflowCommand, WorkflowCoordinator, WorkflowError,
};
