// Collaborators the workflow boundary talks to: persistence, notifications,
// document requests and identity.

pub mod executor;
pub mod file_store;
pub mod memory;
pub mod traits;

pub use executor::{DeliveryFailure, DispatchReport, EffectExecutor};
pub use file_store::FileProjectStore;
pub use memory::{
    InMemoryProjectStore, LoggingNotifier, MembershipIdentity, PendingUploadQueue,
    RecordingNotifier,
};
pub use traits::{
    DeliveryError, DocumentStore, IdentityProvider, Notifier, PendingUploadRequest, ProjectStore,
    StoreError,
};

#[cfg(test)]
pub use traits::{MockDocumentStore, MockIdentityProvider, MockNotifier, MockProjectStore};
