// Quick project intake: collects a new project's brief step by step and
// turns it into the project's first workflow snapshot.

pub mod catalog;
pub mod wizard;

pub use catalog::{BudgetRange, ProjectType, PropertyType, Timeline, UnknownChoiceError};
pub use wizard::{
    normalize_postcode, quick_start, AdditionalInfo, IntakeError, IntakeSession,
    NewProjectRequest, PropertyDetails, QuickProjectWizard, WizardEvent, WizardStep,
};
