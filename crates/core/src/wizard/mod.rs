pub mod catalog;
pub mod controller;
pub mod definition;
pub mod shared;
pub mod states;

pub use catalog::{Catalog, CatalogError};
pub use controller::{WizardController, WizardError};
pub use definition::{DefinitionError, StepDefinition, StepKind, StepOption, WizardDefinition, WizardKind};
pub use shared::SharedWizard;
pub use states::{
    AdvanceDecision, AdvanceOutcome, SessionId, SubmissionState, WizardSession, WizardState,
};
