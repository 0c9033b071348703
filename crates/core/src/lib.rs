pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod quote;
pub mod submission;
pub mod wizard;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::answers::{AnswerSet, AnswerValue, ContactDetails, StepKey};
pub use domain::price_table::{PriceRule, PriceRuleGroup, PriceTable, SelectionMode, UnitPricing};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use quote::{compute_price, price_with_trace, DeterministicQuoteEngine, QuoteBreakdown, QuoteEngine};
pub use submission::{
    Notifier, NotificationError, PersistThenNotify, SubmissionCollaborator, SubmissionError,
    SubmissionId, SubmissionPayload, SubmissionRecord, SubmissionStore,
};
pub use wizard::{
    AdvanceOutcome, Catalog, SessionId, SharedWizard, WizardController, WizardDefinition,
    WizardError, WizardKind, WizardState,
};
