use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::answers::{AnswerSet, AnswerValue, StepKey};
use crate::quote::{DeterministicQuoteEngine, QuoteEngine};
use crate::submission::{SubmissionCollaborator, SubmissionError, SubmissionPayload};
use crate::wizard::definition::{StepKind, WizardDefinition};
use crate::wizard::states::{
    AdvanceDecision, AdvanceOutcome, SessionId, SubmissionState, WizardSession, WizardState,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("cannot {action} while the wizard is {state}")]
    InvalidTransition { action: &'static str, state: &'static str },
    #[error("already at the first step")]
    AtFirstStep,
    #[error("step `{step}` expects a {expected} answer, got {actual}")]
    ShapeMismatch { step: StepKey, expected: &'static str, actual: &'static str },
    #[error("answer {value} for step `{step}` is outside {min}..={max}")]
    OutOfRange { step: StepKey, value: i64, min: i64, max: i64 },
    #[error("`{option}` is not an option of step `{step}`")]
    UnknownOption { step: StepKey, option: String },
}

struct AuditHook {
    sink: Arc<dyn AuditSink>,
    context: AuditContext,
}

/// Drives one wizard session: answers, navigation, live price and the
/// single submission at the end.
pub struct WizardController<Q = DeterministicQuoteEngine> {
    definition: Arc<WizardDefinition>,
    engine: Q,
    session: WizardSession,
    audit: Option<AuditHook>,
}

impl WizardController<DeterministicQuoteEngine> {
    pub fn new(definition: Arc<WizardDefinition>) -> Self {
        Self::with_engine(definition, DeterministicQuoteEngine)
    }
}

impl<Q> WizardController<Q>
where
    Q: QuoteEngine,
{
    pub fn with_engine(definition: Arc<WizardDefinition>, engine: Q) -> Self {
        let session = fresh_session(&definition, &engine);
        Self { definition, engine, session, audit: None }
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>, context: AuditContext) -> Self {
        self.audit = Some(AuditHook { sink, context });
        self
    }

    pub fn definition(&self) -> &Arc<WizardDefinition> {
        &self.definition
    }

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session.id
    }

    pub fn state(&self) -> WizardState {
        self.session.state()
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.session.answers
    }

    pub fn computed_price(&self) -> i64 {
        self.session.computed_price
    }

    pub fn current_step_index(&self) -> usize {
        self.session.current_step_index
    }

    pub fn is_step_complete(&self, index: usize) -> bool {
        self.definition.is_step_complete(index, &self.session.answers)
    }

    pub fn can_advance(&self) -> bool {
        self.is_open() && self.is_step_complete(self.session.current_step_index)
    }

    /// Stores `value` under `key` and returns the recomputed price.
    ///
    /// Keys that match no step are kept but never priced. Answers are still
    /// editable after a failed submission so the user can correct and retry.
    pub fn record_answer(
        &mut self,
        key: impl Into<StepKey>,
        value: AnswerValue,
    ) -> Result<i64, WizardError> {
        self.ensure_open("record an answer")?;
        let key = key.into();

        if let Some(step) = self.definition.step_by_key(&key) {
            if !step.kind.accepts(&value) {
                return Err(WizardError::ShapeMismatch {
                    step: key,
                    expected: step.kind.expected_shape(),
                    actual: value.shape(),
                });
            }
            if let (StepKind::Numeric { min, max, .. }, AnswerValue::Number(number)) =
                (&step.kind, &value)
            {
                if number < min || number > max {
                    return Err(WizardError::OutOfRange {
                        step: key,
                        value: *number,
                        min: *min,
                        max: *max,
                    });
                }
            }
            if let Some(option) = unknown_option(&step.kind, &value) {
                return Err(WizardError::UnknownOption { step: key, option: option.to_owned() });
            }
        }

        self.session.answers.insert(key, value);
        self.refresh_price();
        Ok(self.session.computed_price)
    }

    pub fn retreat(&mut self) -> Result<usize, WizardError> {
        if self.session.submission_state != SubmissionState::Idle {
            return Err(WizardError::InvalidTransition {
                action: "go back",
                state: self.state_label(),
            });
        }
        let index = self.session.current_step_index;
        if index == 0 {
            return Err(WizardError::AtFirstStep);
        }
        self.session.current_step_index = index - 1;
        self.emit("wizard.step_retreated", AuditCategory::Wizard, AuditOutcome::Success, |event| {
            event.with_metadata("from", index.to_string()).with_metadata("to", (index - 1).to_string())
        });
        Ok(index - 1)
    }

    /// Synchronous half of [`advance`](Self::advance).
    ///
    /// On the last step this flips the session to `Submitting` and hands back
    /// the payload; every later call returns `Ignored` until the submission is
    /// finished, so one session can never submit twice concurrently.
    pub fn begin_advance(&mut self) -> AdvanceDecision {
        if !self.is_open() {
            return AdvanceDecision::Ignored;
        }

        let index = self.session.current_step_index;
        if !self.is_step_complete(index) {
            self.emit("wizard.advance_blocked", AuditCategory::Wizard, AuditOutcome::Rejected, |event| {
                event.with_metadata("step", index.to_string())
            });
            return AdvanceDecision::Blocked { step: index };
        }

        if index < self.definition.last_step_index() {
            self.session.current_step_index = index + 1;
            self.emit("wizard.step_advanced", AuditCategory::Wizard, AuditOutcome::Success, |event| {
                event.with_metadata("from", index.to_string()).with_metadata("to", (index + 1).to_string())
            });
            return AdvanceDecision::Moved { from: index, to: index + 1 };
        }

        let contact_key = &self.definition.contact_step().key;
        let Some(contact) = self.session.answers.contact(contact_key).cloned() else {
            return AdvanceDecision::Blocked { step: index };
        };

        self.session.submission_state = SubmissionState::Submitting;
        let payload = SubmissionPayload {
            session_id: self.session.id.clone(),
            kind: self.definition.kind(),
            answers: self.session.answers.clone(),
            computed_price: self.session.computed_price,
            contact,
        };
        let price = payload.computed_price;
        self.emit("submission.started", AuditCategory::Submission, AuditOutcome::Success, |event| {
            event.with_metadata("computed_price", price.to_string())
        });
        AdvanceDecision::Submit(Box::new(payload))
    }

    pub fn submission_succeeded(&mut self) -> Result<(), WizardError> {
        self.ensure_submitting("complete a submission")?;
        self.session.submission_state = SubmissionState::Submitted;
        self.emit("submission.succeeded", AuditCategory::Submission, AuditOutcome::Success, |event| {
            event
        });
        Ok(())
    }

    /// Answers and step index are left untouched so the user can retry.
    pub fn submission_failed(&mut self, reason: impl Into<String>) -> Result<(), WizardError> {
        self.ensure_submitting("fail a submission")?;
        let reason = reason.into();
        warn!(
            event_name = "wizard.submission_failed",
            session_id = %self.session.id,
            reason = %reason,
            "submission failed"
        );
        self.emit("submission.failed", AuditCategory::Submission, AuditOutcome::Failed, |event| {
            event.with_metadata("reason", reason.clone())
        });
        self.session.submission_state = SubmissionState::Failed { reason };
        Ok(())
    }

    pub fn finish_submission(&mut self, result: Result<(), SubmissionError>) -> AdvanceOutcome {
        match result {
            Ok(()) => match self.submission_succeeded() {
                Ok(()) => AdvanceOutcome::Submitted,
                Err(_) => AdvanceOutcome::Ignored,
            },
            Err(error) => {
                let reason = error.to_string();
                match self.submission_failed(reason.clone()) {
                    Ok(()) => AdvanceOutcome::Failed { reason },
                    Err(_) => AdvanceOutcome::Ignored,
                }
            }
        }
    }

    /// Moves forward one step, or submits when the last step is complete.
    pub async fn advance<C>(&mut self, collaborator: &C) -> AdvanceOutcome
    where
        C: SubmissionCollaborator + ?Sized,
    {
        match self.begin_advance() {
            AdvanceDecision::Moved { from, to } => AdvanceOutcome::Moved { from, to },
            AdvanceDecision::Blocked { step } => AdvanceOutcome::Blocked { step },
            AdvanceDecision::Ignored => AdvanceOutcome::Ignored,
            AdvanceDecision::Submit(payload) => {
                let result = collaborator.submit(&payload).await;
                self.finish_submission(result)
            }
        }
    }

    /// Starts over with a new session id and default answers. Not allowed
    /// while a submission is in flight.
    pub fn reset(&mut self) -> Result<(), WizardError> {
        if self.session.submission_state == SubmissionState::Submitting {
            return Err(WizardError::InvalidTransition { action: "reset", state: "submitting" });
        }
        let previous = self.session.id.clone();
        self.session = fresh_session(&self.definition, &self.engine);
        debug!(
            event_name = "wizard.session_reset",
            previous_session_id = %previous,
            session_id = %self.session.id,
            "wizard session reset"
        );
        self.emit("wizard.session_reset", AuditCategory::Wizard, AuditOutcome::Success, |event| {
            event.with_metadata("previous_session_id", previous.0.clone())
        });
        Ok(())
    }

    fn refresh_price(&mut self) {
        self.session.computed_price =
            self.engine.total(self.definition.price_table(), &self.session.answers);
    }

    fn is_open(&self) -> bool {
        matches!(self.session.submission_state, SubmissionState::Idle | SubmissionState::Failed { .. })
    }

    fn ensure_open(&self, action: &'static str) -> Result<(), WizardError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition { action, state: self.state_label() })
        }
    }

    fn ensure_submitting(&self, action: &'static str) -> Result<(), WizardError> {
        if self.session.submission_state == SubmissionState::Submitting {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition { action, state: self.state_label() })
        }
    }

    fn state_label(&self) -> &'static str {
        match self.session.submission_state {
            SubmissionState::Idle => "collecting answers",
            SubmissionState::Submitting => "submitting",
            SubmissionState::Submitted => "submitted",
            SubmissionState::Failed { .. } => "failed",
        }
    }

    fn emit<F>(&self, event_type: &str, category: AuditCategory, outcome: AuditOutcome, decorate: F)
    where
        F: FnOnce(AuditEvent) -> AuditEvent,
    {
        let Some(hook) = &self.audit else {
            return;
        };
        let event = AuditEvent::new(
            Some(self.session.id.clone()),
            hook.context.correlation_id.clone(),
            event_type,
            category,
            hook.context.actor.clone(),
            outcome,
        )
        .with_metadata("wizard", self.definition.kind().as_str());
        hook.sink.emit(decorate(event));
    }
}

fn unknown_option<'a>(kind: &StepKind, value: &'a AnswerValue) -> Option<&'a str> {
    let options = kind.options();
    let offered = |choice: &String| options.iter().any(|option| &option.key == choice);
    match value {
        AnswerValue::Choice(choice) => (!offered(choice)).then_some(choice.as_str()),
        AnswerValue::Choices(choices) => {
            choices.iter().find(|&choice| !offered(choice)).map(String::as_str)
        }
        _ => None,
    }
}

fn fresh_session<Q: QuoteEngine>(definition: &WizardDefinition, engine: &Q) -> WizardSession {
    let answers = definition.default_answers();
    let computed_price = engine.total(definition.price_table(), &answers);
    WizardSession {
        id: SessionId::generate(),
        current_step_index: 0,
        answers,
        submission_state: SubmissionState::Idle,
        computed_price,
    }
}
