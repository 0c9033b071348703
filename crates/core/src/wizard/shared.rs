use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::answers::{AnswerValue, StepKey};
use crate::quote::{DeterministicQuoteEngine, QuoteEngine};
use crate::submission::SubmissionCollaborator;
use crate::wizard::controller::{WizardController, WizardError};
use crate::wizard::states::{AdvanceDecision, AdvanceOutcome, WizardSession};

/// A controller shared between concurrent callers, such as HTTP handlers.
///
/// The lock is only held for the synchronous halves of a transition. While the
/// collaborator is awaited the session sits in `Submitting`, so a second
/// `advance` is ignored instead of blocking or submitting again.
pub struct SharedWizard<Q = DeterministicQuoteEngine> {
    inner: Arc<Mutex<WizardController<Q>>>,
}

impl<Q> Clone for SharedWizard<Q> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<Q> SharedWizard<Q>
where
    Q: QuoteEngine,
{
    pub fn new(controller: WizardController<Q>) -> Self {
        Self { inner: Arc::new(Mutex::new(controller)) }
    }

    pub fn with<R>(&self, operation: impl FnOnce(&mut WizardController<Q>) -> R) -> R {
        operation(&mut self.lock())
    }

    pub fn session(&self) -> WizardSession {
        self.lock().session().clone()
    }

    pub fn record_answer(
        &self,
        key: impl Into<StepKey>,
        value: AnswerValue,
    ) -> Result<i64, WizardError> {
        self.lock().record_answer(key, value)
    }

    pub fn retreat(&self) -> Result<usize, WizardError> {
        self.lock().retreat()
    }

    pub fn reset(&self) -> Result<(), WizardError> {
        self.lock().reset()
    }

    pub async fn advance<C>(&self, collaborator: &C) -> AdvanceOutcome
    where
        C: SubmissionCollaborator + ?Sized,
    {
        let decision = self.with(|controller| controller.begin_advance());
        match decision {
            AdvanceDecision::Moved { from, to } => AdvanceOutcome::Moved { from, to },
            AdvanceDecision::Blocked { step } => AdvanceOutcome::Blocked { step },
            AdvanceDecision::Ignored => AdvanceOutcome::Ignored,
            AdvanceDecision::Submit(payload) => {
                let mut in_flight = InFlightSubmission { wizard: self, armed: true };
                let result = collaborator.submit(&payload).await;
                in_flight.armed = false;
                self.with(|controller| controller.finish_submission(result))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, WizardController<Q>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub const CANCELLED_REASON: &str = "submission cancelled before it completed";

/// Marks the session `Failed` if an `advance` future is dropped while the
/// collaborator is still running, so the session can be retried or reset
/// instead of staying in `Submitting`.
struct InFlightSubmission<'a, Q>
where
    Q: QuoteEngine,
{
    wizard: &'a SharedWizard<Q>,
    armed: bool,
}

impl<Q> Drop for InFlightSubmission<'_, Q>
where
    Q: QuoteEngine,
{
    fn drop(&mut self) {
        if self.armed {
            self.wizard.with(|controller| {
                let _ = controller.submission_failed(CANCELLED_REASON);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::domain::answers::{AnswerValue, ContactDetails};
    use crate::submission::{SubmissionCollaborator, SubmissionError, SubmissionPayload};
    use crate::wizard::catalog::audit_request;
    use crate::wizard::controller::WizardController;
    use crate::wizard::states::{AdvanceOutcome, WizardState};

    use super::{SharedWizard, CANCELLED_REASON};

    struct StalledCollaborator;

    #[async_trait]
    impl SubmissionCollaborator for StalledCollaborator {
        async fn submit(&self, _payload: &SubmissionPayload) -> Result<(), SubmissionError> {
            std::future::pending().await
        }
    }

    #[derive(Default)]
    struct GatedCollaborator {
        calls: AtomicUsize,
        gate: Notify,
    }

    #[async_trait]
    impl SubmissionCollaborator for GatedCollaborator {
        async fn submit(&self, _payload: &SubmissionPayload) -> Result<(), SubmissionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(())
        }
    }

    fn ready_to_submit() -> SharedWizard {
        let definition = Arc::new(audit_request().expect("audit definition"));
        let wizard = SharedWizard::new(WizardController::new(definition));
        wizard
            .record_answer("business_sector", AnswerValue::Choice("health".to_owned()))
            .expect("sector");
        wizard.record_answer("goals", AnswerValue::choices(["visibility"])).expect("goals");
        wizard.record_answer("budget", AnswerValue::Choice("high".to_owned())).expect("budget");
        wizard
            .record_answer(
                "contact",
                AnswerValue::Contact(ContactDetails {
                    first_name: "Luc".to_owned(),
                    last_name: "Bernard".to_owned(),
                    email: "luc@example.fr".to_owned(),
                    phone: Some("0601020304".to_owned()),
                }),
            )
            .expect("contact");
        wizard.with(|controller| {
            while controller.current_step_index() < controller.definition().last_step_index() {
                controller.begin_advance();
            }
        });
        wizard
    }

    #[tokio::test]
    async fn concurrent_advances_submit_exactly_once() {
        let wizard = ready_to_submit();
        let collaborator = GatedCollaborator::default();

        let (first, second, ()) = tokio::join!(wizard.advance(&collaborator), wizard.advance(&collaborator), async {
            tokio::task::yield_now().await;
            collaborator.gate.notify_one();
        });

        let mut outcomes = [first, second];
        outcomes.sort_by_key(|outcome| matches!(outcome, AdvanceOutcome::Ignored));
        assert_eq!(outcomes, [AdvanceOutcome::Submitted, AdvanceOutcome::Ignored]);
        assert_eq!(collaborator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(wizard.session().state(), WizardState::Submitted);
    }

    #[tokio::test]
    async fn session_is_readable_while_submission_is_in_flight() {
        let wizard = ready_to_submit();
        let collaborator = GatedCollaborator::default();

        let (outcome, observed) = tokio::join!(wizard.advance(&collaborator), async {
            tokio::task::yield_now().await;
            let observed = wizard.session().state();
            collaborator.gate.notify_one();
            observed
        });

        assert_eq!(observed, WizardState::Submitting);
        assert_eq!(outcome, AdvanceOutcome::Submitted);
    }

    #[tokio::test]
    async fn dropped_advance_leaves_the_session_retryable() {
        let wizard = ready_to_submit();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(5), wizard.advance(&StalledCollaborator))
                .await;
        assert!(timed_out.is_err());

        let state = wizard.session().state();
        assert!(
            matches!(state, WizardState::Failed { index: 4, ref reason } if reason == CANCELLED_REASON),
            "unexpected {state:?}"
        );

        let collaborator = GatedCollaborator::default();
        collaborator.gate.notify_one();
        assert_eq!(wizard.advance(&collaborator).await, AdvanceOutcome::Submitted);
        assert_eq!(collaborator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_advance_allows_reset() {
        let wizard = ready_to_submit();
        let first_id = wizard.session().id;

        let _ = tokio::time::timeout(Duration::from_millis(5), wizard.advance(&StalledCollaborator))
            .await;

        wizard.reset().expect("reset after cancelled submission");
        assert_ne!(wizard.session().id, first_id);
        assert_eq!(wizard.session().state(), WizardState::AtStep { index: 0 });
    }
}
