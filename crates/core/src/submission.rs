use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::answers::{AnswerSet, ContactDetails};
use crate::wizard::definition::WizardKind;
use crate::wizard::states::SessionId;

pub const PENDING_STATUS: &str = "pending";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub session_id: SessionId,
    pub kind: WizardKind,
    pub answers: AnswerSet,
    pub computed_price: i64,
    pub contact: ContactDetails,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

/// A submission as the backend stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub session_id: SessionId,
    pub kind: WizardKind,
    pub answers: AnswerSet,
    pub estimated_price: i64,
    pub contact: ContactDetails,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn pending(payload: &SubmissionPayload) -> Self {
        Self {
            id: SubmissionId(Uuid::new_v4().to_string()),
            session_id: payload.session_id.clone(),
            kind: payload.kind,
            answers: payload.answers.clone(),
            estimated_price: payload.computed_price,
            contact: payload.contact.clone(),
            status: PENDING_STATUS.to_owned(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("submission could not be saved: {0}")]
    Persistence(String),
    #[error("submission backend unavailable: {0}")]
    Unavailable(String),
    #[error("submission rejected: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification endpoint rejected the request with status {status}")]
    Rejected { status: u16 },
}

/// Receives a completed wizard. Only its outcome decides whether the wizard
/// ends `Submitted` or `Failed`.
#[async_trait]
pub trait SubmissionCollaborator: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<(), SubmissionError>;
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn persist(&self, payload: &SubmissionPayload)
        -> Result<SubmissionRecord, SubmissionError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), NotificationError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _record: &SubmissionRecord) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Persists the submission, then fires the notifier. A notifier failure is
/// logged and swallowed: the submission already succeeded.
pub struct PersistThenNotify<S, N> {
    store: S,
    notifier: N,
}

impl<S, N> PersistThenNotify<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S, N> SubmissionCollaborator for PersistThenNotify<S, N>
where
    S: SubmissionStore,
    N: Notifier,
{
    async fn submit(&self, payload: &SubmissionPayload) -> Result<(), SubmissionError> {
        let record = self.store.persist(payload).await?;
        info!(
            event_name = "submission.persisted",
            session_id = %payload.session_id,
            submission_id = %record.id.0,
            kind = payload.kind.as_str(),
            estimated_price = record.estimated_price,
            "wizard submission persisted"
        );

        if let Err(error) = self.notifier.notify(&record).await {
            warn!(
                event_name = "submission.notification_failed",
                session_id = %payload.session_id,
                submission_id = %record.id.0,
                error = %error,
                "notification failed; submission kept"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::domain::answers::{AnswerSet, AnswerValue, ContactDetails};
    use crate::wizard::definition::WizardKind;
    use crate::wizard::states::SessionId;

    use super::{
        NotificationError, Notifier, PersistThenNotify, SubmissionCollaborator, SubmissionError,
        SubmissionPayload, SubmissionRecord, SubmissionStore, PENDING_STATUS,
    };

    #[derive(Default)]
    struct RecordingStore {
        fail: bool,
        records: Mutex<Vec<SubmissionRecord>>,
    }

    #[async_trait]
    impl SubmissionStore for RecordingStore {
        async fn persist(
            &self,
            payload: &SubmissionPayload,
        ) -> Result<SubmissionRecord, SubmissionError> {
            if self.fail {
                return Err(SubmissionError::Unavailable("connection refused".to_owned()));
            }
            let record = SubmissionRecord::pending(payload);
            self.records.lock().expect("records lock").push(record.clone());
            Ok(record)
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _record: &SubmissionRecord) -> Result<(), NotificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NotificationError::Rejected { status: 502 });
            }
            Ok(())
        }
    }

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            session_id: SessionId("S-1".to_owned()),
            kind: WizardKind::PricingSimulator,
            answers: AnswerSet::new().with("pages", AnswerValue::Number(8)),
            computed_price: 560,
            contact: ContactDetails {
                first_name: "Hugo".to_owned(),
                last_name: "Bernard".to_owned(),
                email: "hugo@example.fr".to_owned(),
                phone: None,
            },
        }
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_submission() {
        let collaborator = PersistThenNotify::new(
            RecordingStore::default(),
            CountingNotifier { fail: true, ..CountingNotifier::default() },
        );

        collaborator.submit(&payload()).await.expect("persisted submission succeeds");

        let records = collaborator.store().records.lock().expect("records lock").clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, PENDING_STATUS);
        assert_eq!(records[0].estimated_price, 560);
        assert_eq!(collaborator.notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn persistence_failure_skips_notification() {
        let collaborator = PersistThenNotify::new(
            RecordingStore { fail: true, ..RecordingStore::default() },
            CountingNotifier::default(),
        );

        let error = collaborator.submit(&payload()).await.expect_err("store is down");

        assert!(matches!(error, SubmissionError::Unavailable(_)));
        assert_eq!(collaborator.notifier.calls.load(Ordering::SeqCst), 0);
    }
}
