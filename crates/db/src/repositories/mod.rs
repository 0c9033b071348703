use async_trait::async_trait;
use thiserror::Error;

use webfit_core::submission::{
    SubmissionError, SubmissionId, SubmissionPayload, SubmissionRecord,
};

pub mod memory;
pub mod submission;

pub use memory::InMemorySubmissionRepository;
pub use submission::SqlSubmissionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for SubmissionError {
    fn from(value: RepositoryError) -> Self {
        match &value {
            RepositoryError::Database(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
                Self::Unavailable(value.to_string())
            }
            _ => Self::Persistence(value.to_string()),
        }
    }
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn save(&self, record: &SubmissionRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError>;
    /// Newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<SubmissionRecord>, RepositoryError>;
}

/// Stores `payload` as a new pending submission.
pub(crate) async fn persist_pending<R>(
    repository: &R,
    payload: &SubmissionPayload,
) -> Result<SubmissionRecord, SubmissionError>
where
    R: SubmissionRepository + ?Sized,
{
    let record = SubmissionRecord::pending(payload);
    repository.save(&record).await?;
    Ok(record)
}
