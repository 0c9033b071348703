use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use webfit_core::submission::{
    SubmissionError, SubmissionId, SubmissionPayload, SubmissionRecord, SubmissionStore,
};

use super::{persist_pending, RepositoryError, SubmissionRepository};

#[derive(Default)]
pub struct InMemorySubmissionRepository {
    submissions: RwLock<HashMap<String, SubmissionRecord>>,
}

impl InMemorySubmissionRepository {
    pub async fn len(&self) -> usize {
        self.submissions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.submissions.read().await.is_empty()
    }
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissionRepository {
    async fn save(&self, record: &SubmissionRecord) -> Result<(), RepositoryError> {
        let mut submissions = self.submissions.write().await;
        submissions.insert(record.id.0.clone(), record.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let submissions = self.submissions.read().await;
        Ok(submissions.get(&id.0).cloned())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        let submissions = self.submissions.read().await;
        let mut records: Vec<SubmissionRecord> = submissions.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.0.cmp(&a.id.0)));
        records.truncate(limit as usize);
        Ok(records)
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionRepository {
    async fn persist(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionRecord, SubmissionError> {
        persist_pending(self, payload).await
    }
}
