use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use webfit_core::domain::answers::{AnswerSet, ContactDetails};
use webfit_core::submission::{
    SubmissionError, SubmissionId, SubmissionPayload, SubmissionRecord, SubmissionStore,
};
use webfit_core::wizard::{SessionId, WizardKind};

use super::{persist_pending, RepositoryError, SubmissionRepository};
use crate::DbPool;

pub struct SqlSubmissionRepository {
    pool: DbPool,
}

impl SqlSubmissionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionRepository for SqlSubmissionRepository {
    async fn save(&self, record: &SubmissionRecord) -> Result<(), RepositoryError> {
        let answers_json = serde_json::to_string(&record.answers)
            .map_err(|error| RepositoryError::Decode(format!("answers not encodable: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO wizard_submission (
                id, session_id, kind, answers_json, estimated_price,
                first_name, last_name, email, phone, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id.0)
        .bind(&record.session_id.0)
        .bind(record.kind.as_str())
        .bind(answers_json)
        .bind(record.estimated_price)
        .bind(record.contact.first_name.trim())
        .bind(record.contact.last_name.trim())
        .bind(record.contact.email.trim())
        .bind(record.contact.phone())
        .bind(&record.status)
        .bind(record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                id, session_id, kind, answers_json, estimated_price,
                first_name, last_name, email, phone, status, created_at
            FROM wizard_submission
            WHERE id = ?
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| submission_from_row(&r)).transpose()
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, session_id, kind, answers_json, estimated_price,
                first_name, last_name, email, phone, status, created_at
            FROM wizard_submission
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(submission_from_row).collect()
    }
}

#[async_trait]
impl SubmissionStore for SqlSubmissionRepository {
    async fn persist(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionRecord, SubmissionError> {
        persist_pending(self, payload).await
    }
}

fn submission_from_row(row: &SqliteRow) -> Result<SubmissionRecord, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    let answers_json: String = row.try_get("answers_json")?;
    let created_at: String = row.try_get("created_at")?;

    let answers: AnswerSet = serde_json::from_str(&answers_json)
        .map_err(|error| RepositoryError::Decode(format!("invalid answers_json: {error}")))?;

    Ok(SubmissionRecord {
        id: SubmissionId(row.try_get("id")?),
        session_id: SessionId(row.try_get("session_id")?),
        kind: kind
            .parse::<WizardKind>()
            .map_err(|_| RepositoryError::Decode(format!("invalid kind: {kind}")))?,
        answers,
        estimated_price: row.try_get("estimated_price")?,
        contact: ContactDetails {
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
        },
        status: row.try_get("status")?,
        created_at: parse_timestamp("created_at", created_at)?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}

#[cfg(test)]
mod tests {
    use webfit_core::domain::answers::{AnswerSet, AnswerValue, ContactDetails};
    use webfit_core::submission::{
        SubmissionId, SubmissionPayload, SubmissionStore, PENDING_STATUS,
    };
    use webfit_core::wizard::{SessionId, WizardKind};

    use super::SqlSubmissionRepository;
    use crate::repositories::SubmissionRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn payload(session: &str, price: i64, phone: Option<&str>) -> SubmissionPayload {
        SubmissionPayload {
            session_id: SessionId(session.to_owned()),
            kind: WizardKind::PricingSimulator,
            answers: AnswerSet::new()
                .with("project_type", AnswerValue::Choice("ecommerce".to_owned()))
                .with("pages", AnswerValue::Number(12))
                .with("features", AnswerValue::choices(["seo", "crm"])),
            computed_price: price,
            contact: ContactDetails {
                first_name: " Jeanne ".to_owned(),
                last_name: "Martin".to_owned(),
                email: "jeanne@example.fr".to_owned(),
                phone: phone.map(str::to_owned),
            },
        }
    }

    #[tokio::test]
    async fn persisted_submission_is_pending_and_readable() {
        let pool = setup_pool().await;
        let repo = SqlSubmissionRepository::new(pool.clone());

        let record = repo.persist(&payload("sess-1", 1190, Some("  "))).await.expect("persist");
        assert_eq!(record.status, PENDING_STATUS);
        assert_eq!(record.estimated_price, 1190);

        let stored = repo.find_by_id(&record.id).await.expect("find").expect("record exists");
        assert_eq!(stored.id, record.id);
        assert_eq!(stored.answers, record.answers);
        assert_eq!(stored.kind, WizardKind::PricingSimulator);
        assert_eq!(stored.contact.first_name, "Jeanne");
        assert_eq!(stored.contact.phone, None);
        assert_eq!(stored.status, "pending");

        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_submission_is_none() {
        let pool = setup_pool().await;
        let repo = SqlSubmissionRepository::new(pool.clone());

        let found = repo.find_by_id(&SubmissionId("missing".to_owned())).await.expect("find");
        assert!(found.is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn list_recent_is_newest_first_and_limited() {
        let pool = setup_pool().await;
        let repo = SqlSubmissionRepository::new(pool.clone());

        let mut ids = Vec::new();
        for (index, price) in [500, 800, 1200].into_iter().enumerate() {
            let mut record = webfit_core::submission::SubmissionRecord::pending(&payload(
                &format!("sess-{index}"),
                price,
                Some("0601020304"),
            ));
            record.created_at += chrono::Duration::seconds(index as i64);
            repo.save(&record).await.expect("save");
            ids.push(record.id);
        }

        let recent = repo.list_recent(2).await.expect("list");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, ids[2]);
        assert_eq!(recent[1].id, ids[1]);
        assert_eq!(recent[0].contact.phone.as_deref(), Some("0601020304"));

        pool.close().await;
    }

    #[tokio::test]
    async fn persist_reports_failure_when_schema_is_missing() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        let repo = SqlSubmissionRepository::new(pool.clone());

        let error = repo.persist(&payload("sess-x", 500, None)).await.expect_err("no table");
        assert!(error.to_string().contains("could not be saved"));

        pool.close().await;
    }
}
