use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use webfit_core::audit::TracingAuditSink;
use webfit_core::config::{AppConfig, ConfigError, LoadOptions};
use webfit_core::submission::PersistThenNotify;
use webfit_core::wizard::{Catalog, CatalogError};
use webfit_db::{connect_from_config, migrations, DbPool, SqlSubmissionRepository};

use crate::api::{ApiState, SessionRegistry};
use crate::notification::ConfiguredNotifier;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState,
    pub notification_mode: &'static str,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notification client could not be built: {0}")]
    Notifier(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let catalog =
        Catalog::load(config.catalog.pricing_path.as_deref(), config.catalog.audit_path.as_deref())?;
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        pricing_override = config.catalog.pricing_path.is_some(),
        audit_override = config.catalog.audit_path.is_some(),
        "wizard catalog loaded"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notifier =
        ConfiguredNotifier::from_config(&config.notification).map_err(BootstrapError::Notifier)?;
    let notification_mode = notifier.mode();
    let collaborator =
        PersistThenNotify::new(SqlSubmissionRepository::new(db_pool.clone()), notifier);

    let api = ApiState {
        catalog,
        sessions: SessionRegistry::default(),
        collaborator: Arc::new(collaborator),
        audit: Arc::new(TracingAuditSink),
    };

    Ok(Application { config, db_pool, api, notification_mode })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use webfit_core::config::{ConfigOverrides, LoadOptions};
    use webfit_core::domain::answers::{AnswerValue, ContactDetails};
    use webfit_core::wizard::{AdvanceOutcome, SharedWizard, WizardController, WizardKind};
    use webfit_db::{SqlSubmissionRepository, SubmissionRepository};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_catalog_override() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("pricing.toml");
        fs::write(&path, "kind = \"pricing_simulator\"\nsteps = []\n[price_table]\n")
            .expect("write definition");

        let mut options = options("sqlite::memory:");
        options.overrides.pricing_catalog_path = Some(path);
        let result = bootstrap(options).await;

        assert!(matches!(result, Err(BootstrapError::Catalog(_))));
    }

    #[tokio::test]
    async fn bootstrap_wires_submissions_to_the_database() {
        let app = bootstrap(options("sqlite::memory:")).await.expect("bootstrap");
        assert_eq!(app.notification_mode, "disabled");

        let wizard =
            SharedWizard::new(WizardController::new(app.api.catalog.get(WizardKind::AuditRequest)));
        wizard
            .record_answer("business_sector", AnswerValue::Choice("services".to_owned()))
            .expect("sector");
        wizard.record_answer("goals", AnswerValue::choices(["automation"])).expect("goals");
        wizard.record_answer("budget", AnswerValue::Choice("premium".to_owned())).expect("budget");
        wizard
            .record_answer(
                "contact",
                AnswerValue::Contact(ContactDetails {
                    first_name: "Inès".to_owned(),
                    last_name: "Roux".to_owned(),
                    email: "ines@example.fr".to_owned(),
                    phone: Some("0611223344".to_owned()),
                }),
            )
            .expect("contact");

        let mut last = AdvanceOutcome::Ignored;
        for _ in 0..5 {
            last = wizard.advance(app.api.collaborator.as_ref()).await;
        }
        assert_eq!(last, AdvanceOutcome::Submitted);

        let stored = SqlSubmissionRepository::new(app.db_pool.clone())
            .list_recent(5)
            .await
            .expect("list submissions");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, WizardKind::AuditRequest);
        assert_eq!(stored[0].contact.phone.as_deref(), Some("0611223344"));

        app.db_pool.close().await;
    }
}
