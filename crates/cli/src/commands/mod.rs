pub mod catalog;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod price;

use serde::Serialize;
use webfit_core::config::{AppConfig, LoadOptions};
use webfit_core::wizard::{Catalog, WizardKind};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Config and catalog shared by the commands that read wizard definitions.
/// Exit code 2 covers both, matching `migrate`.
pub(crate) fn load_catalog(command: &str, wizard: &str) -> Result<(WizardKind, Catalog), CommandResult> {
    let kind = wizard.parse::<WizardKind>().map_err(|error| {
        CommandResult::failure(command, "invalid_argument", error.to_string(), 64)
    })?;
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;
    let catalog = Catalog::load(
        config.catalog.pricing_path.as_deref(),
        config.catalog.audit_path.as_deref(),
    )
    .map_err(|error| CommandResult::failure(command, "catalog", error.to_string(), 2))?;
    Ok((kind, catalog))
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
