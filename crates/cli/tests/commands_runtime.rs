use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use serde_json::{json, Value};
use tempfile::TempDir;
use webfit_cli::commands::{catalog, config, doctor, migrate, price};

#[test]
fn price_prints_breakdown_for_answer_file() {
    let dir = TempDir::new().expect("tempdir");
    let answers = write_answers(
        dir.path(),
        json!({
            "project_type": { "type": "choice", "value": "ecommerce" },
            "pages": { "type": "number", "value": 12 },
            "features": { "type": "choices", "value": ["seo", "ecommerce"] },
            "timeline": { "type": "choice", "value": "standard" },
            "support": { "type": "choice", "value": "priority" },
            "newsletter": { "type": "text", "value": "oui" }
        }),
    );

    with_env(&[], || {
        let result = price::run("pricing", &answers);
        assert_eq!(result.exit_code, 0, "expected successful price run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "price");
        assert_eq!(payload["wizard"], "pricing_simulator");
        assert_eq!(payload["breakdown"]["total"], 1190);
        assert_eq!(payload["breakdown"]["floor_applied"], false);
        assert_eq!(payload["ignored_keys"], json!(["newsletter"]));
    });
}

#[test]
fn price_of_empty_answer_set_is_base_price() {
    let dir = TempDir::new().expect("tempdir");
    let answers = write_answers(dir.path(), json!({}));

    with_env(&[], || {
        let result = price::run("pricing_simulator", &answers);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["breakdown"]["total"], 500);
    });
}

#[test]
fn price_rejects_unknown_wizard_kind() {
    let dir = TempDir::new().expect("tempdir");
    let answers = write_answers(dir.path(), json!({}));

    with_env(&[], || {
        let result = price::run("newsletter", &answers);
        assert_eq!(result.exit_code, 64);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_argument");
    });
}

#[test]
fn price_reports_malformed_answer_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("answers.json");
    fs::write(&path, "{ \"pages\": 12 }").expect("write answers");

    with_env(&[], || {
        let result = price::run("pricing", &path);
        assert_eq!(result.exit_code, 65);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "answers_parse");
    });
}

#[test]
fn price_reports_missing_answer_file() {
    let dir = TempDir::new().expect("tempdir");

    with_env(&[], || {
        let result = price::run("pricing", &dir.path().join("absent.json"));
        assert_eq!(result.exit_code, 66);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "answers_read");
    });
}

#[test]
fn catalog_prints_audit_definition() {
    with_env(&[], || {
        let result = catalog::run("audit");
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["kind"], "audit_request");
        let steps = payload["steps"].as_array().expect("steps array");
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[4]["type"], "contact");
    });
}

#[test]
fn catalog_honours_configured_definition_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("pricing.toml");
    fs::write(
        &path,
        r#"
kind = "pricing_simulator"

[[steps]]
key = "project_type"
title = "Type"
type = "single_select"
options = [{ key = "vitrine", label = "Vitrine" }]

[[steps]]
key = "contact"
title = "Contact"
type = "contact"

[price_table]
base_price = 800
price_floor = 400
groups = []
"#,
    )
    .expect("write definition");
    let path_value = path.display().to_string();

    with_env(&[("WEBFIT_CATALOG_PRICING_PATH", path_value.as_str())], || {
        let result = catalog::run("pricing");
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["steps"].as_array().map(Vec::len), Some(2));
        assert_eq!(payload["price_table"]["base_price"], 800);
    });
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("WEBFIT_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_env() {
    with_env(&[("WEBFIT_DATABASE_MAX_CONNECTIONS", "many")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_passes_with_memory_database() {
    with_env(&[("WEBFIT_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "unexpected report: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(
            names,
            ["config_validation", "wizard_catalog", "notification", "database_connectivity"]
        );
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    with_env(&[("WEBFIT_SERVER_PORT", "not-a-port")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][3]["status"], "skipped");
    });
}

#[test]
fn doctor_human_output_marks_each_check() {
    with_env(&[("WEBFIT_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(false);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] wizard_catalog: pricing_simulator: 6 steps"));
    });
}

#[test]
fn config_redacts_notification_api_key() {
    with_env(
        &[
            ("WEBFIT_DATABASE_URL", "sqlite::memory:"),
            ("WEBFIT_NOTIFICATION_ENABLED", "true"),
            ("WEBFIT_NOTIFICATION_WEBHOOK_URL", "https://hooks.example.test/leads"),
            ("WEBFIT_NOTIFICATION_API_KEY", "sk-live-0123456789"),
        ],
        || {
            let output = config::run();
            assert!(output.contains(
                "- database.url = sqlite::memory: (source: env (WEBFIT_DATABASE_URL))"
            ));
            assert!(output.contains("- notification.api_key = sk-l***"));
            assert!(!output.contains("0123456789"));
            assert!(output.contains("- catalog.pricing_path = <built-in> (source: default)"));
        },
    );
}

fn write_answers(dir: &Path, answers: Value) -> std::path::PathBuf {
    let path = dir.join("answers.json");
    fs::write(&path, answers.to_string()).expect("write answers");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "WEBFIT_DATABASE_URL",
        "WEBFIT_DATABASE_MAX_CONNECTIONS",
        "WEBFIT_DATABASE_TIMEOUT_SECS",
        "WEBFIT_SERVER_BIND_ADDRESS",
        "WEBFIT_SERVER_PORT",
        "WEBFIT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "WEBFIT_NOTIFICATION_ENABLED",
        "WEBFIT_NOTIFICATION_WEBHOOK_URL",
        "WEBFIT_NOTIFICATION_API_KEY",
        "WEBFIT_NOTIFICATION_TIMEOUT_SECS",
        "WEBFIT_CATALOG_PRICING_PATH",
        "WEBFIT_CATALOG_AUDIT_PATH",
        "WEBFIT_LOGGING_LEVEL",
        "WEBFIT_LOGGING_FORMAT",
        "WEBFIT_LOG_LEVEL",
        "WEBFIT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
