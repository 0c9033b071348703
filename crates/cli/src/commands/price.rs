use std::fs;
use std::path::Path;

use serde::Serialize;
use webfit_core::quote::QuoteBreakdown;
use webfit_core::wizard::WizardKind;
use webfit_core::{price_with_trace, AnswerSet};

use crate::commands::{load_catalog, CommandResult};

#[derive(Debug, Serialize)]
struct PriceReport<'a> {
    command: &'static str,
    status: &'static str,
    wizard: WizardKind,
    ignored_keys: Vec<&'a str>,
    breakdown: QuoteBreakdown,
}

/// Prices a JSON answer set offline. Keys the wizard does not declare are
/// reported and never priced.
pub fn run(wizard: &str, answers_path: &Path) -> CommandResult {
    let (kind, catalog) = match load_catalog("price", wizard) {
        Ok(loaded) => loaded,
        Err(result) => return result,
    };

    let raw = match fs::read_to_string(answers_path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "price",
                "answers_read",
                format!("could not read `{}`: {error}", answers_path.display()),
                66,
            );
        }
    };
    let answers: AnswerSet = match serde_json::from_str(&raw) {
        Ok(answers) => answers,
        Err(error) => {
            return CommandResult::failure(
                "price",
                "answers_parse",
                format!("`{}` is not a valid answer set: {error}", answers_path.display()),
                65,
            );
        }
    };

    let definition = catalog.get(kind);
    let ignored_keys = answers
        .iter()
        .map(|(key, _)| key)
        .filter(|key| definition.step_by_key(key).is_none())
        .map(|key| key.as_str())
        .collect();

    let report = PriceReport {
        command: "price",
        status: "ok",
        wizard: kind,
        ignored_keys,
        breakdown: price_with_trace(definition.price_table(), &answers),
    };

    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("price", "serialization", error.to_string(), 70),
    }
}
