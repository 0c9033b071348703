use crate::commands::{load_catalog, CommandResult};

pub fn run(wizard: &str) -> CommandResult {
    let (kind, catalog) = match load_catalog("catalog", wizard) {
        Ok(loaded) => loaded,
        Err(result) => return result,
    };

    match serde_json::to_string_pretty(catalog.get(kind).as_ref()) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("catalog", "serialization", error.to_string(), 70),
    }
}
