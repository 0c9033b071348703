pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "webfit",
    about = "Webfit operator CLI",
    long_about = "Price answer sets offline, inspect wizard definitions and configuration, \
                  and check runtime readiness.",
    after_help = "Examples:\n  webfit price --wizard pricing --answers answers.json\n  \
                  webfit catalog --wizard audit\n  webfit doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Price an answer set against a wizard's price table and print the breakdown")]
    Price {
        #[arg(long, default_value = "pricing", help = "Wizard kind (pricing|audit)")]
        wizard: String,
        #[arg(long, help = "Path to a JSON answer set")]
        answers: PathBuf,
    },
    #[command(about = "Print the effective wizard definition, including catalog overrides")]
    Catalog {
        #[arg(long, default_value = "pricing", help = "Wizard kind (pricing|audit)")]
        wizard: String,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, wizard catalog, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Price { wizard, answers } => commands::price::run(&wizard, &answers),
        Command::Catalog { wizard } => commands::catalog::run(&wizard),
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
